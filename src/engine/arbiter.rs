use chrono::{Timelike, Utc};
use dashmap::mapref::entry::Entry;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::AssignmentStatus;
use crate::models::order::{ShopOrderStatus, ShopOrderSummary};
use crate::models::principal::{Principal, Role};
use crate::realtime;
use crate::state::{ActiveDelivery, AppState};

/// Resolves the race between couriers accepting the same assignment.
///
/// The winner is decided by a conditional update executed while holding the
/// assignment's map entry: "set accepted and accepted_by only if currently
/// open". Losers observe `AlreadyTaken`. The courier's single-active-slot
/// reservation is taken first and rolled back if the conditional update
/// does not go through.
pub fn accept(
    state: &AppState,
    assignment_id: Uuid,
    actor: Principal,
) -> Result<ShopOrderSummary, AppError> {
    if actor.role != Role::Courier {
        return Err(AppError::Forbidden(
            "only couriers may accept assignments".to_string(),
        ));
    }
    let courier_id = actor.id;

    let reservation = match state.active_deliveries.entry(courier_id) {
        Entry::Occupied(_) => {
            record_outcome(state, "conflict");
            return Err(AppError::Conflict(
                "courier already has an active delivery".to_string(),
            ));
        }
        Entry::Vacant(slot) => slot,
    };

    let (order_id, shop_id) = {
        let mut entry = match state.assignments.get_mut(&assignment_id) {
            Some(entry) => entry,
            None => {
                drop(reservation);
                return Err(AppError::NotFound(format!(
                    "assignment {assignment_id} not found"
                )));
            }
        };
        let assignment = entry.value_mut();
        match assignment.status {
            AssignmentStatus::Open => {
                assignment.status = AssignmentStatus::Accepted;
                assignment.accepted_by = Some(courier_id);
                (assignment.order_id, assignment.shop_id)
            }
            AssignmentStatus::Accepted => {
                drop(entry);
                drop(reservation);
                record_outcome(state, "lost");
                return Err(AppError::AlreadyTaken);
            }
            AssignmentStatus::Cancelled => {
                drop(entry);
                drop(reservation);
                record_outcome(state, "conflict");
                return Err(AppError::Conflict(
                    "assignment is no longer available".to_string(),
                ));
            }
        }
    };

    reservation.insert(ActiveDelivery {
        order_id,
        shop_id,
        assignment_id,
    });
    state.metrics.assignments_open.dec();

    // Bind the winner onto the aggregate. The shop order may have been
    // cancelled between the conditional update and here; the acceptance
    // stays terminal either way, only the reservation is rolled back.
    let bind = {
        match state.orders.get_mut(&order_id) {
            None => Err(AppError::Internal(format!(
                "assignment {assignment_id} points at missing order {order_id}"
            ))),
            Some(mut entry) => {
                let order = entry.value_mut();
                let customer_id = order.customer_id;
                let address = order.address.clone();
                let payment_method = order.payment_method;
                let created_at = order.created_at;
                match order.shop_order_mut(shop_id) {
                    None => Err(AppError::Internal(format!(
                        "assignment {assignment_id} points at a missing shop order"
                    ))),
                    Some(shop_order) if shop_order.status.is_terminal() => {
                        Err(AppError::Conflict(
                            "delivery was cancelled before acceptance completed".to_string(),
                        ))
                    }
                    Some(shop_order) if shop_order.assigned_courier.is_some() => {
                        Err(AppError::Conflict(
                            "delivery is already bound to another courier".to_string(),
                        ))
                    }
                    Some(shop_order) => {
                        shop_order.assigned_courier = Some(courier_id);
                        Ok(ShopOrderSummary {
                            order_id,
                            customer_id,
                            address,
                            payment_method,
                            created_at,
                            shop_order: shop_order.clone(),
                        })
                    }
                }
            }
        }
    };

    let summary = match bind {
        Ok(summary) => summary,
        Err(err) => {
            state.active_deliveries.remove_if(&courier_id, |_, active| {
                active.assignment_id == assignment_id
            });
            record_outcome(state, "conflict");
            return Err(err);
        }
    };

    record_outcome(state, "won");
    realtime::status_changed(
        state,
        summary.customer_id,
        order_id,
        shop_id,
        summary.shop_order.status,
        Some(courier_id),
    );
    info!(
        assignment_id = %assignment_id,
        courier_id = %courier_id,
        order_id = %order_id,
        "assignment accepted"
    );

    Ok(summary)
}

/// The courier's currently bound, non-terminal delivery, if any.
pub fn current_assignment(state: &AppState, courier_id: Uuid) -> Option<ShopOrderSummary> {
    let active = state
        .active_deliveries
        .get(&courier_id)
        .map(|entry| *entry.value())?;
    let order = state.orders.get(&active.order_id)?;
    let shop_order = order.shop_order(active.shop_id)?;
    if shop_order.status.is_terminal() {
        return None;
    }
    Some(ShopOrderSummary {
        order_id: order.id,
        customer_id: order.customer_id,
        address: order.address.clone(),
        payment_method: order.payment_method,
        created_at: order.created_at,
        shop_order: shop_order.clone(),
    })
}

/// Dashboard histogram: deliveries this courier completed today, bucketed
/// by the hour the delivery was marked delivered.
pub fn today_deliveries(state: &AppState, courier_id: Uuid) -> [u32; 24] {
    let today = Utc::now().date_naive();
    let mut buckets = [0u32; 24];

    for entry in state.orders.iter() {
        for shop_order in &entry.value().shop_orders {
            if shop_order.assigned_courier != Some(courier_id)
                || shop_order.status != ShopOrderStatus::Delivered
            {
                continue;
            }
            let Some(delivered_at) = shop_order.delivered_at else {
                continue;
            };
            if delivered_at.date_naive() == today {
                buckets[delivered_at.hour() as usize] += 1;
            }
        }
    }

    buckets
}

fn record_outcome(state: &AppState, outcome: &str) {
    state
        .metrics
        .accept_attempts_total
        .with_label_values(&[outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::{accept, current_assignment, today_deliveries};
    use crate::catalog::{CatalogItem, Shop};
    use crate::error::AppError;
    use crate::models::courier::GeoPoint;
    use crate::models::order::{DeliveryAddress, Order, PaymentMethod, ShopOrderStatus};
    use crate::models::principal::{Principal, Role};
    use crate::state::AppState;
    use crate::store::{self, CartLine};

    fn customer() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role: Role::Customer,
        }
    }

    fn courier() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role: Role::Courier,
        }
    }

    async fn seeded_order(state: &AppState) -> (Order, Principal) {
        let owner_id = Uuid::new_v4();
        let shop_id = Uuid::new_v4();
        let item_id = Uuid::new_v4();
        state.catalog.insert_shop(Shop {
            id: shop_id,
            owner_id,
            name: "Biryani House".to_string(),
            location: GeoPoint {
                lat: 28.61,
                lng: 77.21,
            },
        });
        state.catalog.insert_item(CatalogItem {
            id: item_id,
            shop_id,
            name: "Chicken Biryani".to_string(),
            price: 150,
        });

        let buyer = customer();
        let order = store::place_order(
            state,
            buyer,
            vec![CartLine {
                item_id,
                quantity: 1,
            }],
            DeliveryAddress {
                text: "14 Lake Road".to_string(),
                location: GeoPoint {
                    lat: 28.60,
                    lng: 77.20,
                },
            },
            PaymentMethod::CashOnDelivery,
        )
        .await
        .unwrap();

        let owner = Principal {
            id: owner_id,
            role: Role::Owner,
        };
        (order, owner)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exactly_one_of_many_concurrent_accepts_wins() {
        let (state, _rx) = AppState::new(64, 0.0);
        let state = Arc::new(state);
        let (order, _owner) = seeded_order(&state).await;
        let assignment_id = order.shop_orders[0].assignment_id.unwrap();

        let couriers: Vec<Principal> = (0..8).map(|_| courier()).collect();
        let mut outcomes = Vec::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = couriers
                .iter()
                .map(|c| {
                    let state = state.clone();
                    let c = *c;
                    scope.spawn(move || accept(&state, assignment_id, c))
                })
                .collect();
            for handle in handles {
                outcomes.push(handle.join().unwrap());
            }
        });

        let winners: Vec<_> = outcomes.iter().filter(|o| o.is_ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(
            outcomes
                .iter()
                .filter(|o| o.is_err())
                .all(|o| matches!(o, Err(AppError::AlreadyTaken)))
        );

        let winner_id = winners[0].as_ref().unwrap().shop_order.assigned_courier;
        let assignment = state.assignments.get(&assignment_id).unwrap();
        assert_eq!(assignment.accepted_by, winner_id);
    }

    #[tokio::test]
    async fn courier_with_active_delivery_cannot_accept_a_second() {
        let (state, _rx) = AppState::new(64, 0.0);
        let (first, _) = seeded_order(&state).await;
        let (second, _) = seeded_order(&state).await;
        let rider = courier();

        accept(&state, first.shop_orders[0].assignment_id.unwrap(), rider).unwrap();
        let err = accept(&state, second.shop_orders[0].assignment_id.unwrap(), rider).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert!(current_assignment(&state, rider.id).is_some());
    }

    #[tokio::test]
    async fn slot_frees_after_delivery_completes() {
        let (state, _rx) = AppState::new(64, 0.0);
        let (order, owner) = seeded_order(&state).await;
        let shop_id = order.shop_orders[0].shop_id;
        let rider = courier();

        accept(&state, order.shop_orders[0].assignment_id.unwrap(), rider).unwrap();
        store::transition_status(&state, order.id, shop_id, owner, ShopOrderStatus::Preparing)
            .unwrap();
        store::transition_status(
            &state,
            order.id,
            shop_id,
            owner,
            ShopOrderStatus::OutForDelivery,
        )
        .unwrap();
        store::transition_status(&state, order.id, shop_id, rider, ShopOrderStatus::Delivered)
            .unwrap();

        assert!(current_assignment(&state, rider.id).is_none());
        let histogram = today_deliveries(&state, rider.id);
        assert_eq!(histogram.iter().sum::<u32>(), 1);

        let (next, _) = seeded_order(&state).await;
        accept(&state, next.shop_orders[0].assignment_id.unwrap(), rider).unwrap();
    }

    #[tokio::test]
    async fn accepting_a_cancelled_assignment_is_a_conflict() {
        let (state, _rx) = AppState::new(64, 0.0);
        let (order, _) = seeded_order(&state).await;
        let buyer = Principal {
            id: order.customer_id,
            role: Role::Customer,
        };
        store::cancel_order(&state, order.id, buyer).unwrap();

        let err =
            accept(&state, order.shop_orders[0].assignment_id.unwrap(), courier()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
