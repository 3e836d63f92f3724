use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::engine::fees::{MIN_SHOP_SUBTOTAL, delivery_fee};
use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::order::{
    DeliveryAddress, Order, OrderLine, PaymentMethod, ShopOrder, ShopOrderStatus, ShopOrderSummary,
};
use crate::models::principal::{Principal, Role};
use crate::payment::{PaymentOutcome, PaymentProvider};
use crate::realtime;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub quantity: u32,
}

/// Creates the Order aggregate with one ShopOrder per shop in the cart.
/// Cash orders are finalized (and dispatched) immediately; online orders
/// stay in a pending-payment shadow until the provider confirms.
pub async fn place_order(
    state: &AppState,
    actor: Principal,
    lines: Vec<CartLine>,
    address: DeliveryAddress,
    payment_method: PaymentMethod,
) -> Result<Order, AppError> {
    if actor.role != Role::Customer {
        return Err(AppError::Forbidden(
            "only customers may place orders".to_string(),
        ));
    }
    if lines.is_empty() {
        return Err(AppError::Validation("cart is empty".to_string()));
    }
    if address.text.trim().is_empty() {
        return Err(AppError::Validation(
            "delivery address is required".to_string(),
        ));
    }

    let mut per_shop: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for line in &lines {
        if line.quantity == 0 {
            return Err(AppError::Validation(format!(
                "quantity for item {} must be positive",
                line.item_id
            )));
        }
        let item = state
            .catalog
            .item(line.item_id)
            .ok_or_else(|| AppError::NotFound(format!("item {} not found", line.item_id)))?;
        per_shop.entry(item.shop_id).or_default().push(OrderLine {
            item_id: item.id,
            name: item.name,
            unit_price: item.price,
            quantity: line.quantity,
        });
    }

    let mut shop_orders = Vec::with_capacity(per_shop.len());
    let mut total_amount = 0u64;
    for (shop_id, items) in per_shop {
        let shop = state
            .catalog
            .shop(shop_id)
            .ok_or_else(|| AppError::NotFound(format!("shop {shop_id} not found")))?;

        let subtotal: u64 = items.iter().map(OrderLine::line_total).sum();
        if subtotal < MIN_SHOP_SUBTOTAL {
            return Err(AppError::Validation(format!(
                "subtotal {subtotal} for {} is below the minimum of {MIN_SHOP_SUBTOTAL}",
                shop.name
            )));
        }

        let fee = delivery_fee(subtotal);
        total_amount += subtotal + fee;
        shop_orders.push(ShopOrder {
            shop_id,
            owner_id: shop.owner_id,
            shop_name: shop.name,
            items,
            subtotal,
            delivery_fee: fee,
            status: ShopOrderStatus::Pending,
            assigned_courier: None,
            assignment_id: None,
            delivered_at: None,
        });
    }

    // An online order must not exist at all if the gateway is down; a cash
    // order has no such dependency.
    let provider_order_ref = match payment_method {
        PaymentMethod::Online => Some(state.payments.create_intent(total_amount)?),
        PaymentMethod::CashOnDelivery => None,
    };

    let order = Order {
        id: Uuid::new_v4(),
        customer_id: actor.id,
        address,
        payment_method,
        payment_settled: payment_method == PaymentMethod::CashOnDelivery,
        provider_order_ref: provider_order_ref.clone(),
        total_amount,
        shop_orders,
        created_at: Utc::now(),
    };
    let order_id = order.id;

    state.orders.insert(order_id, order);
    state
        .metrics
        .orders_placed_total
        .with_label_values(&[payment_method_label(payment_method)])
        .inc();

    match provider_order_ref {
        // Cash orders are settled by definition; dispatch right away.
        None => finalize(state, order_id).await?,
        Some(provider_ref) => {
            state.payment_refs.insert(provider_ref, order_id);
        }
    }

    let placed = state
        .orders
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::Internal("placed order vanished".to_string()))?;

    info!(
        order_id = %order_id,
        customer_id = %actor.id,
        total = placed.total_amount,
        method = payment_method_label(payment_method),
        "order placed"
    );

    Ok(placed)
}

/// Settlement callback from the payment provider. Idempotent: a duplicate
/// confirmation returns the already-finalized order unchanged.
pub async fn confirm_payment(
    state: &AppState,
    provider_ref: &str,
    proof: &str,
) -> Result<Order, AppError> {
    let order_id = state
        .payment_refs
        .get(provider_ref)
        .map(|entry| *entry.value())
        .ok_or_else(|| AppError::NotFound(format!("payment reference {provider_ref} not found")))?;

    match state.payments.confirm(provider_ref, proof) {
        PaymentOutcome::Settled => {}
        PaymentOutcome::Rejected => {
            return Err(AppError::Validation("payment proof rejected".to_string()));
        }
    }

    let already_settled = {
        let mut entry = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let order = entry.value_mut();
        let already = order.payment_settled;
        order.payment_settled = true;
        already
    };

    if !already_settled {
        finalize(state, order_id).await?;
        info!(order_id = %order_id, "online payment settled");
    }

    state
        .orders
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::Internal("confirmed order vanished".to_string()))
}

/// Creates one open DeliveryAssignment per ShopOrder and queues each for
/// courier notification. Notification is fire-and-forget: if the queue is
/// gone the assignments stay open and discoverable through the pull
/// listing.
async fn finalize(state: &AppState, order_id: Uuid) -> Result<(), AppError> {
    let mut created = Vec::new();
    let snapshot = {
        let mut entry = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let order = entry.value_mut();
        let address = order.address.clone();

        for shop_order in &mut order.shop_orders {
            if shop_order.assignment_id.is_some() {
                continue;
            }
            let assignment = DeliveryAssignment {
                id: Uuid::new_v4(),
                order_id,
                shop_id: shop_order.shop_id,
                shop_name: shop_order.shop_name.clone(),
                items: shop_order.items.clone(),
                subtotal: shop_order.subtotal,
                delivery_fee: shop_order.delivery_fee,
                address: address.clone(),
                status: AssignmentStatus::Open,
                accepted_by: None,
                created_at: Utc::now(),
            };
            shop_order.assignment_id = Some(assignment.id);
            created.push(assignment);
        }

        entry.value().clone()
    };

    for assignment in &created {
        state.assignments.insert(assignment.id, assignment.clone());
    }
    state.metrics.assignments_open.add(created.len() as i64);

    realtime::order_created(state, &snapshot);

    for assignment in created {
        if let Err(err) = state.dispatch_tx.send(assignment.id).await {
            warn!(
                assignment_id = %assignment.id,
                error = %err,
                "dispatch queue unavailable; assignment stays open for pull discovery"
            );
        }
    }

    Ok(())
}

/// Advances one ShopOrder through the status machine. Legality is checked
/// against the current persisted status inside the same aggregate lock
/// that writes the new one, so a rapid double-click resolves to exactly
/// one transition and one `InvalidTransition`.
pub fn transition_status(
    state: &AppState,
    order_id: Uuid,
    shop_id: Uuid,
    actor: Principal,
    new_status: ShopOrderStatus,
) -> Result<ShopOrder, AppError> {
    if new_status == ShopOrderStatus::Cancelled {
        return Err(AppError::Validation(
            "cancellation goes through the order cancel operation".to_string(),
        ));
    }
    if new_status == ShopOrderStatus::Pending {
        return Err(AppError::Validation(
            "an order cannot move back to pending".to_string(),
        ));
    }

    match actor.role {
        Role::Owner => {
            let shop = state.catalog.shop_owned_by(actor.id).ok_or_else(|| {
                AppError::Forbidden("this owner does not own a shop".to_string())
            })?;
            if shop.id != shop_id {
                return Err(AppError::Forbidden(
                    "caller does not own the referenced shop".to_string(),
                ));
            }
        }
        // The bound courier may close out the delivery; binding is checked
        // against the aggregate below.
        Role::Courier if new_status == ShopOrderStatus::Delivered => {}
        _ => {
            return Err(AppError::Forbidden(format!(
                "role {} may not set status {new_status}",
                actor.role
            )));
        }
    }

    let (updated, customer_id) = {
        let mut entry = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let order = entry.value_mut();
        let customer_id = order.customer_id;

        if !order.payment_settled {
            return Err(AppError::Conflict(
                "payment for this order is not settled yet".to_string(),
            ));
        }

        let shop_order = order.shop_order_mut(shop_id).ok_or_else(|| {
            AppError::NotFound(format!("order {order_id} has no shop order for shop {shop_id}"))
        })?;

        if actor.role == Role::Courier && shop_order.assigned_courier != Some(actor.id) {
            return Err(AppError::Forbidden(
                "courier is not bound to this delivery".to_string(),
            ));
        }

        let current = shop_order.status;
        if !current.can_transition_to(new_status) {
            return Err(AppError::InvalidTransition {
                from: current,
                to: new_status,
            });
        }

        // Out-for-delivery means a courier is carrying the food; the
        // aggregate never reaches it without an accepted assignment.
        if new_status == ShopOrderStatus::OutForDelivery && shop_order.assigned_courier.is_none() {
            return Err(AppError::Conflict(
                "no courier has accepted this delivery yet".to_string(),
            ));
        }

        shop_order.status = new_status;
        if new_status == ShopOrderStatus::Delivered {
            shop_order.delivered_at = Some(Utc::now());
        }

        (shop_order.clone(), customer_id)
    };

    if new_status == ShopOrderStatus::Delivered {
        if let Some(courier_id) = updated.assigned_courier {
            state.active_deliveries.remove_if(&courier_id, |_, active| {
                active.order_id == order_id && active.shop_id == shop_id
            });
        }
        state.metrics.deliveries_total.inc();
    }
    state
        .metrics
        .status_transitions_total
        .with_label_values(&[&new_status.to_string()])
        .inc();

    realtime::status_changed(
        state,
        customer_id,
        order_id,
        shop_id,
        new_status,
        updated.assigned_courier,
    );

    info!(
        order_id = %order_id,
        shop_id = %shop_id,
        status = %new_status,
        "shop order transitioned"
    );

    Ok(updated)
}

/// All-or-nothing cancellation by the order's customer. If any shop order
/// is already out for delivery or delivered the whole call fails and
/// nothing changes.
pub fn cancel_order(state: &AppState, order_id: Uuid, actor: Principal) -> Result<Order, AppError> {
    if actor.role != Role::Customer {
        return Err(AppError::Forbidden(
            "only the order's customer may cancel".to_string(),
        ));
    }

    let (snapshot, cancelled) = {
        let mut entry = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let order = entry.value_mut();

        if order.customer_id != actor.id {
            return Err(AppError::Forbidden(
                "only the order's customer may cancel".to_string(),
            ));
        }

        let blocked = order.shop_orders.iter().any(|so| {
            matches!(
                so.status,
                ShopOrderStatus::OutForDelivery | ShopOrderStatus::Delivered
            )
        });
        if blocked {
            return Err(AppError::Conflict(
                "an in-flight or completed delivery cannot be cancelled".to_string(),
            ));
        }

        let mut cancelled = Vec::new();
        for shop_order in &mut order.shop_orders {
            if !shop_order.status.is_cancellable() {
                continue;
            }
            shop_order.status = ShopOrderStatus::Cancelled;
            cancelled.push((
                shop_order.shop_id,
                shop_order.assignment_id,
                shop_order.assigned_courier,
            ));
        }

        (entry.value().clone(), cancelled)
    };

    for (shop_id, assignment_id, courier_id) in cancelled {
        if let Some(assignment_id) = assignment_id {
            if let Some(mut assignment) = state.assignments.get_mut(&assignment_id) {
                if assignment.status == AssignmentStatus::Open {
                    state.metrics.assignments_open.dec();
                }
                if assignment.status != AssignmentStatus::Cancelled {
                    assignment.status = AssignmentStatus::Cancelled;
                }
            }
        }
        if let Some(courier_id) = courier_id {
            state.active_deliveries.remove_if(&courier_id, |_, active| {
                active.order_id == order_id && active.shop_id == shop_id
            });
        }
        state
            .metrics
            .status_transitions_total
            .with_label_values(&["cancelled"])
            .inc();
        realtime::status_changed(
            state,
            snapshot.customer_id,
            order_id,
            shop_id,
            ShopOrderStatus::Cancelled,
            courier_id,
        );
    }

    info!(order_id = %order_id, "order cancelled");
    Ok(snapshot)
}

pub fn order_for(state: &AppState, order_id: Uuid, actor: Principal) -> Result<Order, AppError> {
    let order = state
        .orders
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let is_party = match actor.role {
        Role::Customer => order.customer_id == actor.id,
        Role::Owner => order.shop_orders.iter().any(|so| so.owner_id == actor.id),
        Role::Courier => order
            .shop_orders
            .iter()
            .any(|so| so.assigned_courier == Some(actor.id)),
    };
    if !is_party {
        return Err(AppError::Forbidden(
            "caller is not a party to this order".to_string(),
        ));
    }

    Ok(order)
}

pub fn orders_for_customer(state: &AppState, customer_id: Uuid) -> Vec<Order> {
    let mut orders: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| entry.value().customer_id == customer_id)
        .map(|entry| entry.value().clone())
        .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

pub fn shop_orders_for_owner(state: &AppState, owner_id: Uuid) -> Vec<ShopOrderSummary> {
    shop_orders_matching(state, |so| so.owner_id == owner_id)
}

pub fn shop_orders_for_courier(state: &AppState, courier_id: Uuid) -> Vec<ShopOrderSummary> {
    shop_orders_matching(state, |so| so.assigned_courier == Some(courier_id))
}

fn shop_orders_matching(
    state: &AppState,
    keep: impl Fn(&ShopOrder) -> bool,
) -> Vec<ShopOrderSummary> {
    let mut summaries: Vec<ShopOrderSummary> = state
        .orders
        .iter()
        .flat_map(|entry| {
            let order = entry.value();
            order
                .shop_orders
                .iter()
                .filter(|so| keep(so))
                .map(|so| ShopOrderSummary {
                    order_id: order.id,
                    customer_id: order.customer_id,
                    address: order.address.clone(),
                    payment_method: order.payment_method,
                    created_at: order.created_at,
                    shop_order: so.clone(),
                })
                .collect::<Vec<_>>()
        })
        .collect();
    summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    summaries
}

fn payment_method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::CashOnDelivery => "cash_on_delivery",
        PaymentMethod::Online => "online",
    }
}
