use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::geo::within_radius;
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::courier::CourierPresence;
use crate::realtime;
use crate::state::AppState;

/// Drains the dispatch queue and pushes each still-open assignment to the
/// candidate courier pool. Purely a notification path: an assignment that
/// is never pushed anywhere stays discoverable through
/// [`list_open_assignments`].
pub async fn run_dispatch_engine(state: Arc<AppState>, mut dispatch_rx: mpsc::Receiver<Uuid>) {
    info!("dispatch engine started");

    while let Some(assignment_id) = dispatch_rx.recv().await {
        let Some(assignment) = state
            .assignments
            .get(&assignment_id)
            .map(|entry| entry.value().clone())
        else {
            warn!(assignment_id = %assignment_id, "queued assignment no longer exists");
            continue;
        };

        // Accepted or cancelled while sitting in the queue.
        if assignment.status != AssignmentStatus::Open {
            debug!(assignment_id = %assignment_id, "assignment resolved before notification");
            continue;
        }

        let candidates = candidate_pool(&state, &assignment);
        if candidates.is_empty() {
            info!(
                assignment_id = %assignment_id,
                "no online couriers to notify; assignment stays open for pull discovery"
            );
            continue;
        }

        realtime::assignment_available(&state, &assignment, &candidates);
        info!(
            assignment_id = %assignment_id,
            candidates = candidates.len(),
            "assignment pushed to courier pool"
        );
    }

    warn!("dispatch engine stopped: queue channel closed");
}

/// Eligibility is "online right now". When a dispatch radius is configured
/// and both shop and courier positions are known, couriers outside the
/// radius are skipped.
fn candidate_pool(state: &AppState, assignment: &DeliveryAssignment) -> Vec<CourierPresence> {
    let shop_location = state.catalog.shop(assignment.shop_id).map(|s| s.location);

    state
        .presence
        .online_couriers()
        .into_iter()
        .filter(|courier| match (&shop_location, &courier.location) {
            (Some(shop), Some(courier_at)) => {
                within_radius(shop, courier_at, state.dispatch_radius_km)
            }
            _ => true,
        })
        .collect()
}

/// Pull fallback for couriers that missed the push. Anything not open is
/// excluded.
pub fn list_open_assignments(state: &AppState) -> Vec<DeliveryAssignment> {
    let mut open: Vec<DeliveryAssignment> = state
        .assignments
        .iter()
        .filter(|entry| entry.value().status == AssignmentStatus::Open)
        .map(|entry| entry.value().clone())
        .collect();
    open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    open
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::candidate_pool;
    use crate::catalog::Shop;
    use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
    use crate::models::courier::GeoPoint;
    use crate::models::order::DeliveryAddress;
    use crate::state::AppState;

    fn shop_at(state: &AppState, lat: f64, lng: f64) -> Shop {
        let shop = Shop {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Dosa Corner".to_string(),
            location: GeoPoint { lat, lng },
        };
        state.catalog.insert_shop(shop.clone());
        shop
    }

    fn assignment_for(shop: &Shop) -> DeliveryAssignment {
        DeliveryAssignment {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            shop_id: shop.id,
            shop_name: shop.name.clone(),
            items: Vec::new(),
            subtotal: 150,
            delivery_fee: 30,
            address: DeliveryAddress {
                text: "7 Park Street".to_string(),
                location: GeoPoint {
                    lat: shop.location.lat,
                    lng: shop.location.lng,
                },
            },
            status: AssignmentStatus::Open,
            accepted_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn offline_couriers_are_never_candidates() {
        let (state, _rx) = AppState::new(16, 0.0);
        let shop = shop_at(&state, 28.61, 77.21);

        let online = Uuid::new_v4();
        let offline = Uuid::new_v4();
        let conn_online = Uuid::new_v4();
        let conn_offline = Uuid::new_v4();
        state.presence.register(online, conn_online);
        state.presence.register(offline, conn_offline);
        state.presence.clear(conn_offline);

        let pool = candidate_pool(&state, &assignment_for(&shop));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].courier_id, online);
    }

    #[test]
    fn radius_filter_skips_distant_couriers_but_keeps_unlocated_ones() {
        let (state, _rx) = AppState::new(16, 5.0);
        let shop = shop_at(&state, 28.61, 77.21);

        let near = Uuid::new_v4();
        let far = Uuid::new_v4();
        let unlocated = Uuid::new_v4();
        state
            .presence
            .update_location(near, 28.62, 77.22, Uuid::new_v4());
        state
            .presence
            .update_location(far, 19.07, 72.87, Uuid::new_v4());
        state.presence.register(unlocated, Uuid::new_v4());

        let pool = candidate_pool(&state, &assignment_for(&shop));
        let ids: Vec<Uuid> = pool.iter().map(|c| c.courier_id).collect();
        assert!(ids.contains(&near));
        assert!(ids.contains(&unlocated));
        assert!(!ids.contains(&far));
    }
}
