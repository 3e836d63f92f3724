pub mod events;
pub mod registry;

use uuid::Uuid;

use crate::models::assignment::DeliveryAssignment;
use crate::models::courier::CourierPresence;
use crate::models::order::{Order, ShopOrderStatus};
use crate::realtime::events::Event;
use crate::state::AppState;

/// Push a new open assignment to every candidate courier with a live
/// connection. Couriers without one miss the push and fall back to the
/// pull listing.
pub fn assignment_available(
    state: &AppState,
    assignment: &DeliveryAssignment,
    candidates: &[CourierPresence],
) {
    for courier in candidates {
        state.connections.send_to_principal(
            courier.courier_id,
            Event::AssignmentAvailable {
                assignment: assignment.clone(),
            },
        );
    }
}

/// Let each shop owner see the new order without polling.
pub fn order_created(state: &AppState, order: &Order) {
    for shop_order in &order.shop_orders {
        state.connections.send_to_principal(
            shop_order.owner_id,
            Event::OrderCreated {
                order_id: order.id,
                shop_id: shop_order.shop_id,
                shop_name: shop_order.shop_name.clone(),
                total: shop_order.subtotal + shop_order.delivery_fee,
            },
        );
    }
}

pub fn status_changed(
    state: &AppState,
    customer_id: Uuid,
    order_id: Uuid,
    shop_id: Uuid,
    status: ShopOrderStatus,
    courier_id: Option<Uuid>,
) {
    let event = Event::StatusChanged {
        order_id,
        shop_id,
        status,
    };
    state
        .connections
        .send_to_principal(customer_id, event.clone());
    if let Some(courier_id) = courier_id {
        state.connections.send_to_principal(courier_id, event);
    }
}

/// Stream courier coordinates to whichever customer is tracking the
/// courier's active delivery; with no active delivery there is nobody to
/// notify.
pub fn location_changed(state: &AppState, courier_id: Uuid, lat: f64, lng: f64) {
    let Some(active) = state
        .active_deliveries
        .get(&courier_id)
        .map(|entry| *entry.value())
    else {
        return;
    };

    let Some(customer_id) = state
        .orders
        .get(&active.order_id)
        .map(|order| order.customer_id)
    else {
        return;
    };

    state.connections.send_to_principal(
        customer_id,
        Event::LocationChanged {
            courier_id,
            lat,
            lng,
        },
    );
}
