use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::assignment::DeliveryAssignment;
use crate::models::order::ShopOrderStatus;

/// Closed set of push events. The broadcaster is at-most-once and
/// best-effort; everything here is recoverable through a pull read.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AssignmentAvailable {
        assignment: DeliveryAssignment,
    },
    OrderCreated {
        order_id: Uuid,
        shop_id: Uuid,
        shop_name: String,
        total: u64,
    },
    StatusChanged {
        order_id: Uuid,
        shop_id: Uuid,
        status: ShopOrderStatus,
    },
    LocationChanged {
        courier_id: Uuid,
        lat: f64,
        lng: f64,
    },
}

/// Inbound messages a connected client may send over the push channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    PresenceHandshake,
    LocationPing { lat: f64, lng: f64 },
}
