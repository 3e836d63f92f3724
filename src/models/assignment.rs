use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{DeliveryAddress, OrderLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Open,
    Accepted,
    Cancelled,
}

/// An offer of one shop order's delivery to the courier pool. Carries a
/// snapshot of what couriers need to see so it renders without joins;
/// `open -> accepted` is a one-way race resolved by the arbiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub shop_id: Uuid,
    pub shop_name: String,
    pub items: Vec<OrderLine>,
    pub subtotal: u64,
    pub delivery_fee: u64,
    pub address: DeliveryAddress,
    pub status: AssignmentStatus,
    pub accepted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
