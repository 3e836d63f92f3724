use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShopOrderStatus {
    Pending,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl ShopOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// A customer may still cancel while the food has not left the shop.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Preparing)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Preparing)
                | (Self::Preparing, Self::OutForDelivery)
                | (Self::OutForDelivery, Self::Delivered)
                | (Self::Pending, Self::Cancelled)
                | (Self::Preparing, Self::Cancelled)
        )
    }
}

impl fmt::Display for ShopOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// One cart line with the catalog name and price frozen at placement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: Uuid,
    pub name: String,
    pub unit_price: u64,
    pub quantity: u32,
}

impl OrderLine {
    pub fn line_total(&self) -> u64 {
        self.unit_price * self.quantity as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub text: String,
    pub location: GeoPoint,
}

/// The per-shop slice of an order: the unit of fulfillment and of courier
/// assignment. Lives inside its parent [`Order`] so order-level mutations
/// see every shop's state at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopOrder {
    pub shop_id: Uuid,
    pub owner_id: Uuid,
    pub shop_name: String,
    pub items: Vec<OrderLine>,
    pub subtotal: u64,
    pub delivery_fee: u64,
    pub status: ShopOrderStatus,
    pub assigned_courier: Option<Uuid>,
    pub assignment_id: Option<Uuid>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub payment_settled: bool,
    pub provider_order_ref: Option<String>,
    pub total_amount: u64,
    pub shop_orders: Vec<ShopOrder>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn shop_order(&self, shop_id: Uuid) -> Option<&ShopOrder> {
        self.shop_orders.iter().find(|so| so.shop_id == shop_id)
    }

    pub fn shop_order_mut(&mut self, shop_id: Uuid) -> Option<&mut ShopOrder> {
        self.shop_orders.iter_mut().find(|so| so.shop_id == shop_id)
    }
}

/// Owner- and courier-facing read model: one shop order plus the order
/// context needed to render it without a second fetch.
#[derive(Debug, Clone, Serialize)]
pub struct ShopOrderSummary {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub shop_order: ShopOrder,
}

#[cfg(test)]
mod tests {
    use super::ShopOrderStatus::*;

    #[test]
    fn happy_path_is_legal() {
        assert!(Pending.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(OutForDelivery));
        assert!(OutForDelivery.can_transition_to(Delivered));
    }

    #[test]
    fn skipping_preparing_is_illegal() {
        assert!(!Pending.can_transition_to(OutForDelivery));
        assert!(!Pending.can_transition_to(Delivered));
    }

    #[test]
    fn cancellation_only_before_pickup() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Preparing.can_transition_to(Cancelled));
        assert!(!OutForDelivery.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in [Pending, Preparing, OutForDelivery, Delivered, Cancelled] {
            assert!(!Delivered.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }
}
