use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::catalog::InMemoryCatalog;
use crate::models::assignment::DeliveryAssignment;
use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::payment::{InProcessPayments, PaymentProvider};
use crate::presence::PresenceTracker;
use crate::realtime::registry::ConnectionRegistry;

/// The one in-flight delivery a courier is bound to. At most one entry per
/// courier; the entry reservation is what stops a courier from holding two
/// deliveries at once.
#[derive(Debug, Clone, Copy)]
pub struct ActiveDelivery {
    pub order_id: Uuid,
    pub shop_id: Uuid,
    pub assignment_id: Uuid,
}

pub struct AppState {
    pub orders: DashMap<Uuid, Order>,
    pub assignments: DashMap<Uuid, DeliveryAssignment>,
    pub active_deliveries: DashMap<Uuid, ActiveDelivery>,
    pub payment_refs: DashMap<String, Uuid>,
    pub catalog: InMemoryCatalog,
    pub payments: Arc<dyn PaymentProvider>,
    pub presence: PresenceTracker,
    pub connections: ConnectionRegistry,
    pub dispatch_tx: mpsc::Sender<Uuid>,
    pub dispatch_radius_km: f64,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        dispatch_queue_size: usize,
        dispatch_radius_km: f64,
    ) -> (Self, mpsc::Receiver<Uuid>) {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(dispatch_queue_size);

        (
            Self {
                orders: DashMap::new(),
                assignments: DashMap::new(),
                active_deliveries: DashMap::new(),
                payment_refs: DashMap::new(),
                catalog: InMemoryCatalog::new(),
                payments: Arc::new(InProcessPayments::new()),
                presence: PresenceTracker::new(),
                connections: ConnectionRegistry::new(),
                dispatch_tx,
                dispatch_radius_km,
                metrics: Metrics::new(),
            },
            dispatch_rx,
        )
    }

    pub fn set_payment_provider(&mut self, provider: Arc<dyn PaymentProvider>) {
        self.payments = provider;
    }
}
