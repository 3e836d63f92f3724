use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Ephemeral connectivity state for one courier. Not durable business data:
/// upserted on handshake, refreshed on every location ping, cleared on
/// disconnect. Last write wins across reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierPresence {
    pub courier_id: Uuid,
    pub connection_id: Option<Uuid>,
    pub location: Option<GeoPoint>,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
}
