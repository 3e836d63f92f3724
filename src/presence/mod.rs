use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::courier::{CourierPresence, GeoPoint};

/// Live connectivity and position for the courier fleet, keyed by courier
/// id with a reverse index by connection id so disconnects can be resolved
/// without knowing who was behind the socket.
#[derive(Default)]
pub struct PresenceTracker {
    couriers: DashMap<Uuid, CourierPresence>,
    by_connection: DashMap<Uuid, Uuid>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, courier_id: Uuid, connection_id: Uuid) {
        let mut presence = self
            .couriers
            .entry(courier_id)
            .or_insert_with(|| CourierPresence {
                courier_id,
                connection_id: None,
                location: None,
                online: false,
                last_seen: Utc::now(),
            });

        if let Some(previous) = presence.connection_id.take() {
            self.by_connection.remove(&previous);
        }

        presence.connection_id = Some(connection_id);
        presence.online = true;
        presence.last_seen = Utc::now();
        drop(presence);

        self.by_connection.insert(connection_id, courier_id);
    }

    /// Best-effort telemetry: malformed coordinates are dropped silently
    /// rather than surfaced to the pinging client. Returns whether the
    /// ping was applied so callers know if there is anything to fan out.
    pub fn update_location(&self, courier_id: Uuid, lat: f64, lng: f64, connection_id: Uuid) -> bool {
        if !coordinates_valid(lat, lng) {
            tracing::debug!(courier_id = %courier_id, lat, lng, "ignoring invalid location ping");
            return false;
        }

        self.register(courier_id, connection_id);
        if let Some(mut presence) = self.couriers.get_mut(&courier_id) {
            presence.location = Some(GeoPoint { lat, lng });
        }
        true
    }

    /// Idempotent: clearing an unknown or already-cleared connection is a
    /// no-op.
    pub fn clear(&self, connection_id: Uuid) {
        let Some((_, courier_id)) = self.by_connection.remove(&connection_id) else {
            return;
        };

        if let Some(mut presence) = self.couriers.get_mut(&courier_id) {
            if presence.connection_id == Some(connection_id) {
                presence.connection_id = None;
                presence.online = false;
                presence.last_seen = Utc::now();
            }
        }
    }

    pub fn online_couriers(&self) -> Vec<CourierPresence> {
        self.couriers
            .iter()
            .filter(|entry| entry.value().online)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.couriers.iter().filter(|entry| entry.value().online).count()
    }

    pub fn get(&self, courier_id: Uuid) -> Option<CourierPresence> {
        self.couriers.get(&courier_id).map(|entry| entry.value().clone())
    }
}

fn coordinates_valid(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::PresenceTracker;

    #[test]
    fn register_marks_courier_online() {
        let tracker = PresenceTracker::new();
        let courier = Uuid::new_v4();
        let conn = Uuid::new_v4();

        tracker.register(courier, conn);

        let presence = tracker.get(courier).unwrap();
        assert!(presence.online);
        assert_eq!(presence.connection_id, Some(conn));
        assert_eq!(tracker.online_count(), 1);
    }

    #[test]
    fn clear_marks_courier_offline() {
        let tracker = PresenceTracker::new();
        let courier = Uuid::new_v4();
        let conn = Uuid::new_v4();

        tracker.register(courier, conn);
        tracker.clear(conn);

        let presence = tracker.get(courier).unwrap();
        assert!(!presence.online);
        assert_eq!(presence.connection_id, None);
        assert!(tracker.online_couriers().is_empty());
    }

    #[test]
    fn clear_is_idempotent_and_tolerates_unknown_connections() {
        let tracker = PresenceTracker::new();
        tracker.clear(Uuid::new_v4());

        let courier = Uuid::new_v4();
        let conn = Uuid::new_v4();
        tracker.register(courier, conn);
        tracker.clear(conn);
        tracker.clear(conn);

        assert!(!tracker.get(courier).unwrap().online);
    }

    #[test]
    fn stale_clear_does_not_kill_a_reconnected_session() {
        let tracker = PresenceTracker::new();
        let courier = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        tracker.register(courier, first);
        tracker.register(courier, second);
        tracker.clear(first);

        let presence = tracker.get(courier).unwrap();
        assert!(presence.online);
        assert_eq!(presence.connection_id, Some(second));
    }

    #[test]
    fn invalid_coordinates_are_dropped() {
        let tracker = PresenceTracker::new();
        let courier = Uuid::new_v4();
        let conn = Uuid::new_v4();

        tracker.update_location(courier, 91.0, 0.0, conn);
        assert!(tracker.get(courier).is_none());

        tracker.update_location(courier, 28.6, f64::NAN, conn);
        assert!(tracker.get(courier).is_none());

        tracker.update_location(courier, 28.6139, 77.2090, conn);
        let presence = tracker.get(courier).unwrap();
        assert!(presence.online);
        assert!(presence.location.is_some());
    }
}
