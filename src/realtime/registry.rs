use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::principal::Principal;
use crate::realtime::events::Event;

struct Connection {
    principal: Principal,
    tx: mpsc::UnboundedSender<Event>,
}

/// Registry of live push connections, keyed by connection id with a
/// principal index for targeted fan-out. Owned by the service state and
/// injected wherever broadcast is needed; sends are best-effort and a
/// dead receiver is never an error.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, Connection>,
    by_principal: DashMap<Uuid, Uuid>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, principal: Principal, tx: mpsc::UnboundedSender<Event>) -> Uuid {
        let connection_id = Uuid::new_v4();
        self.connections
            .insert(connection_id, Connection { principal, tx });
        self.by_principal.insert(principal.id, connection_id);
        connection_id
    }

    pub fn detach(&self, connection_id: Uuid) {
        let Some((_, connection)) = self.connections.remove(&connection_id) else {
            return;
        };

        // A reconnect may already have claimed the principal slot.
        self.by_principal
            .remove_if(&connection.principal.id, |_, current| {
                *current == connection_id
            });
    }

    pub fn send_to_principal(&self, principal_id: Uuid, event: Event) {
        let Some(connection_id) = self.by_principal.get(&principal_id).map(|e| *e.value()) else {
            return;
        };
        if let Some(connection) = self.connections.get(&connection_id) {
            let _ = connection.tx.send(event);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
