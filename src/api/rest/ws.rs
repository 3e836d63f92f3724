use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::principal::{Principal, Role};
use crate::realtime;
use crate::realtime::events::ClientMessage;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    principal: Principal,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, principal))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, principal: Principal) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let connection_id = state.connections.attach(principal, tx);
    state.metrics.ws_connections.inc();
    info!(connection_id = %connection_id, actor = %principal.id, "push channel connected");

    let send_task = tokio::spawn(async move {
        let mut events = UnboundedReceiverStream::new(rx);
        while let Some(event) = events.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize push event");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            // Inbound frames are best-effort telemetry; malformed ones are
            // dropped without a reply.
            let Ok(client_message) = serde_json::from_str::<ClientMessage>(&text) else {
                continue;
            };
            handle_client_message(&recv_state, principal, connection_id, client_message);
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.connections.detach(connection_id);
    state.presence.clear(connection_id);
    state.metrics.ws_connections.dec();
    info!(connection_id = %connection_id, "push channel disconnected");
}

fn handle_client_message(
    state: &AppState,
    principal: Principal,
    connection_id: Uuid,
    message: ClientMessage,
) {
    if principal.role != Role::Courier {
        return;
    }

    match message {
        ClientMessage::PresenceHandshake => {
            state.presence.register(principal.id, connection_id);
        }
        ClientMessage::LocationPing { lat, lng } => {
            if state
                .presence
                .update_location(principal.id, lat, lng, connection_id)
            {
                realtime::location_changed(state, principal.id, lat, lng);
            }
        }
    }
}
