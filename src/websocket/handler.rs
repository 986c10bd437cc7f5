use std::sync::{Arc, Mutex};
use axum::{
    extract::{Path, Query, State, ws::{Message, WebSocket, WebSocketUpgrade}},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use futures_util::{StreamExt, SinkExt};
use uuid::Uuid;

use crate::AppState;
use crate::models::{CollabMessage, ErrorResponse, Participant, PresenceAction};
use crate::utils::scope_guard::ScopeGuard;
use crate::websocket::room::RelayFrame;

const MAX_DOCUMENT_ID_LEN: usize = 128;

#[derive(Deserialize, Debug, Default)]
pub struct ConnectParams {
    pub user_name: Option<String>,
}

/// WebSocket handler
pub async fn websocket_handler(
    Path(document_id): Path<String>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    if !is_valid_document_id(&document_id) {
        warn!("Rejecting WebSocket connection for invalid document id '{}'", document_id);
        let error = format!("Invalid document id '{}'", document_id);
        return ErrorResponse::reply(StatusCode::BAD_REQUEST, error).into_response();
    }

    info!("New WebSocket connection attempt for document {}", document_id);
    ws.on_upgrade(move |socket| handle_socket(socket, document_id, params.user_name, app_state))
}

pub fn is_valid_document_id(document_id: &str) -> bool {
    !document_id.is_empty()
        && document_id.len() <= MAX_DOCUMENT_ID_LEN
        && document_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Relay one connection: everything it says goes to the rest of the room,
/// everything the rest of the room says comes back to it.
async fn handle_socket(
    socket: WebSocket,
    document_id: String,
    user_name: Option<String>,
    app_state: Arc<AppState>,
) {

    // Generate unique connection ID to identify this client
    let connection_id = Uuid::new_v4();
    info!(
        "WebSocket connection established for document_id: {} with connection_id: {}",
        document_id, connection_id
    );

    let (bc, mut rbc) = app_state.rooms.join(&document_id);
    let _release = {
        let app_state = app_state.clone();
        let document_id = document_id.clone();
        ScopeGuard::new(move || app_state.rooms.release(&document_id))
    };

    // Who this connection announced itself as, for the leave on disconnect
    let announced: Arc<Mutex<Option<Participant>>> = Arc::new(Mutex::new(None));

    let (mut sender, mut receiver) = socket.split();

    // Listen to the websocket and fan valid messages out to the room
    let reader_bc = bc.clone();
    let reader_announced = announced.clone();
    let reader_doc = document_id.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let message = match CollabMessage::decode(&text) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Dropping malformed message for document {}: {}", reader_doc, e);
                    continue;
                }
            };
            debug!(
                "Relaying {} message from {} on {}",
                message.kind(),
                message.user().name,
                reader_doc
            );

            if let CollabMessage::Presence(presence) = &message {
                if presence.action == PresenceAction::Join {
                    if let Ok(mut slot) = reader_announced.lock() {
                        *slot = Some(presence.user.clone());
                    }
                }
            }

            if reader_bc.send(RelayFrame { sender_id: connection_id, payload: text }).is_err() {
                debug!("No listeners left on document {}", reader_doc);
            }
        }
    });

    // Forward room traffic to this client, skipping its own frames
    let writer_doc = document_id.clone();
    let mut write_task = tokio::spawn(async move {
        loop {
            match rbc.recv().await {
                Ok(frame) => {
                    if frame.sender_id == connection_id {
                        continue;
                    }
                    if sender.send(Message::Text(frame.payload)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Connection {} on {} lagged, skipped {} frame(s)",
                        connection_id, writer_doc, skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut read_task) => write_task.abort(),
        _ = (&mut write_task) => read_task.abort(),
    };

    // Tell the rest of the room this participant is gone
    let leaving = announced
        .lock()
        .ok()
        .and_then(|mut slot| slot.take())
        .or_else(|| user_name.map(Participant::new));
    if let Some(participant) = leaving {
        match CollabMessage::leave(&participant).encode() {
            Ok(payload) => {
                let _ = bc.send(RelayFrame { sender_id: connection_id, payload });
            }
            Err(e) => warn!("Failed to encode leave for {}: {}", participant.name, e),
        }
    }

    info!("WebSocket connection {} on document {} terminated", connection_id, document_id);
}
