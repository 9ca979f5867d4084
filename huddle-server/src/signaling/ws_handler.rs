use crate::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use huddle_core::{Envelope, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Upgrades to a websocket. The session id is assigned here, never taken
/// from the client.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session_id = SessionId::new();

    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

async fn handle_socket(socket: WebSocket, session_id: SessionId, state: Arc<AppState>) {
    info!("New WebSocket connection: {}", session_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();

    state.dispatcher.add_session(session_id, tx);
    state.registry.connect(session_id);

    let mut send_task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let text = match envelope.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize `{}` envelope: {}", envelope.kind, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match Envelope::decode(text.as_str()) {
                        Ok(envelope) => state.registry.handle_envelope(session_id, envelope).await,
                        Err(e) => warn!("Dropping envelope from {}: {}", session_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.registry.disconnect(session_id).await;
    state.dispatcher.remove_session(&session_id);
    info!("WebSocket disconnected: {}", session_id);
}
