use crate::room::RoomRegistry;
use crate::signaling::{RelayDispatcher, ws_handler};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// Shared state behind every websocket connection.
pub struct AppState {
    pub dispatcher: RelayDispatcher,
    pub registry: RoomRegistry,
}

impl AppState {
    pub fn new() -> Self {
        let dispatcher = RelayDispatcher::new();
        let registry = RoomRegistry::new(Arc::new(dispatcher.clone()));

        Self {
            dispatcher,
            registry,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub rooms: usize,
    pub sessions: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(HealthReport {
        rooms: state.registry.room_count(),
        sessions: state.registry.session_count(),
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}
