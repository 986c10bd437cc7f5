//! Real-time collaborative editing for proposal documents.
//!
//! Two halves share one wire format ([`models::CollabMessage`]):
//!
//! - [`ws`]: the client session. A [`ws::SessionChannel`] per
//!   `(document, participant)`, a presence roster, live cursors and a
//!   last-write-wins content controller driving a [`ws::DocumentEditor`].
//! - [`websocket`]: the room relay served by the binary, fanning each
//!   document's messages out to everyone else on that document.

pub mod config;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod utils;
pub mod websocket;
pub mod ws;

use chrono::{DateTime, Utc};
use websocket::RoomRegistry;

/// Shared state of the relay server.
pub struct AppState {
    pub rooms: RoomRegistry,
    pub service_name: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: &config::Config) -> Self {
        Self {
            rooms: RoomRegistry::new(config.room_capacity),
            service_name: config.service_name.clone(),
            started_at: Utc::now(),
        }
    }
}
