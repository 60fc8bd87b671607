mod ws;

pub mod store;

use axum::{routing::get, Router};

use crate::{protocol::{RoomId, ServerEvent}, AppState};

/// Where a bus item should end up. Each connection filters against its own
/// announced identity and joined-room set.
#[derive(Debug, Clone)]
pub enum Target {
    All,
    Room(RoomId),
    User(String),
}

/// One item on the fanout bus. A single ordered bus keeps per-room send
/// order intact without any cross-room coordination.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub target: Target,
    pub event: ServerEvent,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::chat_ws))
}
