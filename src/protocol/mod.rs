//! Wire contract for the realtime channel.
//!
//! Every frame is a JSON envelope `{"event": <name>, "data": <payload>}`.
//! There is no request/response correlation: events are fire-and-forget and
//! later server events are matched only by the room or user id they carry.

pub mod room;

pub use room::{resolve_room, RoomId};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

/// A message as it travels the wire and sits in the store. Immutable once
/// sent; `timestamp` is whatever RFC3339 instant the sender stamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub receiver: String,
    pub room: RoomId,
    pub text: String,
    pub timestamp: String,
}

/// Client -> server events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Announce the connection's identity. Presence binding is
    /// connection-scoped, so this must be re-sent on every (re)connect.
    UserLogin { email: String },
    /// Ask for the current presence snapshot.
    GetOnlineUsers,
    /// Join a room. Idempotent; safe to send on every chat selection.
    Join { room: RoomId },
    Leave { room: RoomId },
    /// Request the full ordered history for a room.
    FetchHistory { room: RoomId },
    SendMessage(ChatMessage),
    Typing {
        room: RoomId,
        sender: String,
        receiver: String,
        status: bool,
    },
}

/// Server -> client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename = "online_users_list")]
    OnlineUsers { users: Vec<String> },
    #[serde(rename = "user_status_update")]
    StatusUpdate { email: String, status: Presence },
    RoomJoined { room: RoomId },
    #[serde(rename = "history_loaded")]
    History {
        room: RoomId,
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "receive_message")]
    Message(ChatMessage),
    TypingUpdate {
        room: RoomId,
        sender: String,
        status: bool,
    },
    Error { message: String },
}
