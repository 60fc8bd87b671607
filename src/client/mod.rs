//! The chat view controller: everything the browser page kept in globals,
//! held in one explicit session-state struct instead. The controller is
//! single-threaded cooperative; every user action and every incoming event
//! is one non-overlapping `&mut self` call.
//!
//! Emission is fire-and-forget through an [`EventSink`]. Production wires an
//! mpsc sender whose consumer writes socket frames; tests record into a
//! `Vec`. Timers live outside: the owner arms a [`timer::SlotTimer`] and
//! calls [`ChatController::poll_typing`] when the deadline fires.

pub mod rest;
pub mod timer;
pub mod typing;

use std::collections::HashMap;
use std::time::Instant;

use crate::protocol::{
    resolve_room, room::RoomError, ChatMessage, ClientEvent, Presence, RoomId, ServerEvent,
};
use typing::{TypingEdge, TypingTracker, TYPING_WINDOW};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection drop. Recovery re-announces and refreshes presence.
    #[error("connection lost: {0}")]
    Transport(String),
    /// The server sent an `error` event. Surfaced, never auto-retried.
    #[error("server error: {0}")]
    Protocol(String),
    /// Suppressed client-side; no network call is issued.
    #[error("{0}")]
    Validation(&'static str),
    /// A REST collaborator call failed.
    #[error("request failed: {0}")]
    RemoteCall(#[from] reqwest::Error),
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

pub trait EventSink {
    fn emit(&mut self, event: ClientEvent);
}

impl EventSink for Vec<ClientEvent> {
    fn emit(&mut self, event: ClientEvent) {
        self.push(event);
    }
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<ClientEvent> {
    fn emit(&mut self, event: ClientEvent) {
        // fire-and-forget: a closed channel is handled by the transport task
        let _ = self.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub text: String,
    pub timestamp: String,
    pub direction: Direction,
}

/// Client-local state for one signed-in page.
#[derive(Debug, Default)]
pub struct ChatSession {
    pub current_user: Option<String>,
    pub current_peer: Option<String>,
    pub current_room: Option<RoomId>,
    /// Last known status per user; fed only by presence events, never
    /// inferred from message delivery.
    pub presence: HashMap<String, Presence>,
    pub transcript: Vec<RenderedMessage>,
    pub peer_typing: bool,
    pub last_error: Option<String>,
}

impl ChatSession {
    pub fn presence_of(&self, email: &str) -> Presence {
        self.presence.get(email).copied().unwrap_or(Presence::Offline)
    }
}

pub struct ChatController<S> {
    sink: S,
    channel: ChannelState,
    typing: TypingTracker,
    pub session: ChatSession,
}

impl<S: EventSink> ChatController<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            channel: ChannelState::Disconnected,
            typing: TypingTracker::new(TYPING_WINDOW),
            session: ChatSession::default(),
        }
    }

    pub fn channel(&self) -> ChannelState {
        self.channel
    }

    pub fn on_connecting(&mut self) {
        if self.channel == ChannelState::Disconnected {
            self.channel = ChannelState::Connecting;
        }
    }

    /// Transport established. Server-side presence binding is
    /// connection-scoped, so identity and the presence snapshot must be
    /// re-established on every (re)connect; the open room is rejoined and
    /// its history refetched wholesale.
    pub fn on_connected(&mut self) {
        self.channel = ChannelState::Connected;
        if let Some(email) = self.session.current_user.clone() {
            self.sink.emit(ClientEvent::UserLogin { email });
        }
        self.sink.emit(ClientEvent::GetOnlineUsers);
        if let Some(room) = self.session.current_room.clone() {
            self.sink.emit(ClientEvent::Join { room: room.clone() });
            self.sink.emit(ClientEvent::FetchHistory { room });
        }
    }

    /// Transport dropped unexpectedly; the transport will retry.
    pub fn on_connection_lost(&mut self) {
        self.channel = ChannelState::Reconnecting;
        // any typing-true we sent is now stale on the receiver (known
        // limitation of the protocol); locally we just start over
        self.typing.reset();
    }

    /// Deliberate teardown, e.g. logout before navigating away.
    pub fn on_disconnected(&mut self) {
        self.channel = ChannelState::Disconnected;
        self.typing.reset();
    }

    pub fn set_identity(&mut self, email: String) {
        self.session.current_user = Some(email.clone());
        if self.channel == ChannelState::Connected {
            self.sink.emit(ClientEvent::UserLogin { email });
            self.sink.emit(ClientEvent::GetOnlineUsers);
        }
    }

    /// Open the conversation with `peer`: derive the room, join it
    /// (idempotent server-side) and request its history.
    pub fn select_chat(&mut self, peer: &str) -> Result<(), ClientError> {
        let user = self
            .session
            .current_user
            .as_deref()
            .ok_or(ClientError::Validation("no identity set"))?;
        let room = resolve_room(user, peer)?;

        self.session.current_peer = Some(peer.to_owned());
        self.session.current_room = Some(room.clone());
        self.session.transcript.clear();
        self.session.peer_typing = false;
        self.typing.reset();

        self.sink.emit(ClientEvent::Join { room: room.clone() });
        self.sink.emit(ClientEvent::FetchHistory { room });
        Ok(())
    }

    /// Send the drafted text to the open conversation. Validation failures
    /// never reach the network.
    pub fn send_message(&mut self, text: &str) -> Result<(), ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::Validation("message text is empty"));
        }
        let (Some(sender), Some(receiver), Some(room)) = (
            self.session.current_user.clone(),
            self.session.current_peer.clone(),
            self.session.current_room.clone(),
        ) else {
            return Err(ClientError::Validation("no chat selected"));
        };

        self.sink.emit(ClientEvent::SendMessage(ChatMessage {
            sender,
            receiver,
            room,
            text: text.to_owned(),
            timestamp: crate::now_rfc3339(),
        }));

        if self.typing.stop() == Some(TypingEdge::Stopped) {
            self.emit_typing(false);
        }
        Ok(())
    }

    /// A keystroke in the message box.
    pub fn input_activity(&mut self, now: Instant) {
        if self.session.current_room.is_none() {
            return;
        }
        if self.typing.on_input(now) == Some(TypingEdge::Started) {
            self.emit_typing(true);
        }
    }

    /// The inactivity deadline fired.
    pub fn poll_typing(&mut self, now: Instant) {
        if self.typing.poll(now) == Some(TypingEdge::Stopped) {
            self.emit_typing(false);
        }
    }

    /// The message box lost focus.
    pub fn input_blur(&mut self) {
        if self.typing.stop() == Some(TypingEdge::Stopped) {
            self.emit_typing(false);
        }
    }

    pub fn is_typing(&self) -> bool {
        self.typing.is_typing()
    }

    fn emit_typing(&mut self, status: bool) {
        let (Some(sender), Some(receiver), Some(room)) = (
            self.session.current_user.clone(),
            self.session.current_peer.clone(),
            self.session.current_room.clone(),
        ) else {
            return;
        };
        self.sink.emit(ClientEvent::Typing { room, sender, receiver, status });
    }

    /// One incoming server event. Stale responses for rooms no longer
    /// selected are discarded by the room id they carry.
    pub fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::OnlineUsers { users } => {
                // the snapshot is authoritative: unlisted users are offline
                for status in self.session.presence.values_mut() {
                    *status = Presence::Offline;
                }
                for email in users {
                    self.session.presence.insert(email, Presence::Online);
                }
            }
            ServerEvent::StatusUpdate { email, status } => {
                self.session.presence.insert(email, status);
            }
            ServerEvent::RoomJoined { room } => {
                if self.session.current_room.as_ref() != Some(&room) {
                    tracing::debug!(%room, "join ack for a room no longer selected");
                }
            }
            ServerEvent::History { room, messages } => {
                if self.session.current_room.as_ref() != Some(&room) {
                    return;
                }
                let me = self.session.current_user.clone();
                self.session.transcript = messages
                    .into_iter()
                    .map(|msg| render(me.as_deref(), msg))
                    .collect();
            }
            ServerEvent::Message(msg) => {
                // messages can arrive before the room_joined ack; only the
                // room id decides whether they belong to the open chat
                if self.session.current_room.as_ref() != Some(&msg.room) {
                    return;
                }
                let me = self.session.current_user.clone();
                self.session.transcript.push(render(me.as_deref(), msg));
            }
            ServerEvent::TypingUpdate { room, sender, status } => {
                if self.session.current_room.as_ref() == Some(&room)
                    && self.session.current_peer.as_deref() == Some(sender.as_str())
                {
                    self.session.peer_typing = status;
                }
            }
            ServerEvent::Error { message } => {
                tracing::warn!(%message, "server reported an error");
                self.session.last_error = Some(message);
            }
        }
    }
}

fn render(current_user: Option<&str>, msg: ChatMessage) -> RenderedMessage {
    let direction = if current_user == Some(msg.sender.as_str()) {
        Direction::Sent
    } else {
        Direction::Received
    };
    RenderedMessage {
        text: msg.text,
        timestamp: msg.timestamp,
        direction,
    }
}
