//! The realtime endpoint. Each connection runs one task that multiplexes
//! between the fanout bus and frames from the client, so handling never
//! overlaps within a connection.

use std::collections::HashSet;

use axum::{
    debug_handler,
    extract::{
        ws::{Message as WsFrame, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    chat::{store, Outbound, Target},
    presence::PresenceRegistry,
    protocol::{ClientEvent, Presence, RoomId, ServerEvent},
};

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(
    State(db_pool): State<SqlitePool>,
    State(presence): State<PresenceRegistry>,
    State(tx): State<broadcast::Sender<Outbound>>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |stream| handle_connection(stream, db_pool, presence, tx))
}

struct ConnState {
    conn_id: Uuid,
    identity: Option<String>,
    joined: HashSet<RoomId>,
}

impl ConnState {
    fn wants(&self, target: &Target) -> bool {
        match target {
            Target::All => true,
            Target::Room(room) => self.joined.contains(room),
            Target::User(email) => self.identity.as_deref() == Some(email.as_str()),
        }
    }
}

async fn handle_connection(
    stream: WebSocket,
    db_pool: SqlitePool,
    presence: PresenceRegistry,
    tx: broadcast::Sender<Outbound>,
) {
    let mut rx = tx.subscribe();
    let (mut sender, mut receiver) = stream.split();
    let mut conn = ConnState {
        conn_id: Uuid::now_v7(),
        identity: None,
        joined: HashSet::new(),
    };
    tracing::debug!(conn = %conn.conn_id, "chat socket open");

    loop {
        tokio::select! {
            out = rx.recv() => match out {
                Ok(out) if conn.wants(&out.target) => {
                    if send_event(&mut sender, &out.event).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(conn = %conn.conn_id, skipped, "slow chat socket, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(WsFrame::Text(text))) => {
                    let event = match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => event,
                        Err(err) => {
                            tracing::debug!(conn = %conn.conn_id, %err, "ignoring malformed frame");
                            continue;
                        }
                    };
                    if handle_event(event, &mut conn, &mut sender, &db_pool, &presence, &tx)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(Ok(WsFrame::Close(_))) | None => break,
                Some(Err(err)) => {
                    tracing::debug!(conn = %conn.conn_id, %err, "chat socket receive error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    if let Some(email) = conn.identity.take() {
        release_identity(&presence, &tx, email, conn.conn_id);
    }
    tracing::debug!(conn = %conn.conn_id, "chat socket closed");
}

async fn handle_event(
    event: ClientEvent,
    conn: &mut ConnState,
    sender: &mut SplitSink<WebSocket, WsFrame>,
    db_pool: &SqlitePool,
    presence: &PresenceRegistry,
    tx: &broadcast::Sender<Outbound>,
) -> Result<(), axum::Error> {
    match event {
        ClientEvent::UserLogin { email } => {
            announce_identity(conn, presence, tx, email);
        }
        ClientEvent::GetOnlineUsers => {
            send_event(sender, &ServerEvent::OnlineUsers { users: presence.snapshot() }).await?;
        }
        ClientEvent::Join { room } => {
            conn.joined.insert(room.clone());
            send_event(sender, &ServerEvent::RoomJoined { room }).await?;
        }
        ClientEvent::Leave { room } => {
            conn.joined.remove(&room);
        }
        ClientEvent::FetchHistory { room } => match store::history(db_pool, &room).await {
            Ok(messages) => {
                send_event(sender, &ServerEvent::History { room, messages }).await?;
            }
            Err(err) => {
                tracing::error!(%room, error = %err.0, "history fetch failed");
                send_event(
                    sender,
                    &ServerEvent::Error { message: "could not load history".to_owned() },
                )
                .await?;
            }
        },
        ClientEvent::SendMessage(msg) => {
            if msg.text.trim().is_empty() || msg.room.as_str().is_empty() {
                send_event(
                    sender,
                    &ServerEvent::Error { message: "message text and room are required".to_owned() },
                )
                .await?;
                return Ok(());
            }
            if let Err(err) = store::save_message(db_pool, &msg).await {
                tracing::error!(room = %msg.room, error = %err.0, "message persist failed");
                send_event(
                    sender,
                    &ServerEvent::Error { message: "could not store message".to_owned() },
                )
                .await?;
                return Ok(());
            }
            // sender included: it joined the room like everyone else
            let _ = tx.send(Outbound {
                target: Target::Room(msg.room.clone()),
                event: ServerEvent::Message(msg),
            });
        }
        ClientEvent::Typing { room, sender: from, receiver, status } => {
            let _ = tx.send(Outbound {
                target: Target::User(receiver),
                event: ServerEvent::TypingUpdate { room, sender: from, status },
            });
        }
    }
    Ok(())
}

fn announce_identity(
    conn: &mut ConnState,
    presence: &PresenceRegistry,
    tx: &broadcast::Sender<Outbound>,
    email: String,
) {
    if conn.identity.as_deref() == Some(email.as_str()) {
        return;
    }
    // an announce under a new identity replaces the old binding
    if let Some(old) = conn.identity.take() {
        release_identity(presence, tx, old, conn.conn_id);
    }
    tracing::info!(conn = %conn.conn_id, %email, "identity announced");
    if presence.announce(&email, conn.conn_id) {
        let _ = tx.send(Outbound {
            target: Target::All,
            event: ServerEvent::StatusUpdate {
                email: email.clone(),
                status: Presence::Online,
            },
        });
    }
    conn.identity = Some(email);
}

fn release_identity(
    presence: &PresenceRegistry,
    tx: &broadcast::Sender<Outbound>,
    email: String,
    conn_id: Uuid,
) {
    if presence.release(&email, conn_id) {
        tracing::info!(%email, "user went offline");
        let _ = tx.send(Outbound {
            target: Target::All,
            event: ServerEvent::StatusUpdate { email, status: Presence::Offline },
        });
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, WsFrame>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender.send(WsFrame::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::resolve_room;

    fn conn() -> ConnState {
        ConnState {
            conn_id: Uuid::now_v7(),
            identity: None,
            joined: HashSet::new(),
        }
    }

    fn status_updates(rx: &mut broadcast::Receiver<Outbound>) -> Vec<(String, Presence)> {
        let mut seen = Vec::new();
        while let Ok(out) = rx.try_recv() {
            assert!(matches!(out.target, Target::All));
            if let ServerEvent::StatusUpdate { email, status } = out.event {
                seen.push((email, status));
            }
        }
        seen
    }

    #[test]
    fn joining_the_same_room_twice_leaves_one_binding() {
        let mut conn = conn();
        let room = resolve_room("a@x.com", "b@x.com").unwrap();

        conn.joined.insert(room.clone());
        conn.joined.insert(room.clone());

        assert_eq!(conn.joined.len(), 1);
        assert!(conn.wants(&Target::Room(room)));
    }

    #[test]
    fn room_fanout_reaches_only_joined_connections() {
        let mut conn = conn();
        let ab = resolve_room("a@x.com", "b@x.com").unwrap();
        let cd = resolve_room("c@x.com", "d@x.com").unwrap();
        conn.joined.insert(ab.clone());

        assert!(conn.wants(&Target::Room(ab)));
        assert!(!conn.wants(&Target::Room(cd)));
        assert!(conn.wants(&Target::All));
    }

    #[test]
    fn user_fanout_matches_only_the_announced_identity() {
        let mut conn = conn();
        assert!(!conn.wants(&Target::User("a@x.com".to_owned())));

        conn.identity = Some("a@x.com".to_owned());
        assert!(conn.wants(&Target::User("a@x.com".to_owned())));
        assert!(!conn.wants(&Target::User("b@x.com".to_owned())));
    }

    #[test]
    fn reannounce_under_a_new_identity_releases_the_old_one_once() {
        let presence = PresenceRegistry::default();
        let (tx, mut rx) = broadcast::channel(16);
        let mut conn = conn();

        announce_identity(&mut conn, &presence, &tx, "a@x.com".to_owned());
        announce_identity(&mut conn, &presence, &tx, "b@x.com".to_owned());

        assert_eq!(conn.identity.as_deref(), Some("b@x.com"));
        assert!(!presence.is_online("a@x.com"));
        assert!(presence.is_online("b@x.com"));
        assert_eq!(
            status_updates(&mut rx),
            vec![
                ("a@x.com".to_owned(), Presence::Online),
                ("a@x.com".to_owned(), Presence::Offline),
                ("b@x.com".to_owned(), Presence::Online),
            ]
        );
    }

    #[test]
    fn reannouncing_the_same_identity_is_a_noop() {
        let presence = PresenceRegistry::default();
        let (tx, _keep_open) = broadcast::channel::<Outbound>(16);
        let mut conn = conn();

        announce_identity(&mut conn, &presence, &tx, "a@x.com".to_owned());
        let mut rx = tx.subscribe();
        announce_identity(&mut conn, &presence, &tx, "a@x.com".to_owned());

        assert!(presence.is_online("a@x.com"));
        assert!(status_updates(&mut rx).is_empty());
    }
}
