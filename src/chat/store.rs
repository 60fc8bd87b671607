//! Message persistence. Append-only per room; history is served wholesale,
//! capped at the most recent [`HISTORY_LIMIT`] in chronological order.

use sqlx::SqlitePool;

use crate::{protocol::{ChatMessage, RoomId}, AppResult};

pub const HISTORY_LIMIT: i64 = 50;

pub async fn save_message(db_pool: &SqlitePool, msg: &ChatMessage) -> AppResult<()> {
    sqlx::query("INSERT INTO messages (room_id,sender,receiver,text,timestamp) VALUES (?,?,?,?,?)")
        .bind(msg.room.as_str())
        .bind(&msg.sender)
        .bind(&msg.receiver)
        .bind(&msg.text)
        .bind(&msg.timestamp)
        .execute(db_pool)
        .await?;
    Ok(())
}

pub async fn history(db_pool: &SqlitePool, room: &RoomId) -> AppResult<Vec<ChatMessage>> {
    // newest first for the cap, then reversed back into send order
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT sender,receiver,text,timestamp FROM messages WHERE room_id=? ORDER BY id DESC LIMIT ?",
    )
    .bind(room.as_str())
    .bind(HISTORY_LIMIT)
    .fetch_all(db_pool)
    .await?;

    Ok(rows
        .into_iter()
        .rev()
        .map(|(sender, receiver, text, timestamp)| ChatMessage {
            sender,
            receiver,
            room: room.clone(),
            text,
            timestamp,
        })
        .collect())
}
