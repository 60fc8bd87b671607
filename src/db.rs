use sqlx::SqlitePool;

/// Create the schema if it does not exist yet. Ran once at startup.
pub async fn init_db(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            email TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            password_hash TEXT NOT NULL
        )",
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_email TEXT NOT NULL,
            contact_email TEXT NOT NULL,
            added_at TEXT NOT NULL,
            UNIQUE(user_email, contact_email)
        )",
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            room_id TEXT NOT NULL,
            sender TEXT NOT NULL,
            receiver TEXT NOT NULL,
            text TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )",
    )
    .execute(db_pool)
    .await?;

    Ok(())
}
