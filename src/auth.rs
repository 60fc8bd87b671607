//! Minimal credential handling so a session can be bound to an email.
//! Passwords are stored as `salt$sha256(salt || password)`.

use axum::{
    debug_handler,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{session::USER_EMAIL, username_from_email, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
}

#[derive(Deserialize)]
pub(crate) struct Credentials {
    email: String,
    password: String,
}

#[debug_handler]
async fn register(
    State(db_pool): State<SqlitePool>,
    Form(Credentials { email, password }): Form<Credentials>,
) -> AppResult<Response> {
    if email.is_empty() || password.is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "email and password are required").into_response());
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE email=?")
        .bind(&email)
        .fetch_optional(&db_pool)
        .await?;
    if existing.is_some() {
        return Ok((StatusCode::BAD_REQUEST, "user already exists").into_response());
    }

    tracing::info!(%email, "registering user");
    sqlx::query("INSERT INTO users (email,username,password_hash) VALUES (?,?,?)")
        .bind(&email)
        .bind(username_from_email(&email))
        .bind(hash_password(&password))
        .execute(&db_pool)
        .await?;

    Ok(Redirect::to("/login").into_response())
}

#[debug_handler]
async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(Credentials { email, password }): Form<Credentials>,
) -> AppResult<Response> {
    let row: Option<(String,)> = sqlx::query_as("SELECT password_hash FROM users WHERE email=?")
        .bind(&email)
        .fetch_optional(&db_pool)
        .await?;

    let Some((stored,)) = row else {
        return Ok((StatusCode::UNAUTHORIZED, "invalid credentials").into_response());
    };
    if !verify_password(&password, &stored) {
        return Ok((StatusCode::UNAUTHORIZED, "invalid credentials").into_response());
    }

    session.insert(USER_EMAIL, &email).await?;
    Ok(Redirect::to("/").into_response())
}

/// The client closes its realtime channel before navigating here, so
/// presence is released by the socket teardown, not by this handler.
#[debug_handler]
async fn logout(session: Session) -> AppResult<Response> {
    session.flush().await?;
    Ok(Redirect::to("/login").into_response())
}

pub(crate) fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let salt = hex(&salt);
    let digest = digest_hex(&salt, password);
    format!("{salt}${digest}")
}

pub(crate) fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    digest_hex(salt, password) == digest
}

fn digest_hex(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex(&hasher.finalize())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("hunter2"), hash_password("hunter2"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("hunter2", "no-separator-here"));
    }
}
