use axum::{
    debug_handler,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{auth, session::USER_EMAIL, username_from_email, AppResult, AppState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    pub username: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile).post(update_profile))
}

#[debug_handler]
async fn get_profile(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let Some(email) = session.get::<String>(USER_EMAIL).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let row: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE email=?")
        .bind(&email)
        .fetch_optional(&db_pool)
        .await?;
    let username = row.map(|(username,)| username).unwrap_or_else(|| username_from_email(&email));

    Ok(Json(Profile { email, username }).into_response())
}

#[debug_handler]
async fn update_profile(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Response> {
    let Some(email) = session.get::<String>(USER_EMAIL).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let mut email = email;
    if let Some(new_email) = update.email.filter(|e| !e.is_empty() && *e != email) {
        let taken: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE email=?")
            .bind(&new_email)
            .fetch_optional(&db_pool)
            .await?;
        if taken.is_some() {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "email already in use"})),
            )
                .into_response());
        }

        tracing::info!(old = %email, new = %new_email, "email changed");
        sqlx::query("UPDATE users SET email=? WHERE email=?")
            .bind(&new_email)
            .bind(&email)
            .execute(&db_pool)
            .await?;
        // the session follows the identity, like the announce on the socket
        session.insert(USER_EMAIL, &new_email).await?;
        email = new_email;
    }

    if let Some(password) = update.password.filter(|p| !p.is_empty()) {
        sqlx::query("UPDATE users SET password_hash=? WHERE email=?")
            .bind(auth::hash_password(&password))
            .bind(&email)
            .execute(&db_pool)
            .await?;
    }

    Ok(Json(json!({"message": "profile updated"})).into_response())
}
