//! Contact list and user search. Contacts are a directed edge, so adding
//! someone does not add you to their list.

use axum::{
    debug_handler,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    now_rfc3339, presence::PresenceRegistry, protocol::Presence, session::USER_EMAIL,
    username_from_email, AppResult, AppState,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    pub email: String,
    pub username: String,
    pub status: Presence,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactList {
    pub contacts: Vec<ContactEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactChange {
    pub contact_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub email: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserSearch {
    pub users: Vec<UserEntry>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/contacts",
            get(list_contacts).post(add_contact).delete(remove_contact),
        )
        .route("/search_users", get(search_users))
}

#[debug_handler(state = crate::AppState)]
async fn list_contacts(
    State(db_pool): State<SqlitePool>,
    State(presence): State<PresenceRegistry>,
    session: Session,
) -> AppResult<Response> {
    let Some(email) = session.get::<String>(USER_EMAIL).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT c.contact_email, u.username
         FROM contacts c LEFT JOIN users u ON u.email = c.contact_email
         WHERE c.user_email=? ORDER BY c.added_at DESC",
    )
    .bind(&email)
    .fetch_all(&db_pool)
    .await?;

    let contacts = rows
        .into_iter()
        .map(|(email, username)| ContactEntry {
            username: username.unwrap_or_else(|| username_from_email(&email)),
            status: presence.status(&email),
            email,
        })
        .collect();

    Ok(Json(ContactList { contacts }).into_response())
}

#[debug_handler]
async fn add_contact(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(ContactChange { contact_email }): Json<ContactChange>,
) -> AppResult<Response> {
    let Some(email) = session.get::<String>(USER_EMAIL).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    if contact_email.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "contact email is required"})),
        )
            .into_response());
    }
    if contact_email == email {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "cannot add yourself as a contact"})),
        )
            .into_response());
    }

    let exists: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE email=?")
        .bind(&contact_email)
        .fetch_optional(&db_pool)
        .await?;
    if exists.is_none() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "user does not exist"})),
        )
            .into_response());
    }

    let inserted =
        sqlx::query("INSERT INTO contacts (user_email,contact_email,added_at) VALUES (?,?,?)")
            .bind(&email)
            .bind(&contact_email)
            .bind(now_rfc3339())
            .execute(&db_pool)
            .await;

    match inserted {
        Ok(_) => Ok(Json(json!({"message": "contact added"})).into_response()),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "contact already exists"})),
        )
            .into_response()),
        Err(err) => Err(err.into()),
    }
}

#[debug_handler]
async fn remove_contact(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(ContactChange { contact_email }): Json<ContactChange>,
) -> AppResult<Response> {
    let Some(email) = session.get::<String>(USER_EMAIL).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };
    if contact_email.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "contact email is required"})),
        )
            .into_response());
    }

    sqlx::query("DELETE FROM contacts WHERE user_email=? AND contact_email=?")
        .bind(&email)
        .bind(&contact_email)
        .execute(&db_pool)
        .await?;

    Ok(Json(json!({"message": "contact removed"})).into_response())
}

#[derive(Deserialize)]
struct SearchQuery {
    query: Option<String>,
}

#[debug_handler]
async fn search_users(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Query(SearchQuery { query }): Query<SearchQuery>,
) -> AppResult<Response> {
    let Some(email) = session.get::<String>(USER_EMAIL).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    let users = find_users(&db_pool, &email, &query.unwrap_or_default()).await?;
    Ok(Json(UserSearch { users }).into_response())
}

/// Substring match on email, excluding the requester. No match is an empty
/// list, never an error.
pub(crate) async fn find_users(
    db_pool: &SqlitePool,
    requester: &str,
    query: &str,
) -> AppResult<Vec<UserEntry>> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT email,username FROM users WHERE email != ? AND lower(email) LIKE ? ORDER BY email",
    )
    .bind(requester)
    .bind(format!("%{query}%"))
    .fetch_all(db_pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(email, username)| UserEntry { email, username })
        .collect())
}
