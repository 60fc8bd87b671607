pub mod auth;
pub mod chat;
pub mod client;
pub mod contacts;
pub mod db;
pub mod presence;
pub mod profile;
pub mod protocol;
pub mod session;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}};
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::{chat::Outbound, presence::PresenceRegistry};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub presence: PresenceRegistry,
    pub tx: broadcast::Sender<Outbound>,
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Display name for users who never set one: the local part of the email.
pub(crate) fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_owned()
}

pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
