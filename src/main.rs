use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use talkline::{auth, chat, contacts, db, presence::PresenceRegistry, profile, AppState};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("talkline=debug,info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(30)));

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&dotenv::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://talkline.db".to_owned()))
        .await?;
    db::init_db(&db_pool).await?;

    let app_state = AppState {
        db_pool,
        presence: PresenceRegistry::default(),
        tx: broadcast::channel(256).0,
    };

    let app = Router::new()
        .merge(auth::router())
        .merge(profile::router())
        .nest("/api", contacts::router())
        .nest("/chat", chat::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive());

    let addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_owned());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "talkline listening");
    axum::serve(listener, app).await?;
    Ok(())
}
