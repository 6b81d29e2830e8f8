pub mod auth;
pub mod db;
pub mod error;
pub mod keys;
pub mod messages;

use axum::{Router, extract::FromRef};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;

pub use error::{ApiError, ApiResult};

use auth::store::{CredentialStore, SessionStore};
use keys::directory::KeyDirectory;
use messages::relay::MessageRelay;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub credentials: CredentialStore,
    pub sessions: SessionStore,
    pub directory: KeyDirectory,
    pub relay: MessageRelay,
}

impl AppState {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self {
            credentials: CredentialStore::new(db_pool.clone()),
            sessions: SessionStore::new(db_pool.clone()),
            directory: KeyDirectory::new(db_pool.clone()),
            relay: MessageRelay::new(db_pool.clone()),
            db_pool,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/key", keys::router(state.clone()))
        .nest("/api/message", messages::router(state.clone()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
