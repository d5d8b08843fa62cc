//! # storelife_api
//!
//! HTTP API library for Storelife.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use sqlx::PgPool;
use storelife_core::auth::SessionManager;
use storelife_core::directory::DirectorySource;
use storelife_core::directory::store::DirectoryStore;
use storelife_core::directory::sync::DirectorySync;
use storelife_core::entities::EntityStore;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{auth, directory, entities, health};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    /// Local accounts and the directory mirror.
    pub users: Arc<dyn DirectoryStore>,
    pub entities: Arc<dyn EntityStore>,
    /// WeCom client, when configured. Needed for SSO login.
    pub directory: Option<Arc<dyn DirectorySource>>,
    /// Directory sync job, when configured. Needed for manual triggers.
    pub sync: Option<Arc<DirectorySync>>,
    /// API configuration.
    pub config: ApiConfig,
}

/// Run embedded database migrations.
///
/// Delegates to `storelife_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    storelife_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_WECOM_LOGIN, post(auth::wecom_login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(
            routes::API_ENTITY,
            get(entities::list_handler).post(entities::create_handler),
        )
        .route(routes::API_ENTITY_ID, get(entities::get_handler))
        .route(
            routes::GET_API_ENTITY_ID_TRANSITIONS,
            get(entities::transitions_handler),
        )
        .route(
            routes::PATCH_API_ENTITY_ID_STATUS,
            patch(entities::change_status_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Admin routes: require_auth runs first (outermost), then require_admin.
    let admin = Router::new()
        .route(
            routes::POST_ADMIN_DIRECTORY_SYNC,
            post(directory::trigger_sync_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .layer(cors)
        .with_state(state)
}
