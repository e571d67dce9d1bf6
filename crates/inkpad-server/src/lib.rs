pub mod api;
pub mod auth;
pub mod collab;
pub mod config;
pub mod db;
pub mod error;
pub mod service;

use axum::{http::StatusCode, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::collab::RoomRegistry;
use crate::config::Config;
use crate::db::{MemoryStore, PgStore, Store};
use crate::service::NotebookService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notebooks: NotebookService,
    pub rooms: Arc<RoomRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let notebooks = NotebookService::new(
            store.clone(),
            config.access_policy(),
            config.invitation_policy(),
        );
        let rooms = Arc::new(RoomRegistry::new(config.relay_room_capacity));
        Self {
            store,
            notebooks,
            rooms,
            config: Arc::new(config),
        }
    }
}

/// Build the router with all routes and middleware
pub fn app(state: AppState) -> Router {
    let timeout = state.config.request_timeout;
    Router::new()
        .merge(api::router())
        .merge(collab::router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the server with the given configuration
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = if config.uses_memory_store() {
        tracing::warn!("Using in-memory store; data is lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        let db = PgStore::connect(&config.database_url, config.max_connections).await?;

        // Run migrations
        db.migrate().await?;
        Arc::new(db)
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(store, config);
    let app = app(state);

    // Start the server
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
