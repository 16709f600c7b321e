//! giftsync - Live collectible-inventory sync service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - GET /profile-gifts                                       │
//! │  - /health, /metrics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Stale-while-revalidate gift service                      │
//! │  - Per-account background refresh coordinator              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │         Data Layer           │ │      External Fetcher       │
//! │  - SQLite cache (sqlx)       │ │  - Script subprocesses      │
//! │  - No-op cache               │ │  - Decoration resolver      │
//! └──────────────────────────────┘ └────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `fetcher`: External process invocation and output mapping
//! - `decoration`: Decoration color resolution
//! - `data`: Models and cache stores
//! - `client`: Consumer-side session with refresh polling
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod client;
pub mod config;
pub mod data;
pub mod decoration;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Profile cache (SQLite or no-op)
    pub cache: Arc<dyn data::CacheStore>,

    /// External gift/decoration fetcher
    pub fetcher: Arc<dyn fetcher::ProfileFetcher>,

    /// Background refresh registry
    pub coordinator: Arc<service::RefreshCoordinator>,

    /// Gift listing service
    pub gifts: Arc<service::GiftService>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Select and open the cache backend
    /// 2. Create the script fetcher
    /// 3. Wire the refresh coordinator and gift service
    ///
    /// # Errors
    /// Returns error if the cache backend was explicitly requested and
    /// cannot be opened
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let cache = data::open_cache_store(&config.cache).await?;
        tracing::info!(backend = cache.backend(), "Cache initialized");

        let fetcher: Arc<dyn fetcher::ProfileFetcher> =
            Arc::new(fetcher::ScriptFetcher::new(config.fetcher.clone()));
        tracing::info!(
            interpreter = %config.fetcher.interpreter.display(),
            working_dir = %config.fetcher.working_dir.display(),
            "Fetcher configured"
        );

        let state = Self::from_parts(config, fetcher, cache);
        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Assemble state from already-built parts
    pub fn from_parts(
        config: config::AppConfig,
        fetcher: Arc<dyn fetcher::ProfileFetcher>,
        cache: Arc<dyn data::CacheStore>,
    ) -> Self {
        let coordinator = Arc::new(service::RefreshCoordinator::new(
            fetcher.clone(),
            cache.clone(),
        ));
        let gifts = Arc::new(service::GiftService::new(
            fetcher.clone(),
            cache.clone(),
            coordinator.clone(),
            config.decoration.timeout(),
        ));

        Self {
            config: Arc::new(config),
            cache,
            fetcher,
            coordinator,
            gifts,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::profile_gifts_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method};
    use tower_http::cors::{Any, CorsLayer};

    let Some(allowed_origin) = server.allowed_origin.as_deref() else {
        return CorsLayer::permissive();
    };

    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods([Method::GET])
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse allowed CORS origin; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods([Method::GET]).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
