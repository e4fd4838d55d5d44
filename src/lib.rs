//! Followgate - OAuth gateway for a single private page
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - Landing / private / error pages                          │
//! │  - /auth/{provider} and callbacks                           │
//! │  - Health and metrics                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Access Gate                           │
//! │  - Identity verification (OAuth code exchange)              │
//! │  - Entitlement check (GitHub follow / YouTube subscription) │
//! │  - Session creation                                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Session Store                          │
//! │  - In-process keyed store, signed id cookie                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: pages and metrics endpoints
//! - `auth`: providers, access gate, sessions
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// HTTP client for provider calls
    pub http_client: Arc<reqwest::Client>,

    /// Session store handed to the access gate
    pub sessions: Arc<dyn auth::SessionStore>,
}

impl AppState {
    /// Initialize application state with the in-process session store
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let ttl = std::time::Duration::from_secs(config.session.max_age.max(1) as u64);
        let sessions = auth::MemorySessionStore::new(config.session.max_sessions, ttl);
        Self::with_session_store(config, Arc::new(sessions))
    }

    /// Initialize application state with a caller-supplied session store
    pub fn with_session_store(
        config: config::AppConfig,
        sessions: Arc<dyn auth::SessionStore>,
    ) -> Result<Self, error::AppError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.http.timeout_seconds))
            .build()?;

        tracing::info!(
            timeout_seconds = config.http.timeout_seconds,
            github_target = %config.github.target_account,
            google_target = %config.google.target_channel_id,
            "Application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            http_client: Arc::new(http_client),
            sessions,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::pages_router())
        .merge(auth::auth_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
