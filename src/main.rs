//! Followgate binary entry point

use followgate::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load `.env` if present
/// 2. Load configuration from file and environment
/// 3. Initialize tracing/logging from the `logging` section
/// 4. Initialize AppState
/// 5. Build Axum router
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = config::AppConfig::load()?;
    init_tracing(&config.logging);

    tracing::info!("Starting Followgate...");

    followgate::metrics::init_metrics();

    tracing::info!(
        domain = %config.server.domain,
        protocol = %config.server.protocol,
        require_session = config.access.require_session,
        "Configuration loaded"
    );
    if !config.should_use_secure_cookies() {
        tracing::warn!(
            domain = %config.server.domain,
            protocol = %config.server.protocol,
            "Using insecure session cookies for local development"
        );
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let base_url = config.server.base_url();

    let state = AppState::new(config)?;
    let app = followgate::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", base_url);

    axum::serve(listener, app).await?;

    Ok(())
}

/// `RUST_LOG` wins over `logging.level` when set
fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter_directive().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
