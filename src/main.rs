//! AI Manager - referral fraud detection and marketing reporting for the marketplace.
//!
//! # API Endpoints
//!
//! - `POST /ai-manager` - Run the job once
//! - `GET /reports/recent` - Latest reports
//! - `GET /referral-logs/recent` - Latest fraud audit entries
//! - `GET /sellers/:seller_id/suggestions` - Suggestions for one seller
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ai_manager::api::{AppState, create_router};
use ai_manager::clock::SystemClock;
use ai_manager::config::Config;
use ai_manager::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("ai_manager=info".parse()?))
        .init();

    // Load configuration from environment
    let config = Config::from_env();

    info!(
        port = config.port,
        db_url = %config.database_url,
        burst_threshold = config.job.detector.burst_threshold,
        insights = config.insight.is_enabled(),
        "Starting AI Manager"
    );

    // Initialize storage
    let storage = Storage::new(&config.database_url).await?;
    info!("Database initialized");

    // Create application state
    let state = AppState {
        storage,
        insight: config.insight.build_provider()?,
        clock: Arc::new(SystemClock),
        settings: Arc::new(config.job.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "AI Manager is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
