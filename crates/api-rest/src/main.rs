//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the CareCard REST API on its own.
//!
//! ## Intended use
//! Useful for development when you want to point a front-end at the API without the rest of
//! the workspace. The workspace's main `carecard-run` binary serves the same router and also
//! loads a `.env` file.

use api_rest::{AppState, DEFAULT_REST_ADDR, REST_ADDR_ENV};
use carecard_core::CoreConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the CareCard REST API server
///
/// # Environment Variables
/// - `CARECARD_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CARECARD_*`: Core configuration, see `carecard_core::config`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the core configuration is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("carecard_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var(REST_ADDR_ENV).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    tracing::info!("-- Starting CareCard REST API on {}", addr);

    let cfg = CoreConfig::from_lookup(|key| std::env::var(key).ok())?;
    api_rest::serve(&addr, AppState::new(&cfg)).await
}
