use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, DEFAULT_REST_ADDR, REST_ADDR_ENV};
use carecard_core::CoreConfig;

/// Main entry point for the CareCard application
///
/// Loads a `.env` file if present, reads the core configuration and serves the REST API.
/// Chat and analysis endpoints answer 503 when no completion API key is configured; the
/// hospital, route, emergency and profile endpoints work without one.
///
/// # Environment Variables
/// - `CARECARD_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CARECARD_GEMINI_API_KEY`: API key for the completion service
/// - `CARECARD_GEMINI_API_BASE`, `CARECARD_GEMINI_MODEL`: completion endpoint and model
/// - `CARECARD_OVERPASS_URL`, `CARECARD_OSRM_URL`, `CARECARD_SEARCH_RADIUS_M`: map services
/// - `CARECARD_MAX_RETRIES`, `CARECARD_INITIAL_DELAY_MS`, `CARECARD_BACKOFF_MULTIPLIER`:
///   retry policy for every outbound request
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If the configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carecard_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("carecard_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var(REST_ADDR_ENV).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let cfg = CoreConfig::from_lookup(|key| std::env::var(key).ok())?;

    match cfg.completion() {
        Ok(completion) => tracing::info!("++ Completion model: {}", completion.model()),
        Err(_) => tracing::warn!("++ No completion API key; chat and analysis are disabled"),
    }
    tracing::info!(
        "++ Hospital search via {} (radius {} m), routes via {}",
        cfg.overpass_url(),
        cfg.search_radius_m(),
        cfg.osrm_url()
    );
    tracing::info!("++ Starting CareCard REST on {}", rest_addr);

    api_rest::serve(&rest_addr, AppState::new(&cfg)).await
}
