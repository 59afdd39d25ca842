//! Sentiment Engine: binary entrypoint
//! Boots the Axum HTTP server around the scoring engine.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or unparsable.
const FALLBACK_FILTER: &str = "sentiment_engine=debug,engine=info,backend=info,warn";

fn env_is(name: &str, accepted: &[&str]) -> bool {
    std::env::var(name)
        .map(|v| accepted.contains(&v.trim().to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Local logging is opt-in through `SENTIMENT_DEV_LOG` and never active in
/// deployed release builds.
fn dev_logging_requested() -> bool {
    let local = cfg!(debug_assertions) || env_is("SHUTTLE_ENV", &["local", "development", "dev"]);
    local && env_is("SENTIMENT_DEV_LOG", &["1", "true"])
}

/// Compact lines by default; `SENTIMENT_LOG_FORMAT=json` for structured output.
fn init_dev_tracing() {
    if !dev_logging_requested() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    // Shuttle may already have installed a subscriber.
    let _ = if env_is("SENTIMENT_LOG_FORMAT", &["json"]) {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Picks up SENTIMENT_CONFIG_PATH / HUGGINGFACE_API_KEY from a local .env.
    let _ = dotenvy::dotenv();

    init_dev_tracing();

    let router = sentiment_engine::app().await?;
    Ok(router.into())
}
