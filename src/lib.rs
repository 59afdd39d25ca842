// src/lib.rs
// Public library surface: the scoring engine plus the thin HTTP glue around it.

pub mod api;
pub mod backends;
pub mod cache;
pub mod config;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod rate_limit;
pub mod result;
pub mod selector;
pub mod signals;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::config::EngineConfig;
pub use crate::engine::{EngineStatus, SentimentEngine};
pub use crate::error::{BackendError, ErrorKind, InputError};
pub use crate::normalize::{Distribution, Label};
pub use crate::result::{AggregateStats, AnalysisResult, MethodUsed};
pub use crate::selector::Method;

use axum::Router;
use tracing::info;

/// Full application router: API routes plus `/metrics`.
pub fn router(engine: SentimentEngine) -> Router {
    let metrics = metrics::Metrics::init();
    api::create_router(engine).merge(metrics.router())
}

/// Load configuration (`SENTIMENT_CONFIG_PATH` / `config/engine.toml` /
/// defaults), build the engine and return the router.
pub async fn app() -> anyhow::Result<Router> {
    let config = EngineConfig::load()?;
    let engine = SentimentEngine::from_config(config)?;
    let status = engine.status();
    info!(
        enabled = ?engine.config().enabled_backends(),
        remote_credential = status.remote_credential_present,
        cache = status.cache_enabled,
        "sentiment engine ready"
    );
    Ok(router(engine))
}
