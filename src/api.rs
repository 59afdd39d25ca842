use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::{EngineStatus, SentimentEngine};
use crate::error::InputError;
use crate::result::{AggregateStats, AnalysisResult};
use crate::selector::{Method, UnknownMethod};
use crate::signals::Signals;

#[derive(Clone)]
pub struct AppState {
    engine: SentimentEngine,
}

pub fn create_router(engine: SentimentEngine) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze))
        .route("/batch", post(analyze_batch))
        .route("/signals", post(signals))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
struct AnalyzeReq {
    /// Kept loose so a non-string payload maps to `InputError::NotText`.
    text: serde_json::Value,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Deserialize)]
struct BatchReq {
    texts: Vec<serde_json::Value>,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Deserialize)]
struct SignalsReq {
    text: serde_json::Value,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

enum ApiError {
    Input(InputError),
    Method(UnknownMethod),
}

impl From<InputError> for ApiError {
    fn from(e: InputError) -> Self {
        ApiError::Input(e)
    }
}

impl From<UnknownMethod> for ApiError {
    fn from(e: UnknownMethod) -> Self {
        ApiError::Method(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Input(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Method(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

fn parse_method(raw: Option<&str>) -> Result<Method, UnknownMethod> {
    raw.map_or(Ok(Method::Auto), |s| s.parse())
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeReq>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let method = parse_method(body.method.as_deref())?;
    let text = body.text.as_str().ok_or(InputError::NotText)?;
    let result = state.engine.analyze(text, method).await?;
    Ok(Json(result))
}

async fn analyze_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchReq>,
) -> Result<Json<AggregateStats>, ApiError> {
    let method = parse_method(body.method.as_deref())?;
    let texts: Vec<&str> = body.texts.iter().filter_map(|v| v.as_str()).collect();
    let not_text = body.texts.len() - texts.len();

    let mut stats = state.engine.analyze_many(texts, method).await;
    stats.rejected_texts += not_text;
    stats.total_texts += not_text;
    Ok(Json(stats))
}

async fn signals(
    State(state): State<AppState>,
    Json(body): Json<SignalsReq>,
) -> Result<Json<Signals>, ApiError> {
    let text = body.text.as_str().ok_or(InputError::NotText)?;
    Ok(Json(state.engine.signals(text)?))
}

async fn status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.engine.status())
}
