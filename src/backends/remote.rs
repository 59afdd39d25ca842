//! Hosted-model adapter (HuggingFace inference API shape).
//!
//! Sends `{"inputs": text, "options": {"wait_for_model": true}}` with a bearer
//! credential and expects a list of `{label, score}` entries, either flat or
//! nested one level (`[[...]]`). HTTP 503 means "model loading": we wait a
//! fixed backoff and retry exactly once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use super::{BackendId, SentimentBackend};
use crate::config::remote::RemoteConfig;
use crate::error::BackendError;
use crate::normalize::RawOutput;

pub struct RemoteModelBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    retry_backoff: Duration,
}

#[derive(Serialize)]
struct Options {
    wait_for_model: bool,
}

#[derive(Serialize)]
struct Req<'a> {
    inputs: &'a str,
    options: Options,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Resp {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl RemoteModelBackend {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        retry_backoff: Duration,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("sentiment-engine/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            retry_backoff,
        })
    }

    /// Build from the `[remote]` config section, resolving the credential.
    pub fn from_config(cfg: &RemoteConfig) -> anyhow::Result<Self> {
        Self::new(
            cfg.endpoint.clone(),
            cfg.model.clone(),
            cfg.resolve_api_key(),
            Duration::from_millis(cfg.retry_backoff_ms),
            Duration::from_millis(cfg.connect_timeout_ms),
        )
    }

    async fn post(
        &self,
        key: &str,
        text: &str,
        deadline: Instant,
        budget: Duration,
    ) -> Result<reqwest::Response, BackendError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out(budget));
        }
        let req = Req {
            inputs: text,
            options: Options {
                wait_for_model: true,
            },
        };
        self.http
            .post(&self.endpoint)
            .bearer_auth(key)
            .timeout(remaining)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_error(e, budget))
    }
}

#[async_trait]
impl SentimentBackend for RemoteModelBackend {
    fn id(&self) -> BackendId {
        BackendId::Remote
    }

    fn model_identifier(&self) -> String {
        self.model.clone()
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn score(&self, text: &str, timeout: Duration) -> Result<RawOutput, BackendError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(BackendError::Unavailable("no API credential".into()));
        };
        let deadline = Instant::now() + timeout;

        let mut resp = self.post(key, text, deadline, timeout).await?;
        if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
            info!(target: "backend", backoff_ms = self.retry_backoff.as_millis() as u64, "remote model loading, retrying once");
            if Instant::now() + self.retry_backoff >= deadline {
                return Err(BackendError::Unavailable(
                    "model loading; retry backoff exceeds deadline".into(),
                ));
            }
            tokio::time::sleep(self.retry_backoff).await;
            resp = self.post(key, text, deadline, timeout).await?;
            if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                return Err(BackendError::Unavailable("model still loading after retry".into()));
            }
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Unavailable(format!("HTTP {status}")));
        }

        let body = resp.bytes().await.map_err(|e| transport_error(e, timeout))?;
        let scores = parse_label_scores(&body)?;
        debug!(target: "backend", labels = scores.len(), "remote response parsed");
        Ok(RawOutput::LabelScores { scores })
    }
}

/// Accepts `[[{label, score}, ...]]` or `[{label, score}, ...]`.
fn parse_label_scores(body: &[u8]) -> Result<Vec<(String, f64)>, BackendError> {
    let parsed: Resp = serde_json::from_slice(body)
        .map_err(|e| BackendError::MalformedResponse(format!("unexpected body: {e}")))?;
    let entries = match parsed {
        Resp::Flat(v) => v,
        Resp::Nested(outer) => outer
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::MalformedResponse("empty outer list".into()))?,
    };
    if entries.is_empty() {
        return Err(BackendError::MalformedResponse("no label scores".into()));
    }
    Ok(entries.into_iter().map(|e| (e.label, e.score)).collect())
}

fn transport_error(e: reqwest::Error, budget: Duration) -> BackendError {
    if e.is_timeout() {
        timed_out(budget)
    } else if e.is_decode() || e.is_body() {
        BackendError::MalformedResponse(e.to_string())
    } else {
        BackendError::Unavailable(e.to_string())
    }
}

fn timed_out(budget: Duration) -> BackendError {
    BackendError::Timeout {
        after_ms: budget.as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_and_flat_shapes() {
        let nested = br#"[[{"label":"LABEL_2","score":0.9},{"label":"LABEL_1","score":0.07},{"label":"LABEL_0","score":0.03}]]"#;
        let flat = br#"[{"label":"positive","score":0.9},{"label":"neutral","score":0.1}]"#;
        assert_eq!(parse_label_scores(nested).unwrap().len(), 3);
        assert_eq!(parse_label_scores(flat).unwrap()[0].0, "positive");
    }

    #[test]
    fn rejects_error_objects_and_empty_lists() {
        for body in [
            &br#"{"error":"Model is currently loading"}"#[..],
            b"[]",
            b"[[]]",
            b"not json",
        ] {
            let err = parse_label_scores(body).unwrap_err();
            assert!(matches!(err, BackendError::MalformedResponse(_)), "{err:?}");
        }
    }

    #[test]
    fn missing_key_means_not_configured() {
        let b = RemoteModelBackend::new(
            "http://127.0.0.1:9",
            "m",
            None,
            Duration::from_millis(1),
            Duration::from_millis(50),
        )
        .unwrap();
        assert!(!b.is_configured());
        assert_eq!(b.model_identifier(), "m");
    }
}
