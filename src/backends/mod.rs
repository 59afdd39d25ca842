//! Backend adapters: one capability contract, four variants.
//!
//! Adapters only produce a backend-native `RawOutput` (or a `BackendError`).
//! `classify` wraps that into a `BackendResult`: it bounds the call with a
//! timeout, measures latency, normalises the output and never returns an
//! error to the caller.

pub mod keyword;
pub mod lexicon;
pub mod remote;
pub mod statistical;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{BackendError, ErrorKind};
use crate::normalize::{Distribution, Label, RawOutput, ScoreNormalizer};

pub use keyword::KeywordFallbackBackend;
pub use lexicon::LexiconBackend;
pub use remote::RemoteModelBackend;
pub use statistical::StatisticalBackend;

/// Closed set of scoring strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Remote,
    Lexicon,
    Statistical,
    Keyword,
}

impl BackendId {
    /// Auto-mode priority order.
    pub const PRIORITY: [BackendId; 4] = [
        BackendId::Remote,
        BackendId::Lexicon,
        BackendId::Statistical,
        BackendId::Keyword,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Remote => "remote",
            BackendId::Lexicon => "lexicon",
            BackendId::Statistical => "statistical",
            BackendId::Keyword => "keyword",
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The capability every backend implements.
#[async_trait]
pub trait SentimentBackend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Model or lexicon identifier for result metadata.
    fn model_identifier(&self) -> String;

    /// False when the backend cannot possibly succeed (e.g. missing credential).
    fn is_configured(&self) -> bool {
        true
    }

    /// Score `text`. Implementations should honour `timeout` themselves where
    /// they do I/O; `classify` enforces it regardless.
    async fn score(&self, text: &str, timeout: Duration) -> Result<RawOutput, BackendError>;
}

pub type DynBackend = Arc<dyn SentimentBackend>;

/// Per-call lifecycle inside one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    NotStarted,
    InFlight,
    Succeeded,
    Failed,
    TimedOut,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Succeeded | CallState::Failed | CallState::TimedOut
        )
    }
}

/// A successful, normalised classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: Label,
    pub distribution: Distribution,
    /// Always `distribution.get(label)`.
    pub confidence: f64,
    pub raw: RawOutput,
}

/// Outcome of one backend invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResult {
    pub backend: BackendId,
    pub model_identifier: String,
    pub latency_ms: u64,
    pub outcome: Result<Classification, BackendError>,
}

impl BackendResult {
    pub fn failed(backend: BackendId, model_identifier: String, error: BackendError) -> Self {
        Self {
            backend,
            model_identifier,
            latency_ms: 0,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.outcome.as_ref().ok()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.outcome.as_ref().err().map(BackendError::kind)
    }

    pub fn state(&self) -> CallState {
        match &self.outcome {
            Ok(_) => CallState::Succeeded,
            Err(BackendError::Timeout { .. }) => CallState::TimedOut,
            Err(_) => CallState::Failed,
        }
    }
}

/// Invoke one backend, bounded by `timeout`. Never fails: faults are
/// captured in `BackendResult::outcome`.
pub async fn classify(
    backend: &dyn SentimentBackend,
    text: &str,
    timeout: Duration,
    normalizer: &ScoreNormalizer,
) -> BackendResult {
    let id = backend.id();
    let model_identifier = backend.model_identifier();
    let started = Instant::now();

    let outcome = if !backend.is_configured() {
        Err(BackendError::Unavailable(format!("{id} is not configured")))
    } else {
        match tokio::time::timeout(timeout, backend.score(text, timeout)).await {
            Ok(Ok(raw)) => normalizer.normalize(&raw).map(|(label, distribution)| {
                Classification {
                    label,
                    confidence: distribution.get(label),
                    distribution,
                    raw,
                }
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BackendError::Timeout {
                after_ms: timeout.as_millis() as u64,
            }),
        }
    };

    let latency_ms = started.elapsed().as_millis() as u64;
    histogram!("sentiment_backend_latency_ms", "backend" => id.as_str()).record(latency_ms as f64);
    match &outcome {
        Ok(c) => {
            counter!("sentiment_backend_calls_total", "backend" => id.as_str(), "outcome" => "ok")
                .increment(1);
            debug!(target: "backend", backend = id.as_str(), label = c.label.as_str(), confidence = c.confidence, latency_ms, "backend succeeded");
        }
        Err(e) => {
            counter!("sentiment_backend_calls_total", "backend" => id.as_str(), "outcome" => e.kind().as_str())
                .increment(1);
            warn!(target: "backend", backend = id.as_str(), error_kind = e.kind().as_str(), error = %e, latency_ms, "backend failed");
        }
    }

    BackendResult {
        backend: id,
        model_identifier,
        latency_ms,
        outcome,
    }
}

/// Registry holding at most one adapter per `BackendId`.
#[derive(Clone, Default)]
pub struct BackendSet {
    backends: BTreeMap<BackendId, DynBackend>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the adapter registered under its own id.
    pub fn insert(&mut self, backend: DynBackend) {
        self.backends.insert(backend.id(), backend);
    }

    pub fn with(mut self, backend: DynBackend) -> Self {
        self.insert(backend);
        self
    }

    pub fn get(&self, id: BackendId) -> Option<&DynBackend> {
        self.backends.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = BackendId> + '_ {
        self.backends.keys().copied()
    }
}

impl std::fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.backends.keys()).finish()
    }
}

/// Alphanumeric tokens, case preserved (apostrophes kept, so "isn't" stays whole).
pub(crate) fn tokenize(s: &str) -> impl Iterator<Item = &str> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
}

/// Shared negator list for the local backends.
pub(crate) fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "nothing"
            | "nobody"
            | "none"
            | "neither"
            | "nor"
            | "without"
            | "cannot"
            | "isn't"
            | "aren't"
            | "wasn't"
            | "weren't"
            | "won't"
            | "wouldn't"
            | "don't"
            | "doesn't"
            | "didn't"
            | "can't"
            | "couldn't"
            | "shouldn't"
            | "hasn't"
            | "haven't"
            | "hadn't"
            | "ain't"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(RawOutput);

    #[async_trait]
    impl SentimentBackend for Fixed {
        fn id(&self) -> BackendId {
            BackendId::Lexicon
        }
        fn model_identifier(&self) -> String {
            "fixed".into()
        }
        async fn score(&self, _text: &str, _timeout: Duration) -> Result<RawOutput, BackendError> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    #[async_trait]
    impl SentimentBackend for Slow {
        fn id(&self) -> BackendId {
            BackendId::Remote
        }
        fn model_identifier(&self) -> String {
            "slow".into()
        }
        async fn score(&self, _text: &str, _timeout: Duration) -> Result<RawOutput, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RawOutput::Compound { compound: 0.0 })
        }
    }

    #[tokio::test]
    async fn classify_normalises_success() {
        let b = Fixed(RawOutput::Compound { compound: 0.5 });
        let r = classify(&b, "x", Duration::from_secs(1), &ScoreNormalizer::default()).await;
        let c = r.classification().unwrap();
        assert_eq!(c.label, Label::Positive);
        assert_eq!(c.confidence, c.distribution.get(c.label));
        assert_eq!(r.state(), CallState::Succeeded);
        assert!(r.error_kind().is_none());
    }

    #[tokio::test]
    async fn classify_captures_malformed_output() {
        let b = Fixed(RawOutput::LabelScores { scores: vec![] });
        let r = classify(&b, "x", Duration::from_secs(1), &ScoreNormalizer::default()).await;
        assert_eq!(r.error_kind(), Some(ErrorKind::BackendMalformedResponse));
        assert_eq!(r.state(), CallState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn classify_enforces_timeout() {
        let r = classify(
            &Slow,
            "x",
            Duration::from_millis(20),
            &ScoreNormalizer::default(),
        )
        .await;
        assert_eq!(r.error_kind(), Some(ErrorKind::BackendTimeout));
        assert_eq!(r.state(), CallState::TimedOut);
        assert!(r.state().is_terminal());
    }

    #[test]
    fn tokenizer_keeps_contractions() {
        let toks: Vec<_> = tokenize("It isn't 'great', is it?").collect();
        assert_eq!(toks, vec!["It", "isn't", "great", "is", "it"]);
    }

    #[test]
    fn backend_set_replaces_by_id() {
        let set = BackendSet::new()
            .with(Arc::new(Fixed(RawOutput::Compound { compound: 0.1 })))
            .with(Arc::new(Fixed(RawOutput::Compound { compound: -0.1 })));
        assert_eq!(set.ids().collect::<Vec<_>>(), vec![BackendId::Lexicon]);
    }
}
