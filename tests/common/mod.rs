// tests/common/mod.rs
//
// Scriptable backend stubs shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sentiment_engine::backends::{
    BackendId, BackendSet, KeywordFallbackBackend, LexiconBackend, SentimentBackend,
    StatisticalBackend,
};
use sentiment_engine::normalize::RawOutput;
use sentiment_engine::{BackendError, EngineConfig, SentimentEngine};

#[derive(Clone)]
pub enum Behavior {
    Fixed(RawOutput),
    Fail(BackendError),
    Hang,
}

pub struct Stub {
    id: BackendId,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl Stub {
    pub fn new(id: BackendId, behavior: Behavior) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let stub = Arc::new(Self {
            id,
            behavior,
            calls: calls.clone(),
        });
        (stub, calls)
    }
}

#[async_trait]
impl SentimentBackend for Stub {
    fn id(&self) -> BackendId {
        self.id
    }

    fn model_identifier(&self) -> String {
        format!("stub-{}", self.id)
    }

    async fn score(&self, _text: &str, _timeout: Duration) -> Result<RawOutput, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Fixed(raw) => Ok(raw.clone()),
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BackendError::Unavailable("unreachable".into()))
            }
        }
    }
}

/// `{label, score}` triple as a remote endpoint would return it.
pub fn label_scores(pos: f64, neg: f64, neu: f64) -> RawOutput {
    RawOutput::LabelScores {
        scores: vec![
            ("positive".to_string(), pos),
            ("negative".to_string(), neg),
            ("neutral".to_string(), neu),
        ],
    }
}

/// Real local backends plus the given remote stand-in.
pub fn local_set_with(remote: Arc<dyn SentimentBackend>) -> BackendSet {
    BackendSet::new()
        .with(remote)
        .with(Arc::new(LexiconBackend::new()))
        .with(Arc::new(StatisticalBackend::new()))
        .with(Arc::new(KeywordFallbackBackend::new()))
}

/// Defaults with the cache off, so every call exercises the backends.
pub fn uncached_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.cache.enabled = false;
    cfg
}

pub fn engine_with(cfg: EngineConfig, set: BackendSet) -> SentimentEngine {
    SentimentEngine::new(cfg, set)
}

pub fn calls(c: &Arc<AtomicUsize>) -> usize {
    c.load(Ordering::SeqCst)
}
