//! # Sentiment Engine
//! Request-driven orchestration: validate → plan → invoke (rate-limited,
//! deadline-bounded) → fuse or fall back → attach signals → cache.
//!
//! Backend faults never escape `analyze`; only `InputError` does. The only
//! cross-request mutable state is the rate limiter (and the optional cache).

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backends::{
    classify, BackendId, BackendResult, BackendSet, Classification, DynBackend,
    KeywordFallbackBackend, LexiconBackend, RemoteModelBackend, StatisticalBackend,
};
use crate::cache::{cache_key, ResultCache};
use crate::config::EngineConfig;
use crate::ensemble::{self, EnsembleWeights};
use crate::error::{BackendError, ErrorKind, InputError};
use crate::normalize::ScoreNormalizer;
use crate::rate_limit::RateLimiter;
use crate::result::{
    assemble, AggregateStats, AnalysisResult, AssemblyOptions, BackendFailure, MethodUsed,
    SentimentOutcome,
};
use crate::selector::{self, Method, Plan};
use crate::signals::{self, Signals};
use crate::validate::{fingerprint, InputValidator};

struct Inner {
    config: EngineConfig,
    backends: BackendSet,
    limiter: RateLimiter,
    normalizer: ScoreNormalizer,
    validator: InputValidator,
    weights: EnsembleWeights,
    cache: Option<ResultCache<AnalysisResult>>,
}

/// Cheap to clone; clones share rate-limit state and cache.
#[derive(Clone)]
pub struct SentimentEngine {
    inner: Arc<Inner>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub id: BackendId,
    pub registered: bool,
    pub enabled: bool,
    pub configured: bool,
    pub model_identifier: Option<String>,
    pub weight: f64,
    pub min_interval_ms: u64,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub version: &'static str,
    pub backends: Vec<BackendStatus>,
    pub remote_credential_present: bool,
    pub cache_enabled: bool,
    pub cache_entries: usize,
    pub request_timeout_ms: u64,
    pub max_text_length: usize,
}

impl SentimentEngine {
    /// Production wiring: the four built-in backends, built from `config`.
    pub fn from_config(config: EngineConfig) -> anyhow::Result<Self> {
        let remote = RemoteModelBackend::from_config(&config.remote)?;
        let backends = BackendSet::new()
            .with(Arc::new(remote))
            .with(Arc::new(LexiconBackend::new()))
            .with(Arc::new(StatisticalBackend::new()))
            .with(Arc::new(KeywordFallbackBackend::new()));
        Ok(Self::new(config, backends))
    }

    /// Wire an explicit backend set (tests swap in stubs here).
    pub fn new(config: EngineConfig, backends: BackendSet) -> Self {
        let limiter = RateLimiter::new(
            BackendId::PRIORITY
                .into_iter()
                .map(|id| (id, config.backend(id).min_interval())),
        );
        let cache = config.cache.enabled.then(|| {
            ResultCache::new(
                config.cache.capacity,
                std::time::Duration::from_secs(config.cache.ttl_secs),
            )
        });
        let inner = Inner {
            normalizer: ScoreNormalizer::new(config.sentiment_threshold),
            validator: InputValidator::new(config.max_text_length),
            weights: config.weights(),
            limiter,
            cache,
            backends,
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Classify one text. Returns `Err` only for invalid input.
    pub async fn analyze(&self, text: &str, method: Method) -> Result<AnalysisResult, InputError> {
        let started = Instant::now();
        let clean = self.inner.validator.validate(text)?;
        counter!("sentiment_requests_total", "method" => method.as_str()).increment(1);

        let key = cache_key(method.as_str(), clean.as_str());
        if let Some(cache) = &self.inner.cache {
            if let Some(mut hit) = cache.get(&key) {
                hit.cache_hit = true;
                hit.latency_ms = started.elapsed().as_millis() as u64;
                debug!(target: "engine", id = %fingerprint(clean.as_str()), method = method.as_str(), "cache hit");
                return Ok(hit);
            }
        }

        let deadline = started + self.inner.config.request_timeout();
        let (outcome, signals) = tokio::join!(self.run_plan(method, clean.as_str(), deadline), async {
            signals::extract(clean.as_str())
        });

        if outcome.degraded {
            counter!("sentiment_degraded_total").increment(1);
            info!(
                target: "engine",
                id = %fingerprint(clean.as_str()),
                requested = method.as_str(),
                method_used = outcome.method_used.as_str(),
                failures = outcome.failures.len(),
                "degraded result"
            );
        }

        let result = assemble(
            &clean,
            method,
            outcome,
            signals,
            started.elapsed().as_millis() as u64,
            AssemblyOptions {
                excerpt_chars: self.inner.config.excerpt_chars,
                confidence_threshold: self.inner.config.confidence_threshold,
            },
        );

        if let Some(cache) = &self.inner.cache {
            if !result.degraded {
                cache.insert(key, result.clone());
            }
        }
        Ok(result)
    }

    /// Sequential fold over `analyze`. Invalid texts are counted, not fatal.
    pub async fn analyze_many<I, S>(&self, texts: I, method: Method) -> AggregateStats
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut results = Vec::new();
        let mut rejected = 0;
        for text in texts {
            match self.analyze(text.as_ref(), method).await {
                Ok(r) => results.push(r),
                Err(e) => {
                    debug!(target: "engine", error = %e, "text rejected in batch");
                    rejected += 1;
                }
            }
        }
        AggregateStats::from_results(&results, rejected)
    }

    /// Emotions and toxicity only; no backend is invoked.
    pub fn signals(&self, text: &str) -> Result<Signals, InputError> {
        let clean = self.inner.validator.validate(text)?;
        Ok(signals::extract(clean.as_str()))
    }

    pub fn status(&self) -> EngineStatus {
        let cfg = &self.inner.config;
        let backends = BackendId::PRIORITY
            .into_iter()
            .map(|id| {
                let s = cfg.backend(id);
                let b = self.inner.backends.get(id);
                BackendStatus {
                    id,
                    registered: b.is_some(),
                    enabled: s.enabled,
                    configured: b.is_some_and(|b| b.is_configured()),
                    model_identifier: b.map(|b| b.model_identifier()),
                    weight: s.weight,
                    min_interval_ms: s.min_interval_ms,
                    timeout_ms: s.timeout_ms,
                }
            })
            .collect();
        EngineStatus {
            version: env!("CARGO_PKG_VERSION"),
            backends,
            remote_credential_present: self
                .inner
                .backends
                .get(BackendId::Remote)
                .is_some_and(|b| b.is_configured()),
            cache_enabled: self.inner.cache.is_some(),
            cache_entries: self.inner.cache.as_ref().map_or(0, |c| c.len()),
            request_timeout_ms: cfg.request_timeout_ms,
            max_text_length: cfg.max_text_length,
        }
    }

    async fn run_plan(&self, method: Method, text: &str, deadline: Instant) -> SentimentOutcome {
        let enabled = self.inner.config.enabled_backends();
        match selector::plan(method, &enabled) {
            Plan::Single(id) => self.run_single(id, text, deadline).await,
            Plan::Chain(ids) => self.run_chain(&ids, text, deadline).await,
            Plan::Ensemble(ids) => self.run_ensemble(ids, text, deadline).await,
        }
    }

    async fn run_single(&self, id: BackendId, text: &str, deadline: Instant) -> SentimentOutcome {
        let r = invoke(&self.inner, id, text, deadline).await;
        match r.outcome {
            Ok(c) => success(r.backend, r.model_identifier, c, false, Vec::new()),
            Err(e) => {
                let kind = e.kind();
                warn!(target: "engine", backend = id.as_str(), error_kind = kind.as_str(), "requested backend failed; using keyword rescue");
                let failures = vec![failure(id, &e)];
                self.rescue(text, failures, kind, id != BackendId::Keyword)
                    .await
            }
        }
    }

    async fn run_chain(&self, ids: &[BackendId], text: &str, deadline: Instant) -> SentimentOutcome {
        let mut failures = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let r = invoke(&self.inner, *id, text, deadline).await;
            match r.outcome {
                Ok(c) => return success(r.backend, r.model_identifier, c, i > 0, failures),
                Err(e) => {
                    warn!(target: "engine", backend = id.as_str(), error_kind = e.kind().as_str(), "falling back to next backend");
                    failures.push(failure(*id, &e));
                }
            }
        }
        let keyword_tried = ids.contains(&BackendId::Keyword);
        self.rescue(text, failures, ErrorKind::AllBackendsExhausted, !keyword_tried)
            .await
    }

    async fn run_ensemble(
        &self,
        ids: Vec<BackendId>,
        text: &str,
        deadline: Instant,
    ) -> SentimentOutcome {
        let mut set = JoinSet::new();
        for id in ids.iter().copied() {
            let inner = Arc::clone(&self.inner);
            let text = text.to_string();
            set.spawn(async move { invoke(&inner, id, &text, deadline).await });
        }

        let mut results: Vec<BackendResult> = Vec::with_capacity(ids.len());
        let mut deadline_hit = false;
        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok(r))) => results.push(r),
                Ok(Some(Err(e))) => warn!(target: "engine", error = %e, "ensemble task failed"),
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    set.abort_all();
                    break;
                }
            }
        }

        // Anything without a terminal result was cancelled.
        for id in &ids {
            if !results.iter().any(|r| r.backend == *id) {
                let error = if deadline_hit {
                    BackendError::Timeout {
                        after_ms: self.inner.config.request_timeout_ms,
                    }
                } else {
                    BackendError::Unavailable("task aborted".into())
                };
                let model = self
                    .inner
                    .backends
                    .get(*id)
                    .map_or_else(|| id.as_str().to_string(), |b| b.model_identifier());
                results.push(BackendResult::failed(*id, model, error));
            }
        }
        results.sort_by_key(|r| ids.iter().position(|id| *id == r.backend));

        let failures: Vec<BackendFailure> = results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| failure(r.backend, e)))
            .collect();

        // Members cut off by the shared deadline make the fused answer partial.
        let cut_short = deadline_hit
            || (Instant::now() >= deadline
                && results
                    .iter()
                    .any(|r| r.error_kind() == Some(ErrorKind::BackendTimeout)));

        match ensemble::fuse(&results, &self.inner.weights) {
            Some(fused) => {
                let names: Vec<&str> = fused.contributors.iter().map(|(id, _)| id.as_str()).collect();
                debug!(target: "engine", members = ?names, label = fused.label.as_str(), confidence = fused.confidence, "ensemble fused");
                SentimentOutcome {
                    label: fused.label,
                    distribution: fused.distribution,
                    confidence: fused.confidence,
                    method_used: MethodUsed::Ensemble,
                    model_identifier: format!("ensemble({})", names.join(", ")),
                    contributing_backends: fused.contributors.iter().map(|(id, _)| *id).collect(),
                    degraded: cut_short,
                    error_kind: cut_short.then_some(ErrorKind::BackendTimeout),
                    failures,
                }
            }
            None => {
                warn!(target: "engine", attempted = ids.len(), "ensemble had no successful backend");
                let keyword_tried = ids.contains(&BackendId::Keyword);
                self.rescue(text, failures, ErrorKind::AllBackendsExhausted, !keyword_tried)
                    .await
            }
        }
    }

    /// Keyword rescue, bypassing rate limit and request deadline; the
    /// neutral default when the keyword scorer is disabled or already failed.
    async fn rescue(
        &self,
        text: &str,
        mut failures: Vec<BackendFailure>,
        error_kind: ErrorKind,
        allow_keyword: bool,
    ) -> SentimentOutcome {
        let settings = self.inner.config.backend(BackendId::Keyword);
        if allow_keyword && settings.enabled {
            let backend: DynBackend = self
                .inner
                .backends
                .get(BackendId::Keyword)
                .cloned()
                .unwrap_or_else(|| Arc::new(KeywordFallbackBackend::new()));
            let r = classify(backend.as_ref(), text, settings.timeout(), &self.inner.normalizer).await;
            match r.outcome {
                Ok(c) => {
                    let mut out = success(r.backend, r.model_identifier, c, true, failures);
                    out.error_kind = Some(error_kind);
                    return out;
                }
                Err(e) => failures.push(failure(BackendId::Keyword, &e)),
            }
        }
        SentimentOutcome::default_neutral(failures)
    }
}

/// One rate-limited, deadline-bounded backend call.
async fn invoke(inner: &Inner, id: BackendId, text: &str, deadline: Instant) -> BackendResult {
    let Some(backend) = inner.backends.get(id) else {
        return BackendResult::failed(
            id,
            id.as_str().to_string(),
            BackendError::Unavailable(format!("{id} is not registered")),
        );
    };
    let settings = inner.config.backend(id);
    if !settings.enabled {
        return BackendResult::failed(
            id,
            backend.model_identifier(),
            BackendError::Unavailable(format!("{id} is disabled")),
        );
    }
    // An unconfigured backend is never called, so it must not hold a rate-limit slot.
    if !backend.is_configured() {
        return BackendResult::failed(
            id,
            backend.model_identifier(),
            BackendError::Unavailable(format!("{id} is not configured")),
        );
    }
    if let Err(e) = inner.limiter.acquire(id, Some(deadline)).await {
        return BackendResult::failed(id, backend.model_identifier(), e);
    }
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return BackendResult::failed(
            id,
            backend.model_identifier(),
            BackendError::Timeout {
                after_ms: inner.config.request_timeout_ms,
            },
        );
    }
    classify(
        backend.as_ref(),
        text,
        settings.timeout().min(remaining),
        &inner.normalizer,
    )
    .await
}

fn success(
    backend: BackendId,
    model_identifier: String,
    c: Classification,
    degraded: bool,
    failures: Vec<BackendFailure>,
) -> SentimentOutcome {
    SentimentOutcome {
        label: c.label,
        distribution: c.distribution,
        confidence: c.confidence,
        method_used: backend.into(),
        contributing_backends: vec![backend],
        model_identifier,
        degraded,
        error_kind: None,
        failures,
    }
}

fn failure(backend: BackendId, e: &BackendError) -> BackendFailure {
    BackendFailure {
        backend,
        kind: e.kind(),
        message: e.to_string(),
    }
}
