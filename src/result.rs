//! Result types handed back to callers, and the assembly of one
//! `AnalysisResult` from a sentiment outcome plus auxiliary signals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backends::BackendId;
use crate::error::ErrorKind;
use crate::normalize::{Distribution, Label};
use crate::selector::Method;
use crate::signals::{Emotion, Signals, Toxicity};
use crate::validate::CleanText;

/// Which path actually produced the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodUsed {
    Remote,
    Lexicon,
    Statistical,
    Keyword,
    Ensemble,
    /// Neutral fallback when nothing (not even the keyword scorer) ran.
    Default,
}

impl From<BackendId> for MethodUsed {
    fn from(id: BackendId) -> Self {
        match id {
            BackendId::Remote => MethodUsed::Remote,
            BackendId::Lexicon => MethodUsed::Lexicon,
            BackendId::Statistical => MethodUsed::Statistical,
            BackendId::Keyword => MethodUsed::Keyword,
        }
    }
}

impl MethodUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodUsed::Remote => "remote",
            MethodUsed::Lexicon => "lexicon",
            MethodUsed::Statistical => "statistical",
            MethodUsed::Keyword => "keyword",
            MethodUsed::Ensemble => "ensemble",
            MethodUsed::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendFailure {
    pub backend: BackendId,
    pub kind: ErrorKind,
    pub message: String,
}

/// The sentiment half of a result, before signals and metadata are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentOutcome {
    pub label: Label,
    pub distribution: Distribution,
    pub confidence: f64,
    pub method_used: MethodUsed,
    pub contributing_backends: Vec<BackendId>,
    pub model_identifier: String,
    pub degraded: bool,
    pub error_kind: Option<ErrorKind>,
    pub failures: Vec<BackendFailure>,
}

impl SentimentOutcome {
    /// Uniform distribution, label neutral.
    pub fn default_neutral(failures: Vec<BackendFailure>) -> Self {
        let distribution = Distribution::uniform();
        let label = distribution.argmax();
        Self {
            label,
            confidence: distribution.get(label),
            distribution,
            method_used: MethodUsed::Default,
            contributing_backends: Vec::new(),
            model_identifier: "default".to_string(),
            degraded: true,
            error_kind: Some(ErrorKind::AllBackendsExhausted),
            failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub text_excerpt: String,
    pub label: Label,
    pub confidence: f64,
    pub distribution: Distribution,
    pub contributing_backends: Vec<BackendId>,
    pub emotion_scores: BTreeMap<Emotion, f64>,
    pub dominant_emotion: String,
    pub toxicity: Toxicity,
    pub method_used: MethodUsed,
    pub requested_method: Method,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub failures: Vec<BackendFailure>,
    pub model_identifier: String,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub text_length: usize,
    pub word_count: usize,
    pub low_confidence: bool,
    pub cache_hit: bool,
}

/// Knobs the assembler needs from configuration.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions {
    pub excerpt_chars: usize,
    pub confidence_threshold: f64,
}

pub fn assemble(
    text: &CleanText,
    requested_method: Method,
    outcome: SentimentOutcome,
    signals: Signals,
    latency_ms: u64,
    opts: AssemblyOptions,
) -> AnalysisResult {
    let confidence = outcome.confidence.clamp(0.0, 1.0);
    AnalysisResult {
        text_excerpt: excerpt(text.as_str(), opts.excerpt_chars),
        label: outcome.label,
        confidence,
        distribution: outcome.distribution,
        contributing_backends: outcome.contributing_backends,
        emotion_scores: signals.emotions.scores,
        dominant_emotion: signals.emotions.dominant,
        toxicity: signals.toxicity,
        method_used: outcome.method_used,
        requested_method,
        degraded: outcome.degraded,
        error_kind: outcome.error_kind,
        failures: outcome.failures,
        model_identifier: outcome.model_identifier,
        latency_ms,
        timestamp: Utc::now(),
        text_length: text.char_count(),
        word_count: text.word_count(),
        low_confidence: confidence < opts.confidence_threshold,
        cache_hit: false,
    }
}

/// First `max` chars, with "..." appended when truncated.
fn excerpt(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Fold over many results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total_texts: usize,
    pub analyzed_texts: usize,
    /// Texts rejected by input validation.
    pub rejected_texts: usize,
    pub degraded_results: usize,
    pub sentiment_distribution: BTreeMap<Label, usize>,
    /// Share of analyzed texts per label, in percent.
    pub sentiment_percentages: BTreeMap<Label, f64>,
    pub dominant_sentiment: Option<Label>,
    pub average_confidence: f64,
    pub average_toxicity: f64,
    pub average_emotions: BTreeMap<Emotion, f64>,
}

impl AggregateStats {
    pub fn from_results(results: &[AnalysisResult], rejected_texts: usize) -> Self {
        let n = results.len();
        let mut counts: BTreeMap<Label, usize> = Label::ALL.iter().map(|l| (*l, 0)).collect();
        let mut emotions: BTreeMap<Emotion, f64> = Emotion::ALL.iter().map(|e| (*e, 0.0)).collect();
        let mut confidence = 0.0;
        let mut toxicity = 0.0;
        let mut degraded = 0;

        for r in results {
            *counts.entry(r.label).or_insert(0) += 1;
            confidence += r.confidence;
            toxicity += r.toxicity.score;
            if r.degraded {
                degraded += 1;
            }
            for (e, s) in &r.emotion_scores {
                *emotions.entry(*e).or_insert(0.0) += s;
            }
        }

        let mean = |sum: f64| if n == 0 { 0.0 } else { sum / n as f64 };
        let sentiment_percentages = counts
            .iter()
            .map(|(l, c)| {
                let pct = if n == 0 { 0.0 } else { *c as f64 / n as f64 * 100.0 };
                (*l, pct)
            })
            .collect();

        let mut dominant: Option<(Label, usize)> = None;
        for l in Label::ALL {
            let c = counts[&l];
            if c > 0 && dominant.map_or(true, |(_, best)| c > best) {
                dominant = Some((l, c));
            }
        }

        Self {
            total_texts: n + rejected_texts,
            analyzed_texts: n,
            rejected_texts,
            degraded_results: degraded,
            sentiment_distribution: counts,
            sentiment_percentages,
            dominant_sentiment: dominant.map(|(l, _)| l),
            average_confidence: mean(confidence),
            average_toxicity: mean(toxicity),
            average_emotions: emotions.into_iter().map(|(e, s)| (e, mean(s))).collect(),
        }
    }
}
