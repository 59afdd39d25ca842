//! Score normalisation: every backend's raw output shape is mapped into the
//! common `{positive, negative, neutral}` distribution.
//!
//! Invariants upheld by every `Distribution` built here:
//! - all masses are finite and ≥ 0, and they sum to 1 (± `SUM_TOLERANCE`);
//! - the reported label is `argmax(distribution)` and confidence is the
//!   label's own mass.

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

pub const SUM_TOLERANCE: f64 = 1e-3;

/// Polarity band inside which the statistical backend reports neutral.
const POLARITY_NEUTRAL_BAND: f64 = 0.1;

/// Polar confidence never reaches certainty for local heuristics.
const MAX_POLAR_MASS: f64 = 0.99;

/// Share of the lexicon's residual mass assigned to the opposite pole.
const LEXICON_OPPOSITE_SHARE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
    Neutral,
}

impl Label {
    /// Iteration order doubles as the argmax tie order.
    pub const ALL: [Label; 3] = [Label::Neutral, Label::Positive, Label::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Negative => "negative",
            Label::Neutral => "neutral",
        }
    }

    fn opposite(&self) -> Label {
        match self {
            Label::Positive => Label::Negative,
            Label::Negative => Label::Positive,
            Label::Neutral => Label::Neutral,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability-like mass over the three sentiment labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Distribution {
    positive: f64,
    negative: f64,
    neutral: f64,
}

impl Distribution {
    /// Build from raw masses and rescale to sum to 1.
    ///
    /// Returns `None` for non-finite or negative input, or when every mass is 0.
    pub fn new(positive: f64, negative: f64, neutral: f64) -> Option<Self> {
        let parts = [positive, negative, neutral];
        if parts.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return None;
        }
        let total: f64 = parts.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(Self {
            positive: positive / total,
            negative: negative / total,
            neutral: neutral / total,
        })
    }

    /// Equal mass on every label; resolves to neutral through the tie order.
    pub fn uniform() -> Self {
        Self {
            positive: 1.0 / 3.0,
            negative: 1.0 / 3.0,
            neutral: 1.0 / 3.0,
        }
    }

    pub fn get(&self, label: Label) -> f64 {
        match label {
            Label::Positive => self.positive,
            Label::Negative => self.negative,
            Label::Neutral => self.neutral,
        }
    }

    pub fn positive(&self) -> f64 {
        self.positive
    }

    pub fn negative(&self) -> f64 {
        self.negative
    }

    pub fn neutral(&self) -> f64 {
        self.neutral
    }

    pub fn sum(&self) -> f64 {
        self.positive + self.negative + self.neutral
    }

    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= SUM_TOLERANCE
            && Label::ALL.iter().all(|l| self.get(*l) >= 0.0)
    }

    /// Label with the largest mass; ties resolve in `Label::ALL` order.
    pub fn argmax(&self) -> Label {
        let mut best = Label::ALL[0];
        for label in Label::ALL.iter().skip(1) {
            if self.get(*label) > self.get(best) {
                best = *label;
            }
        }
        best
    }

    /// Every label whose mass is within `eps` of the maximum.
    pub fn top_labels(&self, eps: f64) -> Vec<Label> {
        let max = self.get(self.argmax());
        Label::ALL
            .iter()
            .copied()
            .filter(|l| (max - self.get(*l)).abs() <= eps)
            .collect()
    }

    /// Peak on a polar `label`; the residual is split between the opposite
    /// pole (`opposite_share`) and neutral.
    fn polar(label: Label, mass: f64, opposite_share: f64) -> Self {
        let mass = mass.clamp(0.0, 1.0);
        let residual = 1.0 - mass;
        let opposite = residual * opposite_share.clamp(0.0, 1.0);
        let neutral = residual - opposite;
        let mut d = Self {
            positive: 0.0,
            negative: 0.0,
            neutral,
        };
        d.set(label, mass);
        d.set(label.opposite(), opposite);
        d
    }

    /// Peak on neutral; the residual leans toward the sign of `lean`.
    fn neutral_leaning(mass: f64, lean: f64) -> Self {
        let mass = mass.clamp(0.0, 1.0);
        let residual = 1.0 - mass;
        let (positive, negative) = if lean > 0.0 {
            (residual, 0.0)
        } else if lean < 0.0 {
            (0.0, residual)
        } else {
            (residual / 2.0, residual / 2.0)
        };
        Self {
            positive,
            negative,
            neutral: mass,
        }
    }

    fn set(&mut self, label: Label, value: f64) {
        match label {
            Label::Positive => self.positive = value,
            Label::Negative => self.negative = value,
            Label::Neutral => self.neutral = value,
        }
    }
}

/// Backend-native output before normalisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RawOutput {
    /// Lexicon compound score in [-1, 1].
    Compound { compound: f64 },
    /// Statistical polarity in [-1, 1] and subjectivity in [0, 1].
    Polarity { polarity: f64, subjectivity: f64 },
    /// Remote `{label, score}` pairs, label spellings as received.
    LabelScores { scores: Vec<(String, f64)> },
    /// Keyword match counts.
    KeywordCounts { positive: usize, negative: usize },
}

/// Maps any `RawOutput` onto `(Label, Distribution)`.
#[derive(Debug, Clone, Copy)]
pub struct ScoreNormalizer {
    /// Compound magnitude below which the lexicon reports neutral.
    sentiment_threshold: f64,
}

impl Default for ScoreNormalizer {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl ScoreNormalizer {
    /// Threshold is clamped into [0, 0.5] so the neutral peak always wins argmax.
    pub fn new(sentiment_threshold: f64) -> Self {
        Self {
            sentiment_threshold: sentiment_threshold.clamp(0.0, 0.5),
        }
    }

    pub fn normalize(&self, raw: &RawOutput) -> Result<(Label, Distribution), BackendError> {
        let dist = match raw {
            RawOutput::Compound { compound } => self.from_compound(*compound)?,
            RawOutput::Polarity {
                polarity,
                subjectivity,
            } => from_polarity(*polarity, *subjectivity)?,
            RawOutput::LabelScores { scores } => from_label_scores(scores)?,
            RawOutput::KeywordCounts { positive, negative } => {
                from_keyword_counts(*positive, *negative)
            }
        };
        Ok((dist.argmax(), dist))
    }

    fn from_compound(&self, compound: f64) -> Result<Distribution, BackendError> {
        if !compound.is_finite() {
            return Err(BackendError::MalformedResponse(
                "non-finite compound score".into(),
            ));
        }
        let c = compound.clamp(-1.0, 1.0);
        let t = self.sentiment_threshold;
        let dist = if c >= t && c > 0.0 {
            Distribution::polar(Label::Positive, polar_mass(c), LEXICON_OPPOSITE_SHARE)
        } else if c <= -t && c < 0.0 {
            Distribution::polar(Label::Negative, polar_mass(c), LEXICON_OPPOSITE_SHARE)
        } else {
            Distribution::neutral_leaning(1.0 - c.abs(), c)
        };
        Ok(dist)
    }
}

fn polar_mass(score: f64) -> f64 {
    ((1.0 + score.abs()) / 2.0).min(MAX_POLAR_MASS)
}

fn from_polarity(polarity: f64, subjectivity: f64) -> Result<Distribution, BackendError> {
    if !polarity.is_finite() || !subjectivity.is_finite() {
        return Err(BackendError::MalformedResponse(
            "non-finite polarity score".into(),
        ));
    }
    let p = polarity.clamp(-1.0, 1.0);
    let s = subjectivity.clamp(0.0, 1.0);
    let dist = if p > POLARITY_NEUTRAL_BAND {
        Distribution::polar(Label::Positive, polar_mass(p), s / 2.0)
    } else if p < -POLARITY_NEUTRAL_BAND {
        Distribution::polar(Label::Negative, polar_mass(p), s / 2.0)
    } else {
        Distribution::neutral_leaning(1.0 - p.abs(), p)
    };
    Ok(dist)
}

/// Accepts human-readable names and generic indexed labels
/// (`LABEL_0` → negative, `LABEL_1` → neutral, `LABEL_2` → positive).
pub fn canonical_label(raw: &str) -> Option<Label> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "LABEL_0" | "NEGATIVE" | "NEG" | "0" => Some(Label::Negative),
        "LABEL_1" | "NEUTRAL" | "NEU" | "1" => Some(Label::Neutral),
        "LABEL_2" | "POSITIVE" | "POS" | "2" => Some(Label::Positive),
        _ => None,
    }
}

fn from_label_scores(scores: &[(String, f64)]) -> Result<Distribution, BackendError> {
    let mut slots: [Option<f64>; 3] = [None, None, None];
    for (raw_label, score) in scores {
        let label = canonical_label(raw_label).ok_or_else(|| {
            BackendError::MalformedResponse(format!("unknown label {raw_label:?}"))
        })?;
        if !score.is_finite() || *score < 0.0 || *score > 1.0 + SUM_TOLERANCE {
            return Err(BackendError::MalformedResponse(format!(
                "score out of range for {raw_label}: {score}"
            )));
        }
        let idx = match label {
            Label::Positive => 0,
            Label::Negative => 1,
            Label::Neutral => 2,
        };
        if slots[idx].replace(*score).is_some() {
            return Err(BackendError::MalformedResponse(format!(
                "duplicate label {label}"
            )));
        }
    }
    match slots {
        [Some(pos), Some(neg), Some(neu)] => Distribution::new(pos, neg, neu).ok_or_else(|| {
            BackendError::MalformedResponse("label scores carry no mass".into())
        }),
        _ => Err(BackendError::MalformedResponse(format!(
            "expected 3 sentiment labels, got {}",
            scores.len()
        ))),
    }
}

fn from_keyword_counts(positive: usize, negative: usize) -> Distribution {
    let (label, diff) = if positive > negative {
        (Label::Positive, positive - negative)
    } else if negative > positive {
        (Label::Negative, negative - positive)
    } else {
        (Label::Neutral, 0)
    };
    match label {
        Label::Neutral => Distribution::neutral_leaning(0.5, 0.0),
        polar => {
            let confidence = (0.5 + diff as f64 * 0.1).min(0.7);
            Distribution::polar(polar, confidence, 0.5)
        }
    }
}
