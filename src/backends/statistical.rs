use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::{is_negator, tokenize, BackendId, SentimentBackend};
use crate::error::BackendError;
use crate::normalize::RawOutput;

/// word → (polarity in [-1, 1], subjectivity in [0, 1])
static POLARITY: Lazy<HashMap<String, (f64, f64)>> = Lazy::new(|| {
    let raw = include_str!("../../polarity_lexicon.json");
    serde_json::from_str::<HashMap<String, (f64, f64)>>(raw).expect("valid polarity lexicon")
});

const NEGATION_SCALAR: f64 = -0.5;

/// Averaging polarity/subjectivity scorer.
#[derive(Debug, Clone, Default)]
pub struct StatisticalBackend;

/// Polarity and subjectivity of one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    pub polarity: f64,
    pub subjectivity: f64,
}

impl StatisticalBackend {
    pub fn new() -> Self {
        Self
    }

    /// Mean polarity/subjectivity over every word found in the lexicon.
    /// An intensifier directly before a word scales its polarity; a negator
    /// directly before it (or before its intensifier) flips and halves it.
    pub fn sentiment(&self, text: &str) -> Sentiment {
        let lowered: Vec<String> = tokenize(text).map(|t| t.to_lowercase()).collect();

        let mut hits: Vec<(f64, f64)> = Vec::new();
        for (i, w) in lowered.iter().enumerate() {
            let Some(&(base_p, base_s)) = POLARITY.get(w.as_str()) else {
                continue;
            };
            let mut p = base_p;
            let mut s = base_s;
            let mut j = i;

            if i >= 1 {
                if let Some(m) = intensifier(&lowered[i - 1]) {
                    p = (p * m).clamp(-1.0, 1.0);
                    s = (s * m).clamp(0.0, 1.0);
                    j = i - 1;
                }
            }
            if j >= 1 && is_negator(lowered[j - 1].as_str()) {
                p *= NEGATION_SCALAR;
            }
            hits.push((p, s));
        }

        if hits.is_empty() {
            return Sentiment {
                polarity: 0.0,
                subjectivity: 0.0,
            };
        }
        let n = hits.len() as f64;
        let polarity = hits.iter().map(|h| h.0).sum::<f64>() / n;
        let subjectivity = hits.iter().map(|h| h.1).sum::<f64>() / n;
        Sentiment {
            polarity: polarity.clamp(-1.0, 1.0),
            subjectivity: subjectivity.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl SentimentBackend for StatisticalBackend {
    fn id(&self) -> BackendId {
        BackendId::Statistical
    }

    fn model_identifier(&self) -> String {
        "polarity-subjectivity".to_string()
    }

    async fn score(&self, text: &str, _timeout: Duration) -> Result<RawOutput, BackendError> {
        let s = self.sentiment(text);
        Ok(RawOutput::Polarity {
            polarity: s.polarity,
            subjectivity: s.subjectivity,
        })
    }
}

fn intensifier(tok: &str) -> Option<f64> {
    match tok {
        "very" => Some(1.3),
        "really" | "so" => Some(1.2),
        "extremely" | "absolutely" | "completely" => Some(1.5),
        "totally" => Some(1.4),
        "quite" => Some(1.1),
        "somewhat" => Some(0.8),
        "slightly" => Some(0.6),
        "barely" => Some(0.4),
        _ => None,
    }
}
