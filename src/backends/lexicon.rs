use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::{is_negator, tokenize, BackendId, SentimentBackend};
use crate::error::BackendError;
use crate::normalize::RawOutput;

static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).expect("valid sentiment lexicon")
});

/// Valence added for a booster word right before a lexicon hit.
const BOOSTER_INCR: f64 = 0.293;
/// Valence added for an ALL-CAPS hit in otherwise mixed-case text.
const CAPS_INCR: f64 = 0.733;
/// Negation flips and damps valence.
const NEGATION_SCALAR: f64 = -0.74;
/// Per-"!" amplification, counted up to four marks.
const EXCLAMATION_INCR: f64 = 0.292;
/// Normalisation constant for the compound score.
const ALPHA: f64 = 15.0;

/// Deterministic lexicon scorer producing a compound score in [-1, 1].
#[derive(Debug, Clone, Default)]
pub struct LexiconBackend;

impl LexiconBackend {
    pub fn new() -> Self {
        Self
    }

    /// Raw lexicon valence for a lowercase word (0 if absent).
    #[inline]
    fn word_valence(&self, w: &str) -> f64 {
        *LEXICON.get(w).unwrap_or(&0.0)
    }

    /// Compound score in [-1, 1].
    ///
    /// Negation: if one of the 1..=3 preceding tokens is a negator, the
    /// word's valence is flipped and damped. Boosters in the same window
    /// push the valence away from zero, dampeners toward it (decaying with
    /// distance). Words before a "but" count half, words after it 1.5×.
    pub fn compound(&self, text: &str) -> f64 {
        let tokens: Vec<&str> = tokenize(text).collect();
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

        let caps_hits = tokens.iter().filter(|t| is_shouting(t)).count();
        let mixed_case = caps_hits > 0 && caps_hits < tokens.len();
        let but_at = lowered.iter().position(|t| t == "but");

        let mut sum = 0.0;
        for i in 0..tokens.len() {
            let base = self.word_valence(&lowered[i]);
            if base == 0.0 {
                continue;
            }
            let sign = base.signum();
            let mut v = base;

            if mixed_case && is_shouting(tokens[i]) {
                v += CAPS_INCR * sign;
            }

            for (k, decay) in [(1usize, 1.0), (2, 0.95), (3, 0.9)] {
                if i >= k {
                    v += booster(&lowered[i - k]) * decay * sign;
                }
            }

            let negated = (1..=3).any(|k| i >= k && is_negator(lowered[i - k].as_str()));
            if negated {
                v *= NEGATION_SCALAR;
            }

            if let Some(b) = but_at {
                if i < b {
                    v *= 0.5;
                } else if i > b {
                    v *= 1.5;
                }
            }

            sum += v;
        }

        if sum != 0.0 {
            let marks = text.matches('!').count().min(4) as f64;
            sum += marks * EXCLAMATION_INCR * sum.signum();
        }

        (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0)
    }
}

#[async_trait]
impl SentimentBackend for LexiconBackend {
    fn id(&self) -> BackendId {
        BackendId::Lexicon
    }

    fn model_identifier(&self) -> String {
        "valence-lexicon".to_string()
    }

    async fn score(&self, text: &str, _timeout: Duration) -> Result<RawOutput, BackendError> {
        Ok(RawOutput::Compound {
            compound: self.compound(text),
        })
    }
}

/// ALL-CAPS word of at least two letters.
fn is_shouting(tok: &str) -> bool {
    let letters: Vec<char> = tok.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase())
}

fn booster(tok: &str) -> f64 {
    match tok {
        "absolutely" | "amazingly" | "completely" | "deeply" | "especially" | "extremely"
        | "highly" | "incredibly" | "really" | "so" | "totally" | "truly" | "very"
        | "remarkably" | "super" => BOOSTER_INCR,
        "barely" | "hardly" | "slightly" | "somewhat" | "marginally" | "partly"
        | "scarcely" | "occasionally" => -BOOSTER_INCR,
        _ => 0.0,
    }
}
