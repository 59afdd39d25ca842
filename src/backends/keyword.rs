use std::time::Duration;

use async_trait::async_trait;

use super::{tokenize, BackendId, SentimentBackend};
use crate::error::BackendError;
use crate::normalize::RawOutput;

const POSITIVE_WORDS: [&str; 10] = [
    "good",
    "great",
    "excellent",
    "amazing",
    "wonderful",
    "fantastic",
    "love",
    "best",
    "awesome",
    "perfect",
];

const NEGATIVE_WORDS: [&str; 10] = [
    "bad",
    "terrible",
    "awful",
    "horrible",
    "hate",
    "worst",
    "disgusting",
    "pathetic",
    "useless",
    "disappointing",
];

/// Last-resort scorer: counts hits against two fixed word lists.
/// It has no failure path, so a fallback chain ending here always terminates.
#[derive(Debug, Clone, Default)]
pub struct KeywordFallbackBackend;

impl KeywordFallbackBackend {
    pub fn new() -> Self {
        Self
    }

    /// `(positive_hits, negative_hits)` over whole, case-insensitive tokens.
    pub fn counts(&self, text: &str) -> (usize, usize) {
        let mut pos = 0;
        let mut neg = 0;
        for tok in tokenize(text) {
            let t = tok.to_lowercase();
            if POSITIVE_WORDS.contains(&t.as_str()) {
                pos += 1;
            } else if NEGATIVE_WORDS.contains(&t.as_str()) {
                neg += 1;
            }
        }
        (pos, neg)
    }
}

#[async_trait]
impl SentimentBackend for KeywordFallbackBackend {
    fn id(&self) -> BackendId {
        BackendId::Keyword
    }

    fn model_identifier(&self) -> String {
        "basic-keyword-fallback".to_string()
    }

    async fn score(&self, text: &str, _timeout: Duration) -> Result<RawOutput, BackendError> {
        let (positive, negative) = self.counts(text);
        Ok(RawOutput::KeywordCounts { positive, negative })
    }
}
