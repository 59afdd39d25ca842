//! Auxiliary signals computed on the cleaned text regardless of backend:
//! per-category emotion intensity and a coarse toxicity level.

use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::backends::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Anger,
    Fear,
    Sadness,
    Surprise,
    Disgust,
    Trust,
    Anticipation,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Joy,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Sadness,
        Emotion::Surprise,
        Emotion::Disgust,
        Emotion::Trust,
        Emotion::Anticipation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Sadness => "sadness",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Trust => "trust",
            Emotion::Anticipation => "anticipation",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Emotion::Joy => &[
                "happy", "joy", "excited", "cheerful", "delighted", "pleased", "glad", "thrilled",
            ],
            Emotion::Anger => &[
                "angry", "furious", "mad", "rage", "irritated", "annoyed", "frustrated",
            ],
            Emotion::Fear => &[
                "afraid", "scared", "terrified", "anxious", "worried", "nervous", "panic",
            ],
            Emotion::Sadness => &[
                "sad", "depressed", "unhappy", "grief", "sorrow", "melancholy", "disappointed",
            ],
            Emotion::Surprise => &[
                "surprised", "amazed", "astonished", "shocked", "stunned", "startled",
            ],
            Emotion::Disgust => &["disgusted", "revolted", "repulsed", "sickened", "nauseated"],
            Emotion::Trust => &["trust", "confidence", "faith", "belief", "reliable", "dependable"],
            Emotion::Anticipation => &["excited", "eager", "hopeful", "expecting", "anticipating"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToxicityLevel {
    None,
    Low,
    Medium,
    High,
}

impl ToxicityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            ToxicityLevel::High
        } else if score >= 0.3 {
            ToxicityLevel::Medium
        } else if score > 0.0 {
            ToxicityLevel::Low
        } else {
            ToxicityLevel::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Toxicity {
    pub score: f64,
    pub level: ToxicityLevel,
}

/// Emotion intensities plus the dominant one ("neutral" when all are zero).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScores {
    pub scores: BTreeMap<Emotion, f64>,
    pub dominant: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    pub emotions: EmotionScores,
    pub toxicity: Toxicity,
}

/// Compute both signals for already-cleaned text.
pub fn extract(text: &str) -> Signals {
    Signals {
        emotions: emotions(text),
        toxicity: toxicity(text),
    }
}

/// intensity = min(hits / words * 10, 1)
pub fn emotions(text: &str) -> EmotionScores {
    let words: Vec<String> = tokenize(text).map(|t| t.to_lowercase()).collect();
    let total = words.len().max(1) as f64;

    let scores: BTreeMap<Emotion, f64> = Emotion::ALL
        .iter()
        .map(|e| {
            let kw = e.keywords();
            let hits = words.iter().filter(|w| kw.contains(&w.as_str())).count() as f64;
            (*e, (hits / total * 10.0).min(1.0))
        })
        .collect();

    // First category wins ties, in `Emotion::ALL` order.
    let mut dominant: Option<(Emotion, f64)> = None;
    for e in Emotion::ALL {
        let s = scores[&e];
        if s > 0.0 && dominant.map_or(true, |(_, best)| s > best) {
            dominant = Some((e, s));
        }
    }

    EmotionScores {
        scores,
        dominant: dominant.map_or("neutral", |(e, _)| e.as_str()).to_string(),
    }
}

fn toxicity_patterns() -> &'static [Regex] {
    static PATTERNS: OnceCell<Vec<Regex>> = OnceCell::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\b(hate|stupid|idiot|moron|dumb|pathetic)\b",
            r"(?i)\b(kill|die|death|murder)\b",
            r"(?i)\b(f[*u]ck|sh[*i]t|damn|hell)\b",
            // case-sensitive: shouting, not any three letters
            r"[A-Z]{3,}",
            r"!{2,}",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid toxicity regex"))
        .collect()
    })
}

/// score = min(matches / words * 5, 1)
pub fn toxicity(text: &str) -> Toxicity {
    let words = text.split_whitespace().count();
    if words == 0 {
        return Toxicity {
            score: 0.0,
            level: ToxicityLevel::None,
        };
    }
    let matches: usize = toxicity_patterns()
        .iter()
        .map(|re| re.find_iter(text).count())
        .sum();
    let score = (matches as f64 / words as f64 * 5.0).min(1.0);
    Toxicity {
        score,
        level: ToxicityLevel::from_score(score),
    }
}
