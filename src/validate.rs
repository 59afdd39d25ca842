//! Input validation and cleaning.
//!
//! Cleaning decodes HTML entities and collapses whitespace; it never changes
//! the words themselves, so every backend sees the same semantic content.

use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::warn;

use crate::error::InputError;

pub const DEFAULT_MAX_TEXT_LENGTH: usize = 5000;

/// Markers that are logged (not rejected) when they appear in input.
const SUSPICIOUS_PATTERNS: [&str; 4] = ["<script", "javascript:", "data:", "vbscript:"];

/// Validated, cleaned text. Only `InputValidator` constructs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanText(String);

impl CleanText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl AsRef<str> for CleanText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct InputValidator {
    max_chars: usize,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TEXT_LENGTH)
    }
}

impl InputValidator {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn validate(&self, text: &str) -> Result<CleanText, InputError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(InputError::Empty);
        }
        let len = trimmed.chars().count();
        if len > self.max_chars {
            return Err(InputError::TooLong {
                len,
                max: self.max_chars,
            });
        }

        let lowered = trimmed.to_ascii_lowercase();
        for pattern in SUSPICIOUS_PATTERNS {
            if lowered.contains(pattern) {
                warn!(target: "validate", id = %fingerprint(trimmed), pattern, "suspicious pattern in input");
            }
        }

        let cleaned = clean(trimmed);
        if cleaned.is_empty() {
            return Err(InputError::Empty);
        }
        Ok(CleanText(cleaned))
    }
}

/// Decode HTML entities, then collapse whitespace runs into single spaces.
pub fn clean(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    // &nbsp; decodes to U+00A0, which `\s` covers under Unicode rules.
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Short anonymised id for log lines: first 6 bytes of SHA-256, hex.
pub fn fingerprint(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
