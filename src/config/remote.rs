// src/config/remote.rs
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_REMOTE_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/cardiffnlp/twitter-roberta-base-sentiment-latest";
pub const DEFAULT_REMOTE_MODEL: &str = "cardiffnlp/twitter-roberta-base-sentiment-latest";

/// Env vars consulted (in order) when `api_key = "ENV"`.
pub const API_KEY_ENV_VARS: [&str; 3] = ["HUGGINGFACE_API_KEY", "HUGGING_FACE_API_KEY", "HF_API_KEY"];

/// Keys this short are placeholders, not credentials.
const MIN_API_KEY_LEN: usize = 11;

fn default_endpoint() -> String {
    DEFAULT_REMOTE_ENDPOINT.to_string()
}
fn default_model() -> String {
    DEFAULT_REMOTE_MODEL.to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_retry_backoff_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    4_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Literal key, or "ENV" to read HUGGINGFACE_API_KEY / HUGGING_FACE_API_KEY / HF_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Fixed wait before the single retry on HTTP 503 (model loading).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: default_api_key(),
            retry_backoff_ms: default_retry_backoff_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl RemoteConfig {
    /// Resolve the credential. `None` means the remote backend is misconfigured.
    pub fn resolve_api_key(&self) -> Option<String> {
        let raw = self.api_key.trim();
        let key = if raw.eq_ignore_ascii_case("env") {
            API_KEY_ENV_VARS
                .iter()
                .find_map(|name| env::var(name).ok().filter(|v| !v.trim().is_empty()))?
        } else {
            raw.to_string()
        };
        let key = key.trim().to_string();
        (key.len() >= MIN_API_KEY_LEN).then_some(key)
    }

    pub(crate) fn sanitize(&mut self) {
        self.endpoint = self.endpoint.trim().to_string();
        if self.endpoint.is_empty() {
            self.endpoint = default_endpoint();
        }
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        self.connect_timeout_ms = self.connect_timeout_ms.max(1);
    }
}
