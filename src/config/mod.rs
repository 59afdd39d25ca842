// src/config/mod.rs
//! Engine configuration: TOML file + env overrides.
//!
//! Resolution order: `SENTIMENT_CONFIG_PATH`, then `config/engine.toml`, then
//! built-in defaults. Every field has a default, so a partial file is fine.

pub mod remote;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::backends::BackendId;
pub use remote::RemoteConfig;

pub const DEFAULT_ENGINE_CONFIG_PATH: &str = "config/engine.toml";
pub const ENV_ENGINE_CONFIG_PATH: &str = "SENTIMENT_CONFIG_PATH";

fn default_max_text_length() -> usize {
    crate::validate::DEFAULT_MAX_TEXT_LENGTH
}
fn default_sentiment_threshold() -> f64 {
    0.05
}
fn default_confidence_threshold() -> f64 {
    0.3
}
fn default_request_timeout_ms() -> u64 {
    15_000
}
fn default_excerpt_chars() -> usize {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
    /// Neutral band half-width for compound scores.
    #[serde(default = "default_sentiment_threshold")]
    pub sentiment_threshold: f64,
    /// Results below this confidence are flagged `low_confidence`.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Overall per-request deadline.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_text_length: default_max_text_length(),
            sentiment_threshold: default_sentiment_threshold(),
            confidence_threshold: default_confidence_threshold(),
            request_timeout_ms: default_request_timeout_ms(),
            excerpt_chars: default_excerpt_chars(),
            backends: BackendsConfig::default(),
            remote: RemoteConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// `[backends.<id>]` tables. Omitted keys fall back to per-backend defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendsConfig {
    #[serde(default)]
    pub remote: BackendOverrides,
    #[serde(default)]
    pub lexicon: BackendOverrides,
    #[serde(default)]
    pub statistical: BackendOverrides,
    #[serde(default)]
    pub keyword: BackendOverrides,
}

impl BackendsConfig {
    fn overrides(&self, id: BackendId) -> &BackendOverrides {
        match id {
            BackendId::Remote => &self.remote,
            BackendId::Lexicon => &self.lexicon,
            BackendId::Statistical => &self.statistical,
            BackendId::Keyword => &self.keyword,
        }
    }

    fn overrides_mut(&mut self, id: BackendId) -> &mut BackendOverrides {
        match id {
            BackendId::Remote => &mut self.remote,
            BackendId::Lexicon => &mut self.lexicon,
            BackendId::Statistical => &mut self.statistical,
            BackendId::Keyword => &mut self.keyword,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendOverrides {
    pub enabled: Option<bool>,
    pub min_interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub weight: Option<f64>,
}

/// Fully resolved settings for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackendSettings {
    pub enabled: bool,
    pub min_interval_ms: u64,
    pub timeout_ms: u64,
    pub weight: f64,
}

impl BackendSettings {
    pub fn defaults_for(id: BackendId) -> Self {
        match id {
            BackendId::Remote => Self {
                enabled: true,
                min_interval_ms: 100,
                timeout_ms: 10_000,
                weight: 0.5,
            },
            BackendId::Lexicon => Self::local(0.3),
            BackendId::Statistical => Self::local(0.2),
            BackendId::Keyword => Self::local(0.1),
        }
    }

    fn local(weight: f64) -> Self {
        Self {
            enabled: true,
            min_interval_ms: 0,
            timeout_ms: 2_000,
            weight,
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_cache_capacity() -> usize {
    1000
}
fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl EngineConfig {
    /// Resolved settings for `id` (file overrides merged over defaults).
    pub fn backend(&self, id: BackendId) -> BackendSettings {
        let d = BackendSettings::defaults_for(id);
        let o = self.backends.overrides(id);
        BackendSettings {
            enabled: o.enabled.unwrap_or(d.enabled),
            min_interval_ms: o.min_interval_ms.unwrap_or(d.min_interval_ms),
            timeout_ms: o.timeout_ms.unwrap_or(d.timeout_ms),
            weight: o.weight.unwrap_or(d.weight),
        }
    }

    /// Toggle a backend in place (handy for tests and the status endpoint).
    pub fn set_enabled(&mut self, id: BackendId, enabled: bool) {
        self.backends.overrides_mut(id).enabled = Some(enabled);
    }

    pub fn enabled_backends(&self) -> Vec<BackendId> {
        BackendId::PRIORITY
            .into_iter()
            .filter(|id| self.backend(*id).enabled)
            .collect()
    }

    /// Configured ensemble weights for every backend.
    pub fn weights(&self) -> BTreeMap<BackendId, f64> {
        BackendId::PRIORITY
            .into_iter()
            .map(|id| (id, self.backend(id).weight))
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parse a TOML string and sanitize it.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut cfg: EngineConfig = toml::from_str(toml_str)?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config at {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("invalid engine config at {}", path.display()))
    }

    /// `SENTIMENT_CONFIG_PATH` (must exist if set), else the default path if
    /// present, else built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_ENGINE_CONFIG_PATH) {
            return Self::load_from_file(PathBuf::from(p));
        }
        let default_path = Path::new(DEFAULT_ENGINE_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from_file(default_path);
        }
        Ok(Self::default())
    }

    /// Clamp out-of-range values back into something usable.
    pub fn sanitize(&mut self) {
        self.max_text_length = self.max_text_length.max(1);
        if !self.sentiment_threshold.is_finite() {
            self.sentiment_threshold = default_sentiment_threshold();
        }
        self.sentiment_threshold = self.sentiment_threshold.clamp(0.0, 1.0);
        if !self.confidence_threshold.is_finite() {
            self.confidence_threshold = default_confidence_threshold();
        }
        self.confidence_threshold = self.confidence_threshold.clamp(0.0, 1.0);
        self.request_timeout_ms = self.request_timeout_ms.max(1);
        self.cache.capacity = self.cache.capacity.max(1);

        for id in BackendId::PRIORITY {
            let o = self.backends.overrides_mut(id);
            if let Some(w) = o.weight {
                o.weight = Some(if w.is_finite() { w.max(0.0) } else { 0.0 });
            }
            if let Some(t) = o.timeout_ms {
                o.timeout_ms = Some(t.max(1));
            }
        }
        self.remote.sanitize();
    }
}
