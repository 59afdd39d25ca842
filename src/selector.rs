//! Method selection: turns a requested `Method` into an execution `Plan`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backends::BackendId;

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Auto,
    Remote,
    Lexicon,
    Statistical,
    Keyword,
    Ensemble,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Auto => "auto",
            Method::Remote => "remote",
            Method::Lexicon => "lexicon",
            Method::Statistical => "statistical",
            Method::Keyword => "keyword",
            Method::Ensemble => "ensemble",
        }
    }

    /// The single backend this method pins, if any.
    pub fn backend(&self) -> Option<BackendId> {
        match self {
            Method::Remote => Some(BackendId::Remote),
            Method::Lexicon => Some(BackendId::Lexicon),
            Method::Statistical => Some(BackendId::Statistical),
            Method::Keyword => Some(BackendId::Keyword),
            Method::Auto | Method::Ensemble => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BackendId> for Method {
    fn from(id: BackendId) -> Self {
        match id {
            BackendId::Remote => Method::Remote,
            BackendId::Lexicon => Method::Lexicon,
            BackendId::Statistical => Method::Statistical,
            BackendId::Keyword => Method::Keyword,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    /// Accepts canonical names plus the legacy backend names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let m = match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Method::Auto,
            "remote" | "huggingface" | "huggingface_api" | "roberta" => Method::Remote,
            "lexicon" | "vader" => Method::Lexicon,
            "statistical" | "textblob" => Method::Statistical,
            "keyword" | "basic" | "basic_fallback" | "fallback" => Method::Keyword,
            "ensemble" => Method::Ensemble,
            _ => return Err(UnknownMethod(s.to_string())),
        };
        Ok(m)
    }
}

/// How one request will be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Exactly this backend; a failure is rescued by the keyword scorer.
    Single(BackendId),
    /// Try in order, stop at the first success.
    Chain(Vec<BackendId>),
    /// Run all concurrently and fuse the survivors.
    Ensemble(Vec<BackendId>),
}

/// Build the plan for `method` given the enabled backends.
///
/// A pinned backend is planned even when disabled; the engine reports it as
/// unavailable instead of substituting another backend.
pub fn plan(method: Method, enabled: &[BackendId]) -> Plan {
    let in_priority = || -> Vec<BackendId> {
        BackendId::PRIORITY
            .into_iter()
            .filter(|id| enabled.contains(id))
            .collect()
    };
    match method {
        Method::Auto => Plan::Chain(in_priority()),
        Method::Ensemble => Plan::Ensemble(in_priority()),
        pinned => match pinned.backend() {
            Some(id) => Plan::Single(id),
            None => Plan::Chain(in_priority()),
        },
    }
}
