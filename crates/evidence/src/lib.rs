//! Client for the AI evidence verifier and the submission auto-verification
//! flow built on it.

pub mod auto;
pub mod client;
pub mod verdict;

use std::time::Duration;

pub use auto::{auto_verify, AutoVerification, AutoVerifyRequest};
pub use client::{EvidenceClient, EvidenceImage};
pub use verdict::{parse_verdict, Verdict};

const DEFAULT_ENDPOINT: &str =
    "https://unlocked-base-backend-production.up.railway.app/task-verification";

#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("verifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("verifier returned status {0}")]
    Status(u16),

    #[error("malformed verifier response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct EvidenceConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl EvidenceConfig {
    /// Default endpoint unless `EVIDENCE_API_URL` is set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("EVIDENCE_API_URL") {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint.trim().to_string();
            }
        }
        config
    }
}
