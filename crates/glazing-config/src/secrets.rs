//! API key resolution.
//!
//! Resolution order:
//! 1. Environment variable (`OPENAI_API_KEY`)
//! 2. Config file (with warning)
//!
//! A key file (`llm.api_key_file`) is not read here. It is handed to the token
//! source, which reads it at construction and refuses to start if it cannot.

use crate::LlmConfig;

/// Environment variable holding the backend API key.
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

/// Result of API key resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve the backend API key using the full resolution chain.
///
/// `lookup` abstracts `std::env::var`.
pub fn resolve_api_key<F>(llm: &LlmConfig, lookup: F) -> Option<ResolvedSecret>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(API_KEY_ENV_VAR)
        && !value.is_empty()
    {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(API_KEY_ENV_VAR.to_string()),
        });
    }

    llm.api_key
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}
