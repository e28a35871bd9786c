//! CLI command handlers.

pub mod config;
pub mod serve;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use glazing_config::LoadedConfig;
use glazing_config::discovery::ConfigSource;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, replacing discovery.
    pub config_path: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Load config files (or the explicit file) and apply environment overrides.
pub fn load_config(ctx: &Context) -> Result<LoadedConfig> {
    let mut loaded = if let Some(ref config_path) = ctx.config_path {
        let config = glazing_config::load_config_file(config_path)?;
        let mut warnings = Vec::new();
        if config.llm().has_plaintext_api_key() {
            warnings.push(format!(
                "{} contains a plaintext API key. Consider OPENAI_API_KEY or llm.api_key_file instead.",
                config_path.display()
            ));
        }
        LoadedConfig {
            config,
            sources: vec![ConfigSource {
                path: config_path.clone(),
                loaded: true,
            }],
            warnings,
        }
    } else {
        glazing_config::load_config(None)?
    };

    loaded
        .config
        .apply_env(|name| std::env::var(name).ok())
        .context("Invalid environment override")?;

    Ok(loaded)
}
