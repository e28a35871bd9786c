//! Configuration for the Glazing chat server.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (XDG user config + project-local overrides)
//! - Environment variable overrides (`USE_FAKE_LLM`, `OPENAI_API_KEY`, ...)
//! - API key resolution (env var → key file → config file)
//!
//! The result is a single [`GlazingConfig`] built once at process start and
//! passed explicitly to the components that need it.

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, xdg_config_dir,
    xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{API_KEY_ENV_VAR, ResolvedSecret, SecretSource, resolve_api_key};
pub use types::*;
