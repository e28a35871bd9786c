//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config (or referenced) file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An environment variable held a value that could not be parsed.
    #[error("invalid value '{value}' for environment variable {name}: {reason}")]
    InvalidEnv {
        name: String,
        value: String,
        reason: String,
    },

    /// A field holds a value outside its allowed range.
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}
