//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/glazing/config.toml` (XDG user config)
//! 2. `./glazing.toml` (project-local)
//! 3. Environment variables (applied by the caller via [`GlazingConfig::apply_env`])
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, GlazingConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "glazing.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "glazing";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "GLAZING_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: GlazingConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g., plaintext API keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config file layers.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `GLAZING_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = GlazingConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    check_plaintext_keys(&config, &mut warnings);

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
///
/// Unlike discovery, a missing or malformed explicit file is an error.
pub fn load_config_file(path: &Path) -> Result<GlazingConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    GlazingConfig::from_toml(&contents)
}

/// Get the XDG config file path for glazing.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the XDG config directory for glazing.
///
/// Checks `GLAZING_CONFIG_DIR` first, then falls back to the platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
///
/// A file that exists but fails to parse becomes a warning, not an error.
fn load_layer(config: &mut GlazingConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

fn check_plaintext_keys(config: &GlazingConfig, warnings: &mut Vec<String>) {
    if let Some(ref llm) = config.llm
        && llm.has_plaintext_api_key()
    {
        warnings.push(
            "[llm] config contains a plaintext API key. \
             Consider OPENAI_API_KEY or llm.api_key_file instead."
                .to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_xdg_config_path_shape() {
        if let Some(p) = xdg_config_path() {
            assert!(p.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[llm]
use_fake = false
model = "test-model"
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.llm().model, "test-model");
        assert!(!config.llm().use_fake);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        assert!(loaded.config.llm.is_none());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_load_config_layered_merge() {
        let xdg_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();

        fs::write(
            xdg_dir.path().join("config.toml"),
            r#"
[llm]
model = "base-model"

[session]
ttl_secs = 120
"#,
        )
        .unwrap();

        fs::write(
            project_dir.path().join("glazing.toml"),
            r#"
[llm]
model = "project-model"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(xdg_dir.path())).unwrap();

        assert_eq!(loaded.config.llm().model, "project-model");
        // Sections the project file did not mention survive from the user layer
        assert_eq!(loaded.config.session().ttl_secs, 120);
        assert_eq!(loaded.loaded_from().len(), 2);
    }

    #[test]
    fn test_broken_layer_becomes_warning() {
        let xdg_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(project_dir.path().join("glazing.toml"), "[llm\n").unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(xdg_dir.path())).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_plaintext_key_warning() {
        let xdg_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        fs::write(
            project_dir.path().join("glazing.toml"),
            r#"
[llm]
api_key = "sk-secret"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(xdg_dir.path())).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("plaintext"));
    }
}
