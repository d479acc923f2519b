pub mod merge;
pub mod schema;

pub use schema::*;

use crate::cli::BackendArgs;
use crate::error::ConfigError;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Load configuration by merging global, local, and CLI sources.
/// Precedence: CLI > local config (or `--config`) > global config > defaults.
///
/// Missing config files are handled gracefully (defaults apply).
pub fn load_config(args: &BackendArgs) -> Result<AppConfig, ConfigError> {
    // Layer 1: Global config (~/.config/scai/scai.toml or platform equivalent)
    let global = load_global_config();

    // Layer 2: Explicit --config path, or ./scai.toml
    let local = match &args.config {
        Some(path) => {
            if !path.exists() {
                tracing::warn!("Config file {} does not exist", path.display());
            }
            load_toml_file(path).unwrap_or_default()
        }
        None => load_toml_file(Path::new("scai.toml")).unwrap_or_default(),
    };

    // Layer 3: CLI args
    let cli_partial = PartialConfig {
        backend_url: args.backend.clone(),
        session_id: args.session.clone(),
        terminal_url: args.terminal_url.clone(),
        ..Default::default()
    };

    let config = cli_partial
        .with_fallback(local)
        .with_fallback(global)
        .finalize();

    validate(&config)?;
    Ok(config)
}

/// Reject backend URLs reqwest cannot use, before any request is built.
fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    reqwest::Url::parse(&config.backend_url)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidUrl {
            url: config.backend_url.clone(),
            message: e.to_string(),
        })
}

/// Load global config from the platform-specific config directory.
/// Returns empty PartialConfig if file not found.
fn load_global_config() -> PartialConfig {
    match global_config_path() {
        Some(p) => load_toml_file(&p).unwrap_or_default(),
        None => {
            tracing::debug!("Could not determine global config directory");
            PartialConfig::default()
        }
    }
}

/// Load and parse a TOML config file into a PartialConfig.
/// Returns None on file-not-found; parse errors are logged and treated the same.
pub fn load_toml_file(path: &Path) -> Option<PartialConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            match toml::from_str::<ConfigFile>(&contents)
                .context(format!("Failed to parse {}", path.display()))
            {
                Ok(config_file) => {
                    tracing::info!("Loaded config from {}", path.display());
                    Some(config_file.to_partial())
                }
                Err(e) => {
                    tracing::warn!("Config parse error: {:#}", e);
                    None
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Failed to read config at {}: {}", path.display(), e);
            None
        }
    }
}

/// Resolve the platform-specific global config path.
/// Linux: ~/.config/scai/scai.toml
/// macOS: ~/Library/Application Support/scai/scai.toml
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "scai").map(|dirs| dirs.config_dir().join("scai.toml"))
}
