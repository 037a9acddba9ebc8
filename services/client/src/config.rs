//! `client.toml` loading. The `--http`/`--backend` CLI flags (wired by the
//! `dtunnel` binary) override `http_bind`/`backend`.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub http_bind: String,
    pub backend: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_bind: ":8080".to_owned(),
            backend: "127.0.0.1:8081".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    http_bind: Option<String>,
    backend: Option<String>,
}

pub fn load_config_from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

pub fn load_config_from_str(toml_str: &str) -> Result<ClientConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let defaults = ClientConfig::default();
    Ok(ClientConfig {
        http_bind: raw.http_bind.unwrap_or(defaults.http_bind),
        backend: raw.backend.unwrap_or(defaults.backend),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}
