//! Configuration resolution for tabcast.
//!
//! Resolution order, lowest to highest priority:
//! 1. Built-in defaults
//! 2. Settings file (`~/.config/tabcast/settings.json`, or an explicit path)
//! 3. Environment variables (`TABCAST_HOST`, `TABCAST_PORT`,
//!    `TABCAST_RESPONSE_TIMEOUT`)
//!
//! CLI flags are applied on top by the binary itself.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Complete tabcast configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Extension (agent) connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Default timeout for a command round-trip, in seconds.
    pub response_timeout_secs: u64,
    /// Capacity of the outbound frame buffer per connection.
    pub channel_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            response_timeout_secs: 30,
            channel_capacity: 128,
        }
    }
}

/// Load configuration with the resolution order described in the module docs.
///
/// When `explicit_path` is given the file must exist and parse; otherwise the
/// global settings file is used if present and skipped if not.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    let mut config = match explicit_path {
        Some(path) => load_config_file(path)?,
        None => match global_config_path() {
            Some(path) if path.exists() => load_config_file(&path)?,
            _ => {
                tracing::debug!("No settings file found; using built-in defaults");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Get the global settings file path for this platform.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".tabcast").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/tabcast/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("tabcast").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply environment variable overrides to `config`.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from(config: &mut Config, get: impl Fn(&str) -> Option<String>) {
    if let Some(host) = get("TABCAST_HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("TABCAST_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = port;
    }
    if let Some(timeout) = get("TABCAST_RESPONSE_TIMEOUT").and_then(|v| v.parse().ok()) {
        config.agent.response_timeout_secs = timeout;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.agent.response_timeout_secs, 30);
        assert_eq!(config.agent.channel_capacity, 128);
    }

    #[test]
    fn env_overrides_take_priority() {
        let env: HashMap<&str, &str> = [
            ("TABCAST_HOST", "127.0.0.1"),
            ("TABCAST_PORT", "9001"),
            ("TABCAST_RESPONSE_TIMEOUT", "5"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides_from(&mut config, |key| env.get(key).map(ToString::to_string));

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.agent.response_timeout_secs, 5);
    }

    #[test]
    fn unparseable_env_values_are_ignored() {
        let mut config = Config::default();
        apply_overrides_from(&mut config, |key| {
            (key == "TABCAST_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn partial_settings_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"host": "::1", "port": 8080}}}}"#).unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.server.host, "::1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.agent.response_timeout_secs, 30);
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = load_config_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/tabcast.json"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
