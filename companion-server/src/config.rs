// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use companion_hooks::HookConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Companion Server Configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: RpcServerConfig,
    #[serde(default)]
    pub hooks: HookConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RpcServerConfig {
    /// Listen address (e.g., "127.0.0.1:47200")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Maximum actions in one `system.batch` or JSON-RPC batch array
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Per-request timeout in seconds (0 disables it)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Session name reported by `/rpc/health`
    #[serde(default = "default_session_name")]
    pub name: String,

    /// Where `config.set` / `config.update` values are persisted (TOML)
    #[serde(default)]
    pub config_file: Option<PathBuf>,
}

// Default values
fn default_listen_addr() -> String {
    "127.0.0.1:47200".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_max_batch_size() -> usize {
    64
}

fn default_request_timeout() -> u64 {
    30
}

fn default_session_name() -> String {
    "companion".to_string()
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: default_enable_cors(),
            max_batch_size: default_max_batch_size(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            config_file: None,
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid listen address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.merge_with_env()
    }

    /// Apply environment overrides
    ///
    /// Supported environment variables:
    /// - COMPANION_LISTEN_ADDR: listen address (default: 127.0.0.1:47200)
    /// - COMPANION_HOOKS_ENABLED: start with the hook pipeline enabled (default: true)
    /// - COMPANION_HOOK_TIMEOUT_MS: default per-hook timeout (default: none)
    /// - COMPANION_CONFIG_FILE: persistence file for the config store
    /// - COMPANION_MAX_BATCH: maximum batch size (default: 64)
    pub fn merge_with_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(addr) = std::env::var("COMPANION_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(enabled) = parse_env::<bool>("COMPANION_HOOKS_ENABLED")? {
            self.hooks.enabled = enabled;
        }
        if let Some(timeout) = parse_env::<u64>("COMPANION_HOOK_TIMEOUT_MS")? {
            self.hooks.default_timeout_ms = Some(timeout);
        }
        if let Ok(path) = std::env::var("COMPANION_CONFIG_FILE") {
            self.session.config_file = Some(PathBuf::from(path));
        }
        if let Some(max) = parse_env::<usize>("COMPANION_MAX_BATCH")? {
            self.server.max_batch_size = max;
        }
        Ok(self)
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen_addr
            .parse()
            .map_err(|source| ConfigError::InvalidAddress {
                addr: self.server.listen_addr.clone(),
                source,
            })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.server.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.server.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size must be at least 1".into()));
        }

        self.hooks
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:47200");
        assert_eq!(config.server.max_batch_size, 64);
        assert!(config.hooks.enabled);
        assert_eq!(config.hooks.default_timeout_ms, None);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
listen_addr = "0.0.0.0:9000"
max_batch_size = 8

[hooks]
default_timeout_ms = 1500

[[hooks.preload]]
event = "before:tts"
patch = {{ voice = "soft" }}

[session]
name = "studio"
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.server.max_batch_size, 8);
        assert!(config.server.enable_cors);
        assert_eq!(config.hooks.default_timeout_ms, Some(1500));
        assert_eq!(config.hooks.preload.len(), 1);
        assert_eq!(config.session.name, "studio");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.server.listen_addr = "not-an-address".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress { .. })
        ));

        let mut config = ServerConfig::default();
        config.server.max_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("COMPANION_LISTEN_ADDR", "0.0.0.0:8080");
        std::env::set_var("COMPANION_HOOK_TIMEOUT_MS", "250");

        let config = ServerConfig::default().merge_with_env().unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.hooks.default_timeout_ms, Some(250));

        std::env::set_var("COMPANION_HOOK_TIMEOUT_MS", "soon");
        assert!(matches!(
            ServerConfig::default().merge_with_env(),
            Err(ConfigError::InvalidEnv { .. })
        ));

        std::env::remove_var("COMPANION_LISTEN_ADDR");
        std::env::remove_var("COMPANION_HOOK_TIMEOUT_MS");

        // Missing file falls back to defaults
        let config = ServerConfig::load(Some(PathBuf::from("/nonexistent/companion.toml"))).unwrap();
        assert_eq!(config.session.name, "companion");
        assert_eq!(config.server.listen_addr, "127.0.0.1:47200");
    }
}
