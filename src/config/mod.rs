// ABOUTME: Coordinator configuration from imagekeeper.yml and the environment.
// ABOUTME: Handles YAML parsing, humantime delays, env overrides and credentials.

mod env_value;

pub use env_value::EnvValue;

use crate::coordinator::{CoordinatorSettings, DEFAULT_REMOVE_DELAY};
use crate::error::{Error, Result};
use crate::store::{RegistryAuth, RuntimeConfig};
use serde::Deserialize;
use serde::de::IntoDeserializer;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "imagekeeper.yml";
pub const CONFIG_FILENAME_ALT: &str = "imagekeeper.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".imagekeeper/config.yml";

/// Overrides `cleanup` (`true`/`false`/`1`/`0`).
pub const ENV_CLEANUP: &str = "IMAGEKEEPER_CLEANUP";
/// Overrides `remove_delay` (humantime, e.g. `90s`, `3m`).
pub const ENV_REMOVE_DELAY: &str = "IMAGEKEEPER_REMOVE_DELAY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,

    #[serde(default = "default_remove_delay", with = "humantime_serde")]
    pub remove_delay: Duration,

    #[serde(default)]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default pull credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub username: EnvValue,
    pub password: EnvValue,
    #[serde(default)]
    pub server: Option<String>,
}

impl AuthConfig {
    pub fn resolve(&self) -> Result<RegistryAuth> {
        Ok(RegistryAuth {
            username: self.username.resolve()?,
            password: self.password.resolve()?,
            server: self.server.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_cleanup() -> bool {
    true
}

fn default_remove_delay() -> Duration {
    DEFAULT_REMOVE_DELAY
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleanup: default_cleanup(),
            remove_delay: default_remove_delay(),
            auth: None,
            runtime: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Apply `IMAGEKEEPER_*` environment overrides on top of the file values.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(raw) = std::env::var(ENV_CLEANUP) {
            self.cleanup = parse_bool(ENV_CLEANUP, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_REMOVE_DELAY) {
            self.remove_delay = parse_duration(ENV_REMOVE_DELAY, &raw)?;
        }
        Ok(self)
    }

    /// Resolve into coordinator settings, reading env-backed credentials.
    pub fn settings(&self) -> Result<CoordinatorSettings> {
        let auth = self.auth.as_ref().map(AuthConfig::resolve).transpose()?;
        Ok(CoordinatorSettings {
            cleanup: self.cleanup,
            remove_delay: self.remove_delay,
            auth,
        })
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(Error::InvalidConfig(format!(
            "{} must be a boolean, got {:?}",
            var, other
        ))),
    }
}

fn parse_duration(var: &str, raw: &str) -> Result<Duration> {
    let de: serde::de::value::StrDeserializer<'_, serde::de::value::Error> =
        raw.trim().into_deserializer();
    humantime_serde::deserialize(de)
        .map_err(|e| Error::InvalidConfig(format!("{} must be a duration: {}", var, e)))
}
