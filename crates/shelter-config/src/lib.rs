//! Shared configuration for the shelter console.
//!
//! Built-in defaults, an optional TOML file and `SHELTER_`-prefixed
//! environment variables, merged with figment and translated into
//! `shelter_link::LinkOptions`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shelter_link::{DEFAULT_HOST, DEFAULT_PORT, LinkOptions};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where the monitoring backend listens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkConfig {
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: default_read_chunk_size(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// How often the console polls the latest status.
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,

    /// "auto", "always" or "never".
    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval(),
            color: default_color(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_read_chunk_size() -> usize {
    LinkOptions::default().read_chunk_size
}
fn default_max_line_bytes() -> usize {
    LinkOptions::default().max_line_bytes
}
fn default_frame_interval() -> u64 {
    100
}
fn default_color() -> String {
    "auto".into()
}

impl Config {
    /// Reject values the session or console cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.host.trim().is_empty() {
            return Err(invalid("backend.host", "must not be empty"));
        }
        if self.backend.port == 0 {
            return Err(invalid("backend.port", "must be between 1 and 65535"));
        }
        if self.backend.connect_timeout_secs == 0 {
            return Err(invalid("backend.connect_timeout_secs", "must be at least 1"));
        }
        if self.link.read_chunk_size == 0 {
            return Err(invalid("link.read_chunk_size", "must be at least 1"));
        }
        if self.link.max_line_bytes < self.link.read_chunk_size {
            return Err(invalid(
                "link.max_line_bytes",
                "must be at least link.read_chunk_size",
            ));
        }
        if self.display.frame_interval_ms == 0 {
            return Err(invalid("display.frame_interval_ms", "must be at least 1"));
        }
        if !matches!(self.display.color.as_str(), "auto" | "always" | "never") {
            return Err(invalid(
                "display.color",
                &format!("expected 'auto', 'always', or 'never', got '{}'", self.display.color),
            ));
        }
        Ok(())
    }

    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            connect_timeout: Duration::from_secs(self.backend.connect_timeout_secs),
            read_chunk_size: self.link.read_chunk_size,
            max_line_bytes: self.link.max_line_bytes,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.display.frame_interval_ms)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "shelter", "shelter").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("shelter");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load and validate config from `path` + environment.
///
/// A missing file is not an error; defaults and environment still apply.
/// Nested keys use a double underscore: `SHELTER_BACKEND__PORT=65501`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SHELTER_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parent dirs.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
