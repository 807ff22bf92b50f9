//! Layers CLI flags on top of the shared `shelter-config` file/env config.

use std::io::IsTerminal;
use std::path::PathBuf;

use shelter_config::Config;

use crate::cli::{ColorMode, GlobalOpts};
use crate::error::CliError;

/// Everything a command needs after config files, env and flags are merged.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub color: bool,
}

impl Context {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.backend.host, self.config.backend.port)
    }
}

/// Config file path: `--config` flag, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(shelter_config::config_path)
}

/// Load config for `global` and apply flag overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Context, CliError> {
    let config_path = config_path(global);
    let mut config = shelter_config::load_config_from(&config_path)?;

    if let Some(ref host) = global.host {
        config.backend.host.clone_from(host);
    }
    if let Some(port) = global.port {
        config.backend.port = port;
    }
    if let Some(color) = global.color {
        config.display.color = match color {
            ColorMode::Auto => "auto",
            ColorMode::Always => "always",
            ColorMode::Never => "never",
        }
        .into();
    }
    config.validate()?;

    let color = match config.display.color.as_str() {
        "always" => true,
        "never" => false,
        _ => std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    };

    Ok(Context {
        config,
        config_path,
        color,
    })
}
