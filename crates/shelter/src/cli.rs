//! Clap derive structures for the `shelter` console.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use shelter_link::Mode;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// shelter -- operator console for the shelter monitoring backend
#[derive(Debug, Parser)]
#[command(
    name = "shelter",
    version,
    about = "Watch shelter sensor status and switch operating modes",
    long_about = "Connects to the shelter monitoring backend, shows the latest\n\
        sensor readings, alerts and predictions, and sends mode commands\n\
        (normal, radiation, gas, oxygen).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend host (overrides config)
    #[arg(long, short = 'H', env = "SHELTER_HOST", global = true)]
    pub host: Option<String>,

    /// Backend port (overrides config)
    #[arg(long, short = 'p', env = "SHELTER_PORT", global = true)]
    pub port: Option<u16>,

    /// Config file to use instead of the default location
    #[arg(long, env = "SHELTER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// When to use color output (overrides config)
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the dashboard, refreshing whenever the backend reports
    Watch(WatchArgs),

    /// Dashboard plus mode commands read from stdin (one per line, `q` quits)
    Console(WatchArgs),

    /// Send a single mode command and exit
    Send(SendArgs),

    /// Inspect or create the configuration file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in milliseconds (overrides config)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Exit after the first status is shown
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Mode to switch to: n|normal, r|radiation, g|gas, o|oxygen
    #[arg(value_parser = parse_mode)]
    pub mode: Mode,
}

fn parse_mode(raw: &str) -> Result<Mode, String> {
    raw.parse()
        .map_err(|_| "expected one of n, r, g, o (or normal, radiation, gas, oxygen)".to_owned())
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the effective configuration as TOML
    Show,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
