//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use shelter_config::ConfigError;
use shelter_link::{LinkError, Mode};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the backend at {addr}")]
    #[diagnostic(
        code(shelter::connection_failed),
        help(
            "Check that the monitoring backend is running and listening.\n\
             Address: {addr}\n\
             Override with --host / --port or [backend] in the config file."
        )
    )]
    ConnectionFailed {
        addr: String,
        #[source]
        source: LinkError,
    },

    #[error("The backend closed the connection")]
    #[diagnostic(
        code(shelter::disconnected),
        help("The last status shown is the final one received. Reconnect by running the command again.")
    )]
    Disconnected,

    #[error("Failed to send '{mode}' to the backend")]
    #[diagnostic(code(shelter::send_failed))]
    SendFailed {
        mode: Mode,
        #[source]
        source: LinkError,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error")]
    #[diagnostic(
        code(shelter::config),
        help("Run `shelter config path` to locate the file, or `shelter config init` to create one.")
    )]
    Config(#[from] ConfigError),

    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(shelter::validation))]
    Validation { field: String, reason: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Disconnected => exit_code::CONNECTION,
            Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::SendFailed { .. } => exit_code::GENERAL,
        }
    }
}
