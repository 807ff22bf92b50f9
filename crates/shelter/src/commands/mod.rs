//! Command handlers.

pub mod config_cmd;
pub mod send;
pub mod watch;

use shelter_link::LinkSession;

use crate::config::Context;
use crate::error::CliError;

/// Build a session from config and connect it to the configured backend.
pub(crate) async fn connect(ctx: &Context) -> Result<LinkSession, CliError> {
    let session = LinkSession::with_options(ctx.config.link_options());
    let backend = &ctx.config.backend;

    session
        .open(&backend.host, backend.port)
        .await
        .map_err(|source| CliError::ConnectionFailed {
            addr: ctx.addr(),
            source,
        })?;
    Ok(session)
}
