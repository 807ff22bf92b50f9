//! `shelter send <mode>`: one command, then disconnect.

use crate::cli::SendArgs;
use crate::config::Context;
use crate::error::CliError;

pub async fn handle(args: SendArgs, ctx: &Context) -> Result<(), CliError> {
    let mode = args.mode;
    let session = super::connect(ctx).await?;

    let sent = session.send_command(mode).await;
    session.close().await;
    sent.map_err(|source| CliError::SendFailed { mode, source })?;

    eprintln!("Sent '{}' ({}) to {}", mode.code(), mode.label(), ctx.addr());
    Ok(())
}
