//! `shelter watch` / `shelter console`: the display loop.
//!
//! Polls the session once per frame and redraws only when the latest
//! status changed. In console mode, stdin lines are parsed as mode
//! commands and forwarded to the backend.

use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use shelter_link::{LinkSession, Mode};

use crate::cli::WatchArgs;
use crate::config::Context;
use crate::error::CliError;
use crate::output::render_dashboard;

type InputLines = Lines<BufReader<Stdin>>;

enum Input {
    Command(Mode),
    Quit,
    Unknown(String),
    Blank,
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" => Input::Blank,
        "q" | "quit" | "exit" => Input::Quit,
        other => Mode::from_str(other).map_or_else(|_| Input::Unknown(other.to_owned()), Input::Command),
    }
}

pub async fn handle(args: WatchArgs, ctx: &Context, interactive: bool) -> Result<(), CliError> {
    let interval = args.interval_ms.map_or_else(|| ctx.config.frame_interval(), Duration::from_millis);
    if interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval-ms".into(),
            reason: "must be at least 1".into(),
        });
    }

    let session = super::connect(ctx).await?;
    if interactive {
        eprintln!("Connected to {}. Commands: n, r, g, o (or normal, radiation, gas, oxygen); q quits.", ctx.addr());
    }

    let result = run_frames(&session, ctx, interval, args.once, interactive).await;
    session.close().await;
    result
}

async fn run_frames(
    session: &LinkSession,
    ctx: &Context,
    interval: Duration,
    once: bool,
    interactive: bool,
) -> Result<(), CliError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut link = session.state_changes();
    // The backend may already have hung up before we subscribed.
    link.mark_changed();
    let mut input: Option<InputLines> =
        interactive.then(|| BufReader::new(tokio::io::stdin()).lines());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut shown_generation = None;
    let mut last_sent = Mode::Normal;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {
                let generation = session.state_generation();
                if shown_generation == Some(generation) {
                    continue;
                }
                shown_generation = Some(generation);

                let latest = session.latest_state();
                println!("{}\n", render_dashboard(latest.as_deref(), session.state(), last_sent, ctx.color));
                if once && latest.is_some() {
                    return Ok(());
                }
            }
            changed = link.changed() => {
                if changed.is_err() || !link.borrow_and_update().is_connected() {
                    let latest = session.latest_state();
                    println!("{}\n", render_dashboard(latest.as_deref(), session.state(), last_sent, ctx.color));
                    return Err(CliError::Disconnected);
                }
            }
            line = next_line(&mut input) => {
                match line {
                    Ok(Some(line)) => match parse_input(&line) {
                        Input::Command(mode) => {
                            // Warnings are logged by the session; keep the console running.
                            if session.send_command(mode).await.is_ok() {
                                last_sent = mode;
                                eprintln!("sent {} ({})", mode.code(), mode.label());
                            }
                        }
                        Input::Quit => return Ok(()),
                        Input::Unknown(other) => eprintln!("unknown command '{other}' (use n, r, g, o or q)"),
                        Input::Blank => {}
                    },
                    Ok(None) => {
                        debug!("stdin closed, continuing without command input");
                        input = None;
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to read stdin, disabling command input");
                        input = None;
                    }
                }
            }
        }
    }
}

/// Next stdin line, or never if input is disabled.
async fn next_line(input: &mut Option<InputLines>) -> std::io::Result<Option<String>> {
    match input {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_names_and_quit() {
        assert!(matches!(parse_input("r"), Input::Command(Mode::Radiation)));
        assert!(matches!(parse_input("  oxygen \n"), Input::Command(Mode::OxygenLow)));
        assert!(matches!(parse_input("GAS"), Input::Command(Mode::Gas)));
        assert!(matches!(parse_input("q"), Input::Quit));
        assert!(matches!(parse_input(""), Input::Blank));
        assert!(matches!(parse_input("x"), Input::Unknown(s) if s == "x"));
    }
}
