//! Dashboard rendering for the console.

use std::fmt::Write as _;

use owo_colors::OwoColorize;

use shelter_link::{ConnectionState, Mode, StatusRecord};

/// Shown before the backend has reported anything, or when it sends blanks.
pub const IDLE_ALERT: &str = "SYSTEM NORMAL";
pub const IDLE_ACTION: &str = "MONITORING";

/// Render one dashboard frame.
///
/// `fallback_mode` colors the status line when the record carries no
/// recognised mode (typically the last command this console sent).
pub fn render_dashboard(
    status: Option<&StatusRecord>,
    link: ConnectionState,
    fallback_mode: Mode,
    color: bool,
) -> String {
    let mode = status
        .and_then(StatusRecord::mode)
        .and_then(|code| code.known())
        .unwrap_or(fallback_mode);
    let mode_text = status.and_then(StatusRecord::mode).map_or_else(
        || format!("{} ({})", mode.code(), mode.label()),
        |code| match code.known() {
            Some(known) => format!("{} ({})", known.code(), known.label()),
            None => format!("{code} (unrecognized)"),
        },
    );

    let alert = status
        .map(StatusRecord::alert_message)
        .filter(|s| !s.is_empty())
        .unwrap_or(IDLE_ALERT);
    let action = status
        .map(StatusRecord::action_plan)
        .filter(|s| !s.is_empty())
        .unwrap_or(IDLE_ACTION);
    let water = status
        .and_then(StatusRecord::predicted_water_usage)
        .unwrap_or(0.0);

    let mut out = String::new();
    let _ = writeln!(out, "=== SHELTER OS ===");
    let _ = writeln!(out, "LINK:    {}", link_label(link));
    let _ = writeln!(out, "MODE:    {mode_text}");
    let _ = writeln!(out, "STATUS:  {}", paint(alert, mode, color));
    let _ = writeln!(out, "ACTION:  {action}");
    match status {
        Some(record) => {
            let s = record.sensors();
            let _ = writeln!(
                out,
                "SENSORS: radiation {:.1} | toxic gas {:.1} | co2 {:.1} | oxygen {:.1}",
                s.radiation, s.toxic_gas, s.co2, s.oxygen
            );
        }
        None => {
            let _ = writeln!(out, "SENSORS: waiting for backend");
        }
    }
    let _ = writeln!(out, "[AI PREDICTION]");
    let _ = write!(out, "Water Usage (24h): {water} L");
    out
}

fn link_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
        ConnectionState::Failed => "failed",
    }
}

fn paint(text: &str, mode: Mode, color: bool) -> String {
    if !color {
        return text.to_owned();
    }
    match mode {
        Mode::Normal => text.green().to_string(),
        Mode::Radiation => text.red().to_string(),
        Mode::Gas => text.truecolor(255, 165, 0).to_string(),
        Mode::OxygenLow => text.yellow().to_string(),
    }
}
