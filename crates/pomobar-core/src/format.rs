//! Reply rendering.
//!
//! Interactive replies are tagged text meant for a terminal. Non-interactive
//! replies are a single JSON object with `text` (and for status, `alt` and
//! `tooltip`) so they can be fed straight into a status-bar custom module.

use std::fmt;

use serde::Serialize;

use crate::protocol::{OutputMode, Reply};
use crate::timer::{Interval, Phase, TimerSnapshot};

/// Tag prepended to every interactive reply.
pub const SERVER_TAG: &str = "pomobar server> ";

/// Label shown in place of a progress clock while idle.
const IDLE_TEXT: &str = "Pomobar";

/// Format seconds as zero-padded `mm:ss`.
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Icon for a phase.
pub fn phase_icon(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "⏹",
        Phase::Running(Interval::Work) => "🍅",
        Phase::Running(Interval::ShortBreak) => "☕",
        Phase::Running(Interval::LongBreak) => "🌴",
        Phase::Paused(_) => "⏸",
    }
}

/// `remaining/duration` as `mm:ss/mm:ss`, or `None` while idle.
pub fn progress(snapshot: &TimerSnapshot) -> Option<String> {
    snapshot.duration_secs().map(|duration| {
        format!(
            "{}/{}",
            format_clock(snapshot.remaining_secs),
            format_clock(duration)
        )
    })
}

/// One line of widget output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetLine {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

impl WidgetLine {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            alt: None,
            tooltip: None,
        }
    }

    pub fn status(snapshot: &TimerSnapshot) -> Self {
        let icon = phase_icon(snapshot.phase);
        let text = match progress(snapshot) {
            Some(progress) => format!("{} {}", icon, progress),
            None => format!("{} {}", icon, IDLE_TEXT),
        };
        Self {
            text,
            alt: Some(snapshot.phase.label().to_string()),
            tooltip: Some(status_tooltip(snapshot)),
        }
    }
}

impl fmt::Display for WidgetLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Render a reply in the requested shape. The result always ends in a newline.
pub fn render(reply: &Reply, mode: OutputMode) -> String {
    match (reply, mode) {
        (Reply::Info(message), OutputMode::Interactive) => {
            format!("{}info: {}\n", SERVER_TAG, message)
        }
        (Reply::Error(err), OutputMode::Interactive) => {
            format!("{}error: {}\n", SERVER_TAG, err)
        }
        (Reply::Status(snapshot), OutputMode::Interactive) => {
            format!("{}{}", SERVER_TAG, status_report(snapshot))
        }
        (Reply::Info(message), OutputMode::NonInteractive) => {
            format!("{}\n", WidgetLine::text(format!("info: {}", message)))
        }
        (Reply::Error(err), OutputMode::NonInteractive) => {
            format!("{}\n", WidgetLine::text(format!("error: {}", err)))
        }
        (Reply::Status(snapshot), OutputMode::NonInteractive) => {
            format!("{}\n", WidgetLine::status(snapshot))
        }
    }
}

fn phase_description(phase: Phase) -> String {
    match phase {
        Phase::Paused(before) => format!("{} ({})", phase.label(), before.label()),
        _ => phase.label().to_string(),
    }
}

/// Multi-line status block for terminals.
fn status_report(snapshot: &TimerSnapshot) -> String {
    let config = &snapshot.config;
    let mut out = format!("info: state: {}\n", phase_description(snapshot.phase));
    if let Some(progress) = progress(snapshot) {
        out.push_str(&format!("remaining time: {}\n", progress));
    }
    out.push_str(&format!("pomodoro count: {}\n", snapshot.completed_cycles));
    out.push('\n');
    out.push_str(&format!(
        "targeted pomodoro count: {}\n",
        config.cycles_before_long_break
    ));
    out.push_str(&format!(
        "targeted work duration: {}\n",
        format_clock(config.work_secs)
    ));
    out.push_str(&format!(
        "targeted short break duration: {}\n",
        format_clock(config.short_break_secs)
    ));
    out.push_str(&format!(
        "targeted long break duration: {}\n",
        format_clock(config.long_break_secs)
    ));
    out
}

fn status_tooltip(snapshot: &TimerSnapshot) -> String {
    let config = &snapshot.config;
    let mut lines = vec![format!("Status: {}", phase_description(snapshot.phase))];
    if !snapshot.phase.is_idle() {
        lines.push(format!(
            "Remaining time: {}",
            format_clock(snapshot.remaining_secs)
        ));
    }
    lines.push(format!("Pomodoro count: {}", snapshot.completed_cycles));
    lines.push(String::new());
    lines.push(format!(
        "Targeted pomodoro count: {}",
        config.cycles_before_long_break
    ));
    lines.push(format!(
        "Targeted work duration: {}",
        format_clock(config.work_secs)
    ));
    lines.push(format!(
        "Targeted short break duration: {}",
        format_clock(config.short_break_secs)
    ));
    lines.push(format!(
        "Targeted long break duration: {}",
        format_clock(config.long_break_secs)
    ));
    lines.join("\n")
}
