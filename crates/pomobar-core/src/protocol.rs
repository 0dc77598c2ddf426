//! Plain-text request protocol between the client and the daemon.
//!
//! A request is a single command token, optionally prefixed with
//! `non-interactive/` to ask for widget-friendly JSON output. Anything after
//! the first whitespace or line terminator is ignored.

use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;
use crate::timer::{PauseOutcome, StartOutcome, Timer, TimerSnapshot};

/// Prefix marking a request as non-interactive.
pub const NON_INTERACTIVE_PREFIX: &str = "non-interactive/";

/// Size of one request read. A request must fit in a single buffer.
pub const MAX_REQUEST_SIZE: usize = 512;

/// Commands the daemon understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Reset,
    Status,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Start,
        Command::Pause,
        Command::Resume,
        Command::Reset,
        Command::Status,
    ];

    /// Wire token for this command.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Reset => "reset",
            Command::Status => "status",
        }
    }

    /// Apply this command to the timer.
    ///
    /// Callers hold the timer lock for the duration of this call only;
    /// `Status` copies a snapshot so rendering can happen after unlocking.
    pub fn apply(self, timer: &mut Timer) -> Reply {
        match self {
            Command::Start => match timer.start() {
                StartOutcome::Started => Reply::Info("pomodoro started"),
                StartOutcome::AlreadyRunning => Reply::Info("pomodoro already running"),
            },
            Command::Pause => match timer.pause() {
                PauseOutcome::StartedFromIdle => {
                    Reply::Info("pomodoro started because it wasn't running")
                }
                PauseOutcome::Paused => Reply::Info("pomodoro paused"),
                PauseOutcome::Resumed => Reply::Info("pomodoro resumed from pause"),
            },
            Command::Resume => match timer.resume() {
                Ok(_) => Reply::Info("pomodoro resumed"),
                Err(e) => Reply::Error(e),
            },
            Command::Reset => {
                timer.reset();
                Reply::Info("pomodoro reset")
            }
            Command::Status => Reply::Status(timer.snapshot()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| CommandError::invalid_command(s))
    }
}

/// How a reply should be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text tagged with the server name.
    #[default]
    Interactive,
    /// One JSON line for status-bar widgets.
    NonInteractive,
}

/// A parsed request. The output mode is known even when the command is not,
/// so rejections are rendered in the shape the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub mode: OutputMode,
    pub command: Result<Command, CommandError>,
}

impl Request {
    pub fn parse(raw: &str) -> Self {
        let Some(token) = raw.split_whitespace().next() else {
            return Self {
                mode: OutputMode::Interactive,
                command: Err(CommandError::EmptyCommand),
            };
        };

        let (mode, token) = match token.strip_prefix(NON_INTERACTIVE_PREFIX) {
            Some(rest) => (OutputMode::NonInteractive, rest),
            None => (OutputMode::Interactive, token),
        };

        let command = if token.is_empty() {
            Err(CommandError::EmptyCommand)
        } else {
            token.parse()
        };

        Self { mode, command }
    }
}

/// Encode a raw command for the wire.
pub fn encode_request(command: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::Interactive => format!("{}\n", command),
        OutputMode::NonInteractive => format!("{}{}\n", NON_INTERACTIVE_PREFIX, command),
    }
}

/// The daemon's answer to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Info(&'static str),
    Error(CommandError),
    Status(TimerSnapshot),
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Render the reply as it is written back on the socket.
    pub fn render(&self, mode: OutputMode) -> String {
        crate::format::render(self, mode)
    }
}
