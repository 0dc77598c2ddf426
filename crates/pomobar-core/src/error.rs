//! Command rejection errors.
//!
//! None of these are fatal to the daemon. They are rendered back to the
//! client as `error: <message>` and leave the timer untouched.

use thiserror::Error;

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The first token is not a known command.
    #[error("invalid command ({0})")]
    InvalidCommand(String),

    /// The request held no command token at all.
    #[error("invalid command")]
    EmptyCommand,

    /// `resume` was sent while the timer was not paused.
    #[error("pomodoro not paused")]
    NotPaused,

    /// The request filled the whole read buffer without a line terminator.
    #[error("request too large (limit {limit} bytes)")]
    RequestTooLarge { limit: usize },
}

impl CommandError {
    pub fn invalid_command(token: impl Into<String>) -> Self {
        Self::InvalidCommand(token.into())
    }
}
