//! CLI argument parsing with clap derive macros.

use clap::{Args, Parser, Subcommand};
use pomobar_core::timer::{
    TimerConfig, DEFAULT_CYCLES_BEFORE_LONG_BREAK, DEFAULT_LONG_BREAK_SECS,
    DEFAULT_SHORT_BREAK_SECS, DEFAULT_WORK_SECS,
};

/// Pomodoro timer daemon and client for status bars.
///
/// Run `pomobar daemon` once per session, then drive it with the
/// subcommands below. Without a subcommand, pomobar reads commands
/// interactively from stdin.
#[derive(Debug, Parser)]
#[command(
    name = "pomobar",
    version,
    after_help = "\
Examples:
  pomobar daemon &                      # Start the timer daemon
  pomobar start                         # Begin a work interval
  pomobar status                        # One JSON line for a status bar
  pomobar                               # Interactive prompt

Environment:
  POMOBAR_SOCKET_DIR   Directory holding pomobar.sock
  NON_INTERACTIVE      Non-zero integer disables the interactive prompt"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a work interval (no-op if already running)
    Start,

    /// Pause the running interval, or start one when idle
    Pause,

    /// Resume a paused interval
    Resume,

    /// Stop the timer and clear the cycle count
    Reset,

    /// Print the current state as a status bar line
    Status,

    /// Run the timer daemon in the foreground
    #[command(after_help = "\
Examples:
  pomobar daemon                        # Classic 25/5/15 minute cycle
  pomobar daemon --work 3000            # 50 minute work intervals
  RUST_LOG=debug pomobar daemon         # Verbose logging")]
    Daemon(DaemonArgs),

    /// Anything else is forwarded to the daemon as-is
    #[command(external_subcommand)]
    Raw(Vec<String>),
}

impl Commands {
    /// The command word sent to the daemon, if this is a client command.
    pub fn request_token(&self) -> Option<&str> {
        match self {
            Commands::Start => Some("start"),
            Commands::Pause => Some("pause"),
            Commands::Resume => Some("resume"),
            Commands::Reset => Some("reset"),
            Commands::Status => Some("status"),
            Commands::Raw(tokens) => tokens.first().map(String::as_str),
            Commands::Daemon(_) => None,
        }
    }
}

#[derive(Debug, Args)]
pub struct DaemonArgs {
    /// Work interval length in seconds
    #[arg(long, default_value_t = DEFAULT_WORK_SECS, value_parser = clap::value_parser!(u32).range(1..))]
    pub work: u32,

    /// Short break length in seconds
    #[arg(long, default_value_t = DEFAULT_SHORT_BREAK_SECS, value_parser = clap::value_parser!(u32).range(1..))]
    pub short_break: u32,

    /// Long break length in seconds
    #[arg(long, default_value_t = DEFAULT_LONG_BREAK_SECS, value_parser = clap::value_parser!(u32).range(1..))]
    pub long_break: u32,

    /// Completed work intervals between long breaks
    #[arg(long, default_value_t = DEFAULT_CYCLES_BEFORE_LONG_BREAK, value_parser = clap::value_parser!(u32).range(1..))]
    pub cycles_before_long_break: u32,
}

impl DaemonArgs {
    pub fn to_timer_config(&self) -> TimerConfig {
        TimerConfig {
            work_secs: self.work,
            short_break_secs: self.short_break,
            long_break_secs: self.long_break,
            cycles_before_long_break: self.cycles_before_long_break,
        }
    }
}
