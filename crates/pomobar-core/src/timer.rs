//! Pomodoro timer state machine.
//!
//! The timer moves between five phases: `Idle`, `Work`, `Short Break`,
//! `Long Break` and `Paused`. Running phases count down once per tick and
//! roll over to the next phase when they reach zero:
//!
//! ```text
//! Idle --start--> Work --expire--> Short Break --expire--> Work (cycles += 1)
//!                  |                                        ^
//!                  +--expire (every Nth cycle)--> Long Break+
//! ```
//!
//! `Paused` remembers which running phase it interrupted, so the phase
//! before pause can only be read while the timer is actually paused.

use std::fmt;

use crate::error::CommandError;

/// Default work phase length in seconds (25 minutes).
pub const DEFAULT_WORK_SECS: u32 = 1500;

/// Default short break length in seconds (5 minutes).
pub const DEFAULT_SHORT_BREAK_SECS: u32 = 300;

/// Default long break length in seconds (15 minutes).
pub const DEFAULT_LONG_BREAK_SECS: u32 = 900;

/// Default number of completed cycles between long breaks.
pub const DEFAULT_CYCLES_BEFORE_LONG_BREAK: u32 = 4;

/// Phase lengths and the long-break threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub work_secs: u32,
    pub short_break_secs: u32,
    pub long_break_secs: u32,
    pub cycles_before_long_break: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_secs: DEFAULT_WORK_SECS,
            short_break_secs: DEFAULT_SHORT_BREAK_SECS,
            long_break_secs: DEFAULT_LONG_BREAK_SECS,
            cycles_before_long_break: DEFAULT_CYCLES_BEFORE_LONG_BREAK,
        }
    }
}

impl TimerConfig {
    /// Full length of a running phase.
    pub fn duration_of(&self, interval: Interval) -> u32 {
        match interval {
            Interval::Work => self.work_secs,
            Interval::ShortBreak => self.short_break_secs,
            Interval::LongBreak => self.long_break_secs,
        }
    }
}

/// A phase that counts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Work,
    ShortBreak,
    LongBreak,
}

impl Interval {
    pub fn label(self) -> &'static str {
        match self {
            Interval::Work => "Work",
            Interval::ShortBreak => "Short Break",
            Interval::LongBreak => "Long Break",
        }
    }

    pub fn is_break(self) -> bool {
        matches!(self, Interval::ShortBreak | Interval::LongBreak)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Current phase of the timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    /// Counting down.
    Running(Interval),
    /// Stopped mid-phase; holds the phase to return to.
    Paused(Interval),
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Running(interval) => interval.label(),
            Phase::Paused(_) => "Paused",
        }
    }

    /// The running phase this one counts against, if any.
    ///
    /// For `Paused` this is the phase before pause.
    pub fn interval(self) -> Option<Interval> {
        match self {
            Phase::Idle => None,
            Phase::Running(interval) | Phase::Paused(interval) => Some(interval),
        }
    }

    pub fn is_idle(self) -> bool {
        self == Phase::Idle
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a `start` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Result of a `pause` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    /// Pausing an idle timer starts a work phase instead.
    StartedFromIdle,
    Paused,
    /// Pausing a paused timer resumes it.
    Resumed,
}

/// A phase change caused by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Interval,
    pub to: Interval,
    pub completed_cycles: u32,
}

/// A consistent copy of the timer, taken under the lock and rendered
/// after it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub completed_cycles: u32,
    pub remaining_secs: u32,
    pub config: TimerConfig,
}

impl TimerSnapshot {
    /// Full length of the phase the snapshot counts against.
    pub fn duration_secs(&self) -> Option<u32> {
        self.phase
            .interval()
            .map(|interval| self.config.duration_of(interval))
    }
}

/// The shared Pomodoro timer.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    config: TimerConfig,
    phase: Phase,
    completed_cycles: u32,
    remaining_secs: u32,
}

impl Timer {
    /// Create an idle timer.
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            completed_cycles: self.completed_cycles,
            remaining_secs: self.remaining_secs,
            config: self.config,
        }
    }

    /// Start a work phase if idle. Never touches a running timer.
    pub fn start(&mut self) -> StartOutcome {
        if self.phase.is_idle() {
            self.enter(Interval::Work);
            StartOutcome::Started
        } else {
            StartOutcome::AlreadyRunning
        }
    }

    /// Toggle pause.
    pub fn pause(&mut self) -> PauseOutcome {
        match self.phase {
            Phase::Idle => {
                self.enter(Interval::Work);
                PauseOutcome::StartedFromIdle
            }
            Phase::Paused(before) => {
                self.phase = Phase::Running(before);
                PauseOutcome::Resumed
            }
            Phase::Running(current) => {
                self.phase = Phase::Paused(current);
                PauseOutcome::Paused
            }
        }
    }

    /// Resume a paused timer, returning the restored phase.
    pub fn resume(&mut self) -> Result<Interval, CommandError> {
        match self.phase {
            Phase::Paused(before) => {
                self.phase = Phase::Running(before);
                Ok(before)
            }
            _ => Err(CommandError::NotPaused),
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.completed_cycles = 0;
        self.remaining_secs = 0;
    }

    /// Advance one second. Returns the phase change if the running phase
    /// expired on this tick; idle and paused timers are left alone.
    pub fn tick(&mut self) -> Option<Transition> {
        let Phase::Running(current) = self.phase else {
            return None;
        };

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return None;
        }

        let next = match current {
            Interval::Work if self.long_break_due() => Interval::LongBreak,
            Interval::Work => Interval::ShortBreak,
            Interval::ShortBreak | Interval::LongBreak => {
                self.completed_cycles = self.completed_cycles.saturating_add(1);
                Interval::Work
            }
        };
        self.enter(next);

        Some(Transition {
            from: current,
            to: next,
            completed_cycles: self.completed_cycles,
        })
    }

    fn long_break_due(&self) -> bool {
        self.completed_cycles > 0
            && self
                .completed_cycles
                .checked_rem(self.config.cycles_before_long_break)
                == Some(0)
    }

    fn enter(&mut self, interval: Interval) {
        self.phase = Phase::Running(interval);
        self.remaining_secs = self.config.duration_of(interval);
    }
}
