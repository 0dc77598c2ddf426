//! Core types and logic for pomobar.
//!
//! This crate holds everything about the Pomodoro timer that does not touch
//! a socket or a clock: the state machine, the text protocol and reply
//! rendering. The daemon wraps a [`timer::Timer`] in a lock and drives it from
//! a once-per-second ticker and from client requests.
//!
//! # Modules
//!
//! - [`timer`]: five-phase state machine and its counters
//! - [`protocol`]: request parsing and command application
//! - [`format`]: interactive and widget (JSON) reply rendering
//! - [`error`]: command rejection errors
//!
//! # Phases
//!
//! | Phase | Counts down | Next on expiry |
//! |-------|-------------|----------------|
//! | **Idle** | no | - |
//! | **Work** | yes | Short Break, or Long Break every Nth cycle |
//! | **Short Break** | yes | Work (cycle completed) |
//! | **Long Break** | yes | Work (cycle completed) |
//! | **Paused** | no | phase before pause, on resume |

pub mod error;
pub mod format;
pub mod protocol;
pub mod timer;
