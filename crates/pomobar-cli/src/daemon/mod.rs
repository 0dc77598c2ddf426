//! Daemon process for the Pomodoro timer.

pub mod client;
pub mod paths;
pub mod server;
pub mod session;
pub mod ticker;

// Public API - used by main.rs
pub use client::DaemonClient;
pub use server::DaemonServer;
