//! pomobar CLI and daemon entry point.

mod args;
mod daemon;

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use pomobar_core::protocol::OutputMode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use crate::args::{Cli, Commands, DaemonArgs};
use crate::daemon::{client, DaemonClient, DaemonServer};

/// Prompt shown by the interactive loop.
const CLIENT_PROMPT: &str = "pomobar client> ";

fn main() {
    let cli = Cli::parse();

    // Daemon logs at info; the client stays quiet so stdout is just replies
    let default_level = match cli.command {
        Some(Commands::Daemon(_)) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    let result = match cli.command {
        Some(Commands::Daemon(args)) => {
            run_daemon(args);
            return;
        }
        Some(command) => run_client_command(command),
        None => run_interactive(),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Send a single command non-interactively and print the reply.
fn run_client_command(command: Commands) -> anyhow::Result<()> {
    let Some(token) = command.request_token() else {
        return Ok(());
    };

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let mut client = DaemonClient::connect().await?;
        let reply = client.request(token, OutputMode::NonInteractive).await?;
        print!("{}", reply);
        std::io::stdout().flush()?;
        Ok(())
    })
}

/// Read commands from stdin until `exit` or end of input.
fn run_interactive() -> anyhow::Result<()> {
    let mode = client::mode_from_env();
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let mut client = DaemonClient::connect().await?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = std::io::stdout();

        loop {
            if mode == OutputMode::Interactive {
                print!("{}", CLIENT_PROMPT);
                stdout.flush()?;
            }

            let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" {
                break;
            }

            let reply = client.request(line, mode).await?;
            print!("{}", reply);
            stdout.flush()?;
        }

        Ok(())
    })
}

/// Run the daemon server with graceful signal handling.
///
/// Handles SIGINT (Ctrl+C) and SIGTERM for clean shutdown.
/// The DaemonServer's Drop impl cleans up socket and PID files.
fn run_daemon(args: DaemonArgs) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let config = args.to_timer_config();

    runtime.block_on(async {
        let server = match DaemonServer::bind(config).await {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to start daemon: {:#}", e);
                std::process::exit(1);
            }
        };
        info!(
            "Timer: work {}s, short break {}s, long break {}s, long break every {} cycles",
            config.work_secs,
            config.short_break_secs,
            config.long_break_secs,
            config.cycles_before_long_break
        );

        let shutdown = server.shutdown_handle();
        let run = server.run();
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => {
                if let Err(e) = result {
                    error!("Daemon error: {:#}", e);
                    std::process::exit(1);
                }
                return;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down gracefully");
            }
            _ = sigterm() => {
                info!("Received SIGTERM, shutting down gracefully");
            }
        }

        shutdown.notify_waiters();
        if let Err(e) = run.await {
            error!("Daemon error during shutdown: {:#}", e);
        }
        info!("Removing {:?}", server.socket_path());
        // Server is dropped here, triggering cleanup of socket and PID files
    });
}

/// Wait for SIGTERM signal.
///
/// If signal registration fails, logs a warning and waits indefinitely.
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(
                "Failed to register SIGTERM handler: {}, daemon will only respond to SIGINT",
                e
            );
            std::future::pending::<()>().await;
        }
    }
}
