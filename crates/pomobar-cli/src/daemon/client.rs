//! Client for connecting to the daemon process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use pomobar_core::protocol::{encode_request, OutputMode};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

use crate::daemon::paths;

/// How long to wait for a reply before giving up.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest reply read back in one go.
const REPLY_BUFFER_SIZE: usize = 4096;

/// Environment variable that switches the interactive loop to widget output.
pub const NON_INTERACTIVE_ENV: &str = "NON_INTERACTIVE";

/// Failures to reach the daemon at all.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to {path:?} - is the daemon running? (start it with 'pomobar daemon')")]
    DaemonNotRunning {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Client for communicating with the daemon.
pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    /// Connect to the calling user's daemon.
    pub async fn connect() -> Result<Self> {
        Self::connect_to(&paths::get_socket_path()).await
    }

    /// Connect to a daemon listening on a specific socket path.
    pub async fn connect_to(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| ClientError::DaemonNotRunning {
                path: socket_path.to_path_buf(),
                source,
            })?;
        debug!("Connected to daemon at {:?}", socket_path);
        Ok(Self { stream })
    }

    /// Send one command and return the daemon's reply verbatim.
    pub async fn request(&mut self, command: &str, mode: OutputMode) -> Result<String> {
        let request = encode_request(command, mode);
        debug!("Sending: {}", request.trim_end());

        self.stream
            .write_all(request.as_bytes())
            .await
            .context("Failed to write request")?;
        self.stream.flush().await.context("Failed to flush")?;

        let mut buf = vec![0u8; REPLY_BUFFER_SIZE];
        let n = timeout(REPLY_TIMEOUT, self.stream.read(&mut buf))
            .await
            .context("Request timed out")?
            .context("Failed to read reply")?;

        if n == 0 {
            bail!("Daemon closed connection unexpectedly");
        }

        let reply = String::from_utf8_lossy(&buf[..n]).into_owned();
        debug!("Received: {}", reply.trim_end());
        Ok(reply)
    }
}

/// Output mode requested through `NON_INTERACTIVE`.
pub fn mode_from_env() -> OutputMode {
    mode_from_value(std::env::var(NON_INTERACTIVE_ENV).ok().as_deref())
}

/// Any non-zero integer selects non-interactive output.
fn mode_from_value(value: Option<&str>) -> OutputMode {
    match value.map(|v| v.trim().parse::<i64>()) {
        Some(Ok(n)) if n != 0 => OutputMode::NonInteractive,
        _ => OutputMode::Interactive,
    }
}
