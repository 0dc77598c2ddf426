//! Unix socket server for the daemon process.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pomobar_core::error::CommandError;
use pomobar_core::protocol::{Reply, Request, MAX_REQUEST_SIZE};
use pomobar_core::timer::TimerConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::daemon::paths;
use crate::daemon::session::SharedTimer;
use crate::daemon::ticker;

/// Maximum number of concurrent client connections to prevent resource exhaustion.
const MAX_CONNECTIONS: usize = 100;

/// How long to wait for in-flight connections to complete during shutdown.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The daemon server that listens for client connections.
pub struct DaemonServer {
    listener: UnixListener,
    socket_path: PathBuf,
    pid_path: PathBuf,
    timer: SharedTimer,
    /// Semaphore to limit concurrent connections.
    connection_semaphore: Arc<Semaphore>,
    /// Shutdown signal for the accept loop and the ticker.
    shutdown: Arc<Notify>,
}

impl DaemonServer {
    /// Create a new daemon server bound to the calling user's socket path.
    pub async fn bind(config: TimerConfig) -> Result<Self> {
        let socket_path = paths::get_socket_path();
        let pid_path = paths::pid_path_for(&socket_path);
        Self::bind_to(socket_path, pid_path, config).await
    }

    /// Create a new daemon server bound to a specific socket path.
    ///
    /// Uses a bind-first approach to avoid TOCTOU race conditions:
    /// 1. Try to bind directly
    /// 2. If socket in use, check PID file to see if daemon is alive
    /// 3. If daemon dead, remove stale socket and retry
    /// 4. If daemon alive, return error
    pub async fn bind_to(
        socket_path: PathBuf,
        pid_path: PathBuf,
        config: TimerConfig,
    ) -> Result<Self> {
        paths::ensure_parent_dir(&socket_path).with_context(|| {
            format!("Failed to create socket directory for {:?}", socket_path)
        })?;

        // Written right after bind so a live daemon is never seen without a PID file.
        let write_pid = |pid_path: &PathBuf| -> Result<()> {
            std::fs::write(pid_path, std::process::id().to_string())
                .with_context(|| format!("Failed to write PID file: {:?}", pid_path))
        };

        let listener = match UnixListener::bind(&socket_path) {
            Ok(l) => {
                write_pid(&pid_path)?;
                l
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                if is_daemon_alive(&pid_path) {
                    anyhow::bail!(
                        "Daemon already running (socket {:?} in use, PID file valid)",
                        socket_path
                    );
                }

                // Don't follow symlinks (could delete unintended files)
                let metadata = std::fs::symlink_metadata(&socket_path)
                    .with_context(|| format!("Failed to stat socket path: {:?}", socket_path))?;

                if metadata.file_type().is_symlink() {
                    anyhow::bail!(
                        "Socket path {:?} is a symlink, refusing to delete for safety",
                        socket_path
                    );
                }

                #[cfg(unix)]
                {
                    use std::os::unix::fs::FileTypeExt;
                    if !metadata.file_type().is_socket() {
                        anyhow::bail!(
                            "Path {:?} exists but is not a socket file (type: {:?})",
                            socket_path,
                            metadata.file_type()
                        );
                    }
                }

                info!("Removing stale socket from dead daemon");
                std::fs::remove_file(&socket_path)
                    .with_context(|| format!("Failed to remove stale socket: {:?}", socket_path))?;

                let l = UnixListener::bind(&socket_path)
                    .with_context(|| format!("Failed to bind to socket: {:?}", socket_path))?;
                write_pid(&pid_path)?;
                l
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to bind to socket: {:?}", socket_path));
            }
        };

        info!("pomobar daemon listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path,
            pid_path,
            timer: SharedTimer::new(config),
            connection_semaphore: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Handle to the shared timer.
    #[cfg(test)]
    pub fn timer(&self) -> SharedTimer {
        self.timer.clone()
    }

    /// Handle used to stop [`DaemonServer::run`] from another task.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the server, accepting connections and handling requests.
    ///
    /// Starts the ticker, then accepts connections until shutdown is
    /// signaled. Each connection runs in its own task. On shutdown, waits for
    /// in-flight connections to complete (with timeout) and returns, allowing
    /// Drop to clean up socket/PID files.
    pub async fn run(&self) -> Result<()> {
        let stopped = self.shutdown.notified();
        tokio::pin!(stopped);

        let ticker = ticker::spawn(self.timer.clone(), self.shutdown.clone());

        // Track spawned connection handlers for graceful shutdown
        let mut connection_tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        "Connection limit ({}) reached, rejecting new connection",
                                        MAX_CONNECTIONS
                                    );
                                    drop(stream);
                                    continue;
                                }
                            };

                            debug!("Accepted new connection");
                            let timer = self.timer.clone();
                            connection_tasks.spawn(async move {
                                // Permit is held for the lifetime of the connection handler
                                let _permit = permit;
                                if let Err(e) = handle_connection(stream, timer).await {
                                    error!("Connection error: {:#}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                // Reap completed connection tasks to prevent unbounded growth
                Some(_) = connection_tasks.join_next(), if !connection_tasks.is_empty() => {}
                _ = &mut stopped => {
                    info!("Shutdown signal received, waiting for in-flight connections");
                    break;
                }
            }
        }

        if !connection_tasks.is_empty() {
            info!(
                "Waiting for {} in-flight connection(s) to complete",
                connection_tasks.len()
            );

            let shutdown_deadline = tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, async {
                while connection_tasks.join_next().await.is_some() {}
            })
            .await;

            if shutdown_deadline.is_err() {
                warn!(
                    "Graceful shutdown timed out after {:?}, aborting {} connection(s)",
                    GRACEFUL_SHUTDOWN_TIMEOUT,
                    connection_tasks.len()
                );
                connection_tasks.abort_all();
            }
        }

        let snapshot = self.timer.snapshot().await;
        info!(
            "Stopping in {} with {} cycles completed",
            snapshot.phase, snapshot.completed_cycles
        );

        ticker.abort();
        match ticker.await {
            Err(e) if !e.is_cancelled() => warn!("Ticker task ended abnormally: {}", e),
            _ => {}
        }

        Ok(())
    }
}

impl Drop for DaemonServer {
    fn drop(&mut self) {
        if self.socket_path.exists() && std::fs::remove_file(&self.socket_path).is_err() {
            warn!("Failed to remove socket on shutdown");
        }
        if self.pid_path.exists() && std::fs::remove_file(&self.pid_path).is_err() {
            warn!("Failed to remove PID file on shutdown");
        }
    }
}

/// Check if a daemon process is still alive by reading its PID file.
///
/// Returns true if:
/// - PID file exists and contains a valid PID
/// - AND that process is still running (verified via kill(pid, 0))
fn is_daemon_alive(pid_path: &Path) -> bool {
    let pid_str = match std::fs::read_to_string(pid_path) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let pid: i32 = match pid_str.trim().parse() {
        Ok(p) => p,
        Err(_) => return false,
    };

    // SAFETY: libc::kill with signal 0 is a POSIX-defined no-op that only checks
    // whether the process exists and the caller has permission to signal it.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Whether a read filled the whole buffer without finishing a line.
fn is_oversized(chunk: &[u8]) -> bool {
    chunk.len() >= MAX_REQUEST_SIZE && !chunk.iter().any(|&b| b == b'\n' || b == b'\r')
}

/// Offset just past the first line terminator in a chunk.
fn line_end(chunk: &[u8]) -> Option<usize> {
    chunk.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

/// Handle a single client connection.
///
/// Every read is one request and gets exactly one reply. The connection
/// stays open for further requests until the peer closes it.
///
/// After an oversized request is rejected, the rest of its line is dropped
/// without a reply, however many reads it takes to arrive.
async fn handle_connection(mut stream: UnixStream, timer: SharedTimer) -> Result<()> {
    let mut buf = vec![0u8; MAX_REQUEST_SIZE];
    let mut discarding = false;

    loop {
        let n = stream
            .read(&mut buf)
            .await
            .context("Failed to read from client")?;

        if n == 0 {
            debug!("Client disconnected");
            break;
        }
        debug!("Received: {} bytes", n);

        let mut chunk = &buf[..n];
        if discarding {
            let Some(end) = line_end(chunk) else {
                debug!("Discarding {} bytes of oversized request", n);
                continue;
            };
            discarding = false;
            chunk = &chunk[end..];
            if chunk.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
        }

        let raw = String::from_utf8_lossy(chunk);
        let reply = if is_oversized(chunk) {
            warn!("Rejecting request larger than {} bytes", MAX_REQUEST_SIZE);
            discarding = true;
            Reply::Error(CommandError::RequestTooLarge {
                limit: MAX_REQUEST_SIZE,
            })
            .render(Request::parse(&raw).mode)
        } else {
            timer.handle_request(&raw).await
        };

        stream
            .write_all(reply.as_bytes())
            .await
            .context("Failed to write reply")?;
        stream.flush().await.context("Failed to flush")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomobar_core::timer::{Interval, Phase};
    use tokio::time::timeout;
    use uuid::Uuid;

    /// Short socket path under /tmp (sun_path is limited to ~100 bytes).
    fn temp_socket_path(tag: &str) -> PathBuf {
        let short_id = Uuid::new_v4().simple().to_string();
        PathBuf::from("/tmp").join(format!("pomobar-{}-{}.sock", tag, &short_id[..8]))
    }

    async fn start_server(tag: &str) -> (PathBuf, SharedTimer, tokio::task::JoinHandle<()>) {
        let socket_path = temp_socket_path(tag);
        let pid_path = paths::pid_path_for(&socket_path);
        let server = DaemonServer::bind_to(socket_path.clone(), pid_path, TimerConfig::default())
            .await
            .expect("Failed to bind server");
        let timer = server.timer();

        let handle = tokio::spawn(async move {
            let _ = timeout(Duration::from_secs(5), server.run()).await;
        });

        (socket_path, timer, handle)
    }

    async fn send(stream: &mut UnixStream, request: &str) -> String {
        stream
            .write_all(request.as_bytes())
            .await
            .expect("Failed to write");
        let mut buf = vec![0u8; 4096];
        let n = timeout(Duration::from_secs(1), stream.read(&mut buf))
            .await
            .expect("Timeout reading reply")
            .expect("Failed to read");
        assert!(n > 0, "Should have received a reply");
        String::from_utf8(buf[..n].to_vec()).expect("reply is UTF-8")
    }

    #[tokio::test]
    async fn test_daemon_scenario_over_one_connection() {
        let (socket_path, timer, server_handle) = start_server("scenario").await;

        let mut stream = UnixStream::connect(&socket_path)
            .await
            .expect("Failed to connect");

        let reply = send(&mut stream, "start\n").await;
        assert_eq!(reply, "pomobar server> info: pomodoro started\n");
        let snapshot = timer.snapshot().await;
        assert_eq!(snapshot.phase, Phase::Running(Interval::Work));

        let reply = send(&mut stream, "non-interactive/status\n").await;
        let json: serde_json::Value =
            serde_json::from_str(reply.trim_end()).expect("status should be JSON");
        assert!(json["text"].as_str().is_some_and(|t| t.contains("/25:00")));
        assert_eq!(json["alt"], "Work");
        assert!(json["tooltip"].is_string());

        let reply = send(&mut stream, "pause\n").await;
        assert!(reply.contains("pomodoro paused"));

        let reply = send(&mut stream, "resume\n").await;
        assert!(reply.contains("pomodoro resumed"));
        assert_eq!(timer.snapshot().await.phase, Phase::Running(Interval::Work));

        server_handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    #[tokio::test]
    async fn test_request_without_newline_is_accepted() {
        let (socket_path, _timer, server_handle) = start_server("nonl").await;

        let mut stream = UnixStream::connect(&socket_path)
            .await
            .expect("Failed to connect");
        let reply = send(&mut stream, "non-interactive/start").await;
        assert_eq!(reply, "{\"text\":\"info: pomodoro started\"}\n");

        server_handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection_open() {
        let (socket_path, timer, server_handle) = start_server("unknown").await;

        let mut stream = UnixStream::connect(&socket_path)
            .await
            .expect("Failed to connect");
        let reply = send(&mut stream, "foo\n").await;
        assert_eq!(reply, "pomobar server> error: invalid command (foo)\n");
        assert_eq!(timer.snapshot().await.phase, Phase::Idle);

        let reply = send(&mut stream, "status\n").await;
        assert!(reply.starts_with("pomobar server> info: state: Idle"));

        server_handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    #[tokio::test]
    async fn test_oversized_request_fails_alone() {
        let (socket_path, timer, server_handle) = start_server("big").await;

        let mut stream = UnixStream::connect(&socket_path)
            .await
            .expect("Failed to connect");
        let huge = format!("{}\n", "a".repeat(MAX_REQUEST_SIZE + 100));
        let reply = send(&mut stream, &huge).await;
        assert!(reply.contains("error: request too large"));
        assert_eq!(timer.snapshot().await.phase, Phase::Idle);

        let reply = send(&mut stream, "start\n").await;
        assert_eq!(reply, "pomobar server> info: pomodoro started\n");

        server_handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    #[tokio::test]
    async fn test_oversized_request_split_across_writes_gets_one_reply() {
        let (socket_path, timer, server_handle) = start_server("split").await;

        let mut stream = UnixStream::connect(&socket_path)
            .await
            .expect("Failed to connect");
        let reply = send(&mut stream, &"a".repeat(MAX_REQUEST_SIZE)).await;
        assert_eq!(
            reply,
            "pomobar server> error: request too large (limit 512 bytes)\n"
        );

        // Tail of the same line arrives late
        tokio::time::sleep(Duration::from_millis(100)).await;
        stream.write_all(b"bbbb\n").await.expect("Failed to write");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let reply = send(&mut stream, "start\n").await;
        assert_eq!(reply, "pomobar server> info: pomodoro started\n");
        assert_eq!(timer.snapshot().await.phase, Phase::Running(Interval::Work));

        let mut buf = vec![0u8; 4096];
        let extra = timeout(Duration::from_millis(200), stream.read(&mut buf)).await;
        assert!(extra.is_err(), "no further reply expected");

        server_handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    #[tokio::test]
    async fn test_request_after_oversized_tail_in_same_chunk_is_served() {
        let (socket_path, _timer, server_handle) = start_server("tail").await;

        let mut stream = UnixStream::connect(&socket_path)
            .await
            .expect("Failed to connect");
        let reply = send(&mut stream, &"a".repeat(MAX_REQUEST_SIZE)).await;
        assert!(reply.contains("error: request too large"));

        let reply = send(&mut stream, "bbbb\nnon-interactive/start\n").await;
        assert_eq!(reply, "{\"text\":\"info: pomodoro started\"}\n");

        server_handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    #[tokio::test]
    async fn test_concurrent_clients_share_one_timer() {
        let (socket_path, timer, server_handle) = start_server("multi").await;

        let mut first = UnixStream::connect(&socket_path)
            .await
            .expect("Failed to connect");
        let mut second = UnixStream::connect(&socket_path)
            .await
            .expect("Failed to connect");

        let reply = send(&mut first, "start\n").await;
        assert!(reply.contains("pomodoro started"));
        let reply = send(&mut second, "start\n").await;
        assert!(reply.contains("already running"));

        let mut tasks = JoinSet::new();
        for _ in 0..10 {
            let socket_path = socket_path.clone();
            tasks.spawn(async move {
                let mut stream = UnixStream::connect(&socket_path)
                    .await
                    .expect("Failed to connect");
                send(&mut stream, "non-interactive/status\n").await
            });
        }
        while let Some(result) = tasks.join_next().await {
            let reply = result.expect("client task panicked");
            assert!(serde_json::from_str::<serde_json::Value>(reply.trim_end()).is_ok());
        }

        assert_eq!(timer.snapshot().await.phase, Phase::Running(Interval::Work));

        server_handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    #[tokio::test]
    async fn test_bind_to_creates_socket_parent_dir() {
        let short_id = Uuid::new_v4().simple().to_string();
        let base_dir =
            PathBuf::from("/tmp").join(format!("pomobar-custom-{}", &short_id[..8]));
        let socket_dir = base_dir.join("nested");
        let socket_path = socket_dir.join("pomobar.sock");
        let pid_path = paths::pid_path_for(&socket_path);

        let server =
            DaemonServer::bind_to(socket_path.clone(), pid_path.clone(), TimerConfig::default())
                .await
                .expect("Failed to bind server");

        assert!(socket_dir.exists());
        assert!(pid_path.exists());

        drop(server);
        assert!(!socket_path.exists(), "socket removed on drop");
        assert!(!pid_path.exists(), "PID file removed on drop");
        let _ = std::fs::remove_dir_all(&base_dir);
    }

    #[tokio::test]
    async fn test_bind_refuses_when_daemon_alive() {
        let socket_path = temp_socket_path("alive");
        let pid_path = paths::pid_path_for(&socket_path);

        let server =
            DaemonServer::bind_to(socket_path.clone(), pid_path.clone(), TimerConfig::default())
                .await
                .expect("Failed to bind server");

        // The PID file points at this test process, which is alive.
        let second =
            DaemonServer::bind_to(socket_path.clone(), pid_path.clone(), TimerConfig::default())
                .await;
        let err = second.err().expect("second bind should fail");
        assert!(err.to_string().contains("already running"));

        drop(server);
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let socket_path = temp_socket_path("stale");
        let pid_path = paths::pid_path_for(&socket_path);

        // Leave a socket file behind with no live owner.
        let stale = std::os::unix::net::UnixListener::bind(&socket_path).expect("bind stale");
        drop(stale);
        std::fs::write(&pid_path, "not-a-pid").expect("write PID file");

        let server =
            DaemonServer::bind_to(socket_path.clone(), pid_path.clone(), TimerConfig::default())
                .await
                .expect("stale socket should be replaced");

        let pid = std::fs::read_to_string(&pid_path).expect("read PID file");
        assert_eq!(pid, std::process::id().to_string());

        drop(server);
    }

    #[tokio::test]
    async fn test_bind_refuses_non_socket_file() {
        let socket_path = temp_socket_path("plain");
        let pid_path = paths::pid_path_for(&socket_path);
        std::fs::write(&socket_path, "not a socket").expect("write plain file");

        let result =
            DaemonServer::bind_to(socket_path.clone(), pid_path.clone(), TimerConfig::default())
                .await;
        let err = result.err().expect("bind should fail");
        assert!(err.to_string().contains("not a socket"));

        let _ = std::fs::remove_file(&socket_path);
        let _ = std::fs::remove_file(&pid_path);
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let socket_path = temp_socket_path("stop");
        let pid_path = paths::pid_path_for(&socket_path);
        let server = DaemonServer::bind_to(socket_path.clone(), pid_path, TimerConfig::default())
            .await
            .expect("Failed to bind server");
        let shutdown = server.shutdown_handle();

        let handle = tokio::spawn(async move { server.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.notify_waiters();

        let result = timeout(Duration::from_secs(2), handle)
            .await
            .expect("run should return after shutdown")
            .expect("run task panicked");
        assert!(result.is_ok());
        assert!(!socket_path.exists(), "server dropped with run task");
    }

    #[test]
    fn test_is_oversized() {
        assert!(!is_oversized(b"status\n"));
        assert!(is_oversized(&[b'a'; MAX_REQUEST_SIZE]));
        let mut full_line = vec![b'a'; MAX_REQUEST_SIZE - 1];
        full_line.push(b'\n');
        assert!(!is_oversized(&full_line));
    }

    #[test]
    fn test_line_end() {
        assert_eq!(line_end(b"aaaa"), None);
        assert_eq!(line_end(b"bb\nstart\n"), Some(3));
    }
}
