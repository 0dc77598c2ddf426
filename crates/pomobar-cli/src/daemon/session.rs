//! Request handling against the shared timer.

use std::sync::Arc;

use pomobar_core::protocol::{Reply, Request};
use pomobar_core::timer::{Timer, TimerConfig, TimerSnapshot, Transition};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The daemon's single timer, shared by the ticker and every connection.
///
/// All reads and writes go through one exclusive lock, held only for the
/// span of a single transition or snapshot.
#[derive(Debug, Clone)]
pub struct SharedTimer {
    inner: Arc<Mutex<Timer>>,
}

impl SharedTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Timer::new(config))),
        }
    }

    /// Advance the timer by one second.
    pub async fn tick(&self) -> Option<Transition> {
        let transition = self.inner.lock().await.tick();
        if let Some(t) = transition {
            info!(
                "{} finished, entering {} ({} cycles completed)",
                t.from, t.to, t.completed_cycles
            );
        }
        transition
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Parse one raw request, apply it and render the reply.
    ///
    /// The lock is only taken for recognized commands and is released before
    /// the reply is rendered.
    pub async fn handle_request(&self, raw: &str) -> String {
        let request = Request::parse(raw);

        let reply = match request.command {
            Ok(command) => {
                let reply = {
                    let mut timer = self.inner.lock().await;
                    command.apply(&mut timer)
                };
                debug!("Applied {}: {:?}", command, reply);
                reply
            }
            Err(e) => {
                debug!("Rejected request: {}", e);
                Reply::Error(e)
            }
        };

        reply.render(request.mode)
    }
}

impl Default for SharedTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}
