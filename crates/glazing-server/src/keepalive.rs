//! Per-session keepalive pings.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::routes::ws::{EventSender, ServerMessage};

/// Shortest interval the keepalive accepts; shorter values are raised to it.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to a running keepalive task.
///
/// Consumed by [`KeepaliveHandle::shutdown`], so a task is cancelled once.
#[derive(Debug)]
pub struct KeepaliveHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl KeepaliveHandle {
    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Keepalive task panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Start pinging through `events` every `interval`.
///
/// The first ping goes out one interval after start. The task stops quietly
/// when `cancel` fires or the outbound channel closes, even while waiting on
/// a full channel. It never tears the session down itself.
pub fn spawn_keepalive(
    events: EventSender,
    interval: Duration,
    cancel: CancellationToken,
) -> KeepaliveHandle {
    let handle = tokio::spawn(run(events, interval, cancel.clone()));
    KeepaliveHandle { cancel, handle }
}

async fn run(events: EventSender, interval: Duration, cancel: CancellationToken) {
    let session_id = *events.session_id();
    let interval = interval.max(MIN_KEEPALIVE_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = events.send(ServerMessage::ping(&session_id)) => sent,
                };
                if sent.is_err() {
                    break;
                }
                tracing::trace!(session_id = %session_id, "Keepalive ping sent");
            }
        }
    }

    tracing::debug!(session_id = %session_id, "Keepalive stopped");
}
