//! Pollers
//!
//! A poller repeats one fetch on a fixed interval until its handle is
//! stopped or dropped, or the process shutdown token fires. Ticks missed
//! while a fetch is in flight are skipped, so a target never has two
//! requests outstanding.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::services::{PremiumService, TickerBoard};

/// Shortest poll period; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Something that can be polled.
#[async_trait]
pub trait PollTarget: Send + Sync + 'static {
    /// Name used in logs.
    fn label(&self) -> String;

    /// Perform one fetch. Failures are recorded by the target itself.
    async fn poll_once(&self);
}

#[async_trait]
impl PollTarget for TickerBoard {
    fn label(&self) -> String {
        self.market().to_string()
    }

    async fn poll_once(&self) {
        // The board keeps the error for its status; nothing to do here.
        let _ = self.refresh().await;
    }
}

#[async_trait]
impl PollTarget for PremiumService {
    fn label(&self) -> String {
        "usd-krw-rate".to_string()
    }

    async fn poll_once(&self) {
        let _ = self.refresh_rate().await;
    }
}

/// Owner of a running poller. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollerHandle {
    label: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Spawn a poller. The first fetch happens immediately.
    ///
    /// The poller also stops when `shutdown` is cancelled.
    #[must_use]
    pub fn spawn(
        target: Arc<dyn PollTarget>,
        interval: Duration,
        shutdown: &CancellationToken,
    ) -> Self {
        let label = target.label();
        let cancel = shutdown.child_token();
        let task = tokio::spawn(run(target, interval, cancel.clone()));

        tracing::info!(poller = %label, interval_ms = interval.as_millis(), "Poller started");
        Self {
            label,
            cancel,
            task: Some(task),
        }
    }

    /// Poller label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the poller and wait for its task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(poller = %self.label, error = %e, "Poller task failed");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(target: Arc<dyn PollTarget>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = target.poll_once() => {}
                }
            }
        }
    }

    tracing::debug!(poller = %target.label(), "Poller stopped");
}
