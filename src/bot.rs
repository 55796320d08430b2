//! The pluggable unit of work and the context the controller hands it.

use crate::controller::StatusHandle;
use crate::model::{BotEvent, BotProfile, CheckIn, Status};
use crate::options::{OptionSet, OptionSpec};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// A supervised automation script.
///
/// The controller calls [`options`](Bot::options) once, before any
/// presentation, and [`run`](Bot::run) exactly once, on its own tokio task,
/// after options have been validated. The body must call
/// [`BotContext::check_in`] at every unbounded loop boundary and use
/// [`BotContext::rest`] for modeled waits so pause/stop take effect within
/// the latency bound.
#[async_trait]
pub trait Bot: Send + 'static {
    fn profile(&self) -> BotProfile;

    /// Declare the option schema. Called once per controller.
    fn options(&self) -> OptionSpec {
        OptionSpec::new()
    }

    /// The work routine. On [`CheckIn::MustStop`] return promptly (a terminal
    /// log line is fine, nothing else). On normal completion emit progress
    /// 1.0 before returning; the controller handles the stop transition.
    async fn run(&mut self, ctx: BotContext) -> Result<()>;
}

/// Tallies of what a run emitted, folded into the terminal summary.
/// Suppressed emissions are not counted.
#[derive(Debug, Default)]
pub(crate) struct EmissionCounters {
    logs: AtomicU64,
    progress: AtomicU64,
}

impl EmissionCounters {
    pub(crate) fn log_lines(&self) -> u64 {
        self.logs.load(Ordering::Relaxed)
    }

    pub(crate) fn progress_updates(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }
}

/// Fire-and-forget reporting channel from the bot to presentation layers.
///
/// Sends never block the bot: the channel is unbounded, and the consumer is
/// expected to drain or drop. Once the run is stopped, emissions from a stale
/// task are suppressed so nothing attributable to it escapes past
/// termination.
#[derive(Clone)]
pub struct ProgressSink {
    event_tx: mpsc::UnboundedSender<BotEvent>,
    status_rx: watch::Receiver<Status>,
    counters: Arc<EmissionCounters>,
}

impl ProgressSink {
    pub(crate) fn new(
        event_tx: mpsc::UnboundedSender<BotEvent>,
        status_rx: watch::Receiver<Status>,
        counters: Arc<EmissionCounters>,
    ) -> Self {
        Self {
            event_tx,
            status_rx,
            counters,
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        if self.stopped() {
            return;
        }
        self.counters.logs.fetch_add(1, Ordering::Relaxed);
        let _ = self.event_tx.send(BotEvent::Log {
            message: message.into(),
        });
    }

    /// Report fractional progress; clamped to `[0, 1]`.
    pub fn set_progress(&self, fraction: f64) {
        if self.stopped() {
            return;
        }
        self.counters.progress.fetch_add(1, Ordering::Relaxed);
        let _ = self.event_tx.send(BotEvent::Progress {
            fraction: fraction.clamp(0.0, 1.0),
        });
    }

    fn stopped(&self) -> bool {
        *self.status_rx.borrow() == Status::Stopped
    }
}

/// Everything a bot body may touch while running: its validated options,
/// the cooperative check-in handle, and the progress sink. No other state is
/// shared with the controlling actor.
pub struct BotContext {
    options: Arc<OptionSet>,
    status: StatusHandle,
    sink: ProgressSink,
}

impl BotContext {
    pub(crate) fn new(options: Arc<OptionSet>, status: StatusHandle, sink: ProgressSink) -> Self {
        Self {
            options,
            status,
            sink,
        }
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn sink(&self) -> &ProgressSink {
        &self.sink
    }

    /// See [`StatusHandle::check_in`].
    pub async fn check_in(&mut self) -> CheckIn {
        self.status.check_in().await
    }

    /// Interruptible wait: sleeps for `duration`, but reacts to a stop within
    /// the watch-notification latency even mid-sleep, and parks on pause
    /// before waiting out the remainder.
    pub async fn rest(&mut self, duration: Duration) -> CheckIn {
        let deadline = Instant::now() + duration;
        loop {
            // Parks here on pause; returns MustStop on stop.
            if !self.check_in().await.should_continue() {
                return CheckIn::MustStop;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return CheckIn::Continue,
                closed = self.status.changed() => {
                    if closed {
                        return CheckIn::MustStop;
                    }
                    // A transition landed mid-sleep; re-enter check_in to act
                    // on it, then wait out whatever is left of the deadline.
                }
            }
        }
    }
}
