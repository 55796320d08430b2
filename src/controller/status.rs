//! Status state machine and the cooperative check-in primitive.
//!
//! The status value lives in a `tokio::sync::watch` channel: transitions are
//! serialized inside `send_if_modified`, and a bot blocked in [`check_in`]
//! wakes on the change notification instead of polling.

use crate::model::{CheckIn, Status};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

/// A transition request that is invalid for the current status. Never fatal:
/// the facade downgrades these to logged notices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {intent} while {current}")]
pub struct TransitionError {
    pub intent: &'static str,
    pub current: Status,
}

/// Owns the current [`Status`] and mediates every transition.
///
/// Cheap to clone; all clones share the same underlying channel.
#[derive(Clone)]
pub struct StatusController {
    tx: watch::Sender<Status>,
}

impl StatusController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Status::Configuring);
        Self { tx }
    }

    pub fn status(&self) -> Status {
        *self.tx.borrow()
    }

    /// Receiver for status-change notifications (facade, progress sink, UI).
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.tx.subscribe()
    }

    /// Resume from `Paused`. Idempotent while `Running`.
    ///
    /// The `Configuring -> Running` edge is not taken here: the facade owns
    /// it via [`mark_running`](Self::mark_running) because it is coupled to
    /// option validation and task spawn.
    pub fn request_play(&self) -> Result<(), TransitionError> {
        self.transition("play", |current| match current {
            Status::Paused => Some(Status::Running),
            Status::Running => Some(Status::Running),
            _ => None,
        })
    }

    /// `Running -> Paused`. The bot's next check-in blocks until released.
    pub fn request_pause(&self) -> Result<(), TransitionError> {
        self.transition("pause", |current| match current {
            Status::Running => Some(Status::Paused),
            _ => None,
        })
    }

    /// `Running | Paused -> Stopped`. Releases any blocked check-in, which
    /// then returns [`CheckIn::MustStop`]. Idempotent once stopped.
    pub fn request_stop(&self) -> Result<(), TransitionError> {
        self.transition("stop", |current| match current {
            Status::Running | Status::Paused => Some(Status::Stopped),
            Status::Stopped => Some(Status::Stopped),
            _ => None,
        })
    }

    /// `Configuring -> Running`, taken by the facade once options are
    /// validated and the bot task is being spawned.
    pub fn mark_running(&self) -> Result<(), TransitionError> {
        self.transition("start", |current| match current {
            Status::Configuring => Some(Status::Running),
            _ => None,
        })
    }

    /// Apply one transition atomically. `next` returns the target status, or
    /// `None` when the intent is invalid for the current status. Waiters are
    /// only notified when the value actually changes.
    fn transition(
        &self,
        intent: &'static str,
        next: impl Fn(Status) -> Option<Status>,
    ) -> Result<(), TransitionError> {
        let mut rejected_from = None;
        self.tx.send_if_modified(|current| match next(*current) {
            Some(target) if target != *current => {
                debug!(from = %current, to = %target, intent, "status transition");
                *current = target;
                true
            }
            Some(_) => false,
            None => {
                rejected_from = Some(*current);
                false
            }
        });

        match rejected_from {
            Some(current) => Err(TransitionError { intent, current }),
            None => Ok(()),
        }
    }
}

impl Default for StatusController {
    fn default() -> Self {
        Self::new()
    }
}

/// The bot-side handle: read the status and suspend cooperatively.
#[derive(Clone)]
pub struct StatusHandle {
    rx: watch::Receiver<Status>,
}

impl StatusHandle {
    pub(crate) fn new(rx: watch::Receiver<Status>) -> Self {
        Self { rx }
    }

    pub fn status(&self) -> Status {
        *self.rx.borrow()
    }

    /// Cooperative suspension point, called by the bot body at every
    /// iteration boundary.
    ///
    /// While `Paused` this blocks (without busy-waiting) until the status
    /// changes; `Stopped` yields [`CheckIn::MustStop`], after which the bot
    /// must unwind without further side effects.
    pub async fn check_in(&mut self) -> CheckIn {
        loop {
            match *self.rx.borrow_and_update() {
                Status::Stopped => return CheckIn::MustStop,
                Status::Paused => {}
                _ => return CheckIn::Continue,
            }
            // Paused: park until the next committed transition. A closed
            // channel means the controller is gone; unwind.
            if self.rx.changed().await.is_err() {
                return CheckIn::MustStop;
            }
        }
    }

    /// Wait for the next committed transition. Returns `true` when the
    /// controller side is gone, which a bot treats like a stop.
    pub(crate) async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_err()
    }
}
