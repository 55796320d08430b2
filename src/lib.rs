//! Supervisor framework for long-lived, interruptible automation bots.
//!
//! One controller supervises one bot: options are declared by the bot and
//! validated before the run, the run executes on its own tokio task, and the
//! controlling actor steers it with play/pause/stop while the bot reports
//! back through a progress/log event channel. Stopping is cooperative: the
//! bot yields at check-in points and interruptible rests, and the controller
//! never kills the task.

pub mod bot;
pub mod bots;
pub mod cli;
pub mod controller;
pub mod model;
pub mod options;

pub use bot::{Bot, BotContext, ProgressSink};
pub use controller::{run_controller, BotController, StatusController, UiCommand};
pub use model::{BotEvent, BotProfile, CheckIn, Outcome, RunSummary, Status};
pub use options::{OptionKind, OptionSet, OptionSpec, OptionValue, ValidationError};
