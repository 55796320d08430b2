//! Bot lifecycle control.
//!
//! This module owns the status state machine, the facade presentation layers
//! call into, and the command loop that drives one bot run from UI intents.
//! UI/CLI layers talk to it exclusively through [`UiCommand`]s in and
//! [`BotEvent`](crate::model::BotEvent)s out.

mod facade;
mod status;

pub use facade::{run_controller, BotController, UiCommand};
pub use status::{StatusController, StatusHandle, TransitionError};
