use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised bot.
///
/// Exactly one value is current at any instant; all transitions are
/// serialized by the [`StatusController`](crate::controller::StatusController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Options have not been validated yet; the bot has never run.
    Configuring,
    Running,
    Paused,
    /// Terminal. Reuse requires a fresh controller/bot pair.
    Stopped,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Configuring => "configuring",
            Status::Running => "running",
            Status::Paused => "paused",
            Status::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Verdict returned to the bot body at each cooperative suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckIn {
    /// Keep going.
    Continue,
    /// A stop was requested; unwind without further side effects.
    MustStop,
}

impl CheckIn {
    /// Convenience for loop guards: `if !ctx.check_in().await.should_continue() { return .. }`.
    pub fn should_continue(self) -> bool {
        matches!(self, CheckIn::Continue)
    }
}

/// Static identity of a bot, shown by presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotProfile {
    pub title: String,
    pub description: String,
}

impl BotProfile {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Events emitted by the controller and the running bot, consumed by
/// presentation layers (CLI, tests, a future TUI). Delivery preserves
/// emission order per producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BotEvent {
    StatusChanged {
        status: Status,
    },
    /// Reply to an open-options intent: the schema to render.
    OptionsDeclared {
        spec: crate::options::OptionSpec,
    },
    /// Fractional progress in `[0, 1]`.
    Progress {
        fraction: f64,
    },
    Log {
        message: String,
    },
    RunCompleted {
        summary: RunSummary,
    },
}

/// How a run reached [`Status::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The bot exhausted its work and terminated itself.
    Completed,
    /// Stop was requested externally and the bot unwound cooperatively.
    Cancelled,
    /// The bot returned an error or panicked; contained at the task boundary.
    Faulted,
}

/// Terminal record for a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub timestamp_utc: String,
    pub bot_title: String,
    pub outcome: Outcome,
    /// Log lines the bot emitted over the run.
    #[serde(default)]
    pub log_lines: u64,
    /// Progress reports the bot emitted over the run.
    #[serde(default)]
    pub progress_updates: u64,
    /// Present when `outcome == Faulted`.
    #[serde(default)]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(
        bot_title: impl Into<String>,
        outcome: Outcome,
        error: Option<String>,
        log_lines: u64,
        progress_updates: u64,
    ) -> Self {
        Self {
            timestamp_utc: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "now".into()),
            bot_title: bot_title.into(),
            outcome,
            log_lines,
            progress_updates,
            error,
        }
    }
}
