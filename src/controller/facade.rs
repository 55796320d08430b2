//! Controller facade and the command loop driving one bot run.
//!
//! Translates UI intents (play, pause, stop, submit-options) into status
//! transitions and task management, and emits events for presentation layers.

use crate::bot::{Bot, BotContext, EmissionCounters, ProgressSink};
use crate::controller::status::{StatusController, StatusHandle};
use crate::model::{BotEvent, BotProfile, Outcome, RunSummary, Status};
use crate::options::{OptionSet, OptionSpec, OptionValue};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Commands emitted by UI layers to control the supervised bot.
#[derive(Debug, Clone)]
pub enum UiCommand {
    /// Start, resume, or pause, depending on the current status.
    PlayPause,
    Stop,
    /// Ask for the option schema (answered with `BotEvent::OptionsDeclared`).
    OpenOptions,
    SubmitOptions(HashMap<String, OptionValue>),
    /// Stop the bot if needed and leave the command loop.
    Quit,
}

/// One bot under supervision: its status, its validated options, and (while
/// running) the task executing it.
///
/// Every method is safe to call at any time; intents that are invalid for the
/// current status become logged notices, never errors or panics. `Stopped` is
/// terminal: reuse means constructing a new controller with a new bot, so
/// working state never leaks across runs.
pub struct BotController {
    bot: Option<Box<dyn Bot>>,
    profile: BotProfile,
    spec: OptionSpec,
    options: Option<Arc<OptionSet>>,
    status: StatusController,
    event_tx: UnboundedSender<BotEvent>,
    counters: Arc<EmissionCounters>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl BotController {
    pub fn new(bot: Box<dyn Bot>, event_tx: UnboundedSender<BotEvent>) -> Self {
        let profile = bot.profile();
        let spec = bot.options();
        Self {
            bot: Some(bot),
            profile,
            spec,
            options: None,
            status: StatusController::new(),
            event_tx,
            counters: Arc::new(EmissionCounters::default()),
            handle: None,
        }
    }

    pub fn profile(&self) -> &BotProfile {
        &self.profile
    }

    /// The schema declared by the bot, for presentation layers to render.
    pub fn option_spec(&self) -> &OptionSpec {
        &self.spec
    }

    /// Publish the schema on the event channel, for presentation layers that
    /// only speak commands and events.
    pub fn open_options(&self) {
        let _ = self.event_tx.send(BotEvent::OptionsDeclared {
            spec: self.spec.clone(),
        });
    }

    pub fn status(&self) -> Status {
        self.status.status()
    }

    /// Whether a validated option set is in place for the run.
    pub fn options_set(&self) -> bool {
        self.options.is_some()
    }

    /// Validate and store a raw option submission. All-or-nothing: any
    /// unknown, missing, or out-of-constraint key rejects the whole
    /// submission and the status stays unchanged.
    pub fn submit_options(&mut self, raw: HashMap<String, OptionValue>) -> bool {
        if self.status() != Status::Configuring {
            self.notice(format!(
                "Options can only be changed before the run starts (currently {})",
                self.status()
            ));
            return false;
        }
        match self.spec.validate(raw) {
            Ok(set) => {
                self.options = Some(Arc::new(set));
                self.log("Options set successfully.");
                true
            }
            Err(err) => {
                for offence in &err.offences {
                    self.log(format!("Failed to set options: {offence}"));
                }
                debug!(%err, "option submission rejected");
                false
            }
        }
    }

    /// Start the run, resume from pause, or pause, depending on the current
    /// status. Starting requires a validated option set (bots with an empty
    /// schema start without one).
    pub fn play_or_pause(&mut self) {
        match self.status() {
            Status::Configuring => self.start(),
            Status::Running => {
                if self.status.request_pause().is_ok() {
                    self.notify_status();
                }
            }
            Status::Paused => {
                if self.status.request_play().is_ok() {
                    self.notify_status();
                }
            }
            Status::Stopped => {
                self.notice("The run is over; select the bot again to start a fresh one");
            }
        }
    }

    /// Request a cooperative stop. Idempotent once stopped; a notice while
    /// still configuring.
    pub fn stop(&mut self) {
        let before = self.status();
        match self.status.request_stop() {
            Ok(()) => {
                if before != Status::Stopped {
                    self.notify_status();
                }
            }
            Err(err) => self.notice(err.to_string()),
        }
    }

    /// Whether the bot task has been spawned and has not yet been joined.
    pub fn task_active(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn handle_mut(&mut self) -> Option<&mut JoinHandle<Result<()>>> {
        self.handle.as_mut()
    }

    /// Spawn the bot task: `Configuring -> Running`.
    fn start(&mut self) {
        let options = match &self.options {
            Some(set) => Arc::clone(set),
            None if self.spec.is_empty() => {
                let set = Arc::new(OptionSet::empty());
                self.options = Some(Arc::clone(&set));
                set
            }
            None => {
                self.notice("Options must be submitted before the bot can start");
                return;
            }
        };
        let Some(mut bot) = self.bot.take() else {
            // Stopped is terminal, so a missing bot can only mean a past run.
            self.notice("This controller has already run its bot");
            return;
        };
        if self.status.mark_running().is_err() {
            self.bot = Some(bot);
            return;
        }

        let ctx = BotContext::new(
            options,
            StatusHandle::new(self.status.subscribe()),
            ProgressSink::new(
                self.event_tx.clone(),
                self.status.subscribe(),
                Arc::clone(&self.counters),
            ),
        );
        self.handle = Some(tokio::spawn(async move { bot.run(ctx).await }));
        self.notify_status();
        debug!(bot = %self.profile.title, "bot task spawned");
    }

    /// Fold the joined task back into the state machine. Normal completion,
    /// bot error, and panic all route through the same stop transition, so
    /// there is exactly one path into `Stopped`.
    pub(crate) fn finish(&mut self, join_res: Result<Result<()>, tokio::task::JoinError>) {
        self.handle = None;
        let stop_was_requested = self.status() == Status::Stopped;

        let (outcome, error) = match join_res {
            Ok(Ok(())) => {
                let outcome = if stop_was_requested {
                    Outcome::Cancelled
                } else {
                    Outcome::Completed
                };
                (outcome, None)
            }
            Ok(Err(e)) => {
                let msg = format!("{e:#}");
                self.log(format!("Bot failed: {msg}"));
                (Outcome::Faulted, Some(msg))
            }
            Err(e) if e.is_panic() => {
                self.log("Bot crashed with an unhandled fault");
                (Outcome::Faulted, Some(e.to_string()))
            }
            Err(_) => (Outcome::Cancelled, None),
        };

        let _ = self.status.request_stop();
        if !stop_was_requested {
            self.notify_status();
        }
        let summary = RunSummary::new(
            self.profile.title.clone(),
            outcome,
            error,
            self.counters.log_lines(),
            self.counters.progress_updates(),
        );
        let _ = self.event_tx.send(BotEvent::RunCompleted { summary });
    }

    fn notify_status(&self) {
        let _ = self.event_tx.send(BotEvent::StatusChanged {
            status: self.status(),
        });
    }

    fn log(&self, message: impl Into<String>) {
        let _ = self.event_tx.send(BotEvent::Log {
            message: message.into(),
        });
    }

    /// Invalid-for-state intent: logged, never fatal.
    fn notice(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(bot = %self.profile.title, "{message}");
        self.log(message);
    }
}

/// Drive one [`BotController`] from UI commands until the UI quits.
///
/// Owns the select loop: command handling, task-completion observation, and
/// the stop-acknowledgement watchdog. Quit waits for an active task to unwind
/// so the terminal events are delivered before the loop returns.
pub async fn run_controller(
    bot: Box<dyn Bot>,
    event_tx: UnboundedSender<BotEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut ctl = BotController::new(bot, event_tx.clone());
    let mut quit_pending = false;
    // Stop watchdog: a cooperative bot should acknowledge a stop quickly; if
    // it does not, keep the user informed (never kill the task from here).
    let mut stop_deadline: Option<tokio::time::Instant> = None;
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::PlayPause) => ctl.play_or_pause(),
                    Some(UiCommand::OpenOptions) => ctl.open_options(),
                    Some(UiCommand::SubmitOptions(raw)) => {
                        ctl.submit_options(raw);
                    }
                    Some(UiCommand::Stop) => {
                        ctl.stop();
                        if ctl.task_active() {
                            stop_deadline = Some(tokio::time::Instant::now() + Duration::from_secs(3));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        quit_pending = true;
                        if ctl.task_active() {
                            ctl.stop();
                            stop_deadline = Some(tokio::time::Instant::now() + Duration::from_secs(3));
                        } else {
                            break;
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it
            // can be dropped if another select branch is chosen, and we'll
            // never observe completion.
            maybe_done = async {
                if let Some(h) = ctl.handle_mut() {
                    return Some(h.await);
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    ctl.finish(join_res);
                    stop_deadline = None;
                    if quit_pending {
                        break;
                    }
                }
            }
            // If a stop goes unacknowledged (a bot stuck outside its check-in
            // cadence), surface it instead of failing silently.
            _ = watchdog.tick() => {
                if let Some(deadline) = stop_deadline {
                    if tokio::time::Instant::now() >= deadline && ctl.task_active() {
                        warn!(bot = %ctl.profile().title, "stop not acknowledged yet");
                        let _ = event_tx.send(BotEvent::Log {
                            message: "Still stopping…".into(),
                        });
                        stop_deadline = None;
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CheckIn;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    /// Parks at check-ins until stopped.
    struct IdleBot;

    #[async_trait]
    impl Bot for IdleBot {
        fn profile(&self) -> BotProfile {
            BotProfile::new("Idle", "waits around")
        }

        fn options(&self) -> OptionSpec {
            OptionSpec::new().slider("running_time", "How long to run (minutes)?", 1, 180)
        }

        async fn run(&mut self, mut ctx: BotContext) -> Result<()> {
            loop {
                if ctx.rest(std::time::Duration::from_millis(5)).await == CheckIn::MustStop {
                    return Ok(());
                }
            }
        }
    }

    /// Declares no options and returns immediately.
    struct Plain;

    #[async_trait]
    impl Bot for Plain {
        fn profile(&self) -> BotProfile {
            BotProfile::new("Plain", "no options, instant finish")
        }

        async fn run(&mut self, _ctx: BotContext) -> Result<()> {
            Ok(())
        }
    }

    /// Logs twice and reports progress once, then finishes.
    struct Chatty;

    #[async_trait]
    impl Bot for Chatty {
        fn profile(&self) -> BotProfile {
            BotProfile::new("Chatty", "narrates a short run")
        }

        async fn run(&mut self, ctx: BotContext) -> Result<()> {
            ctx.sink().log("starting");
            ctx.sink().set_progress(0.5);
            ctx.sink().log("done");
            Ok(())
        }
    }

    /// Fails with a domain error right away.
    struct Broken;

    #[async_trait]
    impl Bot for Broken {
        fn profile(&self) -> BotProfile {
            BotProfile::new("Broken", "fails immediately")
        }

        async fn run(&mut self, _ctx: BotContext) -> Result<()> {
            anyhow::bail!("could not find the game window")
        }
    }

    fn controller(bot: Box<dyn Bot>) -> (BotController, mpsc::UnboundedReceiver<BotEvent>) {
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        (BotController::new(bot, evt_tx), evt_rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<BotEvent>) -> Vec<BotEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn logs(events: &[BotEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|ev| match ev {
                BotEvent::Log { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn open_options_publishes_schema() {
        let (ctl, mut rx) = controller(Box::new(IdleBot));
        ctl.open_options();

        let events = drain(&mut rx);
        assert!(events.iter().any(|ev| matches!(
            ev,
            BotEvent::OptionsDeclared { spec } if spec.descriptors().len() == 1
        )));
    }

    #[test]
    fn rejected_submission_keeps_configuring() {
        let (mut ctl, mut rx) = controller(Box::new(IdleBot));

        let raw = HashMap::from([("running_time".to_string(), OptionValue::Number(0))]);
        assert!(!ctl.submit_options(raw));
        assert_eq!(ctl.status(), Status::Configuring);
        assert!(!ctl.options_set());

        let events = drain(&mut rx);
        assert!(logs(&events)
            .iter()
            .any(|m| m.contains("Failed to set options")));
    }

    #[test]
    fn valid_submission_marks_options_set() {
        let (mut ctl, mut rx) = controller(Box::new(IdleBot));

        let raw = HashMap::from([("running_time".to_string(), OptionValue::Number(180))]);
        assert!(ctl.submit_options(raw));
        assert!(ctl.options_set());
        assert_eq!(ctl.status(), Status::Configuring);

        let events = drain(&mut rx);
        assert!(logs(&events)
            .iter()
            .any(|m| m.contains("Options set successfully")));
    }

    #[tokio::test]
    async fn resubmission_after_start_is_refused() {
        let (mut ctl, mut rx) = controller(Box::new(IdleBot));

        let raw = HashMap::from([("running_time".to_string(), OptionValue::Number(5))]);
        assert!(ctl.submit_options(raw.clone()));
        ctl.play_or_pause();
        assert_eq!(ctl.status(), Status::Running);

        assert!(!ctl.submit_options(raw));
        let events = drain(&mut rx);
        assert!(logs(&events)
            .iter()
            .any(|m| m.contains("before the run starts")));

        ctl.stop();
        let res = ctl.handle_mut().expect("task should be active").await;
        ctl.finish(res);
        assert_eq!(ctl.status(), Status::Stopped);
    }

    #[tokio::test]
    async fn empty_schema_starts_without_submission() {
        let (mut ctl, _rx) = controller(Box::new(Plain));

        ctl.play_or_pause();
        assert_eq!(ctl.status(), Status::Running);

        let res = ctl.handle_mut().unwrap().await;
        ctl.finish(res);
        assert_eq!(ctl.status(), Status::Stopped);
    }

    #[tokio::test]
    async fn bot_error_becomes_faulted_summary() {
        let (mut ctl, mut rx) = controller(Box::new(Broken));

        ctl.play_or_pause();
        let res = ctl.handle_mut().unwrap().await;
        ctl.finish(res);
        assert_eq!(ctl.status(), Status::Stopped);

        let events = drain(&mut rx);
        assert!(logs(&events)
            .iter()
            .any(|m| m.contains("could not find the game window")));
        assert!(events.iter().any(|ev| matches!(
            ev,
            BotEvent::RunCompleted { summary } if summary.outcome == Outcome::Faulted
        )));
    }

    #[tokio::test]
    async fn normal_completion_reported_as_completed() {
        let (mut ctl, mut rx) = controller(Box::new(Plain));

        ctl.play_or_pause();
        let res = ctl.handle_mut().unwrap().await;
        ctl.finish(res);

        let events = drain(&mut rx);
        assert!(events.iter().any(|ev| matches!(
            ev,
            BotEvent::RunCompleted { summary } if summary.outcome == Outcome::Completed
        )));
        assert!(events
            .iter()
            .any(|ev| matches!(ev, BotEvent::StatusChanged { status: Status::Stopped })));
    }

    #[tokio::test]
    async fn summary_tallies_what_the_bot_emitted() {
        let (mut ctl, mut rx) = controller(Box::new(Chatty));

        ctl.play_or_pause();
        let res = ctl.handle_mut().unwrap().await;
        ctl.finish(res);

        let events = drain(&mut rx);
        let summary = events
            .iter()
            .find_map(|ev| match ev {
                BotEvent::RunCompleted { summary } => Some(summary.clone()),
                _ => None,
            })
            .expect("run must end with a summary");
        assert_eq!(summary.log_lines, 2);
        assert_eq!(summary.progress_updates, 1);
    }

    #[tokio::test]
    async fn play_after_stop_is_a_notice() {
        let (mut ctl, mut rx) = controller(Box::new(Plain));

        ctl.play_or_pause();
        let res = ctl.handle_mut().unwrap().await;
        ctl.finish(res);
        drain(&mut rx);

        ctl.play_or_pause();
        assert_eq!(ctl.status(), Status::Stopped);
        let events = drain(&mut rx);
        assert!(logs(&events).iter().any(|m| m.contains("The run is over")));
    }
}
