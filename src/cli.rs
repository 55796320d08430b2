//! Headless front-end: runs the sample walker under the controller and
//! prints the event stream, standing in for a GUI presentation layer.

use crate::bots::WalkerBot;
use crate::controller::{run_controller, UiCommand};
use crate::model::BotEvent;
use crate::options::{OptionKind, OptionValue};
use anyhow::Result;
use clap::Parser;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for the stdout/stderr writer.
#[derive(Debug, PartialEq)]
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer task so a slow terminal never stalls the event
/// loop.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let mut out = std::io::LineWriter::new(std::io::stdout().lock());
        let mut err = std::io::LineWriter::new(std::io::stderr().lock());
        while let Some(line) = rx.blocking_recv() {
            let _ = match line {
                OutputLine::Stdout(msg) => writeln!(out, "{msg}"),
                OutputLine::Stderr(msg) => writeln!(err, "{msg}"),
            };
        }
        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "botctl",
    version,
    about = "Run the sample walker bot under interactive supervision"
)]
pub struct Cli {
    /// How long to run, in bot minutes (1-180)
    #[arg(long, default_value_t = 1)]
    pub running_time: i64,

    /// Multi-select example option (choose from A, B, C; repeatable)
    #[arg(long = "multi-select", default_values_t = [String::from("A")])]
    pub multi_select: Vec<String>,

    /// Menu example option (one of A, B, C)
    #[arg(long, default_value = "A")]
    pub menu: String,

    /// Wait per simulated step
    #[arg(long, default_value = "2s")]
    pub step_duration: humantime::Duration,

    /// Wall-clock length of one bot minute (shrink to fast-forward the demo)
    #[arg(long, default_value = "60s")]
    pub minute_length: humantime::Duration,

    /// Print events as JSON lines instead of text
    #[arg(long)]
    pub json: bool,

    /// Suppress event output; only the terminal summary is printed
    #[arg(long)]
    pub quiet: bool,
}

/// Build the raw option submission from CLI arguments.
fn build_raw_options(args: &Cli) -> HashMap<String, OptionValue> {
    HashMap::from([
        (
            "running_time".to_string(),
            OptionValue::Number(args.running_time),
        ),
        (
            "multi_select_example".to_string(),
            OptionValue::Selection(args.multi_select.clone()),
        ),
        (
            "menu_example".to_string(),
            OptionValue::Choice(args.menu.clone()),
        ),
    ])
}

pub async fn run(args: Cli) -> Result<()> {
    let bot = WalkerBot::new(
        Duration::from(args.step_duration),
        Duration::from(args.minute_length),
    );

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<BotEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let controller = tokio::spawn(run_controller(Box::new(bot), evt_tx, cmd_rx));

    let _ = cmd_tx.send(UiCommand::OpenOptions);
    let _ = cmd_tx.send(UiCommand::SubmitOptions(build_raw_options(&args)));
    let _ = cmd_tx.send(UiCommand::PlayPause);

    // First Ctrl-C stops the bot cooperatively; a second one quits outright.
    let mut interrupted = false;
    loop {
        tokio::select! {
            ev = evt_rx.recv() => {
                let Some(ev) = ev else { break };
                let done = matches!(ev, BotEvent::RunCompleted { .. });
                for line in render_event(&args, &ev) {
                    let _ = out_tx.send(line);
                }
                if done {
                    let _ = cmd_tx.send(UiCommand::Quit);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if interrupted {
                    let _ = cmd_tx.send(UiCommand::Quit);
                } else {
                    interrupted = true;
                    let _ = cmd_tx.send(UiCommand::Stop);
                }
            }
        }
    }

    controller.await??;
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Render one event: JSON lines on stdout, or plain text with the terminal
/// summary on stdout and everything else on stderr. `--quiet` keeps only the
/// terminal summary in either mode.
fn render_event(args: &Cli, ev: &BotEvent) -> Vec<OutputLine> {
    let is_summary = matches!(ev, BotEvent::RunCompleted { .. });
    if args.quiet && !is_summary {
        return Vec::new();
    }
    if args.json {
        return match serde_json::to_string(ev) {
            Ok(line) => vec![OutputLine::Stdout(line)],
            Err(_) => Vec::new(),
        };
    }
    match ev {
        BotEvent::StatusChanged { status } => {
            vec![OutputLine::Stderr(format!("== {status} =="))]
        }
        BotEvent::OptionsDeclared { spec } => spec
            .descriptors()
            .iter()
            .map(|desc| {
                let constraint = match &desc.kind {
                    OptionKind::Slider { min, max } => format!("[{min}-{max}]"),
                    OptionKind::MultiSelect { choices } => format!("any of {choices:?}"),
                    OptionKind::Select { choices } => format!("one of {choices:?}"),
                };
                OutputLine::Stderr(format!("{} ({}): {constraint}", desc.label, desc.key))
            })
            .collect(),
        BotEvent::Progress { fraction } => {
            vec![OutputLine::Stderr(format!(
                "Progress: {:.0}%",
                fraction * 100.0
            ))]
        }
        BotEvent::Log { message } => vec![OutputLine::Stderr(message.clone())],
        BotEvent::RunCompleted { summary } => match serde_json::to_string_pretty(summary) {
            Ok(out) => vec![OutputLine::Stdout(out)],
            Err(_) => Vec::new(),
        },
    }
}
