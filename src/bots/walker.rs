//! Sample bot: walks a character between two points and narrates the trip.
//!
//! Toy task logic, but a faithful template for real bots: options declared up
//! front, a check-in at every loop boundary, interruptible waits, progress per
//! lap, and timed self-termination.

use crate::bot::{Bot, BotContext};
use crate::model::BotProfile;
use crate::options::OptionSpec;
use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Steps between point A and point B.
const STEPS_PER_LAP: u32 = 4;

pub struct WalkerBot {
    /// Wait per simulated step.
    pace: Duration,
    /// Wall-clock length of one "minute" of configured running time. The
    /// default is a real minute; demos and tests shrink it.
    minute: Duration,
}

impl WalkerBot {
    pub fn new(pace: Duration, minute: Duration) -> Self {
        Self { pace, minute }
    }

    /// Step pace with a little randomness so laps don't tick in lockstep.
    fn jittered_pace(&self) -> Duration {
        let jitter_ms = rand::thread_rng().gen_range(0..=self.pace.as_millis() as u64 / 4);
        self.pace + Duration::from_millis(jitter_ms)
    }
}

impl Default for WalkerBot {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(60))
    }
}

#[async_trait]
impl Bot for WalkerBot {
    fn profile(&self) -> BotProfile {
        BotProfile::new(
            "Walker",
            "Walks from point A to point B, teleports back, and repeats until the time is up",
        )
    }

    fn options(&self) -> OptionSpec {
        OptionSpec::new()
            .slider("running_time", "How long to run (minutes)?", 1, 180)
            .multi_select("multi_select_example", "Multi-select Example", &["A", "B", "C"])
            .select("menu_example", "Menu Example", &["A", "B", "C"])
    }

    async fn run(&mut self, mut ctx: BotContext) -> Result<()> {
        let minutes = ctx
            .options()
            .number("running_time")
            .unwrap_or(1)
            .max(1) as u32;
        let multi = ctx
            .options()
            .selection("multi_select_example")
            .unwrap_or(&[])
            .to_vec();
        let menu = ctx.options().choice("menu_example").unwrap_or("A").to_string();

        let sink = ctx.sink().clone();
        sink.log(format!("Bot will run for {minutes} minutes."));
        sink.log(format!("Multi-select example set to: {multi:?}"));
        sink.log(format!("Menu example set to: {menu}"));

        let total = self.minute * minutes;
        let start = Instant::now();
        let mut times_walked = 0u32;

        while start.elapsed() < total {
            sink.log("Character is at point A");

            let mut steps_remaining = STEPS_PER_LAP;
            while steps_remaining > 0 {
                // Listen for pause/stop before every move.
                if !ctx.rest(self.jittered_pace()).await.should_continue() {
                    sink.log("Walker is stopping.");
                    return Ok(());
                }
                steps_remaining -= 1;
                match steps_remaining {
                    0 => sink.log("Character is at point B"),
                    1 => sink.log("Character is very close to B..."),
                    2 => sink.log("Character is still walking..."),
                    _ => sink.log("Character is walking to point B..."),
                }
            }

            if !ctx.rest(self.pace).await.should_continue() {
                sink.log("Walker is stopping.");
                return Ok(());
            }
            times_walked += 1;
            sink.log(format!(
                "Player has walked from A to B {times_walked} time(s)."
            ));
            sink.set_progress(start.elapsed().as_secs_f64() / total.as_secs_f64());

            sink.log("Character is teleporting back to point A...");
            if !ctx.rest(self.pace).await.should_continue() {
                sink.log("Walker is stopping.");
                return Ok(());
            }
        }

        sink.set_progress(1.0);
        sink.log("Bot has completed all of its iterations.");
        Ok(())
    }
}
