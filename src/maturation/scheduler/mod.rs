use super::pairing::{CycleDedup, generate_pairs, slot_count};
use super::script::{PairOutcome, RunContext, ScriptEngine};
use super::throttle::random_between;
use super::types::{Endpoint, RunSettings, RunStatus};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// How a schedule ended when nothing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Finished,
    Stopped,
}

impl ScheduleOutcome {
    pub fn status(self) -> RunStatus {
        match self {
            Self::Finished => RunStatus::Finished,
            Self::Stopped => RunStatus::Stopped,
        }
    }
}

/// Drives rounds of full pairing cycles until each round's deadline, with
/// pauses between rounds.
pub struct RoundScheduler {
    engine: ScriptEngine,
    cycle_delay_min_secs: u64,
    cycle_delay_max_secs: u64,
    pause_poll: Duration,
}

impl RoundScheduler {
    pub fn new(
        engine: ScriptEngine,
        cycle_delay_min_secs: u64,
        cycle_delay_max_secs: u64,
        pause_poll: Duration,
    ) -> Self {
        Self {
            engine,
            cycle_delay_min_secs,
            cycle_delay_max_secs,
            pause_poll: pause_poll.max(Duration::from_millis(100)),
        }
    }

    pub async fn run(
        &self,
        endpoints: &[Endpoint],
        settings: &RunSettings,
        ctx: &mut RunContext,
    ) -> ScheduleOutcome {
        let rounds = settings.number_of_rounds.max(1);
        let overall_deadline = Instant::now() + settings.total_duration();
        ctx.reporter.set_deadline(overall_deadline);
        ctx.reporter.set_status(RunStatus::Running);

        for round in 1..=rounds {
            if ctx.stop.is_requested() {
                return self.stopped(ctx);
            }
            if Instant::now() >= overall_deadline {
                ctx.reporter.info(format!(
                    "overall deadline reached before round {}",
                    round
                ));
                break;
            }
            let round_deadline =
                (Instant::now() + settings.round_duration()).min(overall_deadline);
            ctx.reporter.set_status(RunStatus::Running);
            ctx.reporter.info(format!(
                "round {}/{} started ({} min)",
                round, rounds, settings.minutes_per_round
            ));

            let mut cycle = 0;
            loop {
                if ctx.stop.is_requested() {
                    return self.stopped(ctx);
                }
                if Instant::now() >= round_deadline {
                    break;
                }
                cycle += 1;
                let outcome = self.run_cycle(endpoints, round_deadline, ctx).await;
                if outcome == ScheduleOutcome::Stopped {
                    return self.stopped(ctx);
                }

                let remaining = round_deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let delay = self.cycle_delay(settings.cadence_seconds).min(remaining);
                debug!(
                    "[run {}] cycle {} done, next in {}ms",
                    ctx.reporter.run_id(),
                    cycle,
                    delay.as_millis()
                );
                ctx.reporter.set_status(RunStatus::Running);
                ctx.reporter.expect_next_message_in(delay);
                tokio::time::sleep(delay).await;
            }
            ctx.reporter.info(format!(
                "round {}/{} finished after {} cycles",
                round, rounds, cycle
            ));

            if round < rounds && !settings.pause_duration().is_zero() {
                ctx.reporter.info(format!(
                    "pausing {} min before round {}",
                    settings.pause_minutes_between_rounds,
                    round + 1
                ));
                ctx.reporter.set_status(RunStatus::Running);
                ctx.reporter.expect_next_message_in(settings.pause_duration());
                if self.pause(settings.pause_duration(), ctx).await == ScheduleOutcome::Stopped {
                    return self.stopped(ctx);
                }
            }
        }

        ctx.reporter.clear_pair();
        ScheduleOutcome::Finished
    }

    async fn run_cycle(
        &self,
        endpoints: &[Endpoint],
        round_deadline: Instant,
        ctx: &mut RunContext,
    ) -> ScheduleOutcome {
        let pairs = generate_pairs(endpoints.len());
        ctx.reporter.set_active_pairs(slot_count(endpoints.len()));
        let mut dedup = CycleDedup::new();
        for (i, j) in pairs {
            if ctx.stop.is_requested() {
                return ScheduleOutcome::Stopped;
            }
            if Instant::now() >= round_deadline {
                break;
            }
            let (a, b) = (&endpoints[i], &endpoints[j]);
            if !dedup.first_visit(a, b) {
                debug!(
                    "skipping {} -> {}, already paired this cycle",
                    a.key(),
                    b.key()
                );
                continue;
            }
            if let PairOutcome::Stopped { .. } = self.engine.run_pair(a, b, ctx).await {
                return ScheduleOutcome::Stopped;
            }
        }
        ScheduleOutcome::Finished
    }

    /// Sleep out a pause in short slices so a stop lands quickly.
    async fn pause(&self, duration: Duration, ctx: &RunContext) -> ScheduleOutcome {
        let until = Instant::now() + duration;
        loop {
            if ctx.stop.is_requested() {
                return ScheduleOutcome::Stopped;
            }
            let remaining = until.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ScheduleOutcome::Finished;
            }
            tokio::time::sleep(remaining.min(self.pause_poll)).await;
        }
    }

    fn cycle_delay(&self, cadence_secs: u64) -> Duration {
        let min = self.cycle_delay_min_secs.max(cadence_secs);
        let max = self.cycle_delay_max_secs.max(min);
        random_between(min, max)
    }

    fn stopped(&self, ctx: &mut RunContext) -> ScheduleOutcome {
        ctx.reporter.clear_pair();
        ScheduleOutcome::Stopped
    }
}

#[cfg(test)]
mod tests;
