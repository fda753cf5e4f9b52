//! The fixed five-step exchange run for every ordered pair.

use super::dispatcher::Dispatcher;
use super::pairing::PairKey;
use super::progress::ProgressReporter;
use super::registry::StopSignal;
use super::throttle::{PhoneThrottle, random_between};
use super::types::{Endpoint, RunStatus};
use crate::content::{ContentGenerator, ContentRequest, MessageKind, Topic, fallback};
use crate::utils::truncate_chars;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Texts remembered per (direction, kind).
pub const PAIR_HISTORY_LEN: usize = 5;
/// Texts remembered across the whole run.
pub const RUN_HISTORY_LEN: usize = 50;
const LOG_PREVIEW_CHARS: usize = 80;
const FALLBACK_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Back,
}

const SCRIPT: [(MessageKind, Direction); 5] = [
    (MessageKind::Greeting, Direction::Forward),
    (MessageKind::GreetingReply, Direction::Back),
    (MessageKind::FollowUp, Direction::Forward),
    (MessageKind::Reply, Direction::Back),
    (MessageKind::Closing, Direction::Forward),
];

/// Rolling text history for one run.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    pairs: HashMap<PairKey, VecDeque<String>>,
    run: VecDeque<String>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_pair(&self, key: &PairKey) -> Vec<String> {
        self.pairs
            .get(key)
            .map(|texts| texts.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn recent(&self) -> Vec<String> {
        self.run.iter().cloned().collect()
    }

    pub fn contains_recent(&self, text: &str) -> bool {
        self.run.iter().any(|t| t == text)
    }

    pub fn record(&mut self, key: PairKey, text: &str) {
        let pair = self.pairs.entry(key).or_default();
        pair.push_back(text.to_string());
        while pair.len() > PAIR_HISTORY_LEN {
            pair.pop_front();
        }
        self.run.push_back(text.to_string());
        while self.run.len() > RUN_HISTORY_LEN {
            self.run.pop_front();
        }
    }
}

/// State a run threads through every conversation. Owned by the run task.
pub struct RunContext {
    pub topic: Topic,
    pub templates: Vec<String>,
    pub history: ConversationHistory,
    pub throttle: PhoneThrottle,
    pub reporter: ProgressReporter,
    pub stop: StopSignal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// All steps were attempted; `sent` of them were delivered.
    Completed { sent: usize },
    /// The opening message failed, nothing else was attempted.
    Aborted { reason: String },
    /// A stop was requested between steps.
    Stopped { sent: usize },
}

pub struct ScriptEngine {
    generator: Arc<dyn ContentGenerator>,
    dispatcher: Dispatcher,
    reading_delay_min_secs: u64,
    reading_delay_max_secs: u64,
}

impl ScriptEngine {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        dispatcher: Dispatcher,
        reading_delay_min_secs: u64,
        reading_delay_max_secs: u64,
    ) -> Self {
        Self {
            generator,
            dispatcher,
            reading_delay_min_secs,
            reading_delay_max_secs,
        }
    }

    /// Run the script with `a` opening and `b` answering.
    pub async fn run_pair(
        &self,
        a: &Endpoint,
        b: &Endpoint,
        ctx: &mut RunContext,
    ) -> PairOutcome {
        ctx.reporter.set_pair(&a.display_name, &b.display_name);
        ctx.reporter.info(format!(
            "conversation {} -> {} started",
            a.label(),
            b.label()
        ));

        let mut sent = 0;
        for (step, (kind, direction)) in SCRIPT.iter().copied().enumerate() {
            if step > 0 {
                if ctx.stop.is_requested() {
                    ctx.reporter.clear_pair();
                    return PairOutcome::Stopped { sent };
                }
                let delay =
                    random_between(self.reading_delay_min_secs, self.reading_delay_max_secs);
                ctx.reporter.expect_next_message_in(delay);
                tokio::time::sleep(delay).await;
            }

            let (from, to) = match direction {
                Direction::Forward => (a, b),
                Direction::Back => (b, a),
            };
            ctx.reporter.set_status(match direction {
                Direction::Forward => RunStatus::Sending,
                Direction::Back => RunStatus::Replying,
            });

            let text = self.compose(from, to, kind, ctx).await;
            ctx.history.record(PairKey::new(from, to, kind), &text);

            let from_phone = from.phone_number.as_deref().unwrap_or_default();
            let to_phone = to.phone_number.as_deref().unwrap_or_default();
            let waited = ctx.throttle.await_turn(from_phone).await;
            debug!("{} waited {}ms for its turn", from.key(), waited.as_millis());

            match self.dispatcher.send(from, to_phone, &text).await {
                Ok(_) => {
                    sent += 1;
                    ctx.reporter.record_message();
                    ctx.reporter.info(format!(
                        "[{}] {} -> {}: {}",
                        kind,
                        from.display_name,
                        to.display_name,
                        truncate_chars(&text, LOG_PREVIEW_CHARS)
                    ));
                }
                Err(e) if step == 0 => {
                    ctx.reporter.error(format!(
                        "[{}] {} -> {} failed ({}): {}; skipping pair",
                        kind,
                        from.display_name,
                        to.display_name,
                        e.reason(),
                        e
                    ));
                    ctx.reporter.clear_pair();
                    return PairOutcome::Aborted {
                        reason: e.to_string(),
                    };
                }
                Err(e) => {
                    ctx.reporter.warn(format!(
                        "[{}] {} -> {} failed ({}): {}",
                        kind,
                        from.display_name,
                        to.display_name,
                        e.reason(),
                        e
                    ));
                }
            }
        }

        ctx.reporter.record_conversation();
        ctx.reporter.clear_pair();
        ctx.reporter.info(format!(
            "conversation {} -> {} completed ({}/{} delivered)",
            a.display_name,
            b.display_name,
            sent,
            SCRIPT.len()
        ));
        PairOutcome::Completed { sent }
    }

    async fn compose(
        &self,
        from: &Endpoint,
        to: &Endpoint,
        kind: MessageKind,
        ctx: &RunContext,
    ) -> String {
        let key = PairKey::new(from, to, kind);
        let previous = ctx.history.for_pair(&key);
        let recent = ctx.history.recent();
        let req = ContentRequest {
            topic: &ctx.topic,
            from: &from.display_name,
            to: &to.display_name,
            kind,
            previous: &previous,
            recent: &recent,
        };
        match self.generator.message(&req).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                debug!("generator returned empty text for {}", key);
                fallback_text(kind, &ctx.templates, &ctx.history)
            }
            Err(e) => {
                debug!("generator failed for {}: {}", key, e);
                fallback_text(kind, &ctx.templates, &ctx.history)
            }
        }
    }
}

/// Pick a fallback message, preferring one not sent recently in this run.
pub fn fallback_text(
    kind: MessageKind,
    templates: &[String],
    history: &ConversationHistory,
) -> String {
    let mut text = fallback::pick_message(kind, templates);
    for _ in 1..FALLBACK_ATTEMPTS {
        if !history.contains_recent(&text) {
            break;
        }
        text = fallback::pick_message(kind, templates);
    }
    text
}

/// Number of messages in one full conversation.
pub fn script_len() -> usize {
    SCRIPT.len()
}
