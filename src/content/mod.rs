//! Conversation content: topics and message text.
//!
//! A [`ContentGenerator`] writes each scripted message. Failures are expected
//! and cheap: callers substitute a [`fallback`] message instead of aborting.

pub mod chat;
pub mod fallback;

use crate::config::ContentConfig;
use crate::errors::{MaturationError, MaturationResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use chat::ChatCompletionsGenerator;

/// Shared conversational theme, chosen once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub description: String,
}

/// Position of a message inside the five-step script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Greeting,
    GreetingReply,
    FollowUp,
    Reply,
    Closing,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::GreetingReply => "greeting_reply",
            Self::FollowUp => "follow_up",
            Self::Reply => "reply",
            Self::Closing => "closing",
        }
    }

    /// Instruction handed to the generator for this step.
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Greeting => "Open the conversation with a friendly greeting that hints at the topic.",
            Self::GreetingReply => "Answer the greeting warmly and react to what was said.",
            Self::FollowUp => "Continue the conversation with a question or comment about the topic.",
            Self::Reply => "Reply naturally to the last message, adding a small personal detail.",
            Self::Closing => "Wrap up the conversation politely, as if you need to go.",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a generator needs to write one message.
#[derive(Debug, Clone, Copy)]
pub struct ContentRequest<'a> {
    pub topic: &'a Topic,
    pub from: &'a str,
    pub to: &'a str,
    pub kind: MessageKind,
    /// Texts from this conversation, oldest first.
    pub previous: &'a [String],
    /// Texts recently sent anywhere in the run, oldest first.
    pub recent: &'a [String],
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Propose a topic for a new run.
    async fn topic(&self) -> MaturationResult<Topic>;

    /// Write one message. Errors make the caller use fallback content.
    async fn message(&self, req: &ContentRequest<'_>) -> MaturationResult<String>;
}

/// Generator used when AI content is disabled. Every call fails so the
/// script engine always picks from the fallback pools.
pub struct StaticGenerator;

#[async_trait]
impl ContentGenerator for StaticGenerator {
    async fn topic(&self) -> MaturationResult<Topic> {
        Err(MaturationError::Config(
            "content generation is disabled".into(),
        ))
    }

    async fn message(&self, _req: &ContentRequest<'_>) -> MaturationResult<String> {
        Err(MaturationError::Config(
            "content generation is disabled".into(),
        ))
    }
}

/// Build the generator selected by config.
pub fn create_generator(config: &ContentConfig) -> Arc<dyn ContentGenerator> {
    if config.enabled {
        Arc::new(ChatCompletionsGenerator::new(config))
    } else {
        Arc::new(StaticGenerator)
    }
}

/// Ask the generator for a topic, falling back to a built-in one.
pub async fn choose_topic(generator: &dyn ContentGenerator) -> Topic {
    match generator.topic().await {
        Ok(topic) => topic,
        Err(e) => {
            tracing::debug!("topic generation failed, using built-in topic: {}", e);
            fallback::random_topic()
        }
    }
}

#[cfg(test)]
mod tests;
