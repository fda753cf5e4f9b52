use super::{ContentGenerator, ContentRequest, Topic};
use crate::config::ContentConfig;
use crate::errors::{MaturationError, MaturationResult};
use crate::providers::errors::ProviderErrorHandler;
use crate::utils::http::{http_client_with_timeout, join_url};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You write short, casual chat messages exchanged between two \
acquaintances on a messaging app. Keep each message to one or two sentences, sound natural, \
use few emojis and never mention that you are an AI. Reply with the message text only.";

const TOPIC_PROMPT: &str = "Suggest a light, everyday conversation topic for two acquaintances \
chatting on a messaging app. Reply with JSON only: {\"name\": \"...\", \"description\": \"...\"}";

/// Run-wide lines quoted back to the model.
const MAX_RECENT_IN_PROMPT: usize = 15;

/// Content generator backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsGenerator {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    client: Client,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &ContentConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.api_base.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client: http_client_with_timeout(Duration::from_secs(config.timeout_secs)),
        }
    }

    fn build_prompt(req: &ContentRequest<'_>) -> String {
        let mut prompt = format!(
            "Topic: {} ({})\nYou are {} writing to {}.\nStep: {}. {}\n",
            req.topic.name,
            req.topic.description,
            req.from,
            req.to,
            req.kind,
            req.kind.instruction()
        );
        if !req.previous.is_empty() {
            prompt.push_str("Previous messages in this conversation:\n");
            for msg in req.previous {
                prompt.push_str("- ");
                prompt.push_str(msg);
                prompt.push('\n');
            }
            prompt.push_str("Do not repeat any of them.\n");
        }
        let elsewhere: Vec<&String> = req
            .recent
            .iter()
            .filter(|msg| !req.previous.contains(msg))
            .collect();
        if !elsewhere.is_empty() {
            prompt.push_str("Messages recently sent in other chats (avoid sounding like them):\n");
            let skip = elsewhere.len().saturating_sub(MAX_RECENT_IN_PROMPT);
            for msg in &elsewhere[skip..] {
                prompt.push_str("- ");
                prompt.push_str(msg);
                prompt.push('\n');
            }
        }
        prompt
    }

    async fn complete(&self, user_prompt: &str) -> MaturationResult<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut request = self
            .client
            .post(join_url(&self.base_url, "/chat/completions"))
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let resp = request
            .send()
            .await
            .context("content generator request failed")?;
        let resp = ProviderErrorHandler::check_http_status(resp, "content", "chat").await?;
        let json: Value = resp
            .json()
            .await
            .context("failed to parse content generator response")?;

        let content = json
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| MaturationError::Provider {
                message: "no choices in content generator response".into(),
                retryable: false,
            })?;
        Ok(content.to_string())
    }
}

/// Trim whitespace and one layer of wrapping quotes.
pub fn clean_generated(text: &str) -> String {
    let trimmed = text.trim();
    let unquoted = ['"', '\'', '“', '`']
        .iter()
        .find_map(|q| {
            let close = if *q == '“' { '”' } else { *q };
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(close))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

#[async_trait]
impl ContentGenerator for ChatCompletionsGenerator {
    async fn topic(&self) -> MaturationResult<Topic> {
        let raw = self.complete(TOPIC_PROMPT).await?;
        let cleaned = raw
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        let topic: Topic = serde_json::from_str(cleaned)
            .with_context(|| format!("topic was not valid JSON: {}", cleaned))?;
        if topic.name.trim().is_empty() {
            return Err(MaturationError::Provider {
                message: "generated topic has an empty name".into(),
                retryable: true,
            });
        }
        Ok(topic)
    }

    async fn message(&self, req: &ContentRequest<'_>) -> MaturationResult<String> {
        let text = clean_generated(&self.complete(&Self::build_prompt(req)).await?);
        if text.is_empty() {
            return Err(MaturationError::Provider {
                message: "generator returned empty content".into(),
                retryable: true,
            });
        }
        debug!("generated {} message ({} chars)", req.kind, text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests;
