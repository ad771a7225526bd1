//! Completion client - chat requests against an OpenAI-compatible endpoint.
//!
//! The `Completion` trait is the seam the resolver, generator, and
//! interpreter depend on; tests swap in scripted fakes instead of the HTTP
//! client.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;

/// One role-tagged message of a chat request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling parameters for one completion call
#[derive(Debug, Clone, Copy)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 512,
            top_p: 0.9,
        }
    }
}

/// Text-completion capability consumed by the pipeline
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], params: SamplingParams) -> Result<String>;
}

/// Production client for an OpenAI-compatible /chat/completions endpoint
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Completion for ChatClient {
    async fn complete(&self, messages: &[ChatMessage], params: SamplingParams) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "top_p": params.top_p,
        });

        debug!("completion call: {} messages", messages.len());

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("completion request failed: {}", response.status()));
        }

        let json: serde_json::Value = response.json().await?;
        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|content| content.as_str())
            .unwrap_or("")
            .to_string();

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_roles() {
        assert_eq!(ChatMessage::system("a").role, "system");
        assert_eq!(ChatMessage::user("b").role, "user");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:8080/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = ChatClient::new(&config, "key".to_string()).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:8080/v1");
    }

    #[test]
    fn test_default_sampling_is_low_temperature() {
        let params = SamplingParams::default();
        assert!(params.temperature < 0.5);
        assert!(params.max_tokens > 0);
    }
}
