use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{prompt_messages, LlmProvider, Message};

/// Local model served by Ollama's `/api/chat`.
pub struct OllamaProvider {
    url: String,
    model: String,
    options: SamplingOptions,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct SamplingOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<Message>,
}

impl OllamaProvider {
    pub fn new(url: String, model: String, temperature: f32, max_tokens: u32) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            options: SamplingOptions {
                temperature,
                num_predict: max_tokens,
            },
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: prompt_messages(system_prompt, messages),
            stream: false,
            options: self.options,
        };

        let reply: ChatResponse = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&request)
            .send()
            .await
            .context("Ollama unreachable")?
            .error_for_status()
            .context("Ollama rejected the chat request")?
            .json()
            .await
            .context("unexpected Ollama response body")?;

        reply
            .message
            .map(|m| m.content)
            .context("Ollama reply had no message")
    }
}
