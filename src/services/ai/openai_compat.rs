use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{prompt_messages, LlmProvider, Message};

const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Chat-completions client for Groq, OpenRouter and OpenAI, which share one wire format.
pub struct OpenAiCompatProvider {
    name: &'static str,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(name: &'static str, endpoint: String, api_key: String, model: String) -> Self {
        Self {
            name,
            endpoint,
            api_key,
            model,
            temperature: 0.7,
            max_tokens: 1000,
            client: reqwest::Client::new(),
        }
    }

    pub fn groq(api_key: String, model: String) -> Self {
        Self::new("Groq", GROQ_URL.to_string(), api_key, model)
    }

    pub fn openrouter(api_key: String, model: String) -> Self {
        Self::new("OpenRouter", OPENROUTER_URL.to_string(), api_key, model)
    }

    pub fn openai(api_key: String, model: String) -> Self {
        Self::new("OpenAI", OPENAI_URL.to_string(), api_key, model)
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": prompt_messages(system_prompt, messages),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to call {} API", self.name))?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {} response", self.name))?;

        if !status.is_success() {
            anyhow::bail!("{} API error ({}): {}", self.name, status, data);
        }

        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing content in {} response", self.name))
    }
}
