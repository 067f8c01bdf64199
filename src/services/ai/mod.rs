pub mod ollama;
pub mod openai_compat;
pub mod reply;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::ConversationMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl From<&ConversationMessage> for Message {
    fn from(msg: &ConversationMessage) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Prepends the system instruction to the conversation turns.
pub fn prompt_messages(system_prompt: &str, messages: &[Message]) -> Vec<Message> {
    std::iter::once(Message {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    })
    .chain(messages.iter().cloned())
    .collect()
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}
