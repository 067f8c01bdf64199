use crate::models::ConversationMessage;
use crate::services::ai::{LlmProvider, Message};

pub const APOLOGY: &str = "I apologize, but I'm having trouble processing that right now.";

/// Asks the model for the next receptionist line. Never fails: provider errors
/// and empty replies degrade to [`APOLOGY`].
pub async fn generate_reply(
    llm: &dyn LlmProvider,
    system_instruction: &str,
    history: &[ConversationMessage],
    user_message: &str,
) -> String {
    let mut messages: Vec<Message> = history.iter().map(Message::from).collect();
    messages.push(Message {
        role: "user".to_string(),
        content: user_message.to_string(),
    });

    match llm.chat(system_instruction, &messages).await {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        Ok(_) => {
            tracing::warn!("text generator returned an empty reply, using apology");
            APOLOGY.to_string()
        }
        Err(e) => {
            tracing::error!(error = %e, "text generation failed, using apology");
            APOLOGY.to_string()
        }
    }
}
