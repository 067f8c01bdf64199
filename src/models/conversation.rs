use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::SessionSnapshot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Chat,
    Voice,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Chat => "chat",
            Channel::Voice => "voice",
        }
    }

    /// How many prior messages are handed to the text generator.
    pub fn history_window(&self) -> usize {
        match self {
            Channel::Chat => 10,
            Channel::Voice => 6,
        }
    }
}

/// A stored conversation, as read back from the persistent store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
    pub is_complete: bool,
    pub source: String,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub session_id: String,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub state: String,
    pub is_complete: bool,
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
}
