use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Qualified,
    NotQualified,
    #[serde(rename = "needs_info")]
    NeedsMoreInfo,
    Emergency,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Normal,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualificationResult {
    pub status: LeadStatus,
    pub priority: Priority,
    pub score: u8,
    pub reasons: Vec<String>,
    pub missing_info: Vec<String>,
    pub next_steps: String,
}
