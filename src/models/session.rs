use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Channel;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Start,
    Greeting,
    IdentifyPatient,
    GetService,
    CheckUrgency,
    CollectName,
    CollectPhone,
    CollectDob,
    CollectInsurance,
    VerifyInfo,
    CheckAvailability,
    BookAppointment,
    ConfirmBooking,
    Completed,
    EmergencyTransfer,
}

impl ConversationState {
    /// Every state, in nominal flow order, with the emergency branch last.
    pub const ALL: [ConversationState; 15] = [
        ConversationState::Start,
        ConversationState::Greeting,
        ConversationState::IdentifyPatient,
        ConversationState::GetService,
        ConversationState::CheckUrgency,
        ConversationState::CollectName,
        ConversationState::CollectPhone,
        ConversationState::CollectDob,
        ConversationState::CollectInsurance,
        ConversationState::VerifyInfo,
        ConversationState::CheckAvailability,
        ConversationState::BookAppointment,
        ConversationState::ConfirmBooking,
        ConversationState::Completed,
        ConversationState::EmergencyTransfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Start => "start",
            ConversationState::Greeting => "greeting",
            ConversationState::IdentifyPatient => "identify_patient",
            ConversationState::GetService => "get_service",
            ConversationState::CheckUrgency => "check_urgency",
            ConversationState::CollectName => "collect_name",
            ConversationState::CollectPhone => "collect_phone",
            ConversationState::CollectDob => "collect_dob",
            ConversationState::CollectInsurance => "collect_insurance",
            ConversationState::VerifyInfo => "verify_info",
            ConversationState::CheckAvailability => "check_availability",
            ConversationState::BookAppointment => "book_appointment",
            ConversationState::ConfirmBooking => "confirm_booking",
            ConversationState::Completed => "completed",
            ConversationState::EmergencyTransfer => "emergency_transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_str() == s)
    }

    /// Completed and emergency transfer end the scripted dialogue.
    pub fn is_absorbing(&self) -> bool {
        matches!(
            self,
            ConversationState::Completed | ConversationState::EmergencyTransfer
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Name,
    Phone,
    Email,
    Dob,
    Service,
    Insurance,
    PatientType,
    Urgency,
    PreferredDate,
    PreferredTime,
    Notes,
}

impl Slot {
    pub const REQUIRED: [Slot; 5] = [
        Slot::Name,
        Slot::Phone,
        Slot::Dob,
        Slot::Service,
        Slot::Insurance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Name => "name",
            Slot::Phone => "phone",
            Slot::Email => "email",
            Slot::Dob => "dob",
            Slot::Service => "service",
            Slot::Insurance => "insurance",
            Slot::PatientType => "patient_type",
            Slot::Urgency => "urgency",
            Slot::PreferredDate => "preferred_date",
            Slot::PreferredTime => "preferred_time",
            Slot::Notes => "notes",
        }
    }
}

/// Intake record. Slots only ever go from unset to set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntakeData {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub dob: Option<String>,
    pub service: Option<String>,
    pub insurance: Option<String>,
    pub patient_type: Option<String>,
    pub urgency: Option<String>,
    pub preferred_date: Option<String>,
    pub preferred_time: Option<String>,
    pub notes: Option<String>,
}

impl IntakeData {
    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.slot_ref(slot).as_deref().filter(|v| !v.is_empty())
    }

    pub fn is_set(&self, slot: Slot) -> bool {
        self.get(slot).is_some()
    }

    /// Fills `slot` if it is currently unset. Returns whether the value was stored.
    pub fn fill(&mut self, slot: Slot, value: impl Into<String>) -> bool {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() || self.is_set(slot) {
            return false;
        }
        *self.slot_mut(slot) = Some(value.to_string());
        true
    }

    /// The one sanctioned overwrite: any urgency escalates to "emergency".
    pub fn escalate_to_emergency(&mut self) -> bool {
        if self.get(Slot::Urgency) == Some("emergency") {
            return false;
        }
        self.urgency = Some("emergency".to_string());
        true
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        Slot::REQUIRED
            .iter()
            .filter(|slot| !self.is_set(**slot))
            .map(|slot| slot.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        Slot::REQUIRED.iter().all(|slot| self.is_set(*slot))
    }

    fn slot_ref(&self, slot: Slot) -> &Option<String> {
        match slot {
            Slot::Name => &self.name,
            Slot::Phone => &self.phone,
            Slot::Email => &self.email,
            Slot::Dob => &self.dob,
            Slot::Service => &self.service,
            Slot::Insurance => &self.insurance,
            Slot::PatientType => &self.patient_type,
            Slot::Urgency => &self.urgency,
            Slot::PreferredDate => &self.preferred_date,
            Slot::PreferredTime => &self.preferred_time,
            Slot::Notes => &self.notes,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<String> {
        match slot {
            Slot::Name => &mut self.name,
            Slot::Phone => &mut self.phone,
            Slot::Email => &mut self.email,
            Slot::Dob => &mut self.dob,
            Slot::Service => &mut self.service,
            Slot::Insurance => &mut self.insurance,
            Slot::PatientType => &mut self.patient_type,
            Slot::Urgency => &mut self.urgency,
            Slot::PreferredDate => &mut self.preferred_date,
            Slot::PreferredTime => &mut self.preferred_time,
            Slot::Notes => &mut self.notes,
        }
    }
}

/// One dialogue. Constructed only by the session registry.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: String,
    channel: Channel,
    state: ConversationState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    turn_count: u32,
    messages: Vec<ConversationMessage>,
    data: IntakeData,
    booking_finalized: bool,
}

impl Session {
    pub(crate) fn new(session_id: &str, channel: Channel, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            channel,
            state: ConversationState::Start,
            created_at: now,
            updated_at: now,
            turn_count: 0,
            messages: vec![],
            data: IntakeData::default(),
            booking_finalized: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Channel of the turn that opened the session.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn data(&self) -> &IntakeData {
        &self.data
    }

    pub fn booking_finalized(&self) -> bool {
        self.booking_finalized
    }

    pub fn add_message(&mut self, role: Role, content: &str) {
        self.messages.push(ConversationMessage {
            role,
            content: content.to_string(),
        });
        self.turn_count += 1;
        self.touch();
    }

    pub fn set_state(&mut self, state: ConversationState) {
        self.state = state;
        self.touch();
    }

    /// Mutates the intake record; callers go through `IntakeData::fill`.
    pub fn update_data<R>(&mut self, f: impl FnOnce(&mut IntakeData) -> R) -> R {
        let result = f(&mut self.data);
        self.touch();
        result
    }

    pub fn mark_booking_finalized(&mut self) {
        self.booking_finalized = true;
        self.touch();
    }

    pub fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            state: self.state,
            data: self.data.clone(),
            messages: self.messages.clone(),
            turn_count: self.turn_count,
            booking_finalized: self.booking_finalized,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate(&mut self, by: chrono::Duration) {
        self.created_at -= by;
        self.updated_at -= by;
    }

    fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Serializable copy of a session, as persisted and as returned by inspection endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: ConversationState,
    pub data: IntakeData,
    pub messages: Vec<ConversationMessage>,
    pub turn_count: u32,
    #[serde(default)]
    pub booking_finalized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.data.missing_fields()
    }

    pub fn is_complete(&self) -> bool {
        self.data.is_complete()
    }
}
