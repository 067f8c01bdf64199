//! Scripted intake dialogue: the transition table and the per-state instruction
//! handed to the text generator.

use crate::models::{ConversationState, IntakeData, Slot};
use crate::services::extraction::{self, Urgency};

pub const FALLBACK_TEMPLATE: &str = "Continue the conversation.";

const AFFIRMATIONS: &[&str] = &["yes", "confirm", "correct"];

/// Outcome of one transition decision. Carries intents, never performs them.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: ConversationState,
    pub slot_updates: Vec<(Slot, String)>,
    /// The utterance tripped the emergency override; the caller owes an emergency log entry.
    pub emergency: bool,
}

impl Transition {
    fn to(next: ConversationState) -> Self {
        Self {
            next,
            slot_updates: vec![],
            emergency: false,
        }
    }

    fn recording(next: ConversationState, slot: Slot, value: Option<&str>) -> Self {
        Self {
            next,
            slot_updates: value
                .map(|v| vec![(slot, v.to_string())])
                .unwrap_or_default(),
            emergency: false,
        }
    }

    /// Stores the recorded slots (unset ones only) and escalates urgency on emergency.
    pub fn apply_to(&self, data: &mut IntakeData) {
        if self.emergency {
            data.escalate_to_emergency();
        }
        for (slot, value) in &self.slot_updates {
            data.fill(*slot, value.as_str());
        }
    }
}

/// Computes the next state from the current one and the latest utterance.
pub fn next(state: ConversationState, utterance: &str, _reply: &str) -> Transition {
    use ConversationState::*;

    if state.is_absorbing() {
        return Transition::to(state);
    }
    match state {
        Start => return Transition::to(Greeting),
        Greeting => return Transition::to(IdentifyPatient),
        _ => {}
    }

    if extraction::classify_urgency(utterance) == Urgency::Emergency {
        return Transition {
            next: EmergencyTransfer,
            slot_updates: vec![],
            emergency: true,
        };
    }

    match state {
        IdentifyPatient => Transition::recording(
            GetService,
            Slot::PatientType,
            extraction::extract_patient_type(utterance),
        ),
        GetService => Transition::recording(
            CheckUrgency,
            Slot::Service,
            extraction::extract_service(utterance),
        ),
        CheckUrgency => Transition::recording(
            CollectName,
            Slot::Urgency,
            Some(extraction::classify_urgency(utterance).as_str()),
        ),
        CollectName => Transition::to(CollectPhone),
        CollectPhone => Transition::to(CollectDob),
        CollectDob => Transition::to(CollectInsurance),
        CollectInsurance => Transition::recording(
            VerifyInfo,
            Slot::Insurance,
            extraction::extract_insurance(utterance),
        ),
        VerifyInfo => Transition::to(CheckAvailability),
        CheckAvailability => Transition::to(BookAppointment),
        BookAppointment => Transition::to(ConfirmBooking),
        ConfirmBooking => {
            let text = utterance.to_lowercase();
            if AFFIRMATIONS.iter().any(|word| text.contains(word)) {
                Transition::to(Completed)
            } else {
                Transition::to(CheckAvailability)
            }
        }
        Start | Greeting | Completed | EmergencyTransfer => Transition::to(state),
    }
}

fn scripted(line: &str, restriction: &str) -> String {
    format!(
        "[CRITICAL MODE] You are a dental receptionist. Your response MUST be exactly: \"{line}\" {restriction}"
    )
}

fn shown(value: Option<&str>) -> &str {
    value.unwrap_or("None")
}

/// Fixed instruction for `state`; only already-collected values are interpolated.
pub fn template_for(state: ConversationState, data: &IntakeData, clinic: &str) -> String {
    use ConversationState::*;

    match state {
        Start => FALLBACK_TEMPLATE.to_string(),
        Greeting => scripted(
            &format!("Welcome to {clinic}. I'm Alex, your receptionist today. I'd be happy to help you schedule an appointment. How can I assist you today?"),
            "Do NOT ask about patient type or services.",
        ),
        IdentifyPatient => scripted(
            "Are you a new patient or have you visited us before?",
            "Do NOT ask about services or anything else.",
        ),
        GetService => scripted(
            "What dental service do you need? (cleaning, checkup, pain, etc.)",
            "Do NOT ask about urgency or anything else.",
        ),
        CheckUrgency => scripted(
            "When would you like to be seen? (today, this week, next week, etc.)",
            "Do NOT ask for name or anything else.",
        ),
        CollectName => scripted(
            "What is your full name?",
            "Do NOT ask for phone number or anything else.",
        ),
        CollectPhone => format!(
            "[CRITICAL MODE] You are a dental receptionist. Name is {}. Your response MUST be exactly: \"What is your phone number?\" Do NOT ask for DOB or anything else.",
            shown(data.get(Slot::Name)),
        ),
        CollectDob => scripted(
            "What is your date of birth? (MM/DD/YYYY)",
            "Do NOT ask about insurance or anything else.",
        ),
        CollectInsurance => scripted(
            "Do you have dental insurance or will you pay cash?",
            "Do NOT verify information or ask anything else.",
        ),
        VerifyInfo => format!(
            "[CRITICAL MODE] You are a dental receptionist. Your response MUST be exactly this confirmation:\n\n\
             Name: {}\nPhone: {}\nDOB: {}\nService: {}\nInsurance: {}\n\n\
             \"Is this information correct?\"\n\nDo NOT ask for availability or book anything.",
            shown(data.get(Slot::Name)),
            shown(data.get(Slot::Phone)),
            shown(data.get(Slot::Dob)),
            shown(data.get(Slot::Service)),
            shown(data.get(Slot::Insurance)),
        ),
        CheckAvailability => scripted(
            "What date and time would you prefer for your appointment?",
            "Do NOT book or confirm anything.",
        ),
        BookAppointment => scripted(
            "I'll book your appointment now. Is that okay?",
            "Do NOT provide next steps or confirm booking.",
        ),
        ConfirmBooking => scripted(
            &format!("Your appointment has been booked successfully. We'll send you a confirmation SMS. Thank you for choosing {clinic}!"),
            "Do NOT ask additional questions.",
        ),
        Completed => scripted(
            &format!("Thank you for choosing {clinic}. We look forward to seeing you. Goodbye."),
            "Do NOT ask additional questions.",
        ),
        EmergencyTransfer => scripted(
            "This sounds like an emergency. I'm transferring you to our emergency line right now. Please hold.",
            "Do NOT ask questions.",
        ),
    }
}

/// Template lookup by stored state name; unknown names get the generic instruction.
pub fn template_for_name(state: &str, data: &IntakeData, clinic: &str) -> String {
    match ConversationState::parse(state) {
        Some(state) => template_for(state, data, clinic),
        None => FALLBACK_TEMPLATE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConversationState::*;

    const CLINIC: &str = "Bright Smile Dental Clinic";

    #[test]
    fn test_nominal_path_is_linear() {
        let path = [
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
        ];
        for pair in path.windows(2) {
            assert_eq!(next(pair[0], "ok", "").next, pair[1], "from {:?}", pair[0]);
        }
        assert_eq!(next(ConfirmBooking, "Yes please", "").next, Completed);
    }

    #[test]
    fn test_confirm_without_affirmation_loops_back() {
        assert_eq!(next(ConfirmBooking, "hmm, not sure", "").next, CheckAvailability);
        assert_eq!(next(ConfirmBooking, "That's CORRECT", "").next, Completed);
    }

    #[test]
    fn test_emergency_override_from_get_service() {
        let t = next(GetService, "severe pain, can't sleep", "");
        assert_eq!(t.next, EmergencyTransfer);
        assert!(t.emergency);
        assert!(t.slot_updates.is_empty());

        let mut data = IntakeData::default();
        data.fill(Slot::Urgency, "routine");
        t.apply_to(&mut data);
        assert_eq!(data.urgency.as_deref(), Some("emergency"));
    }

    #[test]
    fn test_emergency_not_checked_before_identify() {
        assert_eq!(next(Start, "bleeding", "").next, Greeting);
        assert_eq!(next(Greeting, "bleeding", "").next, IdentifyPatient);
        assert_eq!(next(IdentifyPatient, "bleeding", "").next, EmergencyTransfer);
    }

    #[test]
    fn test_absorbing_states() {
        for state in [Completed, EmergencyTransfer] {
            let t = next(state, "severe pain, yes", "");
            assert_eq!(t.next, state);
            assert!(!t.emergency);
        }
    }

    #[test]
    fn test_transition_records_slots() {
        let t = next(IdentifyPatient, "I'm a new patient", "");
        assert_eq!(t.slot_updates, vec![(Slot::PatientType, "new".to_string())]);

        let t = next(CheckUrgency, "whenever", "");
        assert_eq!(t.next, CollectName);
        assert_eq!(t.slot_updates, vec![(Slot::Urgency, "routine".to_string())]);

        let t = next(CollectInsurance, "I pay out of pocket", "");
        assert_eq!(t.slot_updates, vec![(Slot::Insurance, "cash_pay".to_string())]);

        assert!(next(GetService, "not sure", "").slot_updates.is_empty());
    }

    #[test]
    fn test_templates_are_deterministic() {
        let mut data = IntakeData::default();
        for state in ConversationState::ALL {
            assert_eq!(
                template_for(state, &data, CLINIC),
                template_for(state, &data, CLINIC)
            );
        }
        assert_eq!(template_for(Start, &data, CLINIC), FALLBACK_TEMPLATE);

        data.fill(Slot::Name, "John Smith");
        assert!(template_for(CollectPhone, &data, CLINIC).contains("Name is John Smith"));
        assert!(template_for(VerifyInfo, &data, CLINIC).contains("Name: John Smith"));
        assert!(template_for(Greeting, &data, CLINIC).contains(CLINIC));
    }

    #[test]
    fn test_unknown_state_name_falls_back() {
        let data = IntakeData::default();
        assert_eq!(template_for_name("nonsense", &data, CLINIC), FALLBACK_TEMPLATE);
        assert!(template_for_name("collect_dob", &data, CLINIC).contains("date of birth"));
    }
}
