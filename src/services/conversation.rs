use crate::models::{
    Channel, ConversationState, IntakeData, QualificationResult, Role, Session, Slot,
};
use crate::services::ai::reply;
use crate::services::{extraction, qualification, state_machine, triggers};
use crate::state::AppState;

/// Everything a channel needs to answer the caller after one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub response: String,
    pub state: ConversationState,
    pub data: IntakeData,
    pub missing_fields: Vec<&'static str>,
    pub is_complete: bool,
    pub qualification: QualificationResult,
}

impl TurnOutcome {
    fn from_session(session: &Session, response: String) -> Self {
        let data = session.data().clone();
        Self {
            session_id: session.session_id().to_string(),
            response,
            state: session.state(),
            missing_fields: data.missing_fields(),
            is_complete: data.is_complete(),
            qualification: qualification::qualify(&data),
            data,
        }
    }
}

fn not_yet(value: Option<&str>) -> &str {
    value.unwrap_or("Not yet")
}

/// Wraps the state's template in the channel's persona and delivery rules.
pub fn system_instruction(
    channel: Channel,
    state: ConversationState,
    template: &str,
    data: &IntakeData,
    clinic: &str,
) -> String {
    match channel {
        Channel::Chat => format!(
            "You are Alex, a dental clinic receptionist at {clinic}.\n\n\
             CRITICAL INSTRUCTION: You are in state '{}'.\n\
             Your ONLY task: {template}\n\
             Do NOT ask for other information. Ask ONE question only.\n\n\
             Current data: name={}, phone={}, service={}\n\n\
             Be direct and wait for the answer.",
            state.as_str(),
            data.get(Slot::Name).unwrap_or("None"),
            data.get(Slot::Phone).unwrap_or("None"),
            data.get(Slot::Service).unwrap_or("None"),
        ),
        Channel::Voice => format!(
            "You are Alex, a warm, professional receptionist for {clinic}.\n\n\
             IMPORTANT: This is a VOICE call. Keep responses SHORT (1-2 sentences max).\n\
             Be conversational and natural. Don't list multiple things at once.\n\n\
             CURRENT STATE: {}\n\
             TASK: {template}\n\n\
             COLLECTED INFO:\n\
             - Name: {}\n\
             - Phone: {}\n\
             - Service: {}",
            state.as_str(),
            not_yet(data.get(Slot::Name)),
            not_yet(data.get(Slot::Phone)),
            not_yet(data.get(Slot::Service)),
        ),
    }
}

/// Runs one inbound utterance through the session: reply generation, state
/// transition, extraction, side effects and persistence.
///
/// Turns for the same session id are serialized; turns for different ids run
/// in parallel. Collaborator failures never fail the turn.
pub async fn process_turn(
    state: &AppState,
    session_id: &str,
    message: &str,
    channel: Channel,
) -> TurnOutcome {
    let handle = state.sessions.get_or_create(session_id, channel);
    let _turn = handle.begin_turn().await;

    let (prev, history, system) = {
        let mut session = handle.lock();
        let messages = session.messages();
        let history = messages[messages.len().saturating_sub(channel.history_window())..].to_vec();

        session.add_message(Role::User, message);
        let template =
            state_machine::template_for(session.state(), session.data(), &state.config.clinic_name);
        let system = system_instruction(
            channel,
            session.state(),
            &template,
            session.data(),
            &state.config.clinic_name,
        );
        (session.state(), history, system)
    };

    let response = reply::generate_reply(state.llm.as_ref(), &system, &history, message).await;

    let transition = {
        let mut session = handle.lock();
        session.add_message(Role::Assistant, &response);

        let transition = state_machine::next(prev, message, &response);
        session.set_state(transition.next);
        let filled = session.update_data(|data| {
            transition.apply_to(data);
            extraction::apply(data, transition.next, message)
        });

        tracing::info!(
            session_id,
            channel = channel.as_str(),
            from = prev.as_str(),
            to = transition.next.as_str(),
            filled = ?filled,
            "turn processed"
        );
        transition
    };

    triggers::dispatch(state, &handle, prev, &transition, message).await;
    triggers::persist_snapshot(state, &handle);

    let session = handle.lock();
    TurnOutcome::from_session(&session, response)
}

/// Saves every live session. Used on shutdown.
pub fn persist_all(state: &AppState) -> usize {
    state
        .sessions
        .handles()
        .iter()
        .filter(|handle| triggers::persist_snapshot(state, handle))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_instruction_embeds_template_and_data() {
        let mut data = IntakeData::default();
        data.fill(Slot::Name, "John Smith");
        let text = system_instruction(
            Channel::Chat,
            ConversationState::CollectPhone,
            "ask for phone",
            &data,
            "Bright Smile Dental Clinic",
        );
        assert!(text.contains("You are in state 'collect_phone'"));
        assert!(text.contains("Your ONLY task: ask for phone"));
        assert!(text.contains("name=John Smith, phone=None"));
    }

    #[test]
    fn test_voice_instruction_asks_for_brevity() {
        let text = system_instruction(
            Channel::Voice,
            ConversationState::CollectName,
            "ask for name",
            &IntakeData::default(),
            "Bright Smile Dental Clinic",
        );
        assert!(text.contains("VOICE call"));
        assert!(text.contains("1-2 sentences"));
        assert!(text.contains("- Name: Not yet"));
    }
}
