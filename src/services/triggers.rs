//! Side effects driven by state edges: booking finalization and emergency intake.
//!
//! Every effect here is best-effort. Failures are logged and never surface to
//! the caller of the turn.

use crate::db::queries;
use crate::models::{BookingPayload, BookingStatus, ConversationState, IntakeData, SheetRow, Slot};
use crate::services::messaging;
use crate::services::registry::SessionHandle;
use crate::services::state_machine::Transition;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    /// First qualifying edge: log, notify and store the booking.
    Finalize,
    /// Completion after the booking was already stored: promote it to confirmed.
    Confirm,
    Skip,
}

/// Whether this turn entered one of the booking states.
pub fn booking_edge(prev: ConversationState, next: ConversationState) -> bool {
    use ConversationState::*;
    prev != next && matches!(next, BookAppointment | ConfirmBooking | Completed)
}

pub fn booking_action(
    prev: ConversationState,
    next: ConversationState,
    finalized: bool,
) -> BookingAction {
    if !booking_edge(prev, next) {
        BookingAction::Skip
    } else if !finalized {
        BookingAction::Finalize
    } else if next == ConversationState::Completed {
        BookingAction::Confirm
    } else {
        BookingAction::Skip
    }
}

/// Executes whatever the turn's transition owes: emergency intake first, then booking effects.
pub async fn dispatch(
    state: &AppState,
    handle: &SessionHandle,
    prev: ConversationState,
    transition: &Transition,
    utterance: &str,
) {
    let (session_id, data, finalized) = {
        let session = handle.lock();
        (
            session.session_id().to_string(),
            session.data().clone(),
            session.booking_finalized(),
        )
    };

    if transition.emergency {
        execute_emergency(state, &session_id, &data, utterance).await;
    }

    match booking_action(prev, transition.next, finalized) {
        BookingAction::Finalize => {
            finalize_booking(state, handle).await;
        }
        BookingAction::Confirm => confirm_booking(state, &session_id),
        BookingAction::Skip => {}
    }
}

/// Logs the emergency row and alerts staff.
pub async fn execute_emergency(
    state: &AppState,
    session_id: &str,
    data: &IntakeData,
    utterance: &str,
) {
    tracing::warn!(session_id, "emergency reported, escalating");

    let row = SheetRow::emergency(session_id, data, utterance);
    if let Err(e) = state.sheets.append_booking_row(&row).await {
        tracing::error!(error = %e, session_id, "failed to log emergency row");
    }

    messaging::send_emergency_alert(
        state.messaging.as_ref(),
        &state.config.staff_phone,
        data.get(Slot::Name).unwrap_or("Unknown"),
        utterance,
    )
    .await;
}

/// Runs the booking side effects once per session: sheet row, confirmation SMS,
/// booking row, conversation snapshot. Returns the stored booking id, if any.
pub async fn finalize_booking(state: &AppState, handle: &SessionHandle) -> Option<i64> {
    let (session_id, data, current, channel) = {
        let mut session = handle.lock();
        if session.booking_finalized() {
            return None;
        }
        session.mark_booking_finalized();
        (
            session.session_id().to_string(),
            session.data().clone(),
            session.state(),
            session.channel(),
        )
    };

    let status = if current == ConversationState::Completed {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    };
    let mut payload = BookingPayload::from_intake(&session_id, &data, status);
    tracing::info!(
        session_id = %session_id,
        patient = payload.patient_name.as_deref().unwrap_or("Unknown"),
        "finalizing booking"
    );

    match state.sheets.append_booking_row(&payload.to_sheet_row()).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(session_id = %session_id, "booking row not logged"),
        Err(e) => tracing::error!(error = %e, session_id = %session_id, "failed to log booking row"),
    }

    if let Some(phone) = payload.patient_phone.clone() {
        payload.sms_sent = messaging::send_booking_confirmation(
            state.messaging.as_ref(),
            &state.config.clinic_name,
            &state.config.twilio_phone_number,
            &phone,
            payload.patient_name.as_deref().unwrap_or("Patient"),
            payload.service.as_deref().unwrap_or("Appointment"),
            &payload.appointment_date,
            &payload.appointment_time,
        )
        .await;
    }

    let booking_id = match state.with_db(|conn| queries::save_booking(conn, &payload, channel)) {
        Ok(id) => {
            tracing::info!(session_id = %session_id, booking_id = id, "booking saved");
            Some(id)
        }
        Err(e) => {
            tracing::error!(error = %e, session_id = %session_id, "failed to save booking");
            None
        }
    };

    persist_snapshot(state, handle);
    booking_id
}

fn confirm_booking(state: &AppState, session_id: &str) {
    match state.with_db(|conn| {
        queries::update_booking_status_for_session(conn, session_id, BookingStatus::Confirmed)
    }) {
        Ok(n) => tracing::info!(session_id, updated = n, "booking confirmed"),
        Err(e) => tracing::error!(error = %e, session_id, "failed to confirm booking"),
    }
}

/// Saves the session's current snapshot under its own channel, logging instead
/// of failing. Returns whether the save went through.
pub fn persist_snapshot(state: &AppState, handle: &SessionHandle) -> bool {
    let (snapshot, channel) = {
        let session = handle.lock();
        (session.to_snapshot(), session.channel())
    };
    match state.with_db(|conn| queries::save_conversation(conn, &snapshot, channel)) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, session_id = %snapshot.session_id, "failed to save conversation");
            false
        }
    }
}
