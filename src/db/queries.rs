use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::models::{
    Booking, BookingPayload, BookingStatus, Channel, ConversationMessage, ConversationRecord,
    ConversationState, ConversationSummary, IntakeData, SessionSnapshot,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn now_str() -> String {
    Utc::now().naive_utc().format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_instant(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid stored timestamp: {s}"))?
        .with_timezone(&Utc))
}

// ── Conversations ──

/// Upserts one session snapshot. `source` is fixed by the first save; `completed_at` is
/// stamped by the first save in the completed state.
pub fn save_conversation(
    conn: &Connection,
    snapshot: &SessionSnapshot,
    source: Channel,
) -> anyhow::Result<()> {
    let messages_json = serde_json::to_string(&snapshot.messages)?;
    let completed_at = (snapshot.state == ConversationState::Completed).then(now_str);
    let data = &snapshot.data;

    conn.execute(
        "INSERT INTO conversations (
            session_id, state, patient_name, patient_phone, patient_email, patient_dob,
            service, insurance, patient_type, urgency, preferred_date, preferred_time, notes,
            messages, turn_count, booking_finalized, is_complete, source,
            created_at, updated_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
         ON CONFLICT(session_id) DO UPDATE SET
           state = excluded.state,
           patient_name = excluded.patient_name,
           patient_phone = excluded.patient_phone,
           patient_email = excluded.patient_email,
           patient_dob = excluded.patient_dob,
           service = excluded.service,
           insurance = excluded.insurance,
           patient_type = excluded.patient_type,
           urgency = excluded.urgency,
           preferred_date = excluded.preferred_date,
           preferred_time = excluded.preferred_time,
           notes = excluded.notes,
           messages = excluded.messages,
           turn_count = excluded.turn_count,
           booking_finalized = excluded.booking_finalized,
           is_complete = excluded.is_complete,
           updated_at = excluded.updated_at,
           completed_at = COALESCE(conversations.completed_at, excluded.completed_at)",
        params![
            snapshot.session_id,
            snapshot.state.as_str(),
            data.name,
            data.phone,
            data.email,
            data.dob,
            data.service,
            data.insurance,
            data.patient_type,
            data.urgency,
            data.preferred_date,
            data.preferred_time,
            data.notes,
            messages_json,
            snapshot.turn_count,
            snapshot.booking_finalized,
            snapshot.is_complete(),
            source.as_str(),
            snapshot.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            snapshot.updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            completed_at,
        ],
    )?;
    Ok(())
}

pub fn get_conversation(
    conn: &Connection,
    session_id: &str,
) -> anyhow::Result<Option<ConversationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT session_id, state, patient_name, patient_phone, patient_email, patient_dob,
                service, insurance, patient_type, urgency, preferred_date, preferred_time, notes,
                messages, turn_count, booking_finalized, is_complete, source,
                created_at, updated_at, completed_at
         FROM conversations WHERE session_id = ?1",
    )?;

    let row = stmt
        .query_row(params![session_id], |row| Ok(parse_conversation_row(row)))
        .optional()?;

    row.transpose()
}

fn parse_conversation_row(row: &rusqlite::Row) -> anyhow::Result<ConversationRecord> {
    let state_str: String = row.get(1)?;
    let messages_json: String = row.get(13)?;
    let created_at: String = row.get(18)?;
    let updated_at: String = row.get(19)?;
    let completed_at: Option<String> = row.get(20)?;

    let state = ConversationState::parse(&state_str)
        .with_context(|| format!("unknown stored state: {state_str}"))?;
    let messages: Vec<ConversationMessage> =
        serde_json::from_str(&messages_json).context("invalid stored message history")?;

    let data = IntakeData {
        name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        dob: row.get(5)?,
        service: row.get(6)?,
        insurance: row.get(7)?,
        patient_type: row.get(8)?,
        urgency: row.get(9)?,
        preferred_date: row.get(10)?,
        preferred_time: row.get(11)?,
        notes: row.get(12)?,
    };

    Ok(ConversationRecord {
        snapshot: SessionSnapshot {
            session_id: row.get(0)?,
            state,
            data,
            messages,
            turn_count: row.get(14)?,
            booking_finalized: row.get(15)?,
            created_at: parse_instant(&created_at)?,
            updated_at: parse_instant(&updated_at)?,
        },
        is_complete: row.get(16)?,
        source: row.get(17)?,
        completed_at: completed_at.as_deref().map(parse_ts),
    })
}

pub fn list_recent_conversations(
    conn: &Connection,
    limit: i64,
) -> anyhow::Result<Vec<ConversationSummary>> {
    let mut stmt = conn.prepare(
        "SELECT session_id, patient_name, patient_phone, state, is_complete, source, created_at, updated_at
         FROM conversations ORDER BY updated_at DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        Ok(ConversationSummary {
            session_id: row.get(0)?,
            patient_name: row.get(1)?,
            patient_phone: row.get(2)?,
            state: row.get(3)?,
            is_complete: row.get(4)?,
            source: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    })?;

    let mut conversations = vec![];
    for row in rows {
        conversations.push(row?);
    }
    Ok(conversations)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConversationStats {
    pub total: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub completion_rate: f64,
}

/// Completion figures over the 100 most recently updated conversations.
pub fn get_stats(conn: &Connection) -> anyhow::Result<ConversationStats> {
    let (total, completed): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_complete), 0) FROM (
            SELECT is_complete FROM conversations ORDER BY updated_at DESC LIMIT 100
         )",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let completion_rate = if total > 0 {
        (completed as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(ConversationStats {
        total,
        completed,
        in_progress: total - completed,
        completion_rate,
    })
}

// ── Bookings ──

/// Stores a booking and returns its row id.
pub fn save_booking(
    conn: &Connection,
    payload: &BookingPayload,
    source: Channel,
) -> anyhow::Result<i64> {
    let now = now_str();
    conn.execute(
        "INSERT INTO bookings (session_id, patient_name, patient_phone, patient_email, patient_dob,
            service, insurance, appointment_date, appointment_time, doctor, status,
            sms_sent, reminder_sent, source, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)",
        params![
            payload.session_id,
            payload.patient_name,
            payload.patient_phone,
            payload.patient_email,
            payload.patient_dob,
            payload.service,
            payload.insurance,
            payload.appointment_date,
            payload.appointment_time,
            payload.doctor,
            payload.status.as_str(),
            payload.sms_sent,
            payload.reminder_sent,
            source.as_str(),
            payload.notes,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_bookings_by_date(conn: &Connection, date: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, patient_name, patient_phone, patient_email, patient_dob, service,
                insurance, appointment_date, appointment_time, doctor, status, sms_sent,
                reminder_sent, source, notes, created_at, updated_at
         FROM bookings WHERE appointment_date = ?1 COLLATE NOCASE ORDER BY appointment_time ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![date], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_for_session(conn: &Connection, session_id: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, patient_name, patient_phone, patient_email, patient_dob, service,
                insurance, appointment_date, appointment_time, doctor, status, sms_sent,
                reminder_sent, source, notes, created_at, updated_at
         FROM bookings WHERE session_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![session_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Moves every non-cancelled booking of a session to `status`. Returns the number touched.
pub fn update_booking_status_for_session(
    conn: &Connection,
    session_id: &str,
    status: BookingStatus,
) -> anyhow::Result<usize> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2
         WHERE session_id = ?3 AND status != 'cancelled'",
        params![status.as_str(), now_str(), session_id],
    )?;
    Ok(count)
}

pub fn cancel_booking(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![BookingStatus::Cancelled.as_str(), now_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get(11)?;
    let created_at_str: String = row.get(16)?;
    let updated_at_str: String = row.get(17)?;

    Ok(Booking {
        id: row.get(0)?,
        session_id: row.get(1)?,
        patient_name: row.get(2)?,
        patient_phone: row.get(3)?,
        patient_email: row.get(4)?,
        patient_dob: row.get(5)?,
        service: row.get(6)?,
        insurance: row.get(7)?,
        appointment_date: row.get(8)?,
        appointment_time: row.get(9)?,
        doctor: row.get(10)?,
        status: BookingStatus::parse(&status_str),
        sms_sent: row.get(12)?,
        reminder_sent: row.get(13)?,
        source: row.get(14)?,
        notes: row.get(15)?,
        created_at: parse_ts(&created_at_str),
        updated_at: parse_ts(&updated_at_str),
    })
}
