use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{IntakeData, Slot};

pub const DEFAULT_DOCTOR: &str = "To be assigned";
const TBD: &str = "TBD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub session_id: String,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub patient_dob: Option<String>,
    pub service: Option<String>,
    pub insurance: Option<String>,
    pub appointment_date: String,
    pub appointment_time: String,
    pub doctor: String,
    pub status: BookingStatus,
    pub sms_sent: bool,
    pub reminder_sent: bool,
    pub source: String,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "cancelled" => BookingStatus::Cancelled,
            "completed" => BookingStatus::Completed,
            _ => BookingStatus::Pending,
        }
    }
}

/// Booking assembled from a session's intake record, before it is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingPayload {
    pub session_id: String,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub patient_dob: Option<String>,
    pub service: Option<String>,
    pub insurance: Option<String>,
    pub appointment_date: String,
    pub appointment_time: String,
    pub doctor: String,
    pub status: BookingStatus,
    pub sms_sent: bool,
    pub reminder_sent: bool,
    pub notes: Option<String>,
}

impl BookingPayload {
    pub fn from_intake(session_id: &str, data: &IntakeData, status: BookingStatus) -> Self {
        let owned = |slot: Slot| data.get(slot).map(str::to_string);
        Self {
            session_id: session_id.to_string(),
            patient_name: owned(Slot::Name),
            patient_phone: owned(Slot::Phone),
            patient_email: owned(Slot::Email),
            patient_dob: owned(Slot::Dob),
            service: owned(Slot::Service),
            insurance: owned(Slot::Insurance),
            appointment_date: owned(Slot::PreferredDate).unwrap_or_else(|| TBD.to_string()),
            appointment_time: owned(Slot::PreferredTime).unwrap_or_else(|| TBD.to_string()),
            doctor: DEFAULT_DOCTOR.to_string(),
            status,
            sms_sent: false,
            reminder_sent: false,
            notes: owned(Slot::Notes),
        }
    }

    pub fn to_sheet_row(&self) -> SheetRow {
        SheetRow {
            caller_name: self
                .patient_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            phone_number: self.patient_phone.clone().unwrap_or_default(),
            symptoms: self.service.clone().unwrap_or_default(),
            preferred_date: self.appointment_date.clone(),
            preferred_time: self.appointment_time.clone(),
            doctor: self.doctor.clone(),
            status: self.status.as_str().to_string(),
            session_id: self.session_id.clone(),
            dob: self.patient_dob.clone().unwrap_or_default(),
        }
    }
}

/// One appended spreadsheet row (the sink prepends a timestamp).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SheetRow {
    pub caller_name: String,
    pub phone_number: String,
    pub symptoms: String,
    pub preferred_date: String,
    pub preferred_time: String,
    pub doctor: String,
    pub status: String,
    pub session_id: String,
    pub dob: String,
}

impl SheetRow {
    pub fn emergency(session_id: &str, data: &IntakeData, utterance: &str) -> Self {
        let details: String = utterance.chars().take(100).collect();
        Self {
            caller_name: data.get(Slot::Name).unwrap_or("Unknown").to_string(),
            phone_number: data.get(Slot::Phone).unwrap_or_default().to_string(),
            symptoms: format!("EMERGENCY - {details}"),
            preferred_date: String::new(),
            preferred_time: String::new(),
            doctor: String::new(),
            status: "EMERGENCY".to_string(),
            session_id: session_id.to_string(),
            dob: data.get(Slot::Dob).unwrap_or_default().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults_unset_appointment_fields() {
        let mut data = IntakeData::default();
        data.fill(Slot::Name, "John Smith");
        data.fill(Slot::Service, "cleaning");
        let payload = BookingPayload::from_intake("s1", &data, BookingStatus::Pending);
        assert_eq!(payload.appointment_date, "TBD");
        assert_eq!(payload.appointment_time, "TBD");
        assert_eq!(payload.doctor, DEFAULT_DOCTOR);

        let row = payload.to_sheet_row();
        assert_eq!(row.caller_name, "John Smith");
        assert_eq!(row.symptoms, "cleaning");
        assert_eq!(row.status, "pending");
    }

    #[test]
    fn test_emergency_row_truncates_details() {
        let data = IntakeData::default();
        let long = "a".repeat(300);
        let row = SheetRow::emergency("s1", &data, &long);
        assert_eq!(row.caller_name, "Unknown");
        assert_eq!(row.symptoms.len(), "EMERGENCY - ".len() + 100);
    }
}
