pub mod google;

use async_trait::async_trait;

use crate::models::SheetRow;

/// Append-only spreadsheet log of bookings and emergencies.
#[async_trait]
pub trait SheetsLogger: Send + Sync {
    /// Appends one row. `Ok(false)` means the sink is not configured and nothing was written.
    async fn append_booking_row(&self, row: &SheetRow) -> anyhow::Result<bool>;
}

/// Column order of the log sheet, after the leading timestamp.
pub fn row_values(timestamp: &str, row: &SheetRow) -> Vec<String> {
    vec![
        timestamp.to_string(),
        row.caller_name.clone(),
        row.phone_number.clone(),
        row.symptoms.clone(),
        row.preferred_date.clone(),
        row.preferred_time.clone(),
        row.doctor.clone(),
        row.status.clone(),
        row.session_id.clone(),
        row.dob.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_values_order() {
        let row = SheetRow {
            caller_name: "John Smith".to_string(),
            phone_number: "5551234567".to_string(),
            symptoms: "cleaning".to_string(),
            preferred_date: "monday".to_string(),
            preferred_time: "morning".to_string(),
            doctor: "To be assigned".to_string(),
            status: "pending".to_string(),
            session_id: "abc".to_string(),
            dob: "01/02/1990".to_string(),
        };
        let values = row_values("2026-01-01 09:00:00", &row);
        assert_eq!(values.len(), 10);
        assert_eq!(values[0], "2026-01-01 09:00:00");
        assert_eq!(values[1], "John Smith");
        assert_eq!(values[3], "cleaning");
        assert_eq!(values[8], "abc");
        assert_eq!(values[9], "01/02/1990");
    }
}
