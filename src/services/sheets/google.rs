use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{row_values, SheetsLogger};
use crate::models::SheetRow;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Google Sheets `values:append` client authenticated with an OAuth bearer token.
pub struct GoogleSheetsLogger {
    sheet_id: String,
    token: String,
    range: String,
    client: reqwest::Client,
}

impl GoogleSheetsLogger {
    pub fn new(sheet_id: String, token: String, range: String) -> Self {
        Self {
            sheet_id,
            token,
            range,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.sheet_id.is_empty() && !self.token.is_empty()
    }
}

#[async_trait]
impl SheetsLogger for GoogleSheetsLogger {
    async fn append_booking_row(&self, row: &SheetRow) -> anyhow::Result<bool> {
        if !self.is_configured() {
            tracing::debug!(session_id = %row.session_id, "sheets sink not configured, skipping row");
            return Ok(false);
        }

        let url = format!(
            "{SHEETS_API}/{}/values/{}:append?valueInputOption=RAW",
            self.sheet_id, self.range
        );
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let body = json!({ "values": [row_values(&timestamp, row)] });

        self.client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("failed to call Google Sheets API")?
            .error_for_status()
            .context("Google Sheets API returned error")?;

        tracing::info!(session_id = %row.session_id, status = %row.status, "appended sheet row");
        Ok(true)
    }
}
