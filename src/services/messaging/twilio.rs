use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::MessagingProvider;

const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";

pub struct TwilioSmsProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
}

impl TwilioSmsProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{TWILIO_API}/Accounts/{}/Messages.json", self.account_sid)
    }

    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }
}

#[async_trait]
impl MessagingProvider for TwilioSmsProvider {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        anyhow::ensure!(self.is_configured(), "Twilio credentials not configured");

        let message: MessageResource = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", &self.from_number), ("Body", body)])
            .send()
            .await
            .context("Twilio unreachable")?
            .error_for_status()
            .context("Twilio rejected the message")?
            .json()
            .await
            .context("unexpected Twilio response body")?;

        tracing::debug!(to, sid = %message.sid, "SMS queued");
        Ok(())
    }
}
