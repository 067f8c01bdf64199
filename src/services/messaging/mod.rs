pub mod twilio;

use async_trait::async_trait;

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()>;
}

/// Prefixes `+` when the number lacks a country-code marker.
pub fn to_e164(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{phone}")
    }
}

pub fn booking_confirmation_body(
    clinic: &str,
    callback: &str,
    name: &str,
    service: &str,
    date: &str,
    time: &str,
) -> String {
    format!(
        "Appointment Confirmed!\n\nName: {name}\nService: {service}\nDate: {date}\nTime: {time}\n\n{clinic}\nCall us: {callback}\nReply CANCEL to cancel"
    )
}

pub fn emergency_alert_body(name: &str, details: &str, at: &str) -> String {
    format!(
        "EMERGENCY ALERT\n\nPatient: {name}\nDetails: {details}\nTime: {at}\n\nIMMEDIATE ATTENTION REQUIRED"
    )
}

/// Sends the booking confirmation SMS. Returns whether it was delivered.
#[allow(clippy::too_many_arguments)]
pub async fn send_booking_confirmation(
    messaging: &dyn MessagingProvider,
    clinic: &str,
    callback: &str,
    phone: &str,
    name: &str,
    service: &str,
    date: &str,
    time: &str,
) -> bool {
    let to = to_e164(phone);
    let body = booking_confirmation_body(clinic, callback, name, service, date, time);
    match messaging.send_message(&to, &body).await {
        Ok(()) => {
            tracing::info!(to = %to, "booking confirmation sent");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, to = %to, "failed to send booking confirmation");
            false
        }
    }
}

pub async fn send_emergency_alert(
    messaging: &dyn MessagingProvider,
    staff_phone: &str,
    name: &str,
    details: &str,
) -> bool {
    if staff_phone.is_empty() {
        tracing::warn!("staff_phone not configured, skipping emergency alert");
        return false;
    }
    let at = chrono::Local::now().format("%I:%M %p").to_string();
    let body = emergency_alert_body(name, details, &at);
    match messaging.send_message(&to_e164(staff_phone), &body).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "failed to send emergency alert");
            false
        }
    }
}
