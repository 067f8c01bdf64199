use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use uuid::Uuid;

use crate::models::{Channel, ConversationState, Slot};
use crate::services::voice::{self, VoiceDirective};
use crate::services::{conversation, triggers};
use crate::state::AppState;

const EMERGENCY_TRANSFER_LINE: &str =
    "This sounds like an emergency. I'm transferring you to our on-call staff right now. Please hold.";
const EMERGENCY_NO_STAFF_LINE: &str =
    "This sounds like a dental emergency. Please call 911 or go to the nearest emergency room right away.";

type Params = BTreeMap<String, String>;

/// Twilio request signature: HMAC-SHA1 over the full URL followed by every
/// posted parameter as key+value in key order, base64 encoded.
pub fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &Params,
) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) else {
        return false;
    };

    mac.update(url.as_bytes());
    for (key, value) in params {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    mac.verify_slice(&expected).is_ok()
}

#[allow(clippy::result_large_err)]
fn verify_request(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    params: &Params,
) -> Result<(), Response> {
    if state.config.twilio_auth_token.is_empty() {
        return Ok(());
    }

    let signature = headers
        .get("x-twilio-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if signature.is_empty() {
        tracing::warn!("missing X-Twilio-Signature header");
        return Err((StatusCode::FORBIDDEN, "Missing signature").into_response());
    }

    // Behind a proxy the public URL comes from the forwarded headers.
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = format!("{proto}://{host}{path}");

    if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, params) {
        tracing::warn!(url = %url, "invalid Twilio signature");
        return Err((StatusCode::FORBIDDEN, "Invalid signature").into_response());
    }
    Ok(())
}

fn twiml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

// POST /voice/incoming
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Form(params): Form<Params>,
) -> Response {
    if let Err(rejection) = verify_request(&state, &headers, &uri, &params) {
        return rejection;
    }
    tracing::info!(call_sid = params.get("CallSid").map(String::as_str).unwrap_or(""), "incoming call");
    twiml(voice::greeting(&state.config.clinic_name))
}

// POST /voice/process
pub async fn process_speech(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Form(params): Form<Params>,
) -> Response {
    if let Err(rejection) = verify_request(&state, &headers, &uri, &params) {
        return rejection;
    }

    let clinic = state.config.clinic_name.as_str();
    let call_sid = params
        .get("CallSid")
        .filter(|sid| !sid.is_empty())
        .cloned()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let speech = params
        .get("SpeechResult")
        .map(|s| s.trim())
        .unwrap_or("");

    if speech.is_empty() {
        return twiml(
            VoiceDirective::Gather {
                say: voice::REPROMPT.to_string(),
            }
            .to_twiml(clinic),
        );
    }

    tracing::info!(call_sid = %call_sid, speech = %speech, "caller speech");
    let outcome = conversation::process_turn(&state, &call_sid, speech, Channel::Voice).await;

    let directive = if outcome.state == ConversationState::EmergencyTransfer {
        let staff = Some(state.config.staff_phone.clone()).filter(|p| !p.is_empty());
        let say = if staff.is_some() {
            EMERGENCY_TRANSFER_LINE
        } else {
            EMERGENCY_NO_STAFF_LINE
        };
        VoiceDirective::Transfer {
            say: say.to_string(),
            to: staff,
        }
    } else if outcome.is_complete {
        if let Some(handle) = state.sessions.get(&call_sid) {
            triggers::finalize_booking(&state, &handle).await;
        }
        state.sessions.delete(&call_sid);
        tracing::info!(call_sid = %call_sid, "call intake complete, session closed");

        VoiceDirective::Hangup {
            say: format!(
                "Perfect! Your appointment is booked. We'll send a confirmation to {}.",
                outcome.data.get(Slot::Phone).unwrap_or("your phone")
            ),
        }
    } else {
        VoiceDirective::Gather {
            say: outcome.response,
        }
    };

    twiml(directive.to_twiml(clinic))
}

// GET /voice/test
pub async fn voice_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let config = &state.config;
    if !config.twilio_account_sid.is_empty() && !config.twilio_auth_token.is_empty() {
        Json(serde_json::json!({
            "status": "Voice service configured",
            "phone_number": config.twilio_phone_number,
        }))
    } else {
        Json(serde_json::json!({
            "status": "Voice service not configured",
            "message": "Set TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN",
        }))
    }
}
