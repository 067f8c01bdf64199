use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tower::ServiceExt;

use frontdesk::config::AppConfig;
use frontdesk::db::{self, queries};
use frontdesk::handlers;
use frontdesk::models::{BookingStatus, Channel, ConversationState, Role, SheetRow, Slot};
use frontdesk::services::ai::reply::APOLOGY;
use frontdesk::services::ai::{LlmProvider, Message};
use frontdesk::services::conversation;
use frontdesk::services::messaging::MessagingProvider;
use frontdesk::services::registry::SessionRegistry;
use frontdesk::services::sheets::SheetsLogger;
use frontdesk::state::AppState;

// ── Mock Providers ──

struct MockLlm {
    fail: bool,
    delay: Duration,
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            anyhow::bail!("provider unavailable");
        }
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        assert!(system_prompt.contains("Alex"));
        Ok(format!("Thanks! You said: {last}"))
    }
}

type Sent = Arc<Mutex<Vec<(String, String)>>>;
type Rows = Arc<Mutex<Vec<SheetRow>>>;

struct MockMessaging {
    sent: Sent,
}

#[async_trait]
impl MessagingProvider for MockMessaging {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

struct MockSheets {
    rows: Rows,
    fail: bool,
}

#[async_trait]
impl SheetsLogger for MockSheets {
    async fn append_booking_row(&self, row: &SheetRow) -> anyhow::Result<bool> {
        if self.fail {
            anyhow::bail!("sheets quota exceeded");
        }
        self.rows.lock().unwrap().push(row.clone());
        Ok(true)
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 8000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        llm_provider: "groq".to_string(),
        groq_api_key: String::new(),
        openrouter_api_key: String::new(),
        openai_api_key: String::new(),
        ai_model: "test-model".to_string(),
        ai_temperature: 0.7,
        ai_max_tokens: 1000,
        ollama_url: "http://localhost:11434".to_string(),
        ollama_model: "llama3.2".to_string(),
        twilio_account_sid: String::new(),
        twilio_auth_token: String::new(), // empty = skip signature validation
        twilio_phone_number: "+15551230000".to_string(),
        staff_phone: "+15559999999".to_string(),
        google_sheet_id: String::new(),
        google_sheets_token: String::new(),
        google_sheet_range: "Sheet1!A:J".to_string(),
        clinic_name: "Bright Smile Dental Clinic".to_string(),
        session_ttl_secs: 1800,
        sweep_interval_secs: 60,
    }
}

struct Harness {
    state: Arc<AppState>,
    sent: Sent,
    rows: Rows,
}

struct Options {
    config: AppConfig,
    llm_fails: bool,
    llm_delay: Duration,
    sheets_fail: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: test_config(),
            llm_fails: false,
            llm_delay: Duration::ZERO,
            sheets_fail: false,
        }
    }
}

fn harness_with(options: Options) -> Harness {
    let conn = db::init_db(":memory:").unwrap();
    let sent: Sent = Arc::new(Mutex::new(vec![]));
    let rows: Rows = Arc::new(Mutex::new(vec![]));
    let state = Arc::new(AppState {
        db: db::shared(conn),
        sessions: SessionRegistry::new(options.config.session_ttl_secs),
        config: options.config,
        llm: Box::new(MockLlm {
            fail: options.llm_fails,
            delay: options.llm_delay,
        }),
        messaging: Box::new(MockMessaging {
            sent: Arc::clone(&sent),
        }),
        sheets: Box::new(MockSheets {
            rows: Arc::clone(&rows),
            fail: options.sheets_fail,
        }),
    });
    Harness { state, sent, rows }
}

fn harness() -> Harness {
    harness_with(Options::default())
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn chat(state: &Arc<AppState>, session_id: &str, message: &str) -> serde_json::Value {
    let response = test_app(Arc::clone(state))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat/message")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({"session_id": session_id, "message": message}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

fn form_encode(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn voice_request(path: &str, params: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("Host", "clinic.test")
        .body(Body::from(form_encode(params)))
        .unwrap()
}

async fn voice(state: &Arc<AppState>, call_sid: &str, speech: &str) -> String {
    let response = test_app(Arc::clone(state))
        .oneshot(voice_request(
            "/voice/process",
            &[("CallSid", call_sid), ("SpeechResult", speech)],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_text(response).await
}

/// Utterances that walk the script from a fresh session to a complete intake record.
const INTAKE_SCRIPT: &[&str] = &[
    "hi",
    "hello there",
    "I'm a new patient",
    "I need a cleaning",
    "next week is fine",
    "My name is John Smith",
    "555-123-4567",
    "01/15/1990",
    "I have Delta Dental",
];

// ── Health ──

#[tokio::test]
async fn test_health() {
    let h = harness();
    let response = test_app(h.state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

// ── Chat channel ──

#[tokio::test]
async fn test_chat_full_booking_flow() {
    let h = harness();
    let sid = "chat-flow";

    let mut last = serde_json::Value::Null;
    for utterance in INTAKE_SCRIPT {
        last = chat(&h.state, sid, utterance).await;
    }
    assert_eq!(last["state"], "verify_info");
    assert_eq!(last["is_complete"], true);
    assert_eq!(last["missing_fields"], serde_json::json!([]));
    assert_eq!(last["data_collected"]["name"], "John Smith");
    assert_eq!(last["data_collected"]["phone"], "5551234567");
    assert_eq!(last["data_collected"]["dob"], "01/15/1990");
    assert_eq!(last["data_collected"]["service"], "cleaning");
    assert_eq!(last["data_collected"]["insurance"], "delta dental");
    assert_eq!(last["data_collected"]["patient_type"], "new");
    assert_eq!(last["data_collected"]["urgency"], "routine");
    assert!(h.rows.lock().unwrap().is_empty());

    assert_eq!(chat(&h.state, sid, "yes that's correct").await["state"], "check_availability");
    let booked = chat(&h.state, sid, "Monday morning works").await;
    assert_eq!(booked["state"], "book_appointment");
    assert_eq!(booked["data_collected"]["preferred_date"], "Monday");
    assert_eq!(booked["data_collected"]["preferred_time"], "Morning");

    assert_eq!(chat(&h.state, sid, "sounds good").await["state"], "confirm_booking");
    assert_eq!(chat(&h.state, sid, "yes, confirm").await["state"], "completed");

    // Side effects fired exactly once across the three booking edges.
    let rows = h.rows.lock().unwrap().clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].caller_name, "John Smith");
    assert_eq!(rows[0].preferred_date, "Monday");

    let sent = h.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+5551234567");
    assert!(sent[0].1.contains("Name: John Smith"));

    let conn = h.state.db.lock().unwrap();
    let bookings = queries::list_bookings_by_date(&conn, "monday").unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].status, BookingStatus::Confirmed);
    assert!(bookings[0].sms_sent);
    assert_eq!(bookings[0].source, "chat");

    let record = queries::get_conversation(&conn, sid).unwrap().unwrap();
    assert_eq!(record.snapshot.state, ConversationState::Completed);
    assert!(record.is_complete);
    assert!(record.completed_at.is_some());
    assert_eq!(record.snapshot.messages.len(), 2 * (INTAKE_SCRIPT.len() + 4));
}

#[tokio::test]
async fn test_chat_generates_session_id() {
    let h = harness();
    let response = test_app(Arc::clone(&h.state))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat/message")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"message":"Hi, I need a cleaning"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let sid = json["session_id"].as_str().unwrap();
    assert_eq!(sid.len(), 36);
    assert_eq!(json["state"], "greeting");
    assert_eq!(json["response"], "Thanks! You said: Hi, I need a cleaning");
    assert!(h.state.sessions.get(sid).is_some());
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let h = harness();
    let response = test_app(h.state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat/message")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"session_id":"x","message":"   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generation_failure_still_answers() {
    let h = harness_with(Options {
        llm_fails: true,
        ..Options::default()
    });
    let json = chat(&h.state, "s-apology", "hi").await;
    assert_eq!(json["response"], APOLOGY);
    assert_eq!(json["state"], "greeting");
}

#[tokio::test]
async fn test_sheets_failure_does_not_fail_turn() {
    let h = harness_with(Options {
        sheets_fail: true,
        ..Options::default()
    });
    let sid = "sheets-down";
    for utterance in &INTAKE_SCRIPT[..INTAKE_SCRIPT.len() - 1] {
        chat(&h.state, sid, utterance).await;
    }
    let verified = chat(&h.state, sid, "I don't have insurance, I'll pay cash").await;
    assert_eq!(verified["state"], "verify_info");
    assert_eq!(verified["data_collected"]["insurance"], "cash_pay");
    assert_eq!(verified["is_complete"], true);

    chat(&h.state, sid, "yes").await;
    let booked = chat(&h.state, sid, "Friday at 3pm").await;
    assert_eq!(booked["state"], "book_appointment");
    assert_eq!(booked["data_collected"]["preferred_time"], "3PM");

    let conn = h.state.db.lock().unwrap();
    assert_eq!(queries::list_bookings_by_date(&conn, "Friday").unwrap().len(), 1);
}

#[tokio::test]
async fn test_booking_without_phone_skips_sms() {
    let h = harness();
    let sid = "no-phone";
    let script = INTAKE_SCRIPT.iter().filter(|u| **u != "555-123-4567");
    for utterance in script {
        chat(&h.state, sid, utterance).await;
    }
    chat(&h.state, sid, "yes").await;
    chat(&h.state, sid, "yes that's correct").await;
    let booked = chat(&h.state, sid, "Monday morning").await;

    assert_eq!(booked["state"], "book_appointment");
    assert_eq!(booked["data_collected"]["phone"], serde_json::Value::Null);
    assert_eq!(booked["data_collected"]["dob"], "01/15/1990");
    assert_eq!(booked["missing_fields"], serde_json::json!(["phone"]));

    assert!(h.sent.lock().unwrap().is_empty());
    let rows = h.rows.lock().unwrap().clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].phone_number, "");

    let conn = h.state.db.lock().unwrap();
    let bookings = queries::get_bookings_for_session(&conn, sid).unwrap();
    assert_eq!(bookings.len(), 1);
    assert!(!bookings[0].sms_sent);
    assert_eq!(bookings[0].patient_phone, None);
}

#[tokio::test]
async fn test_shutdown_keeps_voice_source() {
    let h = harness();
    voice(&h.state, "CA-live", "hi").await;
    h.state.with_db(|conn| {
        conn.execute("DELETE FROM conversations", [])?;
        Ok(())
    })
    .unwrap();

    assert_eq!(conversation::persist_all(&h.state), 1);
    let conn = h.state.db.lock().unwrap();
    let record = queries::get_conversation(&conn, "CA-live").unwrap().unwrap();
    assert_eq!(record.source, "voice");
}

#[tokio::test]
async fn test_emergency_overrides_script() {
    let h = harness();
    let sid = "emergency";
    chat(&h.state, sid, "hi").await;
    chat(&h.state, sid, "hello").await;
    chat(&h.state, sid, "new patient").await;
    let json = chat(&h.state, sid, "severe pain, can't sleep").await;

    assert_eq!(json["state"], "emergency_transfer");
    assert_eq!(json["data_collected"]["urgency"], "emergency");

    let rows = h.rows.lock().unwrap().clone();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "EMERGENCY");
    assert!(rows[0].symptoms.starts_with("EMERGENCY - severe pain"));

    let sent = h.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+15559999999");
    assert!(sent[0].1.contains("EMERGENCY ALERT"));

    // Absorbing: further turns stay put and fire nothing.
    assert_eq!(chat(&h.state, sid, "hello?").await["state"], "emergency_transfer");
    assert_eq!(h.rows.lock().unwrap().len(), 1);
}

// ── Session endpoints ──

#[tokio::test]
async fn test_get_session_snapshot() {
    let h = harness();
    chat(&h.state, "inspect", "hi").await;
    chat(&h.state, "inspect", "hello").await;

    let response = test_app(Arc::clone(&h.state))
        .oneshot(
            Request::builder()
                .uri("/chat/session/inspect")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["session_id"], "inspect");
    assert_eq!(json["state"], "identify_patient");
    assert_eq!(json["turn_count"], 4);
    assert_eq!(json["messages"][0]["role"], "user");
    assert_eq!(json["messages"][0]["content"], "hi");
    assert_eq!(json["is_complete"], false);
    assert_eq!(
        json["missing_fields"],
        serde_json::json!(["name", "phone", "dob", "service", "insurance"])
    );
    assert_eq!(json["qualification"]["status"], "needs_info");
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let h = harness();
    for method in ["GET", "DELETE"] {
        let response = test_app(Arc::clone(&h.state))
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri("/chat/session/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_delete_session() {
    let h = harness();
    chat(&h.state, "bye", "hi").await;

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/chat/session/bye")
            .body(Body::empty())
            .unwrap()
    };
    let response = test_app(Arc::clone(&h.state)).oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.state.sessions.get("bye").is_none());

    let response = test_app(Arc::clone(&h.state)).oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_idle_session_evicted_and_recreated() {
    let h = harness();
    chat(&h.state, "idle", "hi").await;
    chat(&h.state, "idle", "hello").await;

    let later = chrono::Utc::now() + chrono::Duration::seconds(1801);
    assert_eq!(h.state.sessions.sweep_expired(later), vec!["idle".to_string()]);
    assert!(h.state.sessions.get("idle").is_none());

    let json = chat(&h.state, "idle", "hi again").await;
    assert_eq!(json["state"], "greeting");
    let snapshot = h.state.sessions.get("idle").unwrap().snapshot();
    assert_eq!(snapshot.turn_count, 2);
    assert_eq!(snapshot.messages.len(), 2);
}

#[tokio::test]
async fn test_concurrent_turns_on_one_session_are_serialized() {
    let h = harness_with(Options {
        llm_delay: Duration::from_millis(20),
        ..Options::default()
    });
    let (a, b) = tokio::join!(
        conversation::process_turn(&h.state, "race", "hi", Channel::Chat),
        conversation::process_turn(&h.state, "race", "hello", Channel::Chat),
    );
    let mut states = vec![a.state, b.state];
    states.sort_by_key(|s| s.as_str());
    assert_eq!(
        states,
        vec![ConversationState::Greeting, ConversationState::IdentifyPatient]
    );

    let snapshot = h.state.sessions.get("race").unwrap().snapshot();
    assert_eq!(snapshot.turn_count, 4);
    let roles: Vec<Role> = snapshot.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
}

// ── Voice channel ──

#[tokio::test]
async fn test_voice_incoming_greets() {
    let h = harness();
    let response = test_app(h.state)
        .oneshot(voice_request("/voice/incoming", &[("CallSid", "CA1")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/xml"
    );
    let xml = body_text(response).await;
    assert!(xml.contains("Welcome to Bright Smile Dental Clinic"));
    assert!(xml.contains("<Gather input=\"speech\" action=\"/voice/process\""));
}

#[tokio::test]
async fn test_voice_silence_reprompts() {
    let h = harness();
    let response = test_app(Arc::clone(&h.state))
        .oneshot(voice_request("/voice/process", &[("CallSid", "CA2")]))
        .await
        .unwrap();
    let xml = body_text(response).await;
    assert!(xml.contains("Could you please repeat?"));
    assert!(h.state.sessions.get("CA2").is_none());
}

#[tokio::test]
async fn test_voice_call_books_and_hangs_up() {
    let h = harness();
    let sid = "CA-booking";

    let (last, rest) = INTAKE_SCRIPT.split_last().unwrap();
    for utterance in rest {
        let xml = voice(&h.state, sid, utterance).await;
        assert!(xml.contains("<Gather"), "expected gather for {utterance}: {xml}");
        assert!(xml.contains(&format!("You said: {}", utterance.replace('\'', "&apos;"))));
    }

    let xml = voice(&h.state, sid, last).await;
    assert!(xml.contains("Perfect! Your appointment is booked."));
    assert!(xml.contains("5551234567"));
    assert!(xml.ends_with("<Hangup/></Response>"));
    assert!(h.state.sessions.get(sid).is_none());

    assert_eq!(h.rows.lock().unwrap().len(), 1);
    assert_eq!(h.sent.lock().unwrap().len(), 1);

    let conn = h.state.db.lock().unwrap();
    let bookings = queries::get_bookings_for_session(&conn, sid).unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].source, "voice");
    assert_eq!(bookings[0].appointment_date, "TBD");
    let record = queries::get_conversation(&conn, sid).unwrap().unwrap();
    assert_eq!(record.source, "voice");
    assert!(record.snapshot.data.is_set(Slot::Insurance));
}

#[tokio::test]
async fn test_voice_emergency_dials_staff() {
    let h = harness();
    for utterance in ["hi", "hello"] {
        voice(&h.state, "CA-911", utterance).await;
    }
    let xml = voice(&h.state, "CA-911", "my tooth got knocked out and there is bleeding").await;
    assert!(xml.contains("<Dial>+15559999999</Dial>"));
}

#[tokio::test]
async fn test_voice_signature_enforced() {
    let mut config = test_config();
    config.twilio_auth_token = "secret".to_string();
    let h = harness_with(Options {
        config,
        ..Options::default()
    });
    let params = [("CallSid", "CA-signed"), ("SpeechResult", "hello")];

    let response = test_app(Arc::clone(&h.state))
        .oneshot(voice_request("/voice/process", &params))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut sorted = params.to_vec();
    sorted.sort();
    let mut data = "https://clinic.test/voice/process".to_string();
    for (k, v) in &sorted {
        data.push_str(k);
        data.push_str(v);
    }
    let mut mac = Hmac::<Sha1>::new_from_slice(b"secret").unwrap();
    mac.update(data.as_bytes());
    let signature = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    let mut request = voice_request("/voice/process", &params);
    request
        .headers_mut()
        .insert("x-twilio-signature", signature.parse().unwrap());
    let response = test_app(Arc::clone(&h.state)).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.state.sessions.get("CA-signed").is_some());
}

#[tokio::test]
async fn test_voice_status() {
    let h = harness();
    let response = test_app(h.state)
        .oneshot(Request::builder().uri("/voice/test").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await["status"],
        "Voice service not configured"
    );
}

// ── Admin ──

fn admin_get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_admin_requires_auth() {
    let h = harness();
    for token in [None, Some("wrong")] {
        let response = test_app(Arc::clone(&h.state))
            .oneshot(admin_get("/admin/stats", token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_admin_views_and_cancel() {
    let h = harness();
    let sid = "admin-flow";
    for utterance in INTAKE_SCRIPT {
        chat(&h.state, sid, utterance).await;
    }
    chat(&h.state, sid, "yes").await;
    chat(&h.state, sid, "Tuesday afternoon").await;
    chat(&h.state, "other", "hi").await;

    let response = test_app(Arc::clone(&h.state))
        .oneshot(admin_get("/admin/stats", Some("test-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["total_conversations"], 2);
    assert_eq!(stats["completed_bookings"], 1);
    assert_eq!(stats["in_progress"], 1);
    assert_eq!(stats["completion_rate"], "50.0%");

    let response = test_app(Arc::clone(&h.state))
        .oneshot(admin_get("/admin/conversations/recent?limit=5", Some("test-token")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["count"], 2);

    let response = test_app(Arc::clone(&h.state))
        .oneshot(admin_get(&format!("/admin/conversation/{sid}"), Some("test-token")))
        .await
        .unwrap();
    let record = body_json(response).await;
    assert_eq!(record["state"], "book_appointment");
    assert_eq!(record["data"]["name"], "John Smith");
    assert_eq!(record["source"], "chat");

    let response = test_app(Arc::clone(&h.state))
        .oneshot(admin_get("/admin/conversation/nope", Some("test-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = test_app(Arc::clone(&h.state))
        .oneshot(admin_get("/admin/bookings/date/Tuesday", Some("test-token")))
        .await
        .unwrap();
    let bookings = body_json(response).await;
    assert_eq!(bookings["count"], 1);
    assert_eq!(bookings["bookings"][0]["status"], "pending");
    let id = bookings["bookings"][0]["id"].as_i64().unwrap();

    let response = test_app(Arc::clone(&h.state))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/bookings/{id}/cancel"))
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let conn = h.state.db.lock().unwrap();
    let booking = &queries::get_bookings_for_session(&conn, sid).unwrap()[0];
    assert_eq!(booking.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_shutdown_persists_live_sessions() {
    let h = harness();
    chat(&h.state, "live-1", "hi").await;
    chat(&h.state, "live-2", "hi").await;
    assert_eq!(conversation::persist_all(&h.state), 2);

    let conn = h.state.db.lock().unwrap();
    assert!(queries::get_conversation(&conn, "live-1").unwrap().is_some());
}
