pub mod admin;
pub mod chat;
pub mod health;
pub mod voice;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/chat/message", post(chat::send_message))
        .route(
            "/chat/session/:id",
            get(chat::get_session).delete(chat::delete_session),
        )
        .route("/voice/incoming", post(voice::incoming_call))
        .route("/voice/process", post(voice::process_speech))
        .route("/voice/test", get(voice::voice_status))
        .route(
            "/admin/conversations/recent",
            get(admin::recent_conversations),
        )
        .route("/admin/conversation/:id", get(admin::get_conversation))
        .route("/admin/bookings/date/:date", get(admin::bookings_by_date))
        .route("/admin/bookings/:id/cancel", post(admin::cancel_booking))
        .route("/admin/stats", get(admin::get_stats))
        .with_state(state)
}
