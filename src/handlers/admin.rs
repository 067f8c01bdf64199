use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, ConversationRecord, ConversationSummary};
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if expected_token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /admin/conversations/recent
#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct RecentConversations {
    count: usize,
    conversations: Vec<ConversationSummary>,
}

pub async fn recent_conversations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentConversations>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(10).clamp(1, 500);
    let conversations = state.with_db(|conn| queries::list_recent_conversations(conn, limit))?;

    Ok(Json(RecentConversations {
        count: conversations.len(),
        conversations,
    }))
}

// GET /admin/conversation/:id
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ConversationRecord>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    state
        .with_db(|conn| queries::get_conversation(conn, &id))?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("conversation {id}")))
}

// GET /admin/bookings/date/:date
#[derive(Serialize)]
pub struct BookingsForDate {
    date: String,
    count: usize,
    bookings: Vec<Booking>,
}

pub async fn bookings_by_date(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(date): Path<String>,
) -> Result<Json<BookingsForDate>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let bookings = state.with_db(|conn| queries::list_bookings_by_date(conn, &date))?;
    Ok(Json(BookingsForDate {
        count: bookings.len(),
        date,
        bookings,
    }))
}

// POST /admin/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let updated = state.with_db(|conn| queries::cancel_booking(conn, id))?;
    if !updated {
        return Err(AppError::NotFound(format!("booking {id}")));
    }

    tracing::info!(booking_id = id, "booking cancelled by admin");
    Ok(Json(serde_json::json!({"status": "cancelled", "id": id})))
}

// GET /admin/stats
#[derive(Serialize)]
pub struct StatsResponse {
    total_conversations: i64,
    completed_bookings: i64,
    in_progress: i64,
    completion_rate: String,
    active_sessions: usize,
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let stats = state.with_db(queries::get_stats)?;
    Ok(Json(StatsResponse {
        total_conversations: stats.total,
        completed_bookings: stats.completed,
        in_progress: stats.in_progress,
        completion_rate: format!("{:.1}%", stats.completion_rate),
        active_sessions: state.sessions.len(),
    }))
}
