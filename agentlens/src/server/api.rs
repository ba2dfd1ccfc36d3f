//! Read-only query API over recorded sessions.
//!
//! Endpoints:
//! - GET /api/sessions - All sessions, newest first
//! - GET /api/sessions/{id} - One session
//! - GET /api/sessions/{id}/messages - Message log in sequence order
//! - GET /api/sessions/{id}/calls - Requests paired with their responses
//! - GET /api/sessions/{id}/stats - Call count, errors, latency, duration
//! - OPTIONS * - CORS preflight

use axum::{
    extract::{Path, Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};

use crate::db::SessionStore;
use crate::error::ApiError;
use crate::models::{pair_messages, Message, Session, SessionStats, ToolCall};

const SESSION_NOT_FOUND: ApiError = ApiError::NotFound("Session not found");

#[derive(Clone)]
pub struct ApiState {
    store: SessionStore,
}

pub fn router(store: SessionStore) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/messages", get(list_messages))
        .route("/api/sessions/{id}/calls", get(list_calls))
        .route("/api/sessions/{id}/stats", get(session_stats))
        .fallback(not_found)
        .layer(cors())
        .layer(middleware::from_fn(preflight))
        .with_state(ApiState { store })
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Answer every OPTIONS request with 204, whatever the path.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
    )
        .into_response()
}

// === Handlers ===

async fn list_sessions(State(state): State<ApiState>) -> Result<Json<Vec<Session>>, ApiError> {
    Ok(Json(state.store.list_sessions()?))
}

async fn get_session(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    let session = state.store.get_session(&id)?.ok_or(SESSION_NOT_FOUND)?;
    Ok(Json(session))
}

async fn list_messages(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    state.store.get_session(&id)?.ok_or(SESSION_NOT_FOUND)?;
    Ok(Json(state.store.get_messages(&id)?))
}

async fn list_calls(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ToolCall>>, ApiError> {
    state.store.get_session(&id)?.ok_or(SESSION_NOT_FOUND)?;
    let messages = state.store.get_messages(&id)?;
    Ok(Json(pair_messages(&messages)))
}

async fn session_stats(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStats>, ApiError> {
    let session = state.store.get_session(&id)?.ok_or(SESSION_NOT_FOUND)?;
    let calls = pair_messages(&state.store.get_messages(&id)?);
    Ok(Json(SessionStats::compute(
        &session,
        &calls,
        Utc::now().timestamp_millis(),
    )))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found")
}
