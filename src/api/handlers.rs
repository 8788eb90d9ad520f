//! HTTP request handlers

use super::assets::serve_asset;
use super::sse::sse_stream;
use super::types::{ChatRequest, ChatResponse, ErrorResponse};
use super::AppState;
use crate::render;
use crate::runtime::{SseEvent, SubmitError};
use crate::session::SessionView;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::{headers::Cookie, TypedHeader};

/// Cookie carrying the visitor's session id
pub const SESSION_COOKIE: &str = "terasu_session";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Root serves the chat page
        .route("/", get(serve_page))
        // Embedded stylesheet and script
        .route("/assets/*path", get(serve_asset))
        // Session snapshot
        .route("/api/session", get(get_session))
        // The single inbound action
        .route("/api/chat", post(send_chat))
        // Live re-renders
        .route("/api/stream", get(stream_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session identification
// ============================================================

/// Session id from the cookie, or a new one for a first visit
struct VisitorSession {
    id: String,
    is_new: bool,
}

impl VisitorSession {
    fn from_cookie(cookie: Option<&TypedHeader<Cookie>>) -> Self {
        match cookie.and_then(|TypedHeader(c)| c.get(SESSION_COOKIE)) {
            Some(id) if is_valid_session_id(id) => Self {
                id: id.to_string(),
                is_new: false,
            },
            _ => Self {
                id: uuid::Uuid::new_v4().to_string(),
                is_new: true,
            },
        }
    }

    /// Attach `Set-Cookie` when the session was just created
    fn attach(&self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        if self.is_new {
            let cookie = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        response
    }
}

fn is_valid_session_id(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}

// ============================================================
// Page
// ============================================================

async fn serve_page(
    State(state): State<AppState>,
    cookie: Option<TypedHeader<Cookie>>,
) -> Response {
    let visitor = VisitorSession::from_cookie(cookie.as_ref());
    let view = state.runtime.view(&visitor.id).await;
    let html = render::render_page(state.runtime.persona(), &view);
    visitor.attach(Html(html))
}

// ============================================================
// Session snapshot
// ============================================================

async fn get_session(
    State(state): State<AppState>,
    cookie: Option<TypedHeader<Cookie>>,
) -> Response {
    let visitor = VisitorSession::from_cookie(cookie.as_ref());
    let view: SessionView = state.runtime.view(&visitor.id).await;
    visitor.attach(Json(view))
}

// ============================================================
// Submit
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    cookie: Option<TypedHeader<Cookie>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let visitor = VisitorSession::from_cookie(cookie.as_ref());

    // Blank text is ignored, not an error
    if req.text.trim().is_empty() {
        return Ok(visitor.attach(Json(ChatResponse { queued: false })));
    }

    // The session runtime is the only judge of whether a reply is in progress
    state
        .runtime
        .submit(&visitor.id, req.text)
        .await
        .map_err(|e| match e {
            SubmitError::Busy => AppError::Conflict(e.to_string()),
            SubmitError::Unavailable => AppError::Internal(e.to_string()),
        })?;

    Ok(visitor.attach(Json(ChatResponse { queued: true })))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    cookie: Option<TypedHeader<Cookie>>,
) -> Response {
    let visitor = VisitorSession::from_cookie(cookie.as_ref());

    // Subscribe before the snapshot so no render falls in between
    let broadcast_rx = state.runtime.subscribe(&visitor.id).await;
    let view = state.runtime.view(&visitor.id).await;

    let init_event = SseEvent::Init {
        transcript_html: render::render_transcript(&view.turns),
        flags: view.flags,
    };

    visitor.attach(sse_stream(init_event, broadcast_rx))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("terasu-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    Conflict(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
