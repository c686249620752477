//! REST endpoint handlers for the observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET` | `/` | -- | Minimal HTML status page |
//! | `GET` | `/api/status` | -- | Loop state and counters |
//! | `GET` | `/api/events` | bearer | Event backlog |
//! | `GET` | `/api/debugs` | bearer | Debug backlog |
//! | `POST` | `/api/messages` | bearer | Inject a message |

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse};
use axum::Json;
use logrelay_core::{AccumulatorStats, LoopState};
use logrelay_types::Severity;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/messages`.
#[derive(Debug, serde::Deserialize)]
pub struct PostMessageRequest {
    /// `event`, `debug`, `warning`, or `error`.
    pub severity: String,
    /// Message text.
    pub text: String,
}

/// Body of `GET /api/status`.
#[derive(Debug, serde::Serialize)]
pub struct StatusResponse {
    /// Buffer and subscriber counters.
    #[serde(flatten)]
    pub stats: AccumulatorStats,
    /// Open `WebSocket` connections.
    pub connections: usize,
    /// RFC 3339 start time.
    pub started_at: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
}

#[derive(Debug, serde::Serialize)]
struct AcceptedResponse {
    ok: bool,
    message: String,
}

/// Reject the request unless it carries `Authorization: Bearer <token>`
/// matching the admin token.
fn require_bearer(state: &AppState, headers: &HeaderMap) -> Result<(), ObserverError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();
    if state.authorizes(token) {
        Ok(())
    } else {
        Err(ObserverError::Unauthorized)
    }
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page with the relay's counters.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.accumulator.stats();
    let connections = state.hub.connection_count();
    let loop_state = match stats.loop_state {
        LoopState::Idle => "IDLE",
        LoopState::Running => "RUNNING",
        LoopState::Cancelling => "STOPPING",
        LoopState::Stopped => "STOPPED",
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>logrelay</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        code {{ color: #7ee787; }}
    </style>
</head>
<body>
    <h1>logrelay</h1>
    <p>Broadcast loop: <span class="status">{loop_state}</span></p>
    <div>
        <div class="metric"><div class="label">Events</div><div class="value">{events}</div></div>
        <div class="metric"><div class="label">Debug lines</div><div class="value">{debugs}</div></div>
        <div class="metric"><div class="label">Subscribers</div><div class="value">{subscribers}</div></div>
        <div class="metric"><div class="label">Connections</div><div class="value">{connections}</div></div>
    </div>
    <p>Live stream: <code>/ws/monitor</code> &middot; Status: <a href="/api/status">/api/status</a></p>
</body>
</html>"#,
        events = stats.events,
        debugs = stats.debugs,
        subscribers = stats.subscribers,
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Loop state, buffer sizes, pending counts, and connection counts.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        stats: state.accumulator.stats(),
        connections: state.hub.connection_count(),
        started_at: state.started_at.to_rfc3339(),
        uptime_seconds: state.uptime_seconds(),
    })
}

// ---------------------------------------------------------------------------
// GET /api/events, GET /api/debugs
// ---------------------------------------------------------------------------

/// Full event backlog.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ObserverError> {
    require_bearer(&state, &headers)?;
    Ok(Json(state.accumulator.all_events()))
}

/// Full debug backlog.
pub async fn list_debugs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ObserverError> {
    require_bearer(&state, &headers)?;
    Ok(Json(state.accumulator.all_debugs()))
}

// ---------------------------------------------------------------------------
// POST /api/messages
// ---------------------------------------------------------------------------

/// Publish a message through the communication hub.
///
/// `event` goes to the event buffer; anything else must name a debug
/// severity or the request is rejected with 400.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    require_bearer(&state, &headers)?;

    if body.severity.trim().eq_ignore_ascii_case("event") {
        state.communication.notify_event(&body.text);
    } else {
        let severity = Severity::from_str(&body.severity)?;
        state.communication.send_message(&body.text, severity);
    }

    Ok(Json(AcceptedResponse {
        ok: true,
        message: "Message queued".to_owned(),
    }))
}
