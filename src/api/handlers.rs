//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use super::responses::{
    ErrorResponse, HealthResponse, LoadWorkoutRequest, SessionResponse, StatusResponse,
};
use crate::{error::SessionError, projector::ViewModel, state::AppState};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Map a session error onto a status code and body
fn error_response(state: &AppState, e: SessionError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code, message, view) = match &e {
        SessionError::NoSession => (StatusCode::NOT_FOUND, "no_session", e.to_string(), None),
        SessionError::NotStartable { .. } => (StatusCode::CONFLICT, "not_startable", e.to_string(), None),
        SessionError::Plan(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_plan", e.to_string(), None),
        SessionError::Transition(_) => {
            error!("Session failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "session_failed",
                "Something went wrong during the workout".to_string(),
                state.current_view().ok(),
            )
        }
        SessionError::LockPoisoned(_) => {
            error!("{}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string(), None)
        }
    };
    (status, Json(ErrorResponse::new(code, message, view)))
}

fn session_response(state: &AppState, view: ViewModel) -> Json<SessionResponse> {
    Json(SessionResponse::new(
        state.current_session_id(),
        view,
        state.warnings(),
    ))
}

fn respond(state: &AppState, result: Result<ViewModel, SessionError>) -> ApiResult<SessionResponse> {
    match result {
        Ok(view) => Ok(session_response(state, view)),
        Err(e) => Err(error_response(state, e)),
    }
}

/// Handle POST /session - Load a workout into a fresh session
pub async fn load_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoadWorkoutRequest>,
) -> ApiResult<SessionResponse> {
    match state.load_workout(request.workout) {
        Ok(view) => {
            info!("Session endpoint called - workout '{}' loaded", view.summary.name);
            Ok(session_response(&state, view))
        }
        Err(e) => {
            warn!("Rejected workout: {}", e);
            Err(error_response(&state, e))
        }
    }
}

/// Handle POST /session/start - Start the loaded workout
pub async fn start_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    let result = state.start_session();
    respond(&state, result)
}

/// Handle POST /session/pause - Toggle pause
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    respond(&state, state.toggle_pause())
}

/// Handle POST /session/skip - Skip the current rest
pub async fn skip_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    respond(&state, state.skip())
}

/// Handle POST /session/abort - Abort the workout
pub async fn abort_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    respond(&state, state.abort())
}

/// Handle POST /session/background - App moved to the background
pub async fn background_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    respond(&state, state.app_backgrounded())
}

/// Handle POST /session/foreground - App returned to the foreground
pub async fn foreground_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    respond(&state, state.app_foregrounded())
}

/// Handle GET /session - Current view model
pub async fn session_handler(State(state): State<Arc<AppState>>) -> ApiResult<SessionResponse> {
    respond(&state, state.current_view())
}

/// Handle DELETE /session - Leave the training screen
pub async fn leave_handler(State(state): State<Arc<AppState>>) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    match state.leave() {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(error_response(&state, e)),
    }
}

/// Handle GET /session/events - Server-sent view models and notices
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    // Current view first, then every change
    let views = stream::unfold((state.subscribe_views(), true), |(mut rx, first)| async move {
        if !first {
            rx.changed().await.ok()?;
        }
        let view = rx.borrow_and_update().clone();
        Some((view, (rx, false)))
    })
    .map(|view| Event::default().event("view").json_data(view));

    let notices = stream::unfold(state.subscribe_notices(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notice) => return Some((notice, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, {} notices skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .map(|notice| Event::default().event("notice").json_data(notice));

    Sse::new(stream::select(views, notices)).keep_alive(KeepAlive::default())
}

/// Handle GET /status - Return current service status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let view = state.current_view().ok();
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        session_id: state.current_session_id(),
        stage: view.as_ref().map(|v| v.stage),
        workout: view.map(|v| v.summary.name),
        tick_interval_ms: state.tick_interval.as_millis() as u64,
        warnings: state.warnings(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
