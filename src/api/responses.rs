//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{plan::RawWorkout, projector::ViewModel, state::Stage};

/// Body of `POST /session`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadWorkoutRequest {
    pub workout: RawWorkout,
}

/// Response for every session endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Option<u64>,
    pub view: ViewModel,
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl SessionResponse {
    pub fn new(session_id: Option<u64>, view: ViewModel, warnings: Vec<String>) -> Self {
        Self {
            session_id,
            view,
            warnings,
            timestamp: Utc::now(),
        }
    }
}

/// Error body. `view` is present when the session itself failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewModel>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: String, view: Option<ViewModel>) -> Self {
        Self {
            status: "error".to_string(),
            code: code.to_string(),
            message,
            timestamp: Utc::now(),
            view,
        }
    }
}

/// Service status with a short session summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub session_id: Option<u64>,
    pub stage: Option<Stage>,
    pub workout: Option<String>,
    pub tick_interval_ms: u64,
    pub warnings: Vec<String>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
