//! Progress reporting to the fitness backend
//!
//! Every call is best-effort: the session never waits on, retries, or changes
//! state because of a report.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::{error::RecordingFailure, machine::CompletionReport, state::Stage};

/// External collaborator that records session progress
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Record a finished workout's duration and calorie estimate
    async fn update_metrics(&self, report: &CompletionReport) -> Result<(), RecordingFailure>;

    /// Ask the backend to re-evaluate the user's achievements
    async fn update_achievements(&self) -> Result<(), RecordingFailure>;

    /// Mirror the pause flag
    async fn sync_pause_state(&self, paused: bool) -> Result<(), RecordingFailure>;

    /// Announce the duration of the step that just started
    async fn sync_step_time(&self, duration_seconds: u64, stage: Stage) -> Result<(), RecordingFailure>;
}

/// Reporter used when no backend is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReporter;

#[async_trait]
impl ProgressReporter for LoggingReporter {
    async fn update_metrics(&self, report: &CompletionReport) -> Result<(), RecordingFailure> {
        info!(
            "Workout completed: {}s, ~{} kcal (no backend configured)",
            report.total_duration_seconds, report.estimated_calories
        );
        Ok(())
    }

    async fn update_achievements(&self) -> Result<(), RecordingFailure> {
        debug!("Achievements update skipped (no backend configured)");
        Ok(())
    }

    async fn sync_pause_state(&self, paused: bool) -> Result<(), RecordingFailure> {
        debug!("Pause state {} not synced (no backend configured)", paused);
        Ok(())
    }

    async fn sync_step_time(&self, duration_seconds: u64, stage: Stage) -> Result<(), RecordingFailure> {
        debug!("{} step of {}s not synced (no backend configured)", stage, duration_seconds);
        Ok(())
    }
}

/// Reporter that talks to the REST backend
#[derive(Debug, Clone)]
pub struct BackendReporter {
    client: reqwest::Client,
    base_url: String,
}

impl BackendReporter {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RecordingFailure> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RecordingFailure::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), RecordingFailure> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RecordingFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecordingFailure::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressReporter for BackendReporter {
    async fn update_metrics(&self, report: &CompletionReport) -> Result<(), RecordingFailure> {
        self.post(
            "/users/metrics",
            json!({
                "workoutId": report.workout_id,
                "totalDurationSeconds": report.total_duration_seconds,
                "estimatedCalories": report.estimated_calories,
            }),
        )
        .await?;
        info!("Recorded completion: {}s, ~{} kcal", report.total_duration_seconds, report.estimated_calories);
        Ok(())
    }

    async fn update_achievements(&self) -> Result<(), RecordingFailure> {
        self.post("/users/achievements", json!({})).await
    }

    async fn sync_pause_state(&self, paused: bool) -> Result<(), RecordingFailure> {
        self.post(
            "/workout/state",
            json!({ "paused": paused, "clientTimestamp": Utc::now().timestamp_millis() }),
        )
        .await
    }

    async fn sync_step_time(&self, duration_seconds: u64, stage: Stage) -> Result<(), RecordingFailure> {
        let Some(body) = step_time_body(duration_seconds, stage, Utc::now().timestamp_millis()) else {
            debug!("No step time sync for {} step of {}s", stage, duration_seconds);
            return Ok(());
        };
        self.post("/boards/sync-time", body).await
    }
}

/// Stage name as the boards endpoint expects it; only live stages are synced
fn backend_stage_label(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Active => Some("ACTIVO"),
        Stage::Rest => Some("DESCANSO"),
        _ => None,
    }
}

fn step_time_body(duration_seconds: u64, stage: Stage, client_timestamp: i64) -> Option<serde_json::Value> {
    if duration_seconds == 0 {
        return None;
    }
    let etapa = backend_stage_label(stage)?;
    Some(json!({
        "duration": duration_seconds,
        "clientTimestamp": client_timestamp,
        "etapa": etapa,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let reporter = BackendReporter::new("http://localhost:3000/api/").unwrap();
        assert_eq!(reporter.base_url, "http://localhost:3000/api");
    }

    #[test]
    fn step_time_uses_backend_stage_names() {
        let body = step_time_body(30, Stage::Active, 1_700_000_000_000).unwrap();
        assert_eq!(
            body,
            json!({ "duration": 30, "clientTimestamp": 1_700_000_000_000i64, "etapa": "ACTIVO" })
        );
        assert_eq!(step_time_body(10, Stage::Rest, 0).unwrap()["etapa"], "DESCANSO");
    }

    #[test]
    fn step_time_is_not_synced_outside_live_stages() {
        assert!(step_time_body(30, Stage::Done, 0).is_none());
        assert!(step_time_body(30, Stage::Init, 0).is_none());
        assert!(step_time_body(0, Stage::Active, 0).is_none());
    }

    #[tokio::test]
    async fn malformed_backend_url_is_a_transport_failure() {
        let reporter = BackendReporter::new("not a url").unwrap();
        let result = reporter.update_achievements().await;
        assert!(matches!(result, Err(RecordingFailure::Transport(_))));
    }
}
