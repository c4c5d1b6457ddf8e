//! Progress reporting background task

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::{
    machine::{CompletionReport, SessionEffect},
    services::ProgressReporter,
    state::{AppState, NoticeEvent},
};

/// Background task that forwards session notices to the backend.
///
/// Each report runs on its own task so a slow backend never delays the next
/// notice, and never touches session state.
pub async fn progress_reporter_task(state: Arc<AppState>, reporter: Arc<dyn ProgressReporter>) {
    info!("Starting progress reporter task");

    let mut notices = state.subscribe_notices();

    loop {
        match notices.recv().await {
            Ok(notice) => {
                let NoticeEvent::Session(effect) = notice.event else {
                    continue;
                };
                let reporter = Arc::clone(&reporter);
                match effect {
                    SessionEffect::Completed(report) => {
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            record_completion(state, reporter, notice.session_id, report).await;
                        });
                    }
                    SessionEffect::PauseChanged { paused } => {
                        tokio::spawn(async move {
                            if let Err(e) = reporter.sync_pause_state(paused).await {
                                warn!("Failed to sync pause state: {}", e);
                            }
                        });
                    }
                    SessionEffect::Transitioned {
                        to,
                        step_duration_seconds: Some(duration),
                        ..
                    } if to.is_live() => {
                        tokio::spawn(async move {
                            if let Err(e) = reporter.sync_step_time(duration, to).await {
                                debug!("Failed to sync step time: {}", e);
                            }
                        });
                    }
                    _ => {}
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Progress reporter lagged, {} notices skipped", skipped);
            }
            Err(RecvError::Closed) => {
                error!("Notice channel closed, stopping progress reporter");
                break;
            }
        }
    }
}

/// Record metrics then achievements; a failure becomes a UI warning
pub async fn record_completion(
    state: Arc<AppState>,
    reporter: Arc<dyn ProgressReporter>,
    session_id: u64,
    report: CompletionReport,
) {
    if let Err(e) = reporter.update_metrics(&report).await {
        state.record_failure(session_id, format!("Workout results could not be saved: {}", e));
        return;
    }
    if let Err(e) = reporter.update_achievements().await {
        state.record_failure(session_id, format!("Achievements could not be updated: {}", e));
    }
}
