//! Session ticker background task

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::state::{app_state::TickOutcome, AppState};

/// Recurring scheduling callback for one session.
///
/// Runs until the session leaves its live stages, is replaced, or the task is
/// aborted. Every tick is guarded by `session_id`.
pub async fn session_ticker_task(state: Arc<AppState>, session_id: u64) {
    info!(
        "Starting ticker for session {} every {}ms",
        session_id,
        state.tick_interval.as_millis()
    );

    let mut ticks = interval(state.tick_interval);
    // A suspended process catches up with one tick, not a burst
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticks.tick().await;

        match state.tick_session(session_id) {
            Ok(TickOutcome::Continue) => {}
            Ok(TickOutcome::Stop) => {
                debug!("Ticker for session {} finished", session_id);
                break;
            }
            Err(e) => {
                error!("Session {} tick failed: {}", session_id, e);
                break;
            }
        }
    }
}
