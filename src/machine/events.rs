//! Events consumed and effects produced by the session machine

use serde::{Deserialize, Serialize};

use crate::state::Stage;

/// Input to the session machine: UI actions, lifecycle signals and timer activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Start,
    /// Periodic scheduling callback; samples the step timer
    Tick,
    /// Step timer reached zero. `generation` identifies the timer instance.
    TimerExpired { generation: u64 },
    TogglePause,
    /// End the current rest step early
    Skip,
    Abort,
    AppBackgrounded,
    AppForegrounded,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Start => "start",
            SessionEvent::Tick => "tick",
            SessionEvent::TimerExpired { .. } => "timer_expired",
            SessionEvent::TogglePause => "toggle_pause",
            SessionEvent::Skip => "skip",
            SessionEvent::Abort => "abort",
            SessionEvent::AppBackgrounded => "app_backgrounded",
            SessionEvent::AppForegrounded => "app_foregrounded",
        }
    }
}

/// Figures handed to the metrics collaborator when a workout completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub workout_id: Option<String>,
    pub total_duration_seconds: u64,
    pub estimated_calories: u32,
}

/// Observable outcome of a transition, for the host to act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEffect {
    /// Stage or step changed
    Transitioned {
        from: Stage,
        to: Stage,
        step_index: Option<usize>,
        step_duration_seconds: Option<u64>,
    },
    PauseChanged { paused: bool },
    /// Session was paused because the app went to the background
    AutoPaused,
    /// Emitted at most once per session
    Completed(CompletionReport),
    Aborted,
    Failed { reason: String },
}
