//! Progress projection: derives the UI view model from plan and session state

use serde::{Deserialize, Serialize};

use crate::{
    plan::{ExerciseInfo, WorkoutPlan, WorkoutSummary},
    state::{SessionState, Stage},
};

/// UI-ready snapshot of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub stage: Stage,
    pub step_index: Option<usize>,
    pub remaining_ms: u64,
    pub remaining_seconds: u64,
    pub clock_label: String,
    /// Share of the current step already consumed, 0.0 to 1.0
    pub progress: f64,
    pub is_rest: bool,
    pub paused: bool,
    pub current_exercise_ordinal: usize,
    pub total_real_exercises: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_exercise: Option<ExerciseInfo>,
    /// Only populated while resting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_exercise_preview: Option<ExerciseInfo>,
    pub summary: WorkoutSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Project a session onto its view model. Pure; safe to call on every tick.
pub fn project(plan: &WorkoutPlan, state: &SessionState) -> ViewModel {
    let step = state.current_step_index.and_then(|i| plan.step(i).map(|s| (i, s)));
    let is_rest = state.stage == Stage::Rest;

    // Ordinal of the exercise being done, or of the one coming up during rest
    let (current_exercise_ordinal, upcoming) = match step {
        None => (0, None),
        Some((index, step)) if step.is_rest() => match plan.next_exercise_from(index + 1) {
            Some((next_index, next)) => (
                plan.real_ordinal_of(next_index).unwrap_or(plan.total_real_exercises()),
                Some(next),
            ),
            None => (plan.total_real_exercises(), None),
        },
        Some((index, _)) => (plan.real_ordinal_of(index).unwrap_or(0), None),
    };

    let progress = match (state.stage, step) {
        (Stage::Done, _) => 1.0,
        (_, Some((_, step))) if step.duration_ms() > 0 => {
            let consumed = step.duration_ms().saturating_sub(state.remaining_ms);
            (consumed as f64 / step.duration_ms() as f64).clamp(0.0, 1.0)
        }
        _ => 0.0,
    };

    let remaining_seconds = state.remaining_ms.div_ceil(1000);

    ViewModel {
        stage: state.stage,
        step_index: state.current_step_index,
        remaining_ms: state.remaining_ms,
        remaining_seconds,
        clock_label: format_clock(remaining_seconds),
        progress,
        is_rest,
        paused: state.paused,
        current_exercise_ordinal,
        total_real_exercises: plan.total_real_exercises(),
        current_exercise: step.and_then(|(_, s)| s.exercise().cloned()),
        next_exercise_preview: if is_rest { upcoming.cloned() } else { None },
        summary: plan.summary(),
        error: state.error_reason.clone(),
    }
}

/// `m:ss` countdown label
pub fn format_clock(total_seconds: u64) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
