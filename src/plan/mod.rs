//! Workout plan module
//!
//! Raw workout records from the backend and their normalized, validated form.

pub mod normalizer;
pub mod step;

// Re-export main types
pub use normalizer::{
    normalize, PlanRules, WorkoutPlan, WorkoutSummary, DEFAULT_CALORIES_PER_SECOND,
    DEFAULT_REST_SENTINEL,
};
pub use step::{ExerciseInfo, ExerciseRef, PlanStep, RawStep, RawWorkout, StepKind};
