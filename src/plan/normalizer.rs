//! Workout plan normalization
//!
//! Turns the backend's exercise list into an immutable [`WorkoutPlan`]. The
//! rest sentinel is compared here and nowhere else; every later stage works on
//! [`PlanStep`] variants.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::step::{ExerciseInfo, PlanStep, RawStep, RawWorkout};
use crate::error::PlanError;

/// Catalog id the backend uses for its "rest" pseudo-exercise
pub const DEFAULT_REST_SENTINEL: &str = "67bc1a7372e1e0091651e944";

/// Calorie burn assumed for exercises without a catalog rate
pub const DEFAULT_CALORIES_PER_SECOND: f64 = 0.15;

/// Knobs that influence how raw steps are interpreted
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRules {
    pub rest_sentinel: String,
    pub default_calories_per_second: f64,
}

impl PlanRules {
    pub fn new(rest_sentinel: impl Into<String>, default_calories_per_second: f64) -> Self {
        Self {
            rest_sentinel: rest_sentinel.into(),
            default_calories_per_second,
        }
    }

    fn is_rest_id(&self, id: &str) -> bool {
        id == self.rest_sentinel.trim()
    }
}

impl Default for PlanRules {
    fn default() -> Self {
        Self::new(DEFAULT_REST_SENTINEL, DEFAULT_CALORIES_PER_SECOND)
    }
}

/// Figures shown on the start and finish screens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub workout_id: Option<String>,
    pub name: String,
    pub total_real_exercises: usize,
    pub total_duration_seconds: u64,
    pub estimated_calories: u32,
}

/// Immutable, validated plan for one training run
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutPlan {
    workout_id: Option<String>,
    name: String,
    steps: Vec<PlanStep>,
    real_ordinals: Vec<usize>,
    total_real_exercises: usize,
    total_duration_seconds: u64,
    estimated_calories: u32,
}

/// Normalize a bare step list into a plan
pub fn normalize(raw_steps: Vec<RawStep>, rules: &PlanRules) -> Result<WorkoutPlan, PlanError> {
    if raw_steps.is_empty() {
        return Err(PlanError::Empty);
    }

    if let Some((index, step)) = raw_steps
        .iter()
        .enumerate()
        .find(|(_, step)| step.duration_seconds <= 0)
    {
        return Err(PlanError::NonPositiveDuration {
            index,
            duration_seconds: step.duration_seconds,
        });
    }

    let steps: Vec<PlanStep> = raw_steps
        .into_iter()
        .map(|raw| {
            // Checked positive above
            let duration_seconds = raw.duration_seconds.unsigned_abs();
            if rules.is_rest_id(raw.exercise_ref.id()) {
                PlanStep::Rest { duration_seconds }
            } else {
                PlanStep::Exercise {
                    exercise: raw.exercise_ref.into_info(),
                    duration_seconds,
                }
            }
        })
        .collect();

    let real_ordinals: Vec<usize> = steps
        .iter()
        .scan(0usize, |count, step| {
            if !step.is_rest() {
                *count += 1;
            }
            Some(*count)
        })
        .collect();

    let total_real_exercises = real_ordinals.last().copied().unwrap_or(0);
    if total_real_exercises == 0 {
        return Err(PlanError::AllRest);
    }

    let total_duration_seconds: u64 = steps.iter().map(PlanStep::duration_seconds).sum();
    let estimated_calories: u32 = steps
        .iter()
        .filter_map(|step| step.exercise().map(|ex| (ex, step.duration_seconds())))
        .map(|(ex, secs)| step_calories(ex, secs, rules.default_calories_per_second))
        .sum();

    debug!(
        "Normalized plan: {} steps, {} real exercises, {}s, ~{} kcal",
        steps.len(),
        total_real_exercises,
        total_duration_seconds,
        estimated_calories
    );

    Ok(WorkoutPlan {
        workout_id: None,
        name: String::new(),
        steps,
        real_ordinals,
        total_real_exercises,
        total_duration_seconds,
        estimated_calories,
    })
}

fn step_calories(exercise: &ExerciseInfo, duration_seconds: u64, default_rate: f64) -> u32 {
    let rate = exercise
        .calories_per_second
        .filter(|rate| rate.is_finite() && *rate > 0.0)
        .unwrap_or(default_rate);
    (duration_seconds as f64 * rate).round().max(0.0) as u32
}

impl WorkoutPlan {
    /// Normalize a full workout record, keeping its id and name
    pub fn from_workout(workout: RawWorkout, rules: &PlanRules) -> Result<Self, PlanError> {
        let mut plan = normalize(workout.exercises, rules)?;
        plan.workout_id = workout.id;
        plan.name = workout.name;
        Ok(plan)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workout_id(&self) -> Option<&str> {
        self.workout_id.as_deref()
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a constructed plan; kept for the usual `len` pairing
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&PlanStep> {
        self.steps.get(index)
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.steps.len()
    }

    /// Number of exercise steps in `steps[0..=index]`
    pub fn real_ordinal_of(&self, index: usize) -> Option<usize> {
        self.real_ordinals.get(index).copied()
    }

    pub fn real_ordinals(&self) -> &[usize] {
        &self.real_ordinals
    }

    pub fn total_real_exercises(&self) -> usize {
        self.total_real_exercises
    }

    pub fn total_duration_seconds(&self) -> u64 {
        self.total_duration_seconds
    }

    pub fn estimated_calories(&self) -> u32 {
        self.estimated_calories
    }

    /// First exercise step at or after `from`, with its index
    pub fn next_exercise_from(&self, from: usize) -> Option<(usize, &ExerciseInfo)> {
        self.steps
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(index, step)| step.exercise().map(|ex| (index, ex)))
    }

    pub fn summary(&self) -> WorkoutSummary {
        WorkoutSummary {
            workout_id: self.workout_id.clone(),
            name: self.name.clone(),
            total_real_exercises: self.total_real_exercises,
            total_duration_seconds: self.total_duration_seconds,
            estimated_calories: self.estimated_calories,
        }
    }
}
