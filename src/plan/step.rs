//! Raw workout records and the normalized step types

use serde::{Deserialize, Serialize};

/// Catalog entry for a real exercise as served by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseInfo {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "imagen", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(
        default,
        alias = "caloriesPerSecond",
        alias = "caloriasPorSegundo",
        skip_serializing_if = "Option::is_none"
    )]
    pub calories_per_second: Option<f64>,
    #[serde(default, alias = "grupo", skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, alias = "descripcion", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ExerciseInfo {
    /// Exercise known only by its catalog id
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            image: None,
            calories_per_second: None,
            group: None,
            description: None,
        }
    }
}

/// Reference to an exercise: either a bare id or the populated catalog object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExerciseRef {
    Id(String),
    Exercise(ExerciseInfo),
}

impl ExerciseRef {
    /// Trimmed catalog id, whichever shape the reference came in
    pub fn id(&self) -> &str {
        match self {
            ExerciseRef::Id(id) => id.trim(),
            ExerciseRef::Exercise(info) => info.id.trim(),
        }
    }

    pub fn into_info(self) -> ExerciseInfo {
        match self {
            ExerciseRef::Id(id) => ExerciseInfo::from_id(id.trim()),
            ExerciseRef::Exercise(info) => info,
        }
    }
}

/// One entry of a workout's exercise list, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStep {
    #[serde(alias = "exerciseRef", alias = "ejercicioId")]
    pub exercise_ref: ExerciseRef,
    #[serde(alias = "durationSeconds", alias = "tiempo")]
    pub duration_seconds: i64,
}

impl RawStep {
    pub fn new(exercise_ref: ExerciseRef, duration_seconds: i64) -> Self {
        Self {
            exercise_ref,
            duration_seconds,
        }
    }
}

/// A workout as received from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWorkout {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(alias = "steps", alias = "ejercicios")]
    pub exercises: Vec<RawStep>,
}

/// Coarse kind of a plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Exercise,
    Rest,
}

/// A normalized step. Rest is a variant of its own, never an id comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanStep {
    Exercise {
        exercise: ExerciseInfo,
        duration_seconds: u64,
    },
    Rest {
        duration_seconds: u64,
    },
}

impl PlanStep {
    pub fn kind(&self) -> StepKind {
        match self {
            PlanStep::Exercise { .. } => StepKind::Exercise,
            PlanStep::Rest { .. } => StepKind::Rest,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, PlanStep::Rest { .. })
    }

    pub fn duration_seconds(&self) -> u64 {
        match self {
            PlanStep::Exercise { duration_seconds, .. } | PlanStep::Rest { duration_seconds } => {
                *duration_seconds
            }
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_seconds().saturating_mul(1000)
    }

    /// Exercise payload, `None` for rest steps
    pub fn exercise(&self) -> Option<&ExerciseInfo> {
        match self {
            PlanStep::Exercise { exercise, .. } => Some(exercise),
            PlanStep::Rest { .. } => None,
        }
    }
}
