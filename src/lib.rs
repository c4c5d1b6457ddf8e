//! Workout Session - guided training runtime
//!
//! Normalizes a workout into a plan of exercise and rest steps, drives it with
//! wall-clock timers through a stage machine, and projects UI-ready view
//! models. The binary hosts one session behind a small HTTP API.

pub mod api;
pub mod config;
pub mod error;
pub mod machine;
pub mod plan;
pub mod projector;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::{PlanError, RecordingFailure, SessionError, TransitionError};
pub use machine::{SessionEffect, SessionEvent, SessionMachine};
pub use plan::{normalize, WorkoutPlan};
pub use projector::{project, ViewModel};
pub use state::AppState;
pub use utils::signals::shutdown_signal;
