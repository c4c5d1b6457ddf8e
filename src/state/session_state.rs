//! Session state structure

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse phase of a training session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Active,
    Rest,
    Done,
    Aborted,
    Error,
}

impl Stage {
    /// Stages in which a step timer is running or paused
    pub fn is_live(&self) -> bool {
        matches!(self, Stage::Active | Stage::Rest)
    }

    /// Stages that accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Aborted | Stage::Error)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Active => "active",
            Stage::Rest => "rest",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}

/// Mutable state of one training run, owned by the state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub stage: Stage,
    /// `None` until the first step starts
    pub current_step_index: Option<usize>,
    pub remaining_ms: u64,
    pub paused: bool,
    pub error_reason: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            stage: Stage::Init,
            current_step_index: None,
            remaining_ms: 0,
            paused: false,
            error_reason: None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
