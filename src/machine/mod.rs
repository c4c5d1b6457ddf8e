//! Session state machine module

pub mod events;
pub mod session_machine;

// Re-export main types
pub use events::{CompletionReport, SessionEffect, SessionEvent};
pub use session_machine::SessionMachine;
