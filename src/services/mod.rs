//! External service module
//!
//! Collaborators the session reports to: the fitness backend, or a logger
//! when no backend is configured.

pub mod reporter;

// Re-export main types
pub use reporter::{BackendReporter, LoggingReporter, ProgressReporter};
