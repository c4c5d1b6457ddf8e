//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod progress_reporter;
pub mod session_ticker;

// Re-export main functions
pub use progress_reporter::{progress_reporter_task, record_completion};
pub use session_ticker::session_ticker_task;
