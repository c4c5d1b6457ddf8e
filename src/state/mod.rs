//! State management module
//!
//! Session data, the step timer, and the host-side owner of the active session.

pub mod app_state;
pub mod session_state;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, NoticeEvent, SessionNotice};
pub use session_state::{SessionState, Stage};
pub use timer_state::{Clock, ManualClock, SessionTimer, SystemClock};
