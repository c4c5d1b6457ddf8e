//! Main application state management
//!
//! Owns the single active training session. UI events and ticker callbacks
//! both go through the session mutex, so transitions are strictly serialized.
//! Side effects leave through the notice channel after the lock is released.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{Clock, Stage, SystemClock};
use crate::{
    error::{SessionError, TransitionError},
    machine::{SessionEffect, SessionEvent, SessionMachine},
    plan::{PlanRules, RawWorkout, WorkoutPlan},
    projector::ViewModel,
    tasks::session_ticker_task,
};

/// Something the UI or the reporting task may want to react to
#[derive(Debug, Clone, Serialize)]
pub struct SessionNotice {
    pub session_id: u64,
    pub at: DateTime<Utc>,
    pub event: NoticeEvent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", content = "detail", rename_all = "snake_case")]
pub enum NoticeEvent {
    /// Effect emitted by the session machine
    Session(SessionEffect),
    /// Completion could not be recorded; the session is still done
    RecordingFailed { message: String },
}

/// What the ticker should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// Transition result that keeps the effects of a failed transition
type Dispatched = Result<Vec<SessionEffect>, (TransitionError, Vec<SessionEffect>)>;

#[derive(Debug)]
struct ActiveSession {
    id: u64,
    machine: SessionMachine,
    ticker: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Main application state that manages the active session
#[derive(Debug)]
pub struct AppState {
    session: Mutex<Option<ActiveSession>>,
    clock: Arc<dyn Clock>,
    next_session_id: AtomicU64,
    /// How workouts are normalized
    pub rules: PlanRules,
    /// Ticker granularity
    pub tick_interval: Duration,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
    /// Non-blocking warnings for the UI (recording failures)
    warnings: Mutex<Vec<String>>,
    /// Channel for session notices
    pub notice_tx: broadcast::Sender<SessionNotice>,
    /// Channel for view model snapshots
    pub view_tx: watch::Sender<Option<ViewModel>>,
    /// Keep the receiver alive to prevent channel closure
    pub _view_rx: watch::Receiver<Option<ViewModel>>,
}

impl AppState {
    pub fn new(port: u16, host: String, rules: PlanRules, tick_interval: Duration) -> Self {
        let (notice_tx, _) = broadcast::channel(100);
        let (view_tx, view_rx) = watch::channel(None);

        Self {
            session: Mutex::new(None),
            clock: Arc::new(SystemClock),
            next_session_id: AtomicU64::new(1),
            rules,
            tick_interval,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
            warnings: Mutex::new(Vec::new()),
            notice_tx,
            view_tx,
            _view_rx: view_rx,
        }
    }

    /// Replace the time source, for simulations and tests
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Normalize a workout and make it the active session, replacing any other
    pub fn load_workout(&self, workout: RawWorkout) -> Result<ViewModel, SessionError> {
        let plan = WorkoutPlan::from_workout(workout, &self.rules)?;
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let mut machine = SessionMachine::new(Arc::new(plan), Arc::clone(&self.clock));
        let view = machine.snapshot();

        {
            let mut guard = self.lock_session()?;
            if let Some(mut previous) = guard.take() {
                info!("Replacing session {}", previous.id);
                previous.stop_ticker();
            }
            *guard = Some(ActiveSession {
                id,
                machine,
                ticker: None,
            });
        }

        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.clear();
        }
        info!("Loaded workout '{}' as session {}", view.summary.name, id);
        self.record_action("load");
        self.publish_view(Some(view.clone()));
        Ok(view)
    }

    /// Start the loaded session and its ticker
    pub fn start_session(self: &Arc<Self>) -> Result<ViewModel, SessionError> {
        let (id, result, view) = {
            let mut guard = self.lock_session()?;
            let session = guard.as_mut().ok_or(SessionError::NoSession)?;
            let stage = session.machine.stage();
            if stage != Stage::Init {
                return Err(SessionError::NotStartable { stage });
            }

            let result = session.machine.start();
            if session.machine.stage().is_live() {
                let ticker = tokio::spawn(session_ticker_task(Arc::clone(self), session.id));
                session.ticker = Some(ticker);
            }
            let result = Self::collect_effects(&mut session.machine, result);
            (session.id, result, session.machine.snapshot())
        };

        self.record_action("start");
        self.finish_dispatch(id, result, view)
    }

    pub fn toggle_pause(&self) -> Result<ViewModel, SessionError> {
        self.dispatch("toggle-pause", SessionEvent::TogglePause)
    }

    pub fn skip(&self) -> Result<ViewModel, SessionError> {
        self.dispatch("skip", SessionEvent::Skip)
    }

    pub fn abort(&self) -> Result<ViewModel, SessionError> {
        self.dispatch("abort", SessionEvent::Abort)
    }

    pub fn app_backgrounded(&self) -> Result<ViewModel, SessionError> {
        self.dispatch("background", SessionEvent::AppBackgrounded)
    }

    pub fn app_foregrounded(&self) -> Result<ViewModel, SessionError> {
        self.dispatch("foreground", SessionEvent::AppForegrounded)
    }

    /// Leave the training screen: the session and its ticker are dropped
    pub fn leave(&self) -> Result<(), SessionError> {
        let removed = self.lock_session()?.take();
        match removed {
            Some(mut session) => {
                session.stop_ticker();
                info!("Session {} closed", session.id);
                self.record_action("leave");
                self.publish_view(None);
                Ok(())
            }
            None => Err(SessionError::NoSession),
        }
    }

    /// One scheduling turn for `session_id`. Stale ids are told to stop.
    pub fn tick_session(&self, session_id: u64) -> Result<TickOutcome, SessionError> {
        let (result, view, outcome) = {
            let mut guard = self.lock_session()?;
            let session = match guard.as_mut() {
                Some(session) if session.id == session_id => session,
                _ => {
                    debug!("Ticker for session {} is stale", session_id);
                    return Ok(TickOutcome::Stop);
                }
            };

            let result = session.machine.tick();
            let result = Self::collect_effects(&mut session.machine, result);
            let outcome = if session.machine.stage().is_live() {
                TickOutcome::Continue
            } else {
                // The ticker is the caller; detach instead of aborting it
                session.ticker = None;
                TickOutcome::Stop
            };
            (result, session.machine.snapshot(), outcome)
        };

        self.finish_dispatch(session_id, result, view)?;
        Ok(outcome)
    }

    /// Current view model, re-sampled from the timer
    pub fn current_view(&self) -> Result<ViewModel, SessionError> {
        let mut guard = self.lock_session()?;
        let session = guard.as_mut().ok_or(SessionError::NoSession)?;
        Ok(session.machine.snapshot())
    }

    pub fn current_session_id(&self) -> Option<u64> {
        self.session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.id))
    }

    /// Whether the active session still has a ticker attached
    pub fn has_ticker(&self) -> bool {
        self.session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|s| s.ticker.is_some()))
            .unwrap_or(false)
    }

    /// Surface a failed completion report as a non-blocking warning
    pub fn record_failure(&self, session_id: u64, message: String) {
        warn!("Session {}: {}", session_id, message);
        // Warnings belong to the loaded session; older ones only go out as notices
        if self.current_session_id() == Some(session_id) {
            if let Ok(mut warnings) = self.warnings.lock() {
                warnings.push(message.clone());
            }
        }
        self.publish_notice(session_id, NoticeEvent::RecordingFailed { message });
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notice_tx.subscribe()
    }

    pub fn subscribe_views(&self) -> watch::Receiver<Option<ViewModel>> {
        self.view_tx.subscribe()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    fn dispatch(&self, action: &str, event: SessionEvent) -> Result<ViewModel, SessionError> {
        let (id, result, view) = {
            let mut guard = self.lock_session()?;
            let session = guard.as_mut().ok_or(SessionError::NoSession)?;

            let result = session.machine.handle(event);
            let result = Self::collect_effects(&mut session.machine, result);
            if session.machine.stage().is_terminal() {
                session.stop_ticker();
            }
            (session.id, result, session.machine.snapshot())
        };

        self.record_action(action);
        self.finish_dispatch(id, result, view)
    }

    /// Pair a transition result with every effect it produced, including the
    /// ones left behind by a failed transition
    fn collect_effects(
        machine: &mut SessionMachine,
        result: Result<Vec<SessionEffect>, TransitionError>,
    ) -> Dispatched {
        result.map_err(|e| (e, machine.take_effects()))
    }

    fn finish_dispatch(
        &self,
        session_id: u64,
        result: Dispatched,
        view: ViewModel,
    ) -> Result<ViewModel, SessionError> {
        self.publish_view(Some(view.clone()));
        match result {
            Ok(effects) => {
                self.publish_effects(session_id, effects);
                Ok(view)
            }
            Err((e, effects)) => {
                self.publish_effects(session_id, effects);
                Err(SessionError::Transition(e))
            }
        }
    }

    fn publish_effects(&self, session_id: u64, effects: Vec<SessionEffect>) {
        for effect in effects {
            self.publish_notice(session_id, NoticeEvent::Session(effect));
        }
    }

    fn publish_notice(&self, session_id: u64, event: NoticeEvent) {
        let notice = SessionNotice {
            session_id,
            at: Utc::now(),
            event,
        };
        if let Err(e) = self.notice_tx.send(notice) {
            debug!("No notice subscribers: {}", e);
        }
    }

    fn publish_view(&self, view: Option<ViewModel>) {
        if let Err(e) = self.view_tx.send(view) {
            warn!("Failed to send view update: {}", e);
        }
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Option<ActiveSession>>, SessionError> {
        self.session
            .lock()
            .map_err(|e| SessionError::LockPoisoned(e.to_string()))
    }
}
