use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;
use workout_session::{
    error::{RecordingFailure, SessionError},
    machine::{CompletionReport, SessionEffect},
    plan::{PlanRules, RawWorkout, DEFAULT_REST_SENTINEL},
    services::ProgressReporter,
    state::{app_state::TickOutcome, AppState, ManualClock, NoticeEvent, Stage},
    tasks::record_completion,
};

fn workout(exercises: serde_json::Value) -> RawWorkout {
    serde_json::from_value(json!({ "id": "w1", "name": "Core", "exercises": exercises })).unwrap()
}

fn plank_rest_crunch() -> RawWorkout {
    workout(json!([
        { "exercise_ref": "plank", "duration_seconds": 20 },
        { "exercise_ref": DEFAULT_REST_SENTINEL, "duration_seconds": 5 },
        { "exercise_ref": "crunch", "duration_seconds": 20 }
    ]))
}

fn app() -> (Arc<AppState>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let state = AppState::new(
        0,
        "127.0.0.1".to_string(),
        PlanRules::default(),
        Duration::from_millis(100),
    )
    .with_clock(clock.clone());
    (Arc::new(state), clock)
}

#[derive(Default)]
struct RecordingReporter {
    metrics: Mutex<Vec<CompletionReport>>,
    achievements: Mutex<usize>,
}

#[async_trait]
impl ProgressReporter for RecordingReporter {
    async fn update_metrics(&self, report: &CompletionReport) -> Result<(), RecordingFailure> {
        self.metrics.lock().unwrap().push(report.clone());
        Ok(())
    }

    async fn update_achievements(&self) -> Result<(), RecordingFailure> {
        *self.achievements.lock().unwrap() += 1;
        Ok(())
    }

    async fn sync_pause_state(&self, _paused: bool) -> Result<(), RecordingFailure> {
        Ok(())
    }

    async fn sync_step_time(&self, _duration_seconds: u64, _stage: Stage) -> Result<(), RecordingFailure> {
        Ok(())
    }
}

struct FailingReporter;

#[async_trait]
impl ProgressReporter for FailingReporter {
    async fn update_metrics(&self, _report: &CompletionReport) -> Result<(), RecordingFailure> {
        Err(RecordingFailure::Rejected {
            status: 503,
            body: "maintenance".to_string(),
        })
    }

    async fn update_achievements(&self) -> Result<(), RecordingFailure> {
        Ok(())
    }

    async fn sync_pause_state(&self, _paused: bool) -> Result<(), RecordingFailure> {
        Ok(())
    }

    async fn sync_step_time(&self, _duration_seconds: u64, _stage: Stage) -> Result<(), RecordingFailure> {
        Ok(())
    }
}

#[tokio::test]
async fn invalid_workout_is_rejected_and_nothing_is_loaded() {
    let (state, _) = app();
    let result = state.load_workout(workout(json!([
        { "exercise_ref": "plank", "duration_seconds": 0 }
    ])));

    assert_matches!(result, Err(SessionError::Plan(_)));
    assert!(state.current_session_id().is_none());
    assert_matches!(state.current_view(), Err(SessionError::NoSession));
}

#[tokio::test]
async fn start_attaches_ticker_and_abort_releases_it() {
    let (state, _) = app();
    state.load_workout(plank_rest_crunch()).unwrap();
    assert!(!state.has_ticker());

    let view = state.start_session().unwrap();
    assert_eq!(view.stage, Stage::Active);
    assert!(state.has_ticker());

    assert_matches!(state.start_session(), Err(SessionError::NotStartable { stage: Stage::Active }));

    let view = state.abort().unwrap();
    assert_eq!(view.stage, Stage::Aborted);
    assert!(!state.has_ticker());

    // Second abort changes nothing
    assert_eq!(state.abort().unwrap().stage, Stage::Aborted);
}

#[tokio::test]
async fn ticks_drive_the_session_to_completion() {
    let (state, clock) = app();
    state.load_workout(plank_rest_crunch()).unwrap();
    let id = state.current_session_id().unwrap();
    let mut notices = state.subscribe_notices();
    state.start_session().unwrap();

    for ms in [20_000, 5_000, 20_000] {
        clock.advance_ms(ms);
        state.tick_session(id).unwrap();
    }

    assert_eq!(state.current_view().unwrap().stage, Stage::Done);
    assert_eq!(state.tick_session(id).unwrap(), TickOutcome::Stop);
    assert!(!state.has_ticker());

    let mut completions = 0;
    while let Ok(notice) = notices.try_recv() {
        if let NoticeEvent::Session(SessionEffect::Completed(report)) = notice.event {
            assert_eq!(report.total_duration_seconds, 45);
            completions += 1;
        }
    }
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn stale_ticker_is_told_to_stop() {
    let (state, _) = app();
    state.load_workout(plank_rest_crunch()).unwrap();
    let first = state.current_session_id().unwrap();
    state.start_session().unwrap();

    state.load_workout(plank_rest_crunch()).unwrap();
    assert_ne!(state.current_session_id().unwrap(), first);
    assert_eq!(state.tick_session(first).unwrap(), TickOutcome::Stop);
    assert_eq!(state.current_view().unwrap().stage, Stage::Init);
}

#[tokio::test]
async fn backgrounding_pauses_and_surfaces_notice() {
    let (state, clock) = app();
    state.load_workout(plank_rest_crunch()).unwrap();
    let mut notices = state.subscribe_notices();
    state.start_session().unwrap();

    clock.advance_ms(4_000);
    let view = state.app_backgrounded().unwrap();
    assert!(view.paused);
    assert_eq!(view.remaining_ms, 16_000);

    clock.advance_ms(120_000);
    let view = state.app_foregrounded().unwrap();
    assert!(view.paused);
    assert_eq!(view.remaining_ms, 16_000);

    let mut auto_paused = false;
    while let Ok(notice) = notices.try_recv() {
        if matches!(notice.event, NoticeEvent::Session(SessionEffect::AutoPaused)) {
            auto_paused = true;
        }
    }
    assert!(auto_paused);

    let view = state.toggle_pause().unwrap();
    assert!(!view.paused);
}

#[tokio::test]
async fn completion_is_reported_with_metrics_then_achievements() {
    let (state, _) = app();
    let reporter = Arc::new(RecordingReporter::default());
    let report = CompletionReport {
        workout_id: Some("w1".to_string()),
        total_duration_seconds: 70,
        estimated_calories: 12,
    };

    record_completion(Arc::clone(&state), reporter.clone(), 1, report.clone()).await;

    assert_eq!(*reporter.metrics.lock().unwrap(), vec![report]);
    assert_eq!(*reporter.achievements.lock().unwrap(), 1);
    assert!(state.warnings().is_empty());
}

#[tokio::test]
async fn recording_failure_is_a_warning_not_a_state_change() {
    let (state, clock) = app();
    state.load_workout(workout(json!([
        { "exercise_ref": "plank", "duration_seconds": 1 }
    ])))
    .unwrap();
    let id = state.current_session_id().unwrap();
    state.start_session().unwrap();
    clock.advance_ms(1_000);
    state.tick_session(id).unwrap();

    let report = CompletionReport {
        workout_id: Some("w1".to_string()),
        total_duration_seconds: 1,
        estimated_calories: 0,
    };
    record_completion(Arc::clone(&state), Arc::new(FailingReporter), id, report).await;

    let warnings = state.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("503"));
    assert_eq!(state.current_view().unwrap().stage, Stage::Done);
}

#[tokio::test]
async fn late_failure_of_a_replaced_session_stays_out_of_new_warnings() {
    let (state, _) = app();
    state.load_workout(plank_rest_crunch()).unwrap();
    let old = state.current_session_id().unwrap();
    state.load_workout(plank_rest_crunch()).unwrap();
    let mut notices = state.subscribe_notices();

    let report = CompletionReport {
        workout_id: Some("w1".to_string()),
        total_duration_seconds: 45,
        estimated_calories: 6,
    };
    record_completion(Arc::clone(&state), Arc::new(FailingReporter), old, report).await;

    assert!(state.warnings().is_empty());
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.session_id, old);
    assert_matches!(notice.event, NoticeEvent::RecordingFailed { .. });
}

#[tokio::test]
async fn leaving_drops_the_session() {
    let (state, _) = app();
    state.load_workout(plank_rest_crunch()).unwrap();
    state.start_session().unwrap();

    state.leave().unwrap();
    assert!(state.current_session_id().is_none());
    assert_matches!(state.leave(), Err(SessionError::NoSession));
    assert_matches!(state.toggle_pause(), Err(SessionError::NoSession));
}
