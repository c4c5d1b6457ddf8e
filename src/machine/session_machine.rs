//! Session state machine
//!
//! `Init -> Active <-> Rest -> Done`, plus the `Aborted` and `Error` sinks.
//! All transitions go through [`SessionMachine::handle`]; events that a
//! transition derives (a tick noticing expiry) are queued and processed in
//! order within the same call.

use std::{collections::VecDeque, sync::Arc};

use tracing::{debug, error, info, warn};

use super::events::{CompletionReport, SessionEffect, SessionEvent};
use crate::{
    error::TransitionError,
    plan::WorkoutPlan,
    projector::{project, ViewModel},
    state::{Clock, SessionState, SessionTimer, Stage},
};

/// Drives one training run over an immutable plan
#[derive(Debug)]
pub struct SessionMachine {
    plan: Arc<WorkoutPlan>,
    state: SessionState,
    clock: Arc<dyn Clock>,
    timer: Option<SessionTimer>,
    /// Bumped on every timer (re)start; stale expiries carry an older value
    generation: u64,
    queue: VecDeque<SessionEvent>,
    effects: Vec<SessionEffect>,
    completion_reported: bool,
}

impl SessionMachine {
    pub fn new(plan: Arc<WorkoutPlan>, clock: Arc<dyn Clock>) -> Self {
        Self {
            plan,
            state: SessionState::new(),
            clock,
            timer: None,
            generation: 0,
            queue: VecDeque::new(),
            effects: Vec::new(),
            completion_reported: false,
        }
    }

    pub fn plan(&self) -> &WorkoutPlan {
        &self.plan
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    /// Generation of the timer currently counting down
    pub fn timer_generation(&self) -> u64 {
        self.generation
    }

    /// Feed one event through the machine.
    ///
    /// On error the queue is discarded; effects produced before the failure
    /// stay available through [`SessionMachine::take_effects`].
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionEffect>, TransitionError> {
        self.queue.push_back(event);

        while let Some(next) = self.queue.pop_front() {
            if let Err(e) = self.apply(next) {
                self.queue.clear();
                return Err(e);
            }
        }

        self.refresh_remaining();
        Ok(self.take_effects())
    }

    /// Drain effects not yet returned from [`SessionMachine::handle`]
    pub fn take_effects(&mut self) -> Vec<SessionEffect> {
        std::mem::take(&mut self.effects)
    }

    pub fn start(&mut self) -> Result<Vec<SessionEffect>, TransitionError> {
        self.handle(SessionEvent::Start)
    }

    pub fn tick(&mut self) -> Result<Vec<SessionEffect>, TransitionError> {
        self.handle(SessionEvent::Tick)
    }

    pub fn toggle_pause(&mut self) -> Result<Vec<SessionEffect>, TransitionError> {
        self.handle(SessionEvent::TogglePause)
    }

    pub fn skip(&mut self) -> Result<Vec<SessionEffect>, TransitionError> {
        self.handle(SessionEvent::Skip)
    }

    pub fn abort(&mut self) -> Result<Vec<SessionEffect>, TransitionError> {
        self.handle(SessionEvent::Abort)
    }

    pub fn app_backgrounded(&mut self) -> Result<Vec<SessionEffect>, TransitionError> {
        self.handle(SessionEvent::AppBackgrounded)
    }

    pub fn app_foregrounded(&mut self) -> Result<Vec<SessionEffect>, TransitionError> {
        self.handle(SessionEvent::AppForegrounded)
    }

    /// Expire the current timer as if it had run out
    pub fn expire_current(&mut self) -> Result<Vec<SessionEffect>, TransitionError> {
        let generation = self.generation;
        self.handle(SessionEvent::TimerExpired { generation })
    }

    /// Re-sample the timer and project the current view model
    pub fn snapshot(&mut self) -> ViewModel {
        self.refresh_remaining();
        project(&self.plan, &self.state)
    }

    fn apply(&mut self, event: SessionEvent) -> Result<(), TransitionError> {
        match event {
            SessionEvent::Start => self.on_start(),
            SessionEvent::Tick => self.on_tick(),
            SessionEvent::TimerExpired { generation } => self.on_expired(generation),
            SessionEvent::TogglePause => self.on_toggle_pause(),
            SessionEvent::Skip => self.on_skip(),
            SessionEvent::Abort => self.on_abort(),
            SessionEvent::AppBackgrounded => self.on_backgrounded(),
            SessionEvent::AppForegrounded => {
                // Resume is always an explicit user action
                debug!("App foregrounded, session stays {}", self.state.stage);
                Ok(())
            }
        }
    }

    fn on_start(&mut self) -> Result<(), TransitionError> {
        if self.state.stage != Stage::Init {
            return self.reject(SessionEvent::Start);
        }
        info!(
            "Starting workout '{}' ({} steps)",
            self.plan.name(),
            self.plan.len()
        );
        self.enter_step(0)
    }

    fn on_tick(&mut self) -> Result<(), TransitionError> {
        if !self.state.stage.is_live() || self.state.paused {
            return Ok(());
        }
        if self.poll_timer()? {
            let generation = self.generation;
            self.queue.push_back(SessionEvent::TimerExpired { generation });
        }
        Ok(())
    }

    fn on_expired(&mut self, generation: u64) -> Result<(), TransitionError> {
        if !self.state.stage.is_live() {
            return self.reject(SessionEvent::TimerExpired { generation });
        }
        if generation < self.generation {
            debug!(
                "Ignoring stale expiry (generation {} < {})",
                generation, self.generation
            );
            return Ok(());
        }
        if generation > self.generation {
            return Err(self.fail(format!(
                "expiry for unknown timer generation {} (current {})",
                generation, self.generation
            )));
        }
        self.advance()
    }

    fn on_toggle_pause(&mut self) -> Result<(), TransitionError> {
        if !self.state.stage.is_live() {
            debug!("Pause toggle ignored while {}", self.state.stage);
            return Ok(());
        }
        // An expiry that already happened wins over the pause request
        if !self.state.paused && self.poll_timer()? {
            self.advance()?;
            if !self.state.stage.is_live() {
                return Ok(());
            }
        }

        let paused = !self.state.paused;
        self.set_paused(paused)?;
        info!("Session {}", if paused { "paused" } else { "resumed" });
        Ok(())
    }

    fn on_skip(&mut self) -> Result<(), TransitionError> {
        if self.state.stage != Stage::Rest {
            debug!("Skip ignored while {}", self.state.stage);
            return Ok(());
        }
        let ran_out = !self.state.paused && self.poll_timer()?;
        if ran_out {
            debug!("Skip arrived after rest ran out");
        } else {
            info!("Rest skipped");
        }
        self.advance()
    }

    fn on_abort(&mut self) -> Result<(), TransitionError> {
        match self.state.stage {
            Stage::Init | Stage::Active | Stage::Rest => {
                if let Some(timer) = self.timer.take() {
                    self.state.remaining_ms = timer.remaining_ms();
                }
                self.generation += 1;
                self.queue.clear();
                self.state.stage = Stage::Aborted;
                info!("Session aborted");
                self.effects.push(SessionEffect::Aborted);
            }
            Stage::Done | Stage::Aborted | Stage::Error => {
                debug!("Abort ignored while {}", self.state.stage);
            }
        }
        Ok(())
    }

    fn on_backgrounded(&mut self) -> Result<(), TransitionError> {
        if !self.state.stage.is_live() || self.state.paused {
            return Ok(());
        }
        if self.poll_timer()? {
            self.advance()?;
            if !self.state.stage.is_live() {
                return Ok(());
            }
        }
        self.set_paused(true)?;
        warn!("App backgrounded, session auto-paused");
        self.effects.push(SessionEffect::AutoPaused);
        Ok(())
    }

    /// Move past the current step: next step, or completion after the last one
    fn advance(&mut self) -> Result<(), TransitionError> {
        let Some(index) = self.state.current_step_index else {
            return Err(self.fail("live session without a current step".to_string()));
        };
        if self.plan.is_last(index) {
            self.finish(index);
            Ok(())
        } else {
            self.enter_step(index + 1)
        }
    }

    fn enter_step(&mut self, index: usize) -> Result<(), TransitionError> {
        let Some(step) = self.plan.step(index) else {
            return Err(self.fail(format!(
                "step {} out of range for a {}-step plan",
                index,
                self.plan.len()
            )));
        };
        let to = if step.is_rest() { Stage::Rest } else { Stage::Active };
        let duration_seconds = step.duration_seconds();

        let mut timer = SessionTimer::start_new(Arc::clone(&self.clock), step.duration_ms());
        if self.state.paused {
            timer.pause();
        }
        self.generation += 1;
        self.state.remaining_ms = timer.remaining_ms();
        self.timer = Some(timer);

        let from = self.state.stage;
        self.state.stage = to;
        self.state.current_step_index = Some(index);

        info!(
            "Step {}/{}: {} for {}s",
            index + 1,
            self.plan.len(),
            to,
            duration_seconds
        );
        self.effects.push(SessionEffect::Transitioned {
            from,
            to,
            step_index: Some(index),
            step_duration_seconds: Some(duration_seconds),
        });
        Ok(())
    }

    fn finish(&mut self, index: usize) {
        let from = self.state.stage;
        self.timer = None;
        self.generation += 1;
        self.state.stage = Stage::Done;
        self.state.remaining_ms = 0;
        self.state.paused = false;

        info!("Workout '{}' completed", self.plan.name());
        self.effects.push(SessionEffect::Transitioned {
            from,
            to: Stage::Done,
            step_index: Some(index),
            step_duration_seconds: None,
        });

        if !self.completion_reported {
            self.completion_reported = true;
            self.effects.push(SessionEffect::Completed(CompletionReport {
                workout_id: self.plan.workout_id().map(str::to_string),
                total_duration_seconds: self.plan.total_duration_seconds(),
                estimated_calories: self.plan.estimated_calories(),
            }));
        }
    }

    fn set_paused(&mut self, paused: bool) -> Result<(), TransitionError> {
        let Some(timer) = self.timer.as_mut() else {
            return Err(self.fail("live session without a timer".to_string()));
        };
        if paused {
            timer.pause();
        } else {
            timer.resume();
        }
        self.state.paused = paused;
        self.state.remaining_ms = timer.remaining_ms();
        self.effects.push(SessionEffect::PauseChanged { paused });
        Ok(())
    }

    /// Sample the running timer; true once when it has run out
    fn poll_timer(&mut self) -> Result<bool, TransitionError> {
        let Some(timer) = self.timer.as_mut() else {
            return Err(self.fail("live session without a timer".to_string()));
        };
        self.state.remaining_ms = timer.remaining_ms();
        Ok(timer.poll_expired())
    }

    fn refresh_remaining(&mut self) {
        if let (true, Some(timer)) = (self.state.stage.is_live(), self.timer.as_ref()) {
            self.state.remaining_ms = timer.remaining_ms();
        }
    }

    /// Event not allowed in the current stage. Live sessions fail; idle and
    /// terminal ones are left untouched.
    fn reject(&mut self, event: SessionEvent) -> Result<(), TransitionError> {
        let err = TransitionError::IllegalTransition {
            stage: self.state.stage,
            event: event.name(),
        };
        error!("{}", err);
        if self.state.stage.is_live() {
            self.enter_error(err.to_string());
        }
        Err(err)
    }

    fn fail(&mut self, reason: String) -> TransitionError {
        error!("Session failed: {}", reason);
        self.enter_error(reason.clone());
        TransitionError::InvariantViolation { reason }
    }

    fn enter_error(&mut self, reason: String) {
        self.timer = None;
        self.generation += 1;
        self.queue.clear();
        self.state.stage = Stage::Error;
        self.state.error_reason = Some(reason.clone());
        self.effects.push(SessionEffect::Failed { reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        plan::{normalize, ExerciseRef, PlanRules, RawStep, DEFAULT_REST_SENTINEL},
        state::ManualClock,
    };
    use assert_matches::assert_matches;

    fn machine(steps: &[(&str, i64)]) -> (SessionMachine, Arc<ManualClock>) {
        let raw = steps
            .iter()
            .map(|(id, secs)| {
                let id = if *id == "rest" { DEFAULT_REST_SENTINEL } else { id };
                RawStep::new(ExerciseRef::Id(id.to_string()), *secs)
            })
            .collect();
        let plan = Arc::new(normalize(raw, &PlanRules::default()).unwrap());
        let clock = Arc::new(ManualClock::new());
        (SessionMachine::new(plan, clock.clone()), clock)
    }

    fn completions(effects: &[SessionEffect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, SessionEffect::Completed(_)))
            .count()
    }

    #[test]
    fn start_enters_first_step_kind() {
        let (mut m, _) = machine(&[("rest", 5), ("squat", 10)]);
        m.start().unwrap();
        assert_eq!(m.stage(), Stage::Rest);
        assert_eq!(m.state().current_step_index, Some(0));
        assert_eq!(m.state().remaining_ms, 5_000);

        let (mut m, _) = machine(&[("squat", 10)]);
        m.start().unwrap();
        assert_eq!(m.stage(), Stage::Active);
    }

    #[test]
    fn three_step_plan_completes_after_three_expiries() {
        let (mut m, _) = machine(&[("squat", 2), ("rest", 1), ("lunge", 2)]);
        m.start().unwrap();

        let mut transitions = 0;
        let mut completed = 0;
        for expected in [Stage::Rest, Stage::Active, Stage::Done] {
            let effects = m.expire_current().unwrap();
            transitions += effects
                .iter()
                .filter(|e| matches!(e, SessionEffect::Transitioned { .. }))
                .count();
            completed += completions(&effects);
            assert_eq!(m.stage(), expected);
        }
        assert_eq!(transitions, 3);
        assert_eq!(completed, 1);

        let before = m.state().clone();
        assert_matches!(
            m.expire_current(),
            Err(TransitionError::IllegalTransition { stage: Stage::Done, .. })
        );
        assert_eq!(m.state(), &before);
    }

    #[test]
    fn ticks_advance_on_wall_clock_time() {
        let (mut m, clock) = machine(&[("squat", 2), ("rest", 1), ("lunge", 2)]);
        m.start().unwrap();

        clock.advance_ms(1_900);
        m.tick().unwrap();
        assert_eq!(m.stage(), Stage::Active);
        assert_eq!(m.state().remaining_ms, 100);

        clock.advance_ms(100);
        m.tick().unwrap();
        assert_eq!(m.stage(), Stage::Rest);
        assert_eq!(m.state().current_step_index, Some(1));
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let (mut m, _) = machine(&[("squat", 2), ("lunge", 2)]);
        m.start().unwrap();
        let old = m.timer_generation();
        m.expire_current().unwrap();

        let effects = m.handle(SessionEvent::TimerExpired { generation: old }).unwrap();
        assert!(effects.is_empty());
        assert_eq!(m.state().current_step_index, Some(1));
    }

    #[test]
    fn pause_freezes_time_and_keeps_position() {
        let (mut m, clock) = machine(&[("squat", 1), ("lunge", 2)]);
        m.start().unwrap();

        clock.advance_ms(300);
        let effects = m.toggle_pause().unwrap();
        assert_eq!(effects, vec![SessionEffect::PauseChanged { paused: true }]);

        clock.advance_ms(10_000);
        m.tick().unwrap();
        assert_eq!(m.stage(), Stage::Active);
        assert_eq!(m.state().current_step_index, Some(0));
        assert_eq!(m.state().remaining_ms, 700);

        m.toggle_pause().unwrap();
        clock.advance_ms(700);
        m.tick().unwrap();
        assert_eq!(m.state().current_step_index, Some(1));
    }

    #[test]
    fn expiry_beats_pause_in_the_same_turn() {
        let (mut m, clock) = machine(&[("squat", 1), ("lunge", 2)]);
        m.start().unwrap();

        clock.advance_ms(1_000);
        m.toggle_pause().unwrap();

        assert_eq!(m.state().current_step_index, Some(1));
        assert!(m.state().paused);
        assert_eq!(m.state().remaining_ms, 2_000);
    }

    #[test]
    fn backgrounding_pauses_once_and_foreground_does_not_resume() {
        let (mut m, clock) = machine(&[("squat", 5)]);
        m.start().unwrap();

        let effects = m.app_backgrounded().unwrap();
        assert!(effects.contains(&SessionEffect::AutoPaused));
        assert!(m.state().paused);

        assert!(m.app_backgrounded().unwrap().is_empty());
        m.app_foregrounded().unwrap();
        clock.advance_ms(60_000);
        m.tick().unwrap();
        assert!(m.state().paused);
        assert_eq!(m.state().remaining_ms, 5_000);
    }

    #[test]
    fn abort_is_idempotent() {
        let (mut m, _) = machine(&[("squat", 5), ("lunge", 5)]);
        m.start().unwrap();

        assert_eq!(m.abort().unwrap(), vec![SessionEffect::Aborted]);
        let after_first = m.state().clone();
        assert!(m.abort().unwrap().is_empty());
        assert_eq!(m.state(), &after_first);
        assert_eq!(m.stage(), Stage::Aborted);

        // No timer left to drive anything
        assert!(m.tick().unwrap().is_empty());
        assert_matches!(m.expire_current(), Err(TransitionError::IllegalTransition { .. }));
    }

    #[test]
    fn trailing_rest_completes_the_session() {
        let (mut m, _) = machine(&[("squat", 1), ("rest", 1)]);
        m.start().unwrap();
        m.expire_current().unwrap();
        assert_eq!(m.stage(), Stage::Rest);

        let effects = m.expire_current().unwrap();
        assert_eq!(m.stage(), Stage::Done);
        assert_eq!(completions(&effects), 1);
    }

    #[test]
    fn single_exercise_workout() {
        let (mut m, clock) = machine(&[("plank", 3)]);
        m.start().unwrap();
        clock.advance_ms(3_000);
        let effects = m.tick().unwrap();

        assert_eq!(m.stage(), Stage::Done);
        assert_matches!(
            effects.last(),
            Some(SessionEffect::Completed(CompletionReport { total_duration_seconds: 3, .. }))
        );
    }

    #[test]
    fn skip_only_applies_to_rest() {
        let (mut m, _) = machine(&[("squat", 5), ("rest", 30), ("lunge", 5)]);
        m.start().unwrap();

        assert!(m.skip().unwrap().is_empty());
        assert_eq!(m.stage(), Stage::Active);

        m.expire_current().unwrap();
        assert_eq!(m.stage(), Stage::Rest);
        m.skip().unwrap();
        assert_eq!(m.stage(), Stage::Active);
        assert_eq!(m.state().current_step_index, Some(2));
    }

    #[test]
    fn skip_after_rest_ran_out_advances_once() {
        let (mut m, clock) = machine(&[("rest", 10), ("squat", 20), ("lunge", 5)]);
        m.start().unwrap();

        clock.advance_ms(12_000);
        m.skip().unwrap();
        assert_eq!(m.stage(), Stage::Active);
        assert_eq!(m.state().current_step_index, Some(1));
        assert_eq!(m.state().remaining_ms, 20_000);
    }

    #[test]
    fn skipping_while_paused_keeps_next_step_paused() {
        let (mut m, clock) = machine(&[("rest", 30), ("lunge", 5)]);
        m.start().unwrap();
        m.toggle_pause().unwrap();
        m.skip().unwrap();

        clock.advance_ms(10_000);
        m.tick().unwrap();
        assert_eq!(m.stage(), Stage::Active);
        assert!(m.state().paused);
        assert_eq!(m.state().remaining_ms, 5_000);
    }

    #[test]
    fn starting_twice_fails_the_live_session() {
        let (mut m, _) = machine(&[("squat", 5)]);
        m.start().unwrap();

        assert_matches!(m.start(), Err(TransitionError::IllegalTransition { stage: Stage::Active, .. }));
        assert_eq!(m.stage(), Stage::Error);
        assert!(m.state().error_reason.is_some());
        assert_matches!(m.take_effects().as_slice(), [SessionEffect::Failed { .. }]);

        // Error is a sink
        assert!(m.abort().unwrap().is_empty());
        assert_eq!(m.stage(), Stage::Error);
    }

    #[test]
    fn future_generation_is_an_invariant_violation() {
        let (mut m, _) = machine(&[("squat", 5)]);
        m.start().unwrap();
        let bogus = m.timer_generation() + 5;

        assert_matches!(
            m.handle(SessionEvent::TimerExpired { generation: bogus }),
            Err(TransitionError::InvariantViolation { .. })
        );
        assert_eq!(m.stage(), Stage::Error);
    }

    #[test]
    fn expiry_before_start_is_rejected_without_mutation() {
        let (mut m, _) = machine(&[("squat", 5)]);
        assert_matches!(m.expire_current(), Err(TransitionError::IllegalTransition { stage: Stage::Init, .. }));
        assert_eq!(m.stage(), Stage::Init);
    }
}
