//! In-progress workout orchestration.
//!
//! [`SessionState`] owns the workout being performed: the session and its
//! set logs, the pointer to the current exercise, and the rest timer.
//!
//! Phases: `Idle` -> `Active` -> `Finished` | `Discarded`. Both end phases
//! are terminal; operations that mutate the session fail with
//! [`Error::InvalidTransition`] outside `Active`.
//!
//! Every mutation bumps [`SessionState::version`], so a presentation layer can
//! tell when its derived views need to be re-read.

use crate::clock::{Clock, SystemClock};
use crate::timer::{RestTimer, TickToken};
use crate::{Error, Result, Routine, RoutineExercise, SetLog, WorkoutSession};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Active,
    Finished,
    Discarded,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Active => "active",
            SessionPhase::Finished => "finished",
            SessionPhase::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// Serializable image of a [`SessionState`], used to resume a workout
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub session: Option<WorkoutSession>,
    pub routine_exercises: Vec<RoutineExercise>,
    pub current_exercise_index: usize,
    pub timer: RestTimer,
    pub version: u64,
}

pub struct SessionState<C: Clock = SystemClock> {
    clock: C,
    phase: SessionPhase,
    session: Option<WorkoutSession>,
    /// Routine exercises captured at start, sorted by order
    routine_exercises: Vec<RoutineExercise>,
    current_exercise_index: usize,
    timer: RestTimer,
    version: u64,
}

impl<C: Clock> SessionState<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            phase: SessionPhase::Idle,
            session: None,
            routine_exercises: Vec::new(),
            current_exercise_index: 0,
            timer: RestTimer::new(),
            version: 0,
        }
    }

    pub fn from_snapshot(snapshot: SessionSnapshot, clock: C) -> Self {
        Self {
            clock,
            phase: snapshot.phase,
            session: snapshot.session,
            routine_exercises: snapshot.routine_exercises,
            current_exercise_index: snapshot.current_exercise_index,
            timer: snapshot.timer,
            version: snapshot.version,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            session: self.session.clone(),
            routine_exercises: self.routine_exercises.clone(),
            current_exercise_index: self.current_exercise_index,
            timer: self.timer.clone(),
            version: self.version,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Begin a workout of `routine`.
    ///
    /// One uncompleted set log is planned per target set of every routine
    /// exercise whose exercise still exists. Target weights start at zero.
    pub fn start(&mut self, routine: &Routine) -> Result<&WorkoutSession> {
        self.require("start a workout", SessionPhase::Idle)?;

        let now = self.clock.now();
        let routine_exercises: Vec<RoutineExercise> =
            routine.sorted_exercises().into_iter().cloned().collect();

        let mut set_logs = Vec::new();
        for entry in &routine_exercises {
            let Some(exercise_id) = &entry.exercise_id else {
                tracing::warn!(
                    "Routine {} references a deleted exercise, no sets planned for it",
                    routine.id
                );
                continue;
            };
            let unit = entry
                .progression_rule
                .as_ref()
                .map(|rule| rule.unit)
                .unwrap_or_default();
            for set_number in 1..=entry.target_sets {
                set_logs.push(SetLog::planned(
                    Some(exercise_id.clone()),
                    set_number,
                    entry.target_rep_min,
                    unit,
                    now,
                ));
            }
        }

        let session = WorkoutSession {
            id: Uuid::new_v4(),
            routine_id: Some(routine.id.clone()),
            routine_name: routine.name.clone(),
            start_time: now,
            end_time: None,
            set_logs,
            notes: String::new(),
            is_completed: false,
        };

        tracing::info!(
            "Started workout {} from routine {} ({} sets planned)",
            session.id,
            routine.id,
            session.set_logs.len()
        );

        self.routine_exercises = routine_exercises;
        self.current_exercise_index = 0;
        self.timer.stop();
        self.phase = SessionPhase::Active;
        self.touch();
        Ok(&*self.session.insert(session))
    }

    /// End the workout, returning the finished session for persistence.
    ///
    /// Progression is not evaluated here; see
    /// [`crate::progression::evaluate_session`].
    pub fn finish(&mut self) -> Result<WorkoutSession> {
        self.require("finish the workout", SessionPhase::Active)?;

        let now = self.clock.now();
        let session = self.session_mut()?;
        session.end_time = Some(now);
        session.is_completed = true;
        let finished = session.clone();

        self.timer.stop();
        self.phase = SessionPhase::Finished;
        self.touch();

        tracing::info!(
            "Finished workout {} ({})",
            finished.id,
            finished.duration_formatted()
        );
        Ok(finished)
    }

    /// Abandon the workout. Returns the session id so the caller can remove
    /// anything it stored for it; no progression runs for it.
    pub fn discard(&mut self) -> Result<Uuid> {
        self.require("discard the workout", SessionPhase::Active)?;

        let session = self
            .session
            .take()
            .ok_or_else(|| Error::State("active workout has no session".into()))?;

        self.timer.stop();
        self.phase = SessionPhase::Discarded;
        self.touch();

        tracing::info!("Discarded workout {}", session.id);
        Ok(session.id)
    }

    // ------------------------------------------------------------------
    // Set mutation
    // ------------------------------------------------------------------

    /// Record a performed set and start the rest countdown of its exercise
    pub fn complete_set(&mut self, set_id: Uuid, actual_reps: u32, actual_weight: f64) -> Result<()> {
        self.require("complete a set", SessionPhase::Active)?;

        let now = self.clock.now();
        let set = self.set_mut(set_id)?;
        set.actual_reps = actual_reps;
        set.actual_weight = actual_weight;
        set.is_completed = true;
        set.timestamp = now;
        let exercise_id = set.exercise_id.clone();

        tracing::debug!(
            "Completed set {} of {:?}: {} x {}",
            set_id,
            exercise_id,
            actual_reps,
            actual_weight
        );

        let rest_seconds = exercise_id
            .as_deref()
            .and_then(|id| self.routine_exercises.iter().find(|e| e.is_for(id)))
            .map(|e| e.rest_seconds)
            .unwrap_or(0);
        if rest_seconds > 0 {
            self.timer.start(rest_seconds, now);
        }

        self.touch();
        Ok(())
    }

    /// Revert a completed set. A running rest countdown keeps going.
    pub fn uncomplete_set(&mut self, set_id: Uuid) -> Result<()> {
        self.require("uncomplete a set", SessionPhase::Active)?;

        let set = self.set_mut(set_id)?;
        set.is_completed = false;
        set.actual_reps = 0;

        self.touch();
        Ok(())
    }

    pub fn record_rpe(&mut self, set_id: Uuid, rpe: Option<f64>) -> Result<()> {
        self.require("record RPE", SessionPhase::Active)?;

        self.set_mut(set_id)?.rpe = rpe;
        self.touch();
        Ok(())
    }

    /// Nudge a set's target weight by `delta` (never below zero)
    pub fn adjust_target_weight(&mut self, set_id: Uuid, delta: f64) -> Result<()> {
        self.require("adjust a weight", SessionPhase::Active)?;

        let set = self.set_mut(set_id)?;
        set.target_weight = (set.target_weight + delta).max(0.0);
        set.actual_weight = set.target_weight;

        self.touch();
        Ok(())
    }

    /// Set the working weight of every non-warmup set of an exercise.
    ///
    /// Completed sets keep the weight actually lifted. Returns the number of
    /// sets changed.
    pub fn set_weight_for_exercise(&mut self, exercise_id: &str, weight: f64) -> Result<usize> {
        self.require("set a weight", SessionPhase::Active)?;

        let session = self.session_mut()?;
        let mut changed = 0;
        for set in session
            .set_logs
            .iter_mut()
            .filter(|s| !s.is_warmup && s.exercise_id.as_deref() == Some(exercise_id))
        {
            set.target_weight = weight;
            if !set.is_completed {
                set.actual_weight = weight;
            }
            changed += 1;
        }

        self.touch();
        Ok(changed)
    }

    pub fn set_weight_for_current(&mut self, weight: f64) -> Result<usize> {
        self.require("set a weight", SessionPhase::Active)?;

        match self.current_exercise_id() {
            Some(exercise_id) => self.set_weight_for_exercise(&exercise_id, weight),
            None => Ok(0),
        }
    }

    /// Append a set to the current exercise.
    ///
    /// Returns `None` when the current exercise no longer exists.
    pub fn add_set(&mut self, warmup: bool) -> Result<Option<Uuid>> {
        self.require("add a set", SessionPhase::Active)?;

        let Some(entry) = self.current_routine_exercise() else {
            return Ok(None);
        };
        let Some(exercise_id) = entry.exercise_id.clone() else {
            return Ok(None);
        };
        let target_reps = entry.target_rep_min;
        let rule_unit = entry.progression_rule.as_ref().map(|rule| rule.unit);

        let now = self.clock.now();
        let session = self.session_mut()?;
        let existing = session.sets_for(&exercise_id);
        let set_number = existing.last().map(|s| s.set_number + 1).unwrap_or(1);
        let unit = existing
            .first()
            .map(|s| s.unit)
            .or(rule_unit)
            .unwrap_or_default();

        let mut set = SetLog::planned(Some(exercise_id), set_number, target_reps, unit, now);
        set.is_warmup = warmup;
        let id = set.id;
        session.set_logs.push(set);

        self.touch();
        Ok(Some(id))
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Move to the next exercise; ignored on the last one
    pub fn next_exercise(&mut self) -> bool {
        let next = self.current_exercise_index + 1;
        if next < self.exercise_count() {
            self.move_to(next)
        } else {
            false
        }
    }

    /// Move to the previous exercise; ignored on the first one
    pub fn previous_exercise(&mut self) -> bool {
        match self.current_exercise_index.checked_sub(1) {
            Some(previous) => self.move_to(previous),
            None => false,
        }
    }

    /// Jump to an exercise; out-of-range indexes are ignored
    pub fn go_to(&mut self, index: usize) -> bool {
        if index < self.exercise_count() {
            self.move_to(index)
        } else {
            tracing::debug!("Ignoring navigation to exercise {}", index);
            false
        }
    }

    fn move_to(&mut self, index: usize) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }
        self.current_exercise_index = index;
        self.timer.stop();
        self.touch();
        true
    }

    // ------------------------------------------------------------------
    // Rest timer
    // ------------------------------------------------------------------

    pub fn skip_rest(&mut self) {
        if self.timer.is_running() {
            self.timer.stop();
            self.touch();
        }
    }

    pub fn extend_rest(&mut self, delta_seconds: i64) {
        if self.timer.is_running() {
            self.timer.extend(delta_seconds);
            self.touch();
        }
    }

    /// Deliver one scheduled tick; stale tokens are ignored
    pub fn tick(&mut self, token: TickToken) -> bool {
        let changed = self.timer.tick(token);
        if changed {
            self.touch();
        }
        changed
    }

    /// Fire every rest tick that has come due according to the clock
    pub fn poll(&mut self) -> u32 {
        let fired = self.timer.poll(self.clock.now());
        if fired > 0 {
            self.touch();
        }
        fired
    }

    pub fn rest_token(&self) -> Option<TickToken> {
        self.timer.token()
    }

    // ------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&WorkoutSession> {
        self.session.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn timer(&self) -> &RestTimer {
        &self.timer
    }

    pub fn rest_remaining(&self) -> u32 {
        self.timer.remaining()
    }

    pub fn is_resting(&self) -> bool {
        self.timer.is_running()
    }

    pub fn current_exercise_index(&self) -> usize {
        self.current_exercise_index
    }

    pub fn exercise_count(&self) -> usize {
        self.routine_exercises.len()
    }

    pub fn routine_exercises(&self) -> &[RoutineExercise] {
        &self.routine_exercises
    }

    pub fn current_routine_exercise(&self) -> Option<&RoutineExercise> {
        self.routine_exercises.get(self.current_exercise_index)
    }

    fn current_exercise_id(&self) -> Option<String> {
        self.current_routine_exercise()
            .and_then(|e| e.exercise_id.clone())
    }

    /// Set logs of the current exercise, ordered by set number
    pub fn current_set_logs(&self) -> Vec<&SetLog> {
        match (self.session.as_ref(), self.current_routine_exercise()) {
            (Some(session), Some(entry)) => match entry.exercise_id.as_deref() {
                Some(exercise_id) => session.sets_for(exercise_id),
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    pub fn total_sets(&self) -> usize {
        self.session.as_ref().map(|s| s.set_logs.len()).unwrap_or(0)
    }

    pub fn completed_sets(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.set_logs.iter().filter(|l| l.is_completed).count())
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require(&self, operation: &'static str, phase: SessionPhase) -> Result<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                operation,
                phase: self.phase,
            })
        }
    }

    fn session_mut(&mut self) -> Result<&mut WorkoutSession> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::State("active workout has no session".into()))
    }

    fn set_mut(&mut self, set_id: Uuid) -> Result<&mut SetLog> {
        self.session_mut()?
            .set_logs
            .iter_mut()
            .find(|s| s.id == set_id)
            .ok_or(Error::UnknownSet(set_id))
    }

    fn touch(&mut self) {
        self.version += 1;
    }
}

impl Default for SessionState<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}
