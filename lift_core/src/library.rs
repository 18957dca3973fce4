//! Routine and exercise library.
//!
//! The library is the store the session reads routines from at start, and
//! the place progression writes back to once a workout is finished: each
//! rule's failure counter and the next prescribed weight per exercise.

use crate::progression::{evaluate_session, ProgressionResult};
use crate::state::{read_locked, write_atomic};
use crate::{Error, Exercise, Result, Routine, WeightUnit, WorkoutSession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Weight to load the next time an exercise is trained
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NextWeight {
    pub weight: f64,
    pub unit: WeightUnit,
    pub decided_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Library {
    #[serde(default)]
    pub exercises: HashMap<String, Exercise>,
    #[serde(default)]
    pub routines: HashMap<String, Routine>,
    #[serde(default)]
    pub next_weights: HashMap<String, NextWeight>,
    /// Last session whose progression was written back
    #[serde(default)]
    pub last_applied_session: Option<Uuid>,
}

impl Library {
    pub fn exercise(&self, id: &str) -> Option<&Exercise> {
        self.exercises.get(id)
    }

    pub fn routine(&self, id: &str) -> Option<&Routine> {
        self.routines.get(id)
    }

    /// Routines sorted by name for display
    pub fn routines_by_name(&self) -> Vec<&Routine> {
        let mut routines: Vec<_> = self.routines.values().collect();
        routines.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        routines
    }

    /// Display name for a possibly dangling exercise reference
    pub fn exercise_name(&self, id: Option<&str>) -> String {
        id.and_then(|id| self.exercises.get(id))
            .map(|e| e.name.clone())
            .unwrap_or_else(|| "Unknown exercise".to_string())
    }

    /// Validate the library, returning a description of every problem found.
    ///
    /// References to deleted exercises are tolerated and not reported.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (key, exercise) in &self.exercises {
            if key != &exercise.id {
                errors.push(format!(
                    "Exercise stored under '{}' has id '{}'",
                    key, exercise.id
                ));
            }
        }

        for (key, routine) in &self.routines {
            if key != &routine.id {
                errors.push(format!(
                    "Routine stored under '{}' has id '{}'",
                    key, routine.id
                ));
            }
            errors.extend(routine.validate());
        }

        errors
    }

    /// Evaluate progression for a finished session and record the outcome.
    ///
    /// Rule failure counters are updated in place and, for every exercise
    /// with working sets, the new weight is stored as its next weight. A
    /// session whose routine was deleted yields no results.
    pub fn apply_progression(&mut self, session: &WorkoutSession) -> Result<Vec<ProgressionResult>> {
        if self.last_applied_session == Some(session.id) {
            tracing::info!("Progression for session {} already applied", session.id);
            return Ok(Vec::new());
        }

        let Some(routine_id) = session.routine_id.as_deref() else {
            return Ok(Vec::new());
        };
        let Some(routine) = self.routines.get_mut(routine_id) else {
            tracing::warn!(
                "Routine {} no longer exists, skipping progression for session {}",
                routine_id,
                session.id
            );
            return Ok(Vec::new());
        };

        let results = evaluate_session(session, routine, &self.exercises)?;

        let units: HashMap<String, WeightUnit> = routine
            .exercises
            .iter()
            .filter_map(|e| Some((e.exercise_id.clone()?, e.progression_rule.as_ref()?.unit)))
            .collect();

        let decided_at = session.end_time.unwrap_or(session.start_time);
        for result in &results {
            let Some(exercise_id) = &result.exercise_id else {
                continue;
            };
            if result.previous_weight == 0.0 && result.new_weight == 0.0 && !result.passed {
                continue;
            }
            let unit = units.get(exercise_id).copied().unwrap_or_default();
            self.next_weights.insert(
                exercise_id.clone(),
                NextWeight {
                    weight: result.new_weight,
                    unit,
                    decided_at,
                },
            );
        }

        self.last_applied_session = Some(session.id);
        Ok(results)
    }

    /// Load the library from a file with shared locking.
    ///
    /// Returns an empty library if the file doesn't exist. A corrupted or
    /// invalid library is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(contents) = read_locked(path)? else {
            tracing::info!("No library found at {:?}, using an empty library", path);
            return Ok(Self::default());
        };

        let library: Library = serde_json::from_str(&contents)?;
        let errors = library.validate();
        if !errors.is_empty() {
            return Err(Error::LibraryValidation(errors.join("; ")));
        }

        tracing::debug!(
            "Loaded library from {:?}: {} exercises, {} routines",
            path,
            library.exercises.len(),
            library.routines.len()
        );
        Ok(library)
    }

    /// Save the library atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        write_atomic(path, contents.as_bytes())?;
        tracing::debug!("Saved library to {:?}", path);
        Ok(())
    }

    /// Load the library, modify it, and save it back
    pub fn update<F, T>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut Library) -> Result<T>,
    {
        let mut library = Self::load(path)?;
        let value = f(&mut library)?;
        library.save(path)?;
        Ok(value)
    }
}
