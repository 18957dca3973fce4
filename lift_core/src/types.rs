//! Core domain types for the Lift strength tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercises and their classification
//! - Routines, routine exercises and progression rules
//! - Workout sessions and set logs
//! - Equipment records consumed by the loadout calculator

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Enumerations
// ============================================================================

/// Unit a weight is expressed in
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    #[default]
    Lb,
    Kg,
}

impl WeightUnit {
    const KG_PER_LB: f64 = 0.453592;

    pub fn abbreviation(&self) -> &'static str {
        match self {
            WeightUnit::Lb => "lb",
            WeightUnit::Kg => "kg",
        }
    }

    /// Convert `value` expressed in this unit into `target`
    pub fn convert(&self, value: f64, target: WeightUnit) -> f64 {
        match (self, target) {
            (WeightUnit::Lb, WeightUnit::Kg) => value * Self::KG_PER_LB,
            (WeightUnit::Kg, WeightUnit::Lb) => value / Self::KG_PER_LB,
            _ => value,
        }
    }
}

impl std::fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abbreviation())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Compound,
    Isolation,
    Cardio,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Biceps,
    Triceps,
    Quads,
    Hamstrings,
    Glutes,
    Calves,
    Abs,
    Forearms,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    Barbell,
    Dumbbell,
    Machine,
    Cable,
    Bodyweight,
    Other,
}

/// What a workout must achieve for the progression rule to count it as a pass
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionTrigger {
    /// Enough working sets reached the minimum rep target
    #[default]
    AllSetsCompleted,
    /// The heaviest working set reached the minimum rep target
    TopSetHit,
}

// ============================================================================
// Exercise and Routine Types
// ============================================================================

/// An exercise definition (e.g., "Back Squat")
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub category: ExerciseCategory,
    #[serde(default)]
    pub muscle_groups: Vec<MuscleGroup>,
    pub equipment_type: EquipmentType,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_custom: bool,
}

/// Progression policy attached to a routine exercise.
///
/// `consecutive_failures` is the only field mutated by evaluation; it is
/// carried across sessions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressionRule {
    pub increment_amount: f64,
    pub unit: WeightUnit,
    pub trigger: ProgressionTrigger,
    pub consecutive_failures: u32,
    pub deload_percentage: f64,
    pub deload_after_failures: u32,
}

impl Default for ProgressionRule {
    fn default() -> Self {
        Self {
            increment_amount: 5.0,
            unit: WeightUnit::Lb,
            trigger: ProgressionTrigger::AllSetsCompleted,
            consecutive_failures: 0,
            deload_percentage: 0.10,
            deload_after_failures: 3,
        }
    }
}

/// Rep/set goal a routine exercise prescribes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepTarget {
    pub sets: u32,
    pub rep_min: u32,
}

/// One entry of a routine.
///
/// `exercise_id` is a weak reference: it is `None` (or dangles) when the
/// exercise was deleted from the library.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutineExercise {
    pub exercise_id: Option<String>,
    pub order: i32,
    pub target_sets: u32,
    pub target_rep_min: u32,
    pub target_rep_max: u32,
    pub target_rpe: Option<f64>,
    pub rest_seconds: u32,
    pub progression_rule: Option<ProgressionRule>,
}

impl Default for RoutineExercise {
    fn default() -> Self {
        Self {
            exercise_id: None,
            order: 0,
            target_sets: 3,
            target_rep_min: 5,
            target_rep_max: 5,
            target_rpe: None,
            rest_seconds: 90,
            progression_rule: None,
        }
    }
}

impl RoutineExercise {
    pub fn rep_target(&self) -> RepTarget {
        RepTarget {
            sets: self.target_sets,
            rep_min: self.target_rep_min,
        }
    }

    /// "5" for a fixed target, "8-12" for a range
    pub fn rep_range_display(&self) -> String {
        if self.target_rep_min == self.target_rep_max {
            self.target_rep_min.to_string()
        } else {
            format!("{}-{}", self.target_rep_min, self.target_rep_max)
        }
    }

    pub fn is_for(&self, exercise_id: &str) -> bool {
        self.exercise_id.as_deref() == Some(exercise_id)
    }
}

/// A named, ordered list of routine exercises
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Routine {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub exercises: Vec<RoutineExercise>,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Routine {
    /// Routine exercises in `order`; list position is not meaningful
    pub fn sorted_exercises(&self) -> Vec<&RoutineExercise> {
        let mut exercises: Vec<_> = self.exercises.iter().collect();
        exercises.sort_by_key(|e| e.order);
        exercises
    }

    /// Validate the routine, returning a description of every problem found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for entry in &self.exercises {
            let label = entry.exercise_id.as_deref().unwrap_or("<unknown>");
            if entry.target_rep_min > entry.target_rep_max {
                errors.push(format!(
                    "Routine '{}': exercise '{}' has rep min {} above rep max {}",
                    self.id, label, entry.target_rep_min, entry.target_rep_max
                ));
            }
            if entry.target_sets == 0 {
                errors.push(format!(
                    "Routine '{}': exercise '{}' has no target sets",
                    self.id, label
                ));
            }
            if let Some(rule) = &entry.progression_rule {
                if !(0.0..1.0).contains(&rule.deload_percentage) {
                    errors.push(format!(
                        "Routine '{}': exercise '{}' has deload percentage {} outside [0, 1)",
                        self.id, label, rule.deload_percentage
                    ));
                }
            }
        }

        errors
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// A single set performed (or planned) during a workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SetLog {
    pub id: Uuid,
    pub exercise_id: Option<String>,
    pub set_number: u32,
    pub target_weight: f64,
    pub actual_weight: f64,
    pub target_reps: u32,
    pub actual_reps: u32,
    pub unit: WeightUnit,
    pub is_warmup: bool,
    pub timestamp: DateTime<Utc>,
    pub rpe: Option<f64>,
    pub is_completed: bool,
}

impl SetLog {
    /// Uncompleted placeholder for a planned set
    pub fn planned(
        exercise_id: Option<String>,
        set_number: u32,
        target_reps: u32,
        unit: WeightUnit,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercise_id,
            set_number,
            target_weight: 0.0,
            actual_weight: 0.0,
            target_reps,
            actual_reps: 0,
            unit,
            is_warmup: false,
            timestamp: now,
            rpe: None,
            is_completed: false,
        }
    }

    /// A completed, non-warmup set
    pub fn is_working(&self) -> bool {
        self.is_completed && !self.is_warmup
    }

    pub fn volume(&self) -> f64 {
        self.actual_weight * self.actual_reps as f64
    }
}

/// A recorded workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSession {
    pub id: Uuid,
    pub routine_id: Option<String>,
    #[serde(default)]
    pub routine_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub set_logs: Vec<SetLog>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_completed: bool,
}

impl WorkoutSession {
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    pub fn duration_formatted(&self) -> String {
        let Some(duration) = self.duration() else {
            return "In Progress".to_string();
        };
        let minutes = duration.num_minutes();
        let hours = minutes / 60;
        let remaining_minutes = minutes % 60;
        if hours > 0 {
            format!("{}h {}m", hours, remaining_minutes)
        } else {
            format!("{}m", remaining_minutes)
        }
    }

    /// Set logs of one exercise, ordered by set number
    pub fn sets_for(&self, exercise_id: &str) -> Vec<&SetLog> {
        let mut sets: Vec<_> = self
            .set_logs
            .iter()
            .filter(|s| s.exercise_id.as_deref() == Some(exercise_id))
            .collect();
        sets.sort_by_key(|s| s.set_number);
        sets
    }
}

// ============================================================================
// Equipment Types
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Barbell {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub unit: WeightUnit,
    #[serde(default)]
    pub is_default: bool,
}

/// A plate denomination in the inventory; `count` is the total number of
/// plates owned, usable in pairs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Plate {
    pub weight: f64,
    #[serde(default)]
    pub unit: WeightUnit,
    pub count: u32,
    #[serde(default = "default_plate_color")]
    pub color: String,
}

fn default_plate_color() -> String {
    "gray".into()
}

impl Plate {
    pub fn new(weight: f64, count: u32, color: impl Into<String>) -> Self {
        Self {
            weight,
            unit: WeightUnit::Lb,
            count,
            color: color.into(),
        }
    }
}
