//! Progressive overload evaluation.
//!
//! After a workout, each exercise with a progression rule is judged:
//! - Pass: next weight is the working weight plus the rule's increment
//! - Fail: the same weight is repeated, until enough consecutive failures
//!   trigger a deload to a lighter, still loadable weight
//!
//! The rule's failure counter is the only state carried between workouts.

use crate::{
    Error, Exercise, ProgressionRule, ProgressionTrigger, RepTarget, Result, Routine,
    RoutineExercise, SetLog, WorkoutSession,
};
use serde::Serialize;
use std::collections::HashMap;

/// Absorbs floating point error before rounding down to an increment
const ROUNDING_EPSILON: f64 = 1e-9;

/// Outcome of evaluating one exercise
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressionResult {
    pub exercise_id: Option<String>,
    pub exercise_name: String,
    pub previous_weight: f64,
    pub new_weight: f64,
    pub passed: bool,
    pub deloaded: bool,
    pub message: String,
}

/// Evaluate one exercise's sets against its progression rule.
///
/// `set_logs` are expected in set-number order. The rule's
/// `consecutive_failures` is updated in place.
pub fn evaluate(
    exercise: Option<&Exercise>,
    set_logs: &[&SetLog],
    rule: &mut ProgressionRule,
    target: RepTarget,
) -> ProgressionResult {
    let exercise_id = exercise.map(|e| e.id.clone());
    let exercise_name = exercise
        .map(|e| e.name.clone())
        .unwrap_or_else(|| "Unknown exercise".to_string());

    let working_sets: Vec<&SetLog> = set_logs.iter().copied().filter(|s| s.is_working()).collect();

    let Some(first) = working_sets.first() else {
        tracing::debug!("No working sets for {}, skipping progression", exercise_name);
        return ProgressionResult {
            exercise_id,
            exercise_name,
            previous_weight: 0.0,
            new_weight: 0.0,
            passed: false,
            deloaded: false,
            message: "No working sets completed".to_string(),
        };
    };

    let current_weight = first.target_weight;
    let passed = match rule.trigger {
        ProgressionTrigger::AllSetsCompleted => {
            let at_target = working_sets
                .iter()
                .filter(|s| s.actual_reps >= target.rep_min)
                .count();
            at_target >= target.sets as usize
        }
        ProgressionTrigger::TopSetHit => top_set(&working_sets)
            .map(|s| s.actual_reps >= target.rep_min)
            .unwrap_or(false),
    };

    let unit = rule.unit;
    let (new_weight, deloaded, message) = if passed {
        rule.consecutive_failures = 0;
        let new_weight = current_weight + rule.increment_amount;
        (
            new_weight,
            false,
            format!("Increase weight to {} {}", format_weight(new_weight), unit),
        )
    } else {
        rule.consecutive_failures += 1;

        if rule.consecutive_failures >= rule.deload_after_failures {
            let deload_amount = current_weight * rule.deload_percentage;
            let new_weight =
                round_down_to_increment(current_weight - deload_amount, rule.increment_amount);
            rule.consecutive_failures = 0;
            (
                new_weight,
                true,
                format!(
                    "Deload to {} {} after {} consecutive failures",
                    format_weight(new_weight),
                    unit,
                    rule.deload_after_failures
                ),
            )
        } else {
            (
                current_weight,
                false,
                format!(
                    "Repeat {} {} (failure {}/{})",
                    format_weight(current_weight),
                    unit,
                    rule.consecutive_failures,
                    rule.deload_after_failures
                ),
            )
        }
    };

    tracing::info!("Progression for {}: {}", exercise_name, message);

    ProgressionResult {
        exercise_id,
        exercise_name,
        previous_weight: current_weight,
        new_weight,
        passed,
        deloaded,
        message,
    }
}

/// Evaluate a routine exercise using its own rule and targets.
///
/// Returns `None` when the routine exercise has no progression rule.
pub fn evaluate_routine_exercise(
    exercise: Option<&Exercise>,
    set_logs: &[&SetLog],
    routine_exercise: &mut RoutineExercise,
) -> Option<ProgressionResult> {
    let target = routine_exercise.rep_target();
    let rule = routine_exercise.progression_rule.as_mut()?;
    Some(evaluate(exercise, set_logs, rule, target))
}

/// Run progression for every exercise present in a finished session.
///
/// Each routine exercise with a rule and a known exercise id is evaluated
/// once, in routine order. Routine exercises whose exercise no longer exists
/// are skipped.
pub fn evaluate_session(
    session: &WorkoutSession,
    routine: &mut Routine,
    exercises: &HashMap<String, Exercise>,
) -> Result<Vec<ProgressionResult>> {
    if !session.is_completed {
        return Err(Error::State(format!(
            "session {} must be finished before progression is evaluated",
            session.id
        )));
    }

    let mut order: Vec<usize> = (0..routine.exercises.len()).collect();
    order.sort_by_key(|&i| routine.exercises[i].order);

    let mut results = Vec::new();
    for index in order {
        let routine_exercise = &mut routine.exercises[index];
        let Some(exercise_id) = routine_exercise.exercise_id.clone() else {
            continue;
        };
        let Some(exercise) = exercises.get(&exercise_id) else {
            tracing::warn!(
                "Exercise {} no longer exists, skipping progression",
                exercise_id
            );
            continue;
        };

        let sets = session.sets_for(&exercise_id);
        if sets.is_empty() {
            continue;
        }

        if let Some(result) = evaluate_routine_exercise(Some(exercise), &sets, routine_exercise) {
            results.push(result);
        }
    }

    Ok(results)
}

/// Heaviest working set; the first one wins a tie
fn top_set<'a>(working_sets: &[&'a SetLog]) -> Option<&'a SetLog> {
    let mut top: Option<&'a SetLog> = None;
    for &set in working_sets {
        match top {
            Some(current) if set.actual_weight <= current.actual_weight => {}
            _ => top = Some(set),
        }
    }
    top
}

/// Round `value` down to a multiple of `increment`
pub fn round_down_to_increment(value: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return value.max(0.0);
    }
    ((value / increment + ROUNDING_EPSILON).floor() * increment).max(0.0)
}

/// "225" for whole weights, "227.5" otherwise
pub fn format_weight(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExerciseCategory, EquipmentType, WeightUnit};
    use chrono::Utc;
    use uuid::Uuid;

    fn squat() -> Exercise {
        Exercise {
            id: "squat".into(),
            name: "Back Squat".into(),
            category: ExerciseCategory::Compound,
            muscle_groups: vec![],
            equipment_type: EquipmentType::Barbell,
            notes: String::new(),
            is_custom: false,
        }
    }

    fn set(number: u32, target_weight: f64, actual_weight: f64, reps: u32) -> SetLog {
        SetLog {
            id: Uuid::new_v4(),
            exercise_id: Some("squat".into()),
            set_number: number,
            target_weight,
            actual_weight,
            target_reps: 5,
            actual_reps: reps,
            unit: WeightUnit::Lb,
            is_warmup: false,
            timestamp: Utc::now(),
            rpe: None,
            is_completed: true,
        }
    }

    fn target() -> RepTarget {
        RepTarget { sets: 3, rep_min: 5 }
    }

    fn refs(sets: &[SetLog]) -> Vec<&SetLog> {
        sets.iter().collect()
    }

    #[test]
    fn test_all_sets_pass_increments() {
        let sets = vec![set(1, 225.0, 225.0, 5), set(2, 225.0, 225.0, 5), set(3, 225.0, 225.0, 6)];
        let mut rule = ProgressionRule {
            consecutive_failures: 2,
            ..Default::default()
        };

        let result = evaluate(Some(&squat()), &refs(&sets), &mut rule, target());

        assert!(result.passed);
        assert!(!result.deloaded);
        assert_eq!(result.previous_weight, 225.0);
        assert_eq!(result.new_weight, 230.0);
        assert_eq!(rule.consecutive_failures, 0);
        assert_eq!(result.message, "Increase weight to 230 lb");
    }

    #[test]
    fn test_all_sets_fewer_than_target_fails() {
        let sets = vec![set(1, 225.0, 225.0, 5), set(2, 225.0, 225.0, 5), set(3, 225.0, 225.0, 4)];
        let mut rule = ProgressionRule::default();

        let result = evaluate(Some(&squat()), &refs(&sets), &mut rule, target());

        assert!(!result.passed);
        assert!(!result.deloaded);
        assert_eq!(result.new_weight, 225.0);
        assert_eq!(rule.consecutive_failures, 1);
        assert_eq!(result.message, "Repeat 225 lb (failure 1/3)");
    }

    #[test]
    fn test_warmups_and_incomplete_sets_are_ignored() {
        let mut warmup = set(1, 135.0, 135.0, 5);
        warmup.is_warmup = true;
        let mut skipped = set(4, 225.0, 0.0, 0);
        skipped.is_completed = false;
        let sets = vec![
            warmup,
            set(2, 225.0, 225.0, 5),
            set(3, 225.0, 225.0, 5),
            skipped,
        ];
        let mut rule = ProgressionRule::default();
        let result = evaluate(
            Some(&squat()),
            &refs(&sets),
            &mut rule,
            RepTarget { sets: 2, rep_min: 5 },
        );

        // Working weight comes from the first working set, not the warmup
        assert_eq!(result.previous_weight, 225.0);
        assert!(result.passed);
    }

    #[test]
    fn test_no_working_sets_is_reported_noop() {
        let mut pending = set(1, 225.0, 0.0, 0);
        pending.is_completed = false;
        let sets = vec![pending];
        let mut rule = ProgressionRule {
            consecutive_failures: 1,
            ..Default::default()
        };

        let result = evaluate(Some(&squat()), &refs(&sets), &mut rule, target());

        assert!(!result.passed);
        assert!(!result.deloaded);
        assert_eq!(result.previous_weight, 0.0);
        assert_eq!(result.new_weight, 0.0);
        assert_eq!(result.message, "No working sets completed");
        assert_eq!(rule.consecutive_failures, 1);
    }

    #[test]
    fn test_deload_after_threshold_and_counter_reset() {
        let sets = vec![set(1, 225.0, 225.0, 3)];
        let mut rule = ProgressionRule::default();

        for expected in 1..=2 {
            let result = evaluate(Some(&squat()), &refs(&sets), &mut rule, target());
            assert!(!result.deloaded);
            assert_eq!(rule.consecutive_failures, expected);
            assert!(rule.consecutive_failures <= rule.deload_after_failures);
        }

        let result = evaluate(Some(&squat()), &refs(&sets), &mut rule, target());
        assert!(result.deloaded);
        assert!(!result.passed);
        // 225 - 22.5 = 202.5, rounded down to a multiple of 5
        assert_eq!(result.new_weight, 200.0);
        assert_eq!(rule.consecutive_failures, 0);
        assert_eq!(
            result.message,
            "Deload to 200 lb after 3 consecutive failures"
        );
    }

    #[test]
    fn test_deload_weight_is_multiple_of_increment() {
        for (weight, increment) in [(135.0, 5.0), (97.5, 2.5), (100.0, 5.0), (62.0, 1.25)] {
            let sets = vec![set(1, weight, weight, 0)];
            let mut rule = ProgressionRule {
                increment_amount: increment,
                deload_after_failures: 1,
                ..Default::default()
            };

            let result = evaluate(None, &refs(&sets), &mut rule, target());
            assert!(result.deloaded);

            let steps = result.new_weight / increment;
            assert!((steps - steps.round()).abs() < 1e-9, "{} not a multiple of {}", result.new_weight, increment);
            assert!(result.new_weight <= weight * 0.9 + 1e-9);
        }
    }

    #[test]
    fn test_exact_deload_is_not_rounded_below() {
        // 100 * 0.9 = 90 exactly; float error must not round down to 85
        let sets = vec![set(1, 100.0, 100.0, 0)];
        let mut rule = ProgressionRule {
            deload_after_failures: 1,
            ..Default::default()
        };

        let result = evaluate(None, &refs(&sets), &mut rule, target());
        assert_eq!(result.new_weight, 90.0);
    }

    #[test]
    fn test_top_set_hit_uses_heaviest_set() {
        let sets = vec![set(1, 200.0, 200.0, 3), set(2, 200.0, 220.0, 5), set(3, 200.0, 210.0, 2)];
        let mut rule = ProgressionRule {
            trigger: ProgressionTrigger::TopSetHit,
            ..Default::default()
        };

        let result = evaluate(Some(&squat()), &refs(&sets), &mut rule, target());
        assert!(result.passed);
        assert_eq!(result.new_weight, 205.0);
    }

    #[test]
    fn test_top_set_tie_first_encountered_wins() {
        let sets = vec![set(1, 200.0, 220.0, 2), set(2, 200.0, 220.0, 5)];
        let mut rule = ProgressionRule {
            trigger: ProgressionTrigger::TopSetHit,
            ..Default::default()
        };

        let result = evaluate(Some(&squat()), &refs(&sets), &mut rule, target());
        assert!(!result.passed);
        assert_eq!(rule.consecutive_failures, 1);
    }

    #[test]
    fn test_unknown_exercise_still_evaluates() {
        let sets = vec![set(1, 100.0, 100.0, 5), set(2, 100.0, 100.0, 5), set(3, 100.0, 100.0, 5)];
        let mut rule = ProgressionRule {
            increment_amount: 2.5,
            unit: WeightUnit::Kg,
            ..Default::default()
        };

        let result = evaluate(None, &refs(&sets), &mut rule, target());
        assert_eq!(result.exercise_name, "Unknown exercise");
        assert_eq!(result.exercise_id, None);
        assert_eq!(result.new_weight, 102.5);
        assert_eq!(result.message, "Increase weight to 102.5 kg");
    }

    #[test]
    fn test_routine_exercise_without_rule() {
        let sets = vec![set(1, 100.0, 100.0, 5)];
        let mut entry = RoutineExercise::default();
        assert!(evaluate_routine_exercise(None, &refs(&sets), &mut entry).is_none());
    }

    #[test]
    fn test_evaluate_session_requires_finished_session() {
        let session = WorkoutSession {
            id: Uuid::new_v4(),
            routine_id: Some("r".into()),
            routine_name: "R".into(),
            start_time: Utc::now(),
            end_time: None,
            set_logs: vec![],
            notes: String::new(),
            is_completed: false,
        };
        let mut routine = Routine {
            id: "r".into(),
            name: "R".into(),
            exercises: vec![],
            is_template: false,
            source: None,
            created_at: Utc::now(),
        };

        let result = evaluate_session(&session, &mut routine, &HashMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_evaluate_session_updates_rules_once_per_exercise() {
        let session = WorkoutSession {
            id: Uuid::new_v4(),
            routine_id: Some("r".into()),
            routine_name: "R".into(),
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            set_logs: vec![set(2, 225.0, 225.0, 2), set(1, 225.0, 225.0, 5)],
            notes: String::new(),
            is_completed: true,
        };
        let mut routine = Routine {
            id: "r".into(),
            name: "R".into(),
            exercises: vec![
                RoutineExercise {
                    exercise_id: Some("squat".into()),
                    target_sets: 2,
                    progression_rule: Some(ProgressionRule::default()),
                    ..Default::default()
                },
                RoutineExercise {
                    exercise_id: Some("deleted".into()),
                    order: 1,
                    progression_rule: Some(ProgressionRule::default()),
                    ..Default::default()
                },
            ],
            is_template: false,
            source: None,
            created_at: Utc::now(),
        };
        let exercises = HashMap::from([("squat".to_string(), squat())]);

        let results = evaluate_session(&session, &mut routine, &exercises).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].exercise_name, "Back Squat");
        assert!(!results[0].passed);
        assert_eq!(
            routine.exercises[0]
                .progression_rule
                .as_ref()
                .unwrap()
                .consecutive_failures,
            1
        );
    }

    #[test]
    fn test_format_weight() {
        assert_eq!(format_weight(225.0), "225");
        assert_eq!(format_weight(227.5), "227.5");
    }
}
