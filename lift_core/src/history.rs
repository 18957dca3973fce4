//! Workout history loading and summaries.
//!
//! Finished sessions live in the WAL until they are rolled up into the CSV
//! archive, so history merges both sources.

use crate::{Result, WorkoutSession};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::HashSet;
use std::path::Path;

/// One point on an exercise's progress chart
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressPoint {
    pub date: DateTime<Utc>,
    pub max_weight: f64,
    pub total_volume: f64,
    pub max_reps: u32,
}

/// Training totals for one week, starting Monday
#[derive(Clone, Debug, PartialEq)]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub workouts: usize,
    pub working_sets: usize,
    pub volume: f64,
}

/// Load all finished sessions from both WAL and CSV
///
/// Returns sessions sorted by start time (newest first). Sessions that appear
/// in both WAL and CSV are only returned once.
pub fn load_finished_sessions(wal_path: &Path, csv_path: &Path) -> Result<Vec<WorkoutSession>> {
    let mut sessions = Vec::new();
    let mut seen_ids = HashSet::new();

    // WAL first: it holds the most recent sessions
    for session in crate::wal::read_sessions(wal_path)? {
        if seen_ids.insert(session.id) {
            sessions.push(session);
        }
    }
    let wal_count = sessions.len();
    tracing::debug!("Loaded {} sessions from WAL", wal_count);

    for session in crate::csv_rollup::read_sessions_from_csv(csv_path)? {
        if seen_ids.insert(session.id) {
            sessions.push(session);
        }
    }
    tracing::debug!("Loaded {} sessions from CSV", sessions.len() - wal_count);

    sessions.retain(|s| s.is_completed);
    sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    tracing::info!("Loaded {} finished sessions", sessions.len());
    Ok(sessions)
}

/// Progress of one exercise across sessions, oldest first.
///
/// Sessions without a completed set of the exercise are skipped.
pub fn exercise_progress(sessions: &[WorkoutSession], exercise_id: &str) -> Vec<ProgressPoint> {
    let mut points: Vec<ProgressPoint> = sessions
        .iter()
        .filter_map(|session| {
            let sets: Vec<_> = session
                .sets_for(exercise_id)
                .into_iter()
                .filter(|s| s.is_completed)
                .collect();
            if sets.is_empty() {
                return None;
            }

            Some(ProgressPoint {
                date: session.start_time,
                max_weight: sets.iter().map(|s| s.actual_weight).fold(0.0, f64::max),
                total_volume: sets.iter().map(|s| s.volume()).sum(),
                max_reps: sets.iter().map(|s| s.actual_reps).max().unwrap_or(0),
            })
        })
        .collect();

    points.sort_by(|a, b| a.date.cmp(&b.date));
    points
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Summaries of the last `weeks` weeks up to and including the week of
/// `today`, oldest first. Weeks without training are included with zeros.
pub fn weekly_summary(sessions: &[WorkoutSession], today: NaiveDate, weeks: u32) -> Vec<WeekSummary> {
    let current = week_start(today);
    let mut summaries: Vec<WeekSummary> = (0..weeks as i64)
        .rev()
        .map(|back| WeekSummary {
            week_start: current - Duration::weeks(back),
            workouts: 0,
            working_sets: 0,
            volume: 0.0,
        })
        .collect();

    for session in sessions {
        let start = week_start(session.start_time.date_naive());
        let Some(summary) = summaries.iter_mut().find(|w| w.week_start == start) else {
            continue;
        };

        summary.workouts += 1;
        for set in session.set_logs.iter().filter(|s| s.is_working()) {
            summary.working_sets += 1;
            summary.volume += set.volume();
        }
    }

    summaries
}
