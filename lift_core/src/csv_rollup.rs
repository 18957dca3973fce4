//! CSV rollup functionality for archiving WAL sessions.
//!
//! Each set log becomes one CSV row carrying its session's columns, so the
//! archive can be opened in a spreadsheet and read back into sessions.
//! Sessions without any set logs carry no training data and are not written.
//!
//! A finished workout is logged once per session id and each set once per set
//! id: a retried finish can leave the same session in the WAL twice, and only
//! its first copy is archived or read back.

use crate::{Result, SetLog, WeightUnit, WorkoutSession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::path::Path;
use uuid::Uuid;

/// A row in the CSV archive
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CsvRow {
    session_id: Uuid,
    routine_id: Option<String>,
    routine_name: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    set_id: Uuid,
    exercise_id: Option<String>,
    set_number: u32,
    target_weight: f64,
    actual_weight: f64,
    target_reps: u32,
    actual_reps: u32,
    unit: WeightUnit,
    is_warmup: bool,
    rpe: Option<f64>,
    is_completed: bool,
    timestamp: DateTime<Utc>,
}

impl CsvRow {
    fn new(session: &WorkoutSession, set: &SetLog) -> Self {
        CsvRow {
            session_id: session.id,
            routine_id: session.routine_id.clone(),
            routine_name: session.routine_name.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            set_id: set.id,
            exercise_id: set.exercise_id.clone(),
            set_number: set.set_number,
            target_weight: set.target_weight,
            actual_weight: set.actual_weight,
            target_reps: set.target_reps,
            actual_reps: set.actual_reps,
            unit: set.unit,
            is_warmup: set.is_warmup,
            rpe: set.rpe,
            is_completed: set.is_completed,
            timestamp: set.timestamp,
        }
    }

    fn set_log(&self) -> SetLog {
        SetLog {
            id: self.set_id,
            exercise_id: self.exercise_id.clone(),
            set_number: self.set_number,
            target_weight: self.target_weight,
            actual_weight: self.actual_weight,
            target_reps: self.target_reps,
            actual_reps: self.actual_reps,
            unit: self.unit,
            is_warmup: self.is_warmup,
            timestamp: self.timestamp,
            rpe: self.rpe,
            is_completed: self.is_completed,
        }
    }
}

/// Roll up WAL sessions into CSV and archive the WAL atomically
///
/// This function:
/// 1. Reads all sessions from the WAL
/// 2. Appends their set logs to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Renames the WAL to .processed
/// 5. Returns the number of distinct sessions processed
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let mut sessions = crate::wal::read_sessions(wal_path)?;

    let mut seen = HashSet::new();
    sessions.retain(|session| {
        let first = seen.insert(session.id);
        if !first {
            tracing::warn!("Skipping duplicate WAL entry for session {}", session.id);
        }
        first
    });

    if sessions.is_empty() {
        tracing::info!("No sessions in WAL to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Headers only go into a fresh file
    let needs_headers = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    let mut rows = 0;
    for session in &sessions {
        for set in &session.set_logs {
            writer.serialize(CsvRow::new(session, set))?;
            rows += 1;
        }
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} sessions ({} sets) to CSV", sessions.len(), rows);

    // CSV is on disk before the WAL goes away
    let processed_path = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &processed_path)?;

    tracing::info!("Archived WAL to {:?}", processed_path);

    Ok(sessions.len())
}

/// Read archived sessions back from a CSV file, in file order
pub fn read_sessions_from_csv(path: &Path) -> Result<Vec<WorkoutSession>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut sessions: Vec<WorkoutSession> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut seen_sets: HashSet<Uuid> = HashSet::new();

    for (row_num, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Failed to parse CSV row {}: {}", row_num + 1, e);
                continue;
            }
        };

        if !seen_sets.insert(row.set_id) {
            tracing::debug!("Skipping duplicate CSV row for set {}", row.set_id);
            continue;
        }

        let position = *index.entry(row.session_id).or_insert_with(|| {
            sessions.push(WorkoutSession {
                id: row.session_id,
                routine_id: row.routine_id.clone(),
                routine_name: row.routine_name.clone(),
                start_time: row.start_time,
                end_time: row.end_time,
                set_logs: Vec::new(),
                notes: String::new(),
                is_completed: row.end_time.is_some(),
            });
            sessions.len() - 1
        });
        sessions[position].set_logs.push(row.set_log());
    }

    tracing::debug!("Read {} sessions from CSV", sessions.len());
    Ok(sessions)
}

/// Clean up old processed WAL files
///
/// This removes all .wal.processed files in the given directory.
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed WAL: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed WAL files", count);
    }

    Ok(count)
}
