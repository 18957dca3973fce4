//! State persistence with file locking.
//!
//! JSON state files (the library and the active workout snapshot) are read
//! under a shared lock and written atomically:
//! 1. Write to a temp file in the same directory
//! 2. Sync to disk
//! 3. Rename over the original

use crate::session::SessionSnapshot;
use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Read a file's contents under a shared lock.
///
/// Returns `None` if the file doesn't exist.
pub(crate) fn read_locked(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    Ok(Some(contents))
}

/// Atomically replace `path` with `contents`
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::Other, "state path missing parent")
    })?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;

    // Exclusive lock on the temp file serializes concurrent writers
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        writer.write_all(contents)?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Load the snapshot of an in-progress workout.
///
/// Returns `None` if there is no active workout. An unreadable or corrupted
/// file is logged and treated as no active workout.
pub fn load_active_session(path: &Path) -> Result<Option<SessionSnapshot>> {
    let contents = match read_locked(path) {
        Ok(Some(contents)) => contents,
        Ok(None) => {
            tracing::debug!("No active session file at {:?}", path);
            return Ok(None);
        }
        Err(e) => {
            tracing::warn!(
                "Unable to read active session {:?}: {}. Ignoring it.",
                path,
                e
            );
            return Ok(None);
        }
    };

    match serde_json::from_str::<SessionSnapshot>(&contents) {
        Ok(snapshot) => {
            tracing::debug!("Loaded active session from {:?}", path);
            Ok(Some(snapshot))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse active session {:?}: {}. Ignoring it.",
                path,
                e
            );
            Ok(None)
        }
    }
}

/// Save the snapshot of an in-progress workout
pub fn save_active_session(path: &Path, snapshot: &SessionSnapshot) -> Result<()> {
    let contents = serde_json::to_string(snapshot)?;
    write_atomic(path, contents.as_bytes())?;
    tracing::debug!("Saved active session to {:?}", path);
    Ok(())
}

/// Delete the active workout snapshot. Returns whether a file was removed.
pub fn clear_active_session(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed active session {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::session::{SessionPhase, SessionState};
    use crate::{Routine, RoutineExercise};
    use chrono::Utc;

    fn active_snapshot() -> SessionSnapshot {
        let routine = Routine {
            id: "day_a".into(),
            name: "Day A".into(),
            exercises: vec![RoutineExercise {
                exercise_id: Some("squat".into()),
                ..Default::default()
            }],
            is_template: false,
            source: None,
            created_at: Utc::now(),
        };
        let mut state = SessionState::new(ManualClock::new(Utc::now()));
        state.start(&routine).unwrap();
        state.snapshot()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("active_session.json");

        let snapshot = active_snapshot();
        save_active_session(&path, &snapshot).unwrap();

        let loaded = load_active_session(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.phase, SessionPhase::Active);
    }

    #[test]
    fn test_load_nonexistent_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nonexistent.json");

        assert!(load_active_session(&path).unwrap().is_none());
    }

    #[test]
    fn test_corrupted_snapshot_is_ignored() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("active_session.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let result = load_active_session(&path);
        assert!(result.is_ok());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_clear_active_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("active_session.json");

        save_active_session(&path, &active_snapshot()).unwrap();
        assert!(clear_active_session(&path).unwrap());
        assert!(!path.exists());
        assert!(!clear_active_session(&path).unwrap());
    }

    #[test]
    fn test_atomic_save() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("active_session.json");

        save_active_session(&path, &active_snapshot()).unwrap();

        // Verify file exists and no stray temp files remain
        assert!(path.exists());
        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "active_session.json")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only active_session.json, found extras: {:?}",
            extras
        );
    }
}
