#![forbid(unsafe_code)]

//! Core domain model and business logic for the Lift workout tracker.
//!
//! This crate provides:
//! - Domain types (exercises, routines, set logs, sessions, equipment)
//! - Plate loadout calculation
//! - Progressive overload evaluation
//! - The in-workout session state machine and rest timer
//! - Persistence (library, active session, WAL, CSV) and history

pub mod types;
pub mod error;
pub mod clock;
pub mod config;
pub mod logging;
pub mod loadout;
pub mod progression;
pub mod timer;
pub mod session;
pub mod state;
pub mod library;
pub mod wal;
pub mod csv_rollup;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use loadout::{LoadedPlate, Loadout};
pub use progression::ProgressionResult;
pub use timer::{RestTimer, TickToken, TimerStatus};
pub use session::{SessionPhase, SessionSnapshot, SessionState};
pub use library::{Library, NextWeight};
pub use wal::{JsonlSink, SessionSink};
pub use history::{load_finished_sessions, ProgressPoint, WeekSummary};
