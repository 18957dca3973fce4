use chrono::Utc;
use clap::{Parser, Subcommand};
use lift_core::csv_rollup::{cleanup_processed_wals, wal_to_csv_and_archive};
use lift_core::history::{exercise_progress, weekly_summary};
use lift_core::progression::format_weight;
use lift_core::state::{clear_active_session, load_active_session, save_active_session};
use lift_core::timer::format_countdown;
use lift_core::*;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lift")]
#[command(about = "Strength workout logger with load progression", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List routines in the library
    Routines,

    /// Start a workout from a routine (id or name)
    Start { routine: String },

    /// Show the active workout
    Status,

    /// Complete a set of the current exercise
    Done {
        /// Set number within the current exercise
        set: u32,

        /// Reps performed (defaults to the target)
        #[arg(long)]
        reps: Option<u32>,

        /// Weight lifted (defaults to the target)
        #[arg(long)]
        weight: Option<f64>,

        /// Rate of perceived exertion
        #[arg(long)]
        rpe: Option<f64>,
    },

    /// Mark a completed set of the current exercise as not done
    Undo { set: u32 },

    /// Set the working weight of the current exercise
    Weight {
        #[arg(required_unless_present_any = ["up", "down"])]
        weight: Option<f64>,

        /// Add the configured weight step to the remaining sets
        #[arg(long, conflicts_with_all = ["weight", "down"])]
        up: bool,

        /// Subtract the configured weight step from the remaining sets
        #[arg(long, conflicts_with_all = ["weight", "up"])]
        down: bool,
    },

    /// Add a set to the current exercise
    AddSet {
        #[arg(long)]
        warmup: bool,
    },

    /// Move to the next exercise
    Next,

    /// Move to the previous exercise
    Prev,

    /// Jump to an exercise by position (1-based)
    Goto { position: usize },

    /// Control the rest timer
    Rest {
        #[command(subcommand)]
        action: RestAction,
    },

    /// Finish the workout and apply progression
    Finish,

    /// Abandon the workout without logging it
    Discard,

    /// Show how to load a barbell for a target weight
    Plates {
        target: f64,

        /// Barbell name (defaults to the configured default bar)
        #[arg(long)]
        bar: Option<String>,
    },

    /// Show progress for an exercise (id or name)
    History { exercise: String },

    /// Show weekly training totals
    Weekly {
        #[arg(long, default_value_t = 8)]
        weeks: u32,
    },

    /// Roll up WAL sessions to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

#[derive(Subcommand)]
enum RestAction {
    /// Stop the rest countdown
    Skip,

    /// Add (or with a negative value, remove) rest time
    Extend {
        #[arg(long, allow_hyphen_values = true)]
        seconds: Option<i64>,
    },
}

/// Files kept under the data directory
struct Paths {
    library: PathBuf,
    active: PathBuf,
    wal_dir: PathBuf,
    wal: PathBuf,
    csv: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        let wal_dir = data_dir.join("wal");
        Self {
            library: data_dir.join("library.json"),
            active: data_dir.join("active_session.json"),
            wal: wal_dir.join("workout_sessions.wal"),
            wal_dir,
            csv: data_dir.join("sessions.csv"),
        }
    }
}

fn main() -> Result<()> {
    // Keep stdout clean for command output
    lift_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths::new(&data_dir);
    tracing::debug!("Using data directory {:?}", data_dir);

    match cli.command {
        Commands::Routines => cmd_routines(&paths),
        Commands::Start { routine } => cmd_start(&paths, &routine),
        Commands::Status => cmd_status(&paths),
        Commands::Done {
            set,
            reps,
            weight,
            rpe,
        } => cmd_done(&paths, set, reps, weight, rpe),
        Commands::Undo { set } => cmd_undo(&paths, set),
        Commands::Weight { weight, up, down } => {
            let change = match (weight, up, down) {
                (Some(weight), _, _) => WeightChange::To(weight),
                (None, true, _) => WeightChange::By(config.workout.weight_step),
                _ => WeightChange::By(-config.workout.weight_step),
            };
            cmd_weight(&paths, change)
        }
        Commands::AddSet { warmup } => cmd_add_set(&paths, warmup),
        Commands::Next => cmd_navigate(&paths, Navigation::Next),
        Commands::Prev => cmd_navigate(&paths, Navigation::Previous),
        Commands::Goto { position } => cmd_navigate(&paths, Navigation::To(position)),
        Commands::Rest { action } => cmd_rest(&paths, action, &config),
        Commands::Finish => cmd_finish(&paths),
        Commands::Discard => cmd_discard(&paths),
        Commands::Plates { target, bar } => cmd_plates(target, bar.as_deref(), &config),
        Commands::History { exercise } => cmd_history(&paths, &exercise),
        Commands::Weekly { weeks } => cmd_weekly(&paths, weeks),
        Commands::Rollup { cleanup } => cmd_rollup(&paths, cleanup),
    }
}

// ============================================================================
// Active workout plumbing
// ============================================================================

/// Resume the saved workout, catching the rest timer up with the wall clock
fn load_workout(paths: &Paths) -> Result<SessionState> {
    let mut state = match load_active_session(&paths.active)? {
        Some(snapshot) if snapshot.phase == SessionPhase::Active => {
            SessionState::from_snapshot(snapshot, SystemClock)
        }
        _ => SessionState::default(),
    };
    state.poll();
    Ok(state)
}

fn load_active_workout(paths: &Paths) -> Result<SessionState> {
    let state = load_workout(paths)?;
    if state.phase() != SessionPhase::Active {
        return Err(Error::State(
            "No active workout. Start one with `lift start <routine>`.".into(),
        ));
    }
    Ok(state)
}

fn save_workout(paths: &Paths, state: &SessionState) -> Result<()> {
    if state.phase() == SessionPhase::Active {
        save_active_session(&paths.active, &state.snapshot())
    } else {
        clear_active_session(&paths.active).map(|_| ())
    }
}

/// Resolve a 1-based set number of the current exercise to its set log
fn current_set_id(state: &SessionState, set_number: u32) -> Result<Uuid> {
    state
        .current_set_logs()
        .into_iter()
        .find(|s| s.set_number == set_number)
        .map(|s| s.id)
        .ok_or_else(|| Error::Other(format!("No set {} for the current exercise", set_number)))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_routines(paths: &Paths) -> Result<()> {
    let library = Library::load(&paths.library)?;

    if library.routines.is_empty() {
        println!("No routines found in {}", paths.library.display());
        return Ok(());
    }

    for routine in library.routines_by_name() {
        println!("{} ({})", routine.name, routine.id);
        for entry in routine.sorted_exercises() {
            println!(
                "  → {}  {} × {}",
                library.exercise_name(entry.exercise_id.as_deref()),
                entry.target_sets,
                entry.rep_range_display()
            );
        }
    }

    Ok(())
}

fn cmd_start(paths: &Paths, routine_ref: &str) -> Result<()> {
    let library = Library::load(&paths.library)?;
    let routine = library
        .routine(routine_ref)
        .or_else(|| {
            library
                .routines
                .values()
                .find(|r| r.name.eq_ignore_ascii_case(routine_ref))
        })
        .ok_or_else(|| Error::Other(format!("Unknown routine: {}", routine_ref)))?;

    let mut state = load_workout(paths)?;
    if state.phase() == SessionPhase::Active {
        return Err(Error::State(
            "A workout is already in progress. Finish or discard it first.".into(),
        ));
    }
    state.start(routine)?;

    // Pre-fill working weights decided by earlier workouts
    let entries = state.routine_exercises().to_vec();
    for entry in &entries {
        let Some(exercise_id) = entry.exercise_id.as_deref() else {
            continue;
        };
        let Some(next) = library.next_weights.get(exercise_id) else {
            continue;
        };
        let unit = entry
            .progression_rule
            .as_ref()
            .map(|rule| rule.unit)
            .unwrap_or(next.unit);
        state.set_weight_for_exercise(exercise_id, next.unit.convert(next.weight, unit))?;
    }

    save_workout(paths, &state)?;

    println!("✓ Started {}", routine.name);
    print_workout(&state, &library);
    Ok(())
}

fn cmd_status(paths: &Paths) -> Result<()> {
    let state = load_workout(paths)?;
    if state.phase() != SessionPhase::Active {
        println!("No active workout.");
        return Ok(());
    }

    // Read-only: the timer catches up from its deadline on every load
    let library = Library::load(&paths.library)?;
    print_workout(&state, &library);
    Ok(())
}

fn cmd_done(
    paths: &Paths,
    set_number: u32,
    reps: Option<u32>,
    weight: Option<f64>,
    rpe: Option<f64>,
) -> Result<()> {
    let mut state = load_active_workout(paths)?;
    let set_id = current_set_id(&state, set_number)?;

    let (target_reps, target_weight) = state
        .current_set_logs()
        .into_iter()
        .find(|s| s.id == set_id)
        .map(|s| (s.target_reps, s.target_weight))
        .unwrap_or_default();
    let reps = reps.unwrap_or(target_reps);
    let weight = weight.unwrap_or(target_weight);

    state.complete_set(set_id, reps, weight)?;
    if rpe.is_some() {
        state.record_rpe(set_id, rpe)?;
    }
    save_workout(paths, &state)?;

    println!("✓ Set {}: {} × {}", set_number, format_weight(weight), reps);
    if state.is_resting() {
        println!("  Rest: {}", format_countdown(state.rest_remaining()));
    }
    println!(
        "  Progress: {}/{} sets",
        state.completed_sets(),
        state.total_sets()
    );
    Ok(())
}

fn cmd_undo(paths: &Paths, set_number: u32) -> Result<()> {
    let mut state = load_active_workout(paths)?;
    let set_id = current_set_id(&state, set_number)?;

    state.uncomplete_set(set_id)?;
    save_workout(paths, &state)?;

    println!("✓ Set {} marked as not done", set_number);
    Ok(())
}

enum WeightChange {
    To(f64),
    By(f64),
}

fn cmd_weight(paths: &Paths, change: WeightChange) -> Result<()> {
    let mut state = load_active_workout(paths)?;

    match change {
        WeightChange::To(weight) => {
            let changed = state.set_weight_for_current(weight)?;
            println!("✓ {} sets set to {}", changed, format_weight(weight));
        }
        WeightChange::By(delta) => {
            let pending: Vec<Uuid> = state
                .current_set_logs()
                .into_iter()
                .filter(|s| !s.is_completed && !s.is_warmup)
                .map(|s| s.id)
                .collect();
            for set_id in &pending {
                state.adjust_target_weight(*set_id, delta)?;
            }
            let weight = state
                .current_set_logs()
                .into_iter()
                .find(|s| pending.contains(&s.id))
                .map(|s| s.target_weight);
            match weight {
                Some(weight) => println!(
                    "✓ {} sets now at {}",
                    pending.len(),
                    format_weight(weight)
                ),
                None => println!("No remaining sets to adjust."),
            }
        }
    }

    save_workout(paths, &state)
}

fn cmd_add_set(paths: &Paths, warmup: bool) -> Result<()> {
    let mut state = load_active_workout(paths)?;

    match state.add_set(warmup)? {
        Some(set_id) => {
            let number = state
                .current_set_logs()
                .into_iter()
                .find(|s| s.id == set_id)
                .map(|s| s.set_number)
                .unwrap_or_default();
            let kind = if warmup { "warmup set" } else { "set" };
            println!("✓ Added {} {}", kind, number);
        }
        None => println!("The current exercise no longer exists; no set added."),
    }

    save_workout(paths, &state)
}

enum Navigation {
    Next,
    Previous,
    To(usize),
}

fn cmd_navigate(paths: &Paths, navigation: Navigation) -> Result<()> {
    let mut state = load_active_workout(paths)?;

    let moved = match navigation {
        Navigation::Next => state.next_exercise(),
        Navigation::Previous => state.previous_exercise(),
        Navigation::To(position) => match position.checked_sub(1) {
            Some(index) => state.go_to(index),
            None => false,
        },
    };

    if !moved {
        println!("Already there; staying on the current exercise.");
    }
    save_workout(paths, &state)?;

    let library = Library::load(&paths.library)?;
    print_workout(&state, &library);
    Ok(())
}

fn cmd_rest(paths: &Paths, action: RestAction, config: &Config) -> Result<()> {
    let mut state = load_active_workout(paths)?;

    if !state.is_resting() {
        println!("Not resting.");
        return save_workout(paths, &state);
    }

    match action {
        RestAction::Skip => {
            state.skip_rest();
            println!("✓ Rest skipped");
        }
        RestAction::Extend { seconds } => {
            state.extend_rest(seconds.unwrap_or(config.workout.rest_extend_seconds));
            if state.is_resting() {
                println!("✓ Rest: {}", format_countdown(state.rest_remaining()));
            } else {
                println!("✓ Rest over");
            }
        }
    }

    save_workout(paths, &state)
}

fn cmd_finish(paths: &Paths) -> Result<()> {
    let mut state = load_active_workout(paths)?;
    let session = state.finish()?;

    // Log the workout before touching anything derived from it. A retry
    // after a failed finish finds it already logged.
    let logged = lift_core::wal::read_sessions(&paths.wal)?
        .iter()
        .any(|s| s.id == session.id);
    if logged {
        tracing::info!("Session {} already in WAL", session.id);
    } else {
        let mut sink = JsonlSink::new(&paths.wal);
        sink.append(&session)?;
    }

    let results = Library::update(&paths.library, |library| {
        library.apply_progression(&session)
    })?;

    save_workout(paths, &state)?;

    let completed = session.set_logs.iter().filter(|s| s.is_completed).count();
    println!(
        "✓ Workout logged: {} ({}, {}/{} sets)",
        session.routine_name,
        session.duration_formatted(),
        completed,
        session.set_logs.len()
    );

    if !results.is_empty() {
        println!();
        println!("Next time:");
        for result in &results {
            let marker = if result.passed {
                "↑"
            } else if result.deloaded {
                "↓"
            } else {
                "→"
            };
            println!("  {} {}: {}", marker, result.exercise_name, result.message);
        }
    }

    Ok(())
}

fn cmd_discard(paths: &Paths) -> Result<()> {
    let mut state = load_active_workout(paths)?;
    let session_id = state.discard()?;
    save_workout(paths, &state)?;

    println!("✓ Workout {} discarded", session_id);
    Ok(())
}

fn cmd_plates(target: f64, bar_name: Option<&str>, config: &Config) -> Result<()> {
    let equipment = &config.equipment;
    let bar = match bar_name {
        Some(name) => equipment.barbell(name),
        None => equipment.default_barbell(),
    }
    .ok_or_else(|| Error::Config(format!("Unknown barbell: {}", bar_name.unwrap_or("default"))))?;

    let unit = equipment.unit;
    let bar_weight = to_display_unit(bar.weight, bar.unit, unit);
    let plates: Vec<Plate> = equipment
        .plates
        .iter()
        .map(|p| Plate {
            weight: to_display_unit(p.weight, p.unit, unit),
            unit,
            ..p.clone()
        })
        .collect();

    let loadout = loadout::calculate(target, bar_weight, &plates);

    println!("Target: {} {}", format_weight(target), unit);
    println!("Bar: {} ({} {})", bar.name, format_weight(bar_weight), unit);

    if loadout.plates_per_side.is_empty() {
        println!("Per side: (empty bar)");
    } else {
        let per_side: Vec<String> = loadout
            .plates_per_side
            .iter()
            .map(|p| format!("{} ({})", format_weight(p.weight), p.color))
            .collect();
        println!("Per side: {}", per_side.join(" + "));
    }

    if loadout.is_exact {
        println!("Total: {} {} ✓", format_weight(loadout.total_weight), unit);
    } else {
        println!(
            "Total: {} {} (off by {} {})",
            format_weight(loadout.total_weight),
            unit,
            format_weight(loadout.difference),
            unit
        );
    }

    Ok(())
}

/// Convert a weight into the equipment unit, rounded to hundredths
fn to_display_unit(weight: f64, from: WeightUnit, to: WeightUnit) -> f64 {
    if from == to {
        weight
    } else {
        (from.convert(weight, to) * 100.0).round() / 100.0
    }
}

fn cmd_history(paths: &Paths, exercise_ref: &str) -> Result<()> {
    let library = Library::load(&paths.library)?;
    let exercise = library.exercise(exercise_ref).or_else(|| {
        library
            .exercises
            .values()
            .find(|e| e.name.eq_ignore_ascii_case(exercise_ref))
    });
    let (exercise_id, name) = match exercise {
        Some(e) => (e.id.as_str(), e.name.as_str()),
        None => (exercise_ref, exercise_ref),
    };

    let sessions = load_finished_sessions(&paths.wal, &paths.csv)?;
    let points = exercise_progress(&sessions, exercise_id);

    println!("{}", name);
    if points.is_empty() {
        println!("  No completed sets yet.");
    }
    for point in &points {
        println!(
            "  {}  top {}  × {} reps  volume {}",
            point.date.format("%Y-%m-%d"),
            format_weight(point.max_weight),
            point.max_reps,
            format_weight(point.total_volume)
        );
    }

    if let Some(next) = library.next_weights.get(exercise_id) {
        println!("  Next: {} {}", format_weight(next.weight), next.unit);
    }

    Ok(())
}

fn cmd_weekly(paths: &Paths, weeks: u32) -> Result<()> {
    let sessions = load_finished_sessions(&paths.wal, &paths.csv)?;
    let today = Utc::now().date_naive();

    println!("Week of      Workouts  Sets  Volume");
    for week in weekly_summary(&sessions, today, weeks) {
        println!(
            "{}  {:>8}  {:>4}  {}",
            week.week_start.format("%Y-%m-%d"),
            week.workouts,
            week.working_sets,
            format_weight(week.volume)
        );
    }

    Ok(())
}

fn cmd_rollup(paths: &Paths, cleanup: bool) -> Result<()> {
    if !paths.wal.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = wal_to_csv_and_archive(&paths.wal, &paths.csv)?;

    println!("✓ Rolled up {} sessions to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = cleanup_processed_wals(&paths.wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}

// ============================================================================
// Display
// ============================================================================

fn print_workout(state: &SessionState, library: &Library) {
    let Some(session) = state.session() else {
        return;
    };

    let elapsed = (Utc::now() - session.start_time).num_minutes().max(0);
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {} · {}m", session.routine_name, elapsed);
    println!("╰─────────────────────────────────────────╯");
    println!();

    if let Some(entry) = state.current_routine_exercise() {
        println!(
            "  Exercise {}/{}: {}",
            state.current_exercise_index() + 1,
            state.exercise_count(),
            library.exercise_name(entry.exercise_id.as_deref())
        );
        println!(
            "  {} × {}  ·  rest {}",
            entry.target_sets,
            entry.rep_range_display(),
            format_countdown(entry.rest_seconds)
        );
        println!();
    }

    for set in state.current_set_logs() {
        let label = if set.is_warmup { " (warmup)" } else { "" };
        if set.is_completed {
            println!(
                "  ✓ Set {}{}  {} {} × {}",
                set.set_number,
                label,
                format_weight(set.actual_weight),
                set.unit,
                set.actual_reps
            );
        } else {
            println!(
                "  · Set {}{}  {} {} × {}",
                set.set_number,
                label,
                format_weight(set.target_weight),
                set.unit,
                set.target_reps
            );
        }
    }

    println!();
    if state.is_resting() {
        println!("  Rest: {} remaining", format_countdown(state.rest_remaining()));
    }
    println!(
        "  Progress: {}/{} sets",
        state.completed_sets(),
        state.total_sets()
    );
}
