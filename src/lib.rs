mod db;
mod derive;
mod engine;
mod errors;
mod models;
mod rollup;

pub use db::Database;
pub use derive::{
    build_day_views, derive_day_status, ensure_monday, monday_of, week_dates, week_end,
    week_ready_for_promotion,
};
pub use engine::WorkLogEngine;
pub use errors::{AppError, AppResult};
pub use models::{
    AssignedBy, CategoryTotal, CreateTaskPayload, DayStatus, DayView, TaskRecord, TaskStatus,
    TrackerSettings, UpdateTaskPayload, WeekOverview, WeekRecord, WeekStatus, WeekSummary,
};
pub use rollup::{category_breakdown, summarize};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Set up daily-rolling JSON logs under `data_dir/logs`. Callers embedding
/// the engine invoke this once at startup; repeated calls are ignored.
pub fn init_tracing(data_dir: &Path) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "worklog.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
