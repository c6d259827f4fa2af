use crate::db::Database;
use crate::derive::{
    build_day_views, derive_day_status, ensure_monday, monday_of, week_ready_for_promotion,
};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AssignedBy, CreateTaskPayload, DayStatus, TaskRecord, TaskStatus, TrackerSettings,
    UpdateTaskPayload, WeekOverview, WeekRecord, WeekStatus,
};
use crate::rollup::summarize;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use std::sync::Arc;
use tracing::{info, warn};

/// Drives every task mutation and is the only writer of a week's persisted
/// status. Every mutating operation refetches the week's task set before
/// deriving anything, so derived values never come from a stale cache.
pub struct WorkLogEngine {
    db: Arc<Database>,
}

impl WorkLogEngine {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch a week lazily (creating it on first access) together with its
    /// five derived day views and the rollup summary.
    pub fn week_overview(&self, employee_id: &str, week_start: NaiveDate) -> AppResult<WeekOverview> {
        ensure_monday(week_start)?;
        let week = self.db.get_or_create_week(employee_id, week_start)?;
        self.overview_of(week)
    }

    pub fn create_task(&self, payload: CreateTaskPayload) -> AppResult<TaskRecord> {
        let settings = self.db.get_settings()?;
        validate_task_fields(
            &settings,
            Some(&payload.title),
            Some(payload.duration_minutes),
            Some(&payload.category),
        )?;
        if payload.assigned_by != AssignedBy::SelfAssigned
            && payload.assigned_by_id.is_none()
        {
            return Err(AppError::Validation(
                "non-self attribution requires an assigning person".to_string(),
            ));
        }
        if matches!(payload.work_date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(AppError::Validation(format!(
                "work date {} falls outside the Monday-Friday span",
                payload.work_date
            )));
        }
        if payload.duration_minutes > settings.daily_task_cap_minutes {
            warn!(
                duration_minutes = payload.duration_minutes,
                cap = settings.daily_task_cap_minutes,
                "task duration exceeds the daily soft cap"
            );
        }

        let week = self
            .db
            .get_or_create_week(&payload.employee_id, monday_of(payload.work_date))?;
        let tasks = self.db.list_tasks(&week.id)?;
        ensure_editable(&week, payload.work_date, &tasks)?;

        let task = self.db.insert_task(&week.id, &payload)?;
        self.refresh_week_total(&week.id)?;
        info!(task_id = %task.id, week_id = %week.id, "task created");
        Ok(task)
    }

    /// Partial update; only changed fields are re-validated.
    pub fn update_task(&self, task_id: &str, update: UpdateTaskPayload) -> AppResult<TaskRecord> {
        let task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| AppError::NotFound(format!("task '{}'", task_id)))?;
        let week = self
            .db
            .get_week(&task.week_id)?
            .ok_or_else(|| AppError::NotFound(format!("week '{}'", task.week_id)))?;
        let tasks = self.db.list_tasks(&week.id)?;
        ensure_editable(&week, task.work_date, &tasks)?;

        let settings = self.db.get_settings()?;
        validate_task_fields(
            &settings,
            update.title.as_deref(),
            update.duration_minutes,
            update.category.as_deref(),
        )?;

        let mut merged = task;
        if let Some(title) = update.title {
            merged.title = title;
        }
        if let Some(category) = update.category {
            merged.category = category;
        }
        if let Some(duration) = update.duration_minutes {
            if duration > settings.daily_task_cap_minutes {
                warn!(
                    duration_minutes = duration,
                    cap = settings.daily_task_cap_minutes,
                    "task duration exceeds the daily soft cap"
                );
            }
            merged.duration_minutes = duration;
        }
        let attribution_changed = update.assigned_by.is_some() || update.assigned_by_id.is_some();
        if let Some(assigned_by) = update.assigned_by {
            merged.assigned_by = assigned_by;
        }
        if let Some(assigned_by_id) = update.assigned_by_id {
            merged.assigned_by_id = Some(assigned_by_id);
        }
        if attribution_changed
            && merged.assigned_by != AssignedBy::SelfAssigned
            && merged.assigned_by_id.is_none()
        {
            return Err(AppError::Validation(
                "non-self attribution requires an assigning person".to_string(),
            ));
        }
        if let Some(description) = update.description {
            merged.description = Some(description);
        }

        self.db.update_task(&merged)?;
        self.refresh_week_total(&merged.week_id)?;
        self.db
            .get_task(task_id)?
            .ok_or_else(|| AppError::NotFound(format!("task '{}'", task_id)))
    }

    pub fn delete_task(&self, task_id: &str) -> AppResult<()> {
        let task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| AppError::NotFound(format!("task '{}'", task_id)))?;
        let week = self
            .db
            .get_week(&task.week_id)?
            .ok_or_else(|| AppError::NotFound(format!("week '{}'", task.week_id)))?;
        let tasks = self.db.list_tasks(&week.id)?;
        ensure_editable(&week, task.work_date, &tasks)?;

        self.db.delete_task(task_id)?;
        self.refresh_week_total(&week.id)?;
        info!(task_id = %task_id, week_id = %week.id, "task deleted");
        Ok(())
    }

    /// Convenience wrapper: a fresh Create pre-filled from another task,
    /// with new identity and date.
    pub fn duplicate_task(&self, task_id: &str, work_date: NaiveDate) -> AppResult<TaskRecord> {
        let source = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| AppError::NotFound(format!("task '{}'", task_id)))?;
        self.create_task(CreateTaskPayload {
            employee_id: source.employee_id,
            work_date,
            title: source.title,
            category: source.category,
            duration_minutes: source.duration_minutes,
            assigned_by: source.assigned_by,
            assigned_by_id: source.assigned_by_id,
            description: source.description,
        })
    }

    /// Submit every Draft/Rework task on one date, then run the week
    /// auto-promotion check. The whole day transitions atomically or not
    /// at all.
    pub fn submit_day(&self, week_id: &str, date: NaiveDate) -> AppResult<WeekOverview> {
        let week = self
            .db
            .get_week(week_id)?
            .ok_or_else(|| AppError::NotFound(format!("week '{}'", week_id)))?;

        let tasks = self.db.list_tasks(week_id)?;
        let statuses: Vec<TaskStatus> = tasks
            .iter()
            .filter(|task| task.work_date == date)
            .map(|task| task.status)
            .collect();
        let day_status = derive_day_status(&statuses);
        if !matches!(
            day_status,
            DayStatus::Draft | DayStatus::Rework
        ) {
            return Err(AppError::NotSubmittable(format!(
                "day {} is {} and cannot be submitted",
                date,
                day_status.as_str()
            )));
        }

        let changed = self.db.submit_day_tasks(week_id, date)?;
        info!(week_id = %week_id, %date, changed, "day submitted");
        self.refresh_week_total(week_id)?;

        // Promotion follows explicit submissions only, never plain edits.
        let tasks = self.db.list_tasks(week_id)?;
        let days = build_day_views(week.week_start_date, &tasks);
        if week.status.is_editable() && week_ready_for_promotion(&days) {
            self.db
                .set_week_status(week_id, WeekStatus::Submitted, Some(Utc::now()))?;
            info!(week_id = %week_id, "week auto-promoted to submitted");
        }

        let week = self
            .db
            .get_week(week_id)?
            .ok_or_else(|| AppError::NotFound(format!("week '{}'", week_id)))?;
        self.overview_of(week)
    }

    /// Catch-all end-of-week action: submits every remaining Draft/Rework
    /// task and marks the week Submitted unconditionally.
    pub fn submit_week(&self, week_id: &str) -> AppResult<WeekOverview> {
        let week = self
            .db
            .get_week(week_id)?
            .ok_or_else(|| AppError::NotFound(format!("week '{}'", week_id)))?;

        let changed = self.db.submit_week_tasks(week_id)?;
        self.db
            .set_week_status(week_id, WeekStatus::Submitted, Some(Utc::now()))?;
        self.refresh_week_total(week_id)?;
        info!(week_id = %week_id, changed, "week submitted");

        let week = self
            .db
            .get_week(&week.id)?
            .ok_or_else(|| AppError::NotFound(format!("week '{}'", week_id)))?;
        self.overview_of(week)
    }

    pub fn is_week_editable(week: &WeekRecord) -> bool {
        week.status.is_editable()
    }

    fn overview_of(&self, week: WeekRecord) -> AppResult<WeekOverview> {
        let tasks = self.db.list_tasks(&week.id)?;
        let settings = self.db.get_settings()?;
        let days = build_day_views(week.week_start_date, &tasks);
        let summary = summarize(&tasks, &settings);
        Ok(WeekOverview { week, days, summary })
    }

    /// The cached week total is never trusted after a mutation; it is
    /// recomputed from the refetched task set and written back.
    fn refresh_week_total(&self, week_id: &str) -> AppResult<i64> {
        let tasks = self.db.list_tasks(week_id)?;
        let total = tasks.iter().map(|task| task.duration_minutes).sum();
        self.db.set_week_total(week_id, total)?;
        Ok(total)
    }
}

/// Outer gate: the week itself must be Draft or Rework. Inner gate: the
/// target day must derive Draft, Rework or NoEntry.
fn ensure_editable(week: &WeekRecord, date: NaiveDate, tasks: &[TaskRecord]) -> AppResult<()> {
    if !week.status.is_editable() {
        return Err(AppError::Validation(format!(
            "week {} is {} and cannot be edited",
            week.week_start_date,
            week.status.as_str()
        )));
    }
    let statuses: Vec<TaskStatus> = tasks
        .iter()
        .filter(|task| task.work_date == date)
        .map(|task| task.status)
        .collect();
    let day_status = derive_day_status(&statuses);
    if !day_status.is_editable() {
        return Err(AppError::Validation(format!(
            "day {} is {} and cannot be edited",
            date,
            day_status.as_str()
        )));
    }
    Ok(())
}

fn validate_task_fields(
    settings: &TrackerSettings,
    title: Option<&str>,
    duration_minutes: Option<i64>,
    category: Option<&str>,
) -> AppResult<()> {
    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("title must not be empty".to_string()));
        }
    }
    if let Some(duration) = duration_minutes {
        if duration <= 0 {
            return Err(AppError::Validation(
                "duration must be a positive number of minutes".to_string(),
            ));
        }
    }
    if let Some(category) = category {
        if !settings.categories.iter().any(|known| known == category) {
            return Err(AppError::Validation(format!(
                "unknown category '{}'",
                category
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_task_fields, WorkLogEngine};
    use crate::db::Database;
    use crate::errors::AppError;
    use crate::models::{AssignedBy, CreateTaskPayload, TrackerSettings};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn engine() -> WorkLogEngine {
        WorkLogEngine::new(Arc::new(Database::in_memory().expect("db")))
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).expect("date")
    }

    fn payload(date: NaiveDate) -> CreateTaskPayload {
        CreateTaskPayload {
            employee_id: "emp-1".to_string(),
            work_date: date,
            title: "implement parser".to_string(),
            category: "development".to_string(),
            duration_minutes: 120,
            assigned_by: AssignedBy::SelfAssigned,
            assigned_by_id: None,
            description: None,
        }
    }

    #[test]
    fn field_validation_catches_bad_input() {
        let settings = TrackerSettings::default();
        assert!(validate_task_fields(&settings, Some("ok"), Some(60), Some("testing")).is_ok());
        assert!(validate_task_fields(&settings, Some("  "), None, None).is_err());
        assert!(validate_task_fields(&settings, None, Some(0), None).is_err());
        assert!(validate_task_fields(&settings, None, Some(-5), None).is_err());
        assert!(validate_task_fields(&settings, None, None, Some("golfing")).is_err());
    }

    #[test]
    fn create_rejects_missing_assigner() {
        let engine = engine();
        let mut bad = payload(monday());
        bad.assigned_by = AssignedBy::Manager;
        let err = engine.create_task(bad).expect_err("should reject");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn create_rejects_weekend_dates() {
        let engine = engine();
        let saturday = NaiveDate::from_ymd_opt(2025, 6, 7).expect("date");
        let err = engine.create_task(payload(saturday)).expect_err("should reject");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn create_attaches_task_to_the_containing_week() {
        let engine = engine();
        let wednesday = NaiveDate::from_ymd_opt(2025, 6, 4).expect("date");
        let task = engine.create_task(payload(wednesday)).expect("create");

        let overview = engine.week_overview("emp-1", monday()).expect("overview");
        assert_eq!(overview.week.id, task.week_id);
        assert_eq!(overview.week.total_minutes, 120);
        assert_eq!(overview.days[2].tasks.len(), 1);
    }

    #[test]
    fn duplicate_copies_fields_but_not_identity_or_date() {
        let engine = engine();
        let original = engine.create_task(payload(monday())).expect("create");
        let tuesday = monday().succ_opt().expect("tuesday");
        let copy = engine.duplicate_task(&original.id, tuesday).expect("duplicate");

        assert_ne!(copy.id, original.id);
        assert_eq!(copy.work_date, tuesday);
        assert_eq!(copy.title, original.title);
        assert_eq!(copy.category, original.category);
        assert_eq!(copy.duration_minutes, original.duration_minutes);
    }
}
