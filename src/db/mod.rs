use crate::derive::week_end;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AssignedBy, CreateTaskPayload, TaskRecord, TaskStatus, TrackerSettings, WeekRecord, WeekStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

const TASK_COLUMNS: &str = "id, week_id, employee_id, work_date, title, category, duration_minutes, \
     assigned_by, assigned_by_id, description, status, rework_comment, created_at, updated_at";

const WEEK_COLUMNS: &str = "id, employee_id, week_start_date, week_end_date, status, total_minutes, \
     submitted_at, approved_by, approved_at, rework_comment";

/// Storage collaborator for week and task records. All mutations are single
/// short statements; the bulk submit transitions run inside one transaction
/// so a day's tasks move together or not at all.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Storage(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    /// Fetch the week for (employee, start date), creating it lazily with
    /// status Draft on first access.
    pub fn get_or_create_week(
        &self,
        employee_id: &str,
        week_start: NaiveDate,
    ) -> AppResult<WeekRecord> {
        let conn = self.lock()?;
        let existing = conn
            .query_row(
                &format!(
                    "SELECT {WEEK_COLUMNS} FROM weeks WHERE employee_id = ?1 AND week_start_date = ?2"
                ),
                params![employee_id, week_start.to_string()],
                parse_week_row,
            )
            .optional()?;
        if let Some(week) = existing {
            return Ok(week);
        }

        let id = Uuid::new_v4().to_string();
        let end = week_end(week_start);
        conn.execute(
            "INSERT INTO weeks (id, employee_id, week_start_date, week_end_date, status, total_minutes)
             VALUES (?1, ?2, ?3, ?4, 'draft', 0)",
            params![id, employee_id, week_start.to_string(), end.to_string()],
        )?;
        Ok(WeekRecord {
            id,
            employee_id: employee_id.to_string(),
            week_start_date: week_start,
            week_end_date: end,
            status: WeekStatus::Draft,
            total_minutes: 0,
            submitted_at: None,
            approved_by: None,
            approved_at: None,
            rework_comment: None,
        })
    }

    pub fn get_week(&self, week_id: &str) -> AppResult<Option<WeekRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {WEEK_COLUMNS} FROM weeks WHERE id = ?1"),
            [week_id],
            parse_week_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Tasks of one week, ordered by work date then creation order.
    pub fn list_tasks(&self, week_id: &str) -> AppResult<Vec<TaskRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE week_id = ?1 ORDER BY work_date ASC, created_at ASC"
        ))?;
        let tasks = stmt
            .query_map([week_id], parse_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn get_task(&self, task_id: &str) -> AppResult<Option<TaskRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            [task_id],
            parse_task_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn insert_task(&self, week_id: &str, payload: &CreateTaskPayload) -> AppResult<TaskRecord> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO tasks ({TASK_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'draft', NULL, ?11, ?11)"
            ),
            params![
                id,
                week_id,
                payload.employee_id,
                payload.work_date.to_string(),
                payload.title,
                payload.category,
                payload.duration_minutes,
                payload.assigned_by.as_str(),
                payload.assigned_by_id,
                payload.description,
                now.to_rfc3339(),
            ],
        )?;
        Ok(TaskRecord {
            id,
            week_id: week_id.to_string(),
            employee_id: payload.employee_id.clone(),
            work_date: payload.work_date,
            title: payload.title.clone(),
            category: payload.category.clone(),
            duration_minutes: payload.duration_minutes,
            assigned_by: payload.assigned_by,
            assigned_by_id: payload.assigned_by_id.clone(),
            description: payload.description.clone(),
            status: TaskStatus::Draft,
            rework_comment: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Write the mutable columns of an already-merged task record.
    pub fn update_task(&self, task: &TaskRecord) -> AppResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET title = ?1, category = ?2, duration_minutes = ?3, assigned_by = ?4,
                              assigned_by_id = ?5, description = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                task.title,
                task.category,
                task.duration_minutes,
                task.assigned_by.as_str(),
                task.assigned_by_id,
                task.description,
                Utc::now().to_rfc3339(),
                task.id,
            ],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("task '{}'", task.id)));
        }
        Ok(())
    }

    pub fn delete_task(&self, task_id: &str) -> AppResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", [task_id])?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("task '{}'", task_id)));
        }
        Ok(())
    }

    /// Move every Draft/Rework task on one date to Submitted, atomically.
    /// Returns the number of tasks that transitioned.
    pub fn submit_day_tasks(&self, week_id: &str, date: NaiveDate) -> AppResult<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE tasks SET status = 'submitted', updated_at = ?1
             WHERE week_id = ?2 AND work_date = ?3 AND status IN ('draft', 'rework')",
            params![Utc::now().to_rfc3339(), week_id, date.to_string()],
        )?;
        tx.commit()?;
        Ok(changed)
    }

    /// Move every Draft/Rework task in the week to Submitted, atomically.
    pub fn submit_week_tasks(&self, week_id: &str) -> AppResult<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE tasks SET status = 'submitted', updated_at = ?1
             WHERE week_id = ?2 AND status IN ('draft', 'rework')",
            params![Utc::now().to_rfc3339(), week_id],
        )?;
        tx.commit()?;
        Ok(changed)
    }

    pub fn set_week_status(
        &self,
        week_id: &str,
        status: WeekStatus,
        submitted_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let conn = self.lock()?;
        let changed = match submitted_at {
            Some(at) => conn.execute(
                "UPDATE weeks SET status = ?1, submitted_at = ?2 WHERE id = ?3",
                params![status.as_str(), at.to_rfc3339(), week_id],
            )?,
            None => conn.execute(
                "UPDATE weeks SET status = ?1 WHERE id = ?2",
                params![status.as_str(), week_id],
            )?,
        };
        if changed == 0 {
            return Err(AppError::NotFound(format!("week '{}'", week_id)));
        }
        Ok(())
    }

    pub fn set_week_total(&self, week_id: &str, total_minutes: i64) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE weeks SET total_minutes = ?1 WHERE id = ?2",
            params![total_minutes, week_id],
        )?;
        Ok(())
    }

    /// The external reviewer's single write path. Only Approved and Rework
    /// are reviewer decisions; a Rework decision carries the comment, an
    /// Approved decision clears it.
    pub fn set_task_review(
        &self,
        task_id: &str,
        status: TaskStatus,
        comment: Option<&str>,
    ) -> AppResult<()> {
        if !matches!(status, TaskStatus::Approved | TaskStatus::Rework) {
            return Err(AppError::Validation(format!(
                "'{}' is not a review decision",
                status.as_str()
            )));
        }
        let rework_comment = match status {
            TaskStatus::Rework => comment,
            _ => None,
        };
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE tasks SET status = ?1, rework_comment = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                status.as_str(),
                rework_comment,
                Utc::now().to_rfc3339(),
                task_id
            ],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("task '{}'", task_id)));
        }
        Ok(())
    }

    pub fn get_settings(&self) -> AppResult<TrackerSettings> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'tracker'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(serde_json::from_str::<TrackerSettings>(&raw).unwrap_or_default()),
            None => Ok(TrackerSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<TrackerSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: TrackerSettings = serde_json::from_value(merged)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('tracker', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;
        Ok(settings)
    }
}

fn parse_week_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WeekRecord> {
    Ok(WeekRecord {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        week_start_date: parse_date(&row.get::<_, String>(2)?)?,
        week_end_date: parse_date(&row.get::<_, String>(3)?)?,
        status: parse_week_status(&row.get::<_, String>(4)?)?,
        total_minutes: row.get(5)?,
        submitted_at: row
            .get::<_, Option<String>>(6)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        approved_by: row.get(7)?,
        approved_at: row
            .get::<_, Option<String>>(8)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        rework_comment: row.get(9)?,
    })
}

fn parse_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        week_id: row.get(1)?,
        employee_id: row.get(2)?,
        work_date: parse_date(&row.get::<_, String>(3)?)?,
        title: row.get(4)?,
        category: row.get(5)?,
        duration_minutes: row.get(6)?,
        assigned_by: parse_assigned_by(&row.get::<_, String>(7)?)?,
        assigned_by_id: row.get(8)?,
        description: row.get(9)?,
        status: parse_task_status(&row.get::<_, String>(10)?)?,
        rework_comment: row.get(11)?,
        created_at: parse_time(&row.get::<_, String>(12)?)?,
        updated_at: parse_time(&row.get::<_, String>(13)?)?,
    })
}

fn parse_task_status(raw: &str) -> rusqlite::Result<TaskStatus> {
    match raw {
        "draft" => Ok(TaskStatus::Draft),
        "submitted" => Ok(TaskStatus::Submitted),
        "approved" => Ok(TaskStatus::Approved),
        "rework" => Ok(TaskStatus::Rework),
        other => Err(conversion_error(format!("unknown task status '{}'", other))),
    }
}

fn parse_week_status(raw: &str) -> rusqlite::Result<WeekStatus> {
    match raw {
        "draft" => Ok(WeekStatus::Draft),
        "submitted" => Ok(WeekStatus::Submitted),
        "approved" => Ok(WeekStatus::Approved),
        "rework" => Ok(WeekStatus::Rework),
        other => Err(conversion_error(format!("unknown week status '{}'", other))),
    }
}

fn parse_assigned_by(raw: &str) -> rusqlite::Result<AssignedBy> {
    match raw {
        "self" => Ok(AssignedBy::SelfAssigned),
        "employee" => Ok(AssignedBy::Employee),
        "manager" => Ok(AssignedBy::Manager),
        "admin" => Ok(AssignedBy::Admin),
        other => Err(conversion_error(format!("unknown attribution '{}'", other))),
    }
}

fn parse_date(raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|error| conversion_error(error.to_string()))
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| conversion_error(error.to_string()))
}

fn conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
