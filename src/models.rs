use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a single logged task.
///
/// Draft -> Submitted -> Approved (terminal), or Submitted -> Rework and back
/// into the cycle. Review decisions that assign Approved/Rework come from an
/// external reviewer; this crate only consumes the resulting status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Draft,
    Submitted,
    Approved,
    Rework,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rework => "rework",
        }
    }

    /// Precedence rank used by day derivation. Higher ranks win: a single
    /// Rework task forces the whole day to Rework even when every other task
    /// is Approved.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Submitted => 1,
            Self::Approved => 2,
            Self::Rework => 3,
        }
    }
}

/// Status of one calendar day, derived from the tasks logged on it.
/// Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayStatus {
    NoEntry,
    Draft,
    Submitted,
    Approved,
    Rework,
}

impl DayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoEntry => "no-entry",
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rework => "rework",
        }
    }

    /// Tasks may be added, edited or deleted on this day.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::NoEntry | Self::Draft | Self::Rework)
    }
}

/// Persisted lifecycle status of a week record. The transition engine is the
/// only writer of this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeekStatus {
    Draft,
    Submitted,
    Approved,
    Rework,
}

impl WeekStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rework => "rework",
        }
    }

    /// Outer editability gate; per-day editability is the inner gate.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Rework)
    }
}

/// Who assigned the logged work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignedBy {
    #[serde(rename = "self")]
    SelfAssigned,
    Employee,
    Manager,
    Admin,
}

impl AssignedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfAssigned => "self",
            Self::Employee => "employee",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub week_id: String,
    pub employee_id: String,
    pub work_date: NaiveDate,
    pub title: String,
    pub category: String,
    pub duration_minutes: i64,
    pub assigned_by: AssignedBy,
    pub assigned_by_id: Option<String>,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub rework_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRecord {
    pub id: String,
    pub employee_id: String,
    pub week_start_date: NaiveDate,
    pub week_end_date: NaiveDate,
    pub status: WeekStatus,
    pub total_minutes: i64,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rework_comment: Option<String>,
}

/// Read-only view of one calendar day inside a week.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub total_minutes: i64,
    pub rework_comment: Option<String>,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub employee_id: String,
    pub work_date: NaiveDate,
    pub title: String,
    pub category: String,
    pub duration_minutes: i64,
    pub assigned_by: AssignedBy,
    pub assigned_by_id: Option<String>,
    pub description: Option<String>,
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub title: Option<String>,
    pub category: Option<String>,
    pub duration_minutes: Option<i64>,
    pub assigned_by: Option<AssignedBy>,
    pub assigned_by_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub minutes: i64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    pub total_minutes: i64,
    pub target_minutes: i64,
    pub days_with_entries: usize,
    pub categories: Vec<CategoryTotal>,
}

/// Full read model for one week: the persisted record, the five derived day
/// views and the rollup summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekOverview {
    pub week: WeekRecord,
    pub days: Vec<DayView>,
    pub summary: WeekSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerSettings {
    pub weekly_target_minutes: i64,
    pub daily_task_cap_minutes: i64,
    pub categories: Vec<String>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            weekly_target_minutes: 2400,
            daily_task_cap_minutes: 960,
            categories: [
                "development",
                "testing",
                "code-review",
                "design",
                "documentation",
                "meeting",
                "training",
                "support",
                "research",
                "other",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}
