use crate::errors::{AppError, AppResult};
use crate::models::{DayStatus, DayView, TaskRecord, TaskStatus};
use chrono::{Datelike, Days, NaiveDate, Weekday};

pub const DAYS_PER_WEEK: u64 = 5;

/// Derive the status of one calendar day from the statuses of its tasks.
///
/// Precedence is data-driven via `TaskStatus::precedence`: the highest-ranked
/// status present nominates the outcome, but Approved and Submitted only hold
/// when uniform across the day. Any mixture falls back to Draft.
pub fn derive_day_status(statuses: &[TaskStatus]) -> DayStatus {
    let Some(highest) = statuses.iter().copied().max_by_key(|status| status.precedence()) else {
        return DayStatus::NoEntry;
    };
    match highest {
        TaskStatus::Rework => DayStatus::Rework,
        TaskStatus::Approved if statuses.iter().all(|s| *s == TaskStatus::Approved) => {
            DayStatus::Approved
        }
        TaskStatus::Submitted if statuses.iter().all(|s| *s == TaskStatus::Submitted) => {
            DayStatus::Submitted
        }
        _ => DayStatus::Draft,
    }
}

/// The five working dates of a week, Monday first.
pub fn week_dates(week_start: NaiveDate) -> Vec<NaiveDate> {
    (0..DAYS_PER_WEEK)
        .filter_map(|offset| week_start.checked_add_days(Days::new(offset)))
        .collect()
}

pub fn week_end(week_start: NaiveDate) -> NaiveDate {
    week_start + chrono::Duration::days(DAYS_PER_WEEK as i64 - 1)
}

pub fn ensure_monday(date: NaiveDate) -> AppResult<()> {
    if date.weekday() != Weekday::Mon {
        return Err(AppError::Validation(format!(
            "week start {} is not a Monday",
            date
        )));
    }
    Ok(())
}

/// Monday of the week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Group a week's tasks into five day views. Tasks are expected in
/// date-then-creation order; that order is preserved within each day. The
/// surfaced rework comment is the first task's comment carrying one.
pub fn build_day_views(week_start: NaiveDate, tasks: &[TaskRecord]) -> Vec<DayView> {
    week_dates(week_start)
        .into_iter()
        .map(|date| {
            let day_tasks: Vec<TaskRecord> = tasks
                .iter()
                .filter(|task| task.work_date == date)
                .cloned()
                .collect();
            let statuses: Vec<TaskStatus> = day_tasks.iter().map(|task| task.status).collect();
            DayView {
                date,
                status: derive_day_status(&statuses),
                total_minutes: day_tasks.iter().map(|task| task.duration_minutes).sum(),
                rework_comment: day_tasks
                    .iter()
                    .find_map(|task| task.rework_comment.clone()),
                tasks: day_tasks,
            }
        })
        .collect()
}

/// A week may auto-promote to Submitted once every populated day derives
/// Submitted or Approved. Days with no tasks are ignored; a week with no
/// tasks at all never promotes.
pub fn week_ready_for_promotion(days: &[DayView]) -> bool {
    let populated: Vec<&DayView> = days.iter().filter(|day| !day.tasks.is_empty()).collect();
    !populated.is_empty()
        && populated
            .iter()
            .all(|day| matches!(day.status, DayStatus::Submitted | DayStatus::Approved))
}

#[cfg(test)]
mod tests {
    use super::{
        build_day_views, derive_day_status, ensure_monday, monday_of, week_dates, week_end,
        week_ready_for_promotion,
    };
    use crate::models::{AssignedBy, DayStatus, TaskRecord, TaskStatus};
    use chrono::{NaiveDate, Utc};

    fn task(date: NaiveDate, status: TaskStatus, minutes: i64) -> TaskRecord {
        TaskRecord {
            id: uuid::Uuid::new_v4().to_string(),
            week_id: "week-1".to_string(),
            employee_id: "emp-1".to_string(),
            work_date: date,
            title: "task".to_string(),
            category: "development".to_string(),
            duration_minutes: minutes,
            assigned_by: AssignedBy::SelfAssigned,
            assigned_by_id: None,
            description: None,
            status,
            rework_comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).expect("date")
    }

    #[test]
    fn empty_day_has_no_entry() {
        assert_eq!(derive_day_status(&[]), DayStatus::NoEntry);
    }

    #[test]
    fn rework_beats_everything() {
        use TaskStatus::*;
        assert_eq!(derive_day_status(&[Approved, Rework]), DayStatus::Rework);
        assert_eq!(derive_day_status(&[Submitted, Rework]), DayStatus::Rework);
        assert_eq!(derive_day_status(&[Draft, Rework]), DayStatus::Rework);
        assert_eq!(
            derive_day_status(&[Approved, Submitted, Draft, Rework]),
            DayStatus::Rework
        );
    }

    #[test]
    fn uniform_days_take_their_status() {
        use TaskStatus::*;
        assert_eq!(derive_day_status(&[Approved, Approved]), DayStatus::Approved);
        assert_eq!(derive_day_status(&[Submitted, Submitted]), DayStatus::Submitted);
        assert_eq!(derive_day_status(&[Draft, Draft]), DayStatus::Draft);
    }

    #[test]
    fn mixtures_without_rework_fall_back_to_draft() {
        use TaskStatus::*;
        assert_eq!(derive_day_status(&[Approved, Submitted]), DayStatus::Draft);
        assert_eq!(derive_day_status(&[Approved, Draft]), DayStatus::Draft);
        assert_eq!(derive_day_status(&[Submitted, Draft]), DayStatus::Draft);
    }

    #[test]
    fn week_spans_monday_to_friday() {
        let dates = week_dates(monday());
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], monday());
        assert_eq!(dates[4], week_end(monday()));
        assert_eq!(week_end(monday()), NaiveDate::from_ymd_opt(2025, 6, 6).expect("date"));
    }

    #[test]
    fn monday_validation() {
        assert!(ensure_monday(monday()).is_ok());
        assert!(ensure_monday(monday().succ_opt().expect("tuesday")).is_err());
    }

    #[test]
    fn monday_of_maps_any_weekday_back() {
        let wednesday = NaiveDate::from_ymd_opt(2025, 6, 4).expect("date");
        assert_eq!(monday_of(wednesday), monday());
        assert_eq!(monday_of(monday()), monday());
    }

    #[test]
    fn day_views_group_and_sum() {
        let tuesday = monday().succ_opt().expect("tuesday");
        let tasks = vec![
            task(monday(), TaskStatus::Draft, 60),
            task(monday(), TaskStatus::Draft, 30),
            task(tuesday, TaskStatus::Submitted, 45),
        ];
        let days = build_day_views(monday(), &tasks);
        assert_eq!(days.len(), 5);
        assert_eq!(days[0].total_minutes, 90);
        assert_eq!(days[0].status, DayStatus::Draft);
        assert_eq!(days[1].total_minutes, 45);
        assert_eq!(days[1].status, DayStatus::Submitted);
        assert_eq!(days[2].status, DayStatus::NoEntry);
    }

    #[test]
    fn first_rework_comment_is_surfaced() {
        let mut first = task(monday(), TaskStatus::Rework, 60);
        first.rework_comment = Some("needs detail".to_string());
        let mut second = task(monday(), TaskStatus::Rework, 30);
        second.rework_comment = Some("later comment".to_string());
        let days = build_day_views(monday(), &[first, second]);
        assert_eq!(days[0].rework_comment.as_deref(), Some("needs detail"));
    }

    #[test]
    fn promotion_requires_all_populated_days_done() {
        let tuesday = monday().succ_opt().expect("tuesday");
        let days = build_day_views(
            monday(),
            &[
                task(monday(), TaskStatus::Submitted, 60),
                task(tuesday, TaskStatus::Approved, 30),
            ],
        );
        assert!(week_ready_for_promotion(&days));

        let days = build_day_views(
            monday(),
            &[
                task(monday(), TaskStatus::Submitted, 60),
                task(tuesday, TaskStatus::Draft, 30),
            ],
        );
        assert!(!week_ready_for_promotion(&days));
    }

    #[test]
    fn empty_week_never_promotes() {
        let days = build_day_views(monday(), &[]);
        assert!(!week_ready_for_promotion(&days));
    }
}
