use crate::models::{CategoryTotal, TaskRecord, TrackerSettings, WeekSummary};
use std::collections::{BTreeMap, BTreeSet};

/// Pure read-side aggregation over a week's task set. Always returns a value;
/// an empty task set yields zero totals and no categories.
pub fn summarize(tasks: &[TaskRecord], settings: &TrackerSettings) -> WeekSummary {
    let total_minutes: i64 = tasks.iter().map(|task| task.duration_minutes).sum();
    let days_with_entries = tasks
        .iter()
        .map(|task| task.work_date)
        .collect::<BTreeSet<_>>()
        .len();

    WeekSummary {
        total_minutes,
        target_minutes: settings.weekly_target_minutes,
        days_with_entries,
        categories: category_breakdown(tasks),
    }
}

/// Per-category minute totals, sorted descending, zero-minute categories
/// dropped. Percentages are computed against the sum of the displayed
/// entries so the shown breakdown always totals 100.
pub fn category_breakdown(tasks: &[TaskRecord]) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for task in tasks {
        *totals.entry(task.category.as_str()).or_insert(0) += task.duration_minutes;
    }

    let mut entries: Vec<(&str, i64)> = totals
        .into_iter()
        .filter(|(_, minutes)| *minutes > 0)
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let displayed_sum: i64 = entries.iter().map(|(_, minutes)| minutes).sum();
    entries
        .into_iter()
        .map(|(category, minutes)| CategoryTotal {
            category: category.to_string(),
            minutes,
            percent: if displayed_sum > 0 {
                minutes as f64 * 100.0 / displayed_sum as f64
            } else {
                0.0
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{category_breakdown, summarize};
    use crate::models::{AssignedBy, TaskRecord, TaskStatus, TrackerSettings};
    use chrono::{NaiveDate, Utc};

    fn task(date: NaiveDate, category: &str, minutes: i64) -> TaskRecord {
        TaskRecord {
            id: uuid::Uuid::new_v4().to_string(),
            week_id: "week-1".to_string(),
            employee_id: "emp-1".to_string(),
            work_date: date,
            title: "task".to_string(),
            category: category.to_string(),
            duration_minutes: minutes,
            assigned_by: AssignedBy::SelfAssigned,
            assigned_by_id: None,
            description: None,
            status: TaskStatus::Draft,
            rework_comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).expect("date")
    }

    #[test]
    fn empty_week_summarizes_to_zero() {
        let settings = TrackerSettings::default();
        let summary = summarize(&[], &settings);
        assert_eq!(summary.total_minutes, 0);
        assert_eq!(summary.target_minutes, 2400);
        assert_eq!(summary.days_with_entries, 0);
        assert!(summary.categories.is_empty());
    }

    #[test]
    fn breakdown_sum_matches_task_sum() {
        let tuesday = monday().succ_opt().expect("tuesday");
        let tasks = vec![
            task(monday(), "development", 120),
            task(monday(), "meeting", 60),
            task(tuesday, "development", 90),
        ];
        let summary = summarize(&tasks, &TrackerSettings::default());
        assert_eq!(summary.total_minutes, 270);
        assert_eq!(summary.days_with_entries, 2);
        let breakdown_sum: i64 = summary.categories.iter().map(|c| c.minutes).sum();
        assert_eq!(breakdown_sum, summary.total_minutes);
    }

    #[test]
    fn breakdown_is_sorted_descending() {
        let tasks = vec![
            task(monday(), "meeting", 30),
            task(monday(), "development", 240),
            task(monday(), "testing", 60),
        ];
        let breakdown = category_breakdown(&tasks);
        assert_eq!(breakdown[0].category, "development");
        assert_eq!(breakdown[1].category, "testing");
        assert_eq!(breakdown[2].category, "meeting");
    }

    #[test]
    fn displayed_percentages_total_one_hundred() {
        let tasks = vec![
            task(monday(), "development", 100),
            task(monday(), "testing", 50),
            task(monday(), "meeting", 25),
        ];
        let breakdown = category_breakdown(&tasks);
        let percent_sum: f64 = breakdown.iter().map(|c| c.percent).sum();
        assert!((percent_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn target_comes_from_settings() {
        let settings = TrackerSettings {
            weekly_target_minutes: 1800,
            ..TrackerSettings::default()
        };
        let summary = summarize(&[task(monday(), "development", 60)], &settings);
        assert_eq!(summary.target_minutes, 1800);
    }
}
