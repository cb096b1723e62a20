//! Date-keyed views over a fetched task list.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, Months, NaiveDate};

use crate::task::Task;

/// Dates that carry at least one task.
pub fn marked_dates(tasks: &[Task]) -> BTreeSet<NaiveDate> {
    tasks.iter().filter_map(|t| t.due_date).collect()
}

/// Tasks due on `date`, in input order.
pub fn tasks_on(tasks: &[Task], date: NaiveDate) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.due_date == Some(date))
        .cloned()
        .collect()
}

/// Incomplete tasks due on or before `today`, earliest first.
pub fn due_reminders(tasks: &[Task], today: NaiveDate) -> Vec<Task> {
    let mut due: Vec<Task> = tasks
        .iter()
        .filter(|t| !t.completed && t.due_date.is_some_and(|d| d <= today))
        .cloned()
        .collect();
    due.sort_by_key(|t| t.due_date);
    due
}

/// One cell of a [`MonthGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_month: bool,
    pub marked: bool,
}

/// Sunday-first weeks covering a whole month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub first: NaiveDate,
    pub weeks: Vec<[DayCell; 7]>,
}

impl MonthGrid {
    pub fn new(any_day: NaiveDate, marks: &BTreeSet<NaiveDate>) -> Self {
        let first = any_day.with_day(1).unwrap_or(any_day);
        let next_month = first
            .checked_add_months(Months::new(1))
            .unwrap_or(first + Duration::days(31));

        let lead = i64::from(first.weekday().num_days_from_sunday());
        let mut cursor = first - Duration::days(lead);
        let mut weeks = Vec::with_capacity(6);

        while cursor < next_month {
            let week = std::array::from_fn(|offset| {
                let date = cursor + Duration::days(offset as i64);
                DayCell {
                    date,
                    in_month: date.month() == first.month() && date.year() == first.year(),
                    marked: marks.contains(&date),
                }
            });
            weeks.push(week);
            cursor += Duration::days(7);
        }

        Self { first, weeks }
    }

    pub fn title(&self) -> String {
        self.first.format("%B %Y").to_string()
    }
}
