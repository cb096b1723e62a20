use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
)]
pub enum Filter {
  #[default]
  All,
  Incomplete,
  Complete
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
)]
pub enum SortKey {
  #[default]
  Priority,
  DueDate
}

impl Filter {
  pub const NAMES: [&'static str; 3] =
    ["all", "incomplete", "complete"];

  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Incomplete => {
        !task.completed
      }
      | Self::Complete => task.completed
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      | Self::All => "all",
      | Self::Incomplete => "incomplete",
      | Self::Complete => "complete"
    }
  }
}

impl SortKey {
  pub const NAMES: [&'static str; 2] =
    ["priority", "due_date"];

  pub fn name(self) -> &'static str {
    match self {
      | Self::Priority => "priority",
      | Self::DueDate => "due_date"
    }
  }

  fn compare(
    self,
    a: &Task,
    b: &Task
  ) -> Ordering {
    match self {
      | Self::Priority => {
        b.priority.cmp(&a.priority)
      }
      | Self::DueDate => {
        cmp_optional(
          a.due_date.as_ref(),
          b.due_date.as_ref()
        )
      }
    }
  }
}

impl FromStr for Filter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(Self::All),
      | "incomplete" | "open"
      | "pending" => {
        Ok(Self::Incomplete)
      }
      | "complete" | "completed"
      | "done" => Ok(Self::Complete),
      | other => {
        Err(anyhow!(
          "unknown filter '{other}'; \
           expected one of: {}",
          Self::NAMES.join(", ")
        ))
      }
    }
  }
}

impl FromStr for SortKey {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "priority" | "pri" => {
        Ok(Self::Priority)
      }
      | "due_date" | "due-date"
      | "due" => Ok(Self::DueDate),
      | other => {
        Err(anyhow!(
          "unknown sort key '{other}'; \
           expected one of: {}",
          Self::NAMES.join(", ")
        ))
      }
    }
  }
}

impl fmt::Display for Filter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl fmt::Display for SortKey {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Ordered subset of `tasks` to display.
/// The sort is stable, so equal keys keep their input order.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn project(
  tasks: &[Task],
  filter: Filter,
  sort_key: SortKey
) -> Vec<Task> {
  let mut out: Vec<Task> = tasks
    .iter()
    .filter(|task| filter.matches(task))
    .cloned()
    .collect();
  out.sort_by(|a, b| {
    sort_key.compare(a, b)
  });
  trace!(kept = out.len(), "projected task view");
  out
}

/// Present values before missing ones.
fn cmp_optional<T: Ord>(
  left: Option<&T>,
  right: Option<&T>
) -> Ordering {
  match (left, right) {
    | (Some(a), Some(b)) => a.cmp(b),
    | (Some(_), None) => Ordering::Less,
    | (None, Some(_)) => {
      Ordering::Greater
    }
    | (None, None) => Ordering::Equal
  }
}

/// Memoizes [`project`] on its last `(tasks, filter, sort_key)` inputs.
#[derive(Debug, Default)]
pub struct TaskView {
  inputs:       Option<(
    Vec<Task>,
    Filter,
    SortKey
  )>,
  output:       Vec<Task>,
  computations: usize
}

impl TaskView {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(
    &mut self,
    tasks: &[Task],
    filter: Filter,
    sort_key: SortKey
  ) -> &[Task] {
    let fresh = matches!(
      &self.inputs,
      Some((prev, f, s))
        if prev.as_slice() == tasks
          && *f == filter
          && *s == sort_key
    );

    if !fresh {
      self.output =
        project(tasks, filter, sort_key);
      self.inputs = Some((
        tasks.to_vec(),
        filter,
        sort_key
      ));
      self.computations += 1;
    }

    &self.output
  }

  pub fn computations(&self) -> usize {
    self.computations
  }
}

/// Completion ratio of a goal's tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalProgress {
  pub completed: usize,
  pub total:     usize
}

impl GoalProgress {
  pub fn of(tasks: &[Task]) -> Self {
    Self {
      completed: tasks
        .iter()
        .filter(|t| t.completed)
        .count(),
      total:     tasks.len()
    }
  }

  pub fn ratio(&self) -> f64 {
    if self.total == 0 {
      0.0
    } else {
      self.completed as f64
        / self.total as f64
    }
  }

  pub fn percent(&self) -> u32 {
    (self.ratio() * 100.0).round()
      as u32
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::task::Priority;

  fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d)
      .expect("valid date")
  }

  fn ids(tasks: &[Task]) -> Vec<u64> {
    tasks.iter().map(|t| t.id).collect()
  }

  fn sample() -> Vec<Task> {
    vec![
      Task::new(1, "a")
        .with_priority(Priority::Low)
        .with_due(date(20)),
      Task::new(2, "b")
        .with_priority(Priority::High)
        .with_completed(true),
      Task::new(3, "c")
        .with_priority(Priority::Medium)
        .with_due(date(12)),
      Task::new(4, "d")
        .with_priority(Priority::High),
      Task::new(5, "e")
        .with_priority(Priority::Low)
        .with_due(date(12))
        .with_completed(true),
      Task::new(6, "f")
        .with_priority(Priority::Medium),
    ]
  }

  #[test]
  fn incomplete_by_priority_scenario() {
    let tasks = vec![
      Task::new(1, "one")
        .with_priority(Priority::Low),
      Task::new(2, "two")
        .with_priority(Priority::High)
        .with_completed(true),
      Task::new(3, "three")
        .with_priority(Priority::Medium),
    ];
    let out = project(
      &tasks,
      Filter::Incomplete,
      SortKey::Priority
    );
    assert_eq!(ids(&out), vec![3, 1]);
  }

  #[test]
  fn empty_input_yields_empty_output() {
    for filter in [
      Filter::All,
      Filter::Incomplete,
      Filter::Complete
    ] {
      for key in
        [SortKey::Priority, SortKey::DueDate]
      {
        assert!(
          project(&[], filter, key)
            .is_empty()
        );
      }
    }
  }

  #[test]
  fn incomplete_and_complete_partition_input() {
    let tasks = sample();
    let mut joined = project(
      &tasks,
      Filter::Incomplete,
      SortKey::DueDate
    );
    joined.extend(project(
      &tasks,
      Filter::Complete,
      SortKey::DueDate
    ));
    let mut got = ids(&joined);
    got.sort_unstable();
    assert_eq!(got, ids(&tasks));
  }

  #[test]
  fn priority_sort_is_non_increasing_and_stable()
  {
    let out = project(
      &sample(),
      Filter::All,
      SortKey::Priority
    );
    assert_eq!(
      ids(&out),
      vec![2, 4, 3, 6, 1, 5]
    );
    assert!(out.windows(2).all(|w| {
      w[0].priority >= w[1].priority
    }));
  }

  #[test]
  fn due_date_sort_puts_undated_last() {
    let out = project(
      &sample(),
      Filter::All,
      SortKey::DueDate
    );
    assert_eq!(
      ids(&out),
      vec![3, 5, 1, 2, 4, 6]
    );

    let first_undated = out
      .iter()
      .position(|t| t.due_date.is_none())
      .expect("has undated tasks");
    assert!(
      out[first_undated..]
        .iter()
        .all(|t| t.due_date.is_none())
    );
    assert!(
      out[..first_undated]
        .windows(2)
        .all(|w| w[0].due_date <= w[1].due_date)
    );
  }

  #[test]
  fn projection_is_deterministic() {
    let tasks = sample();
    let first = project(
      &tasks,
      Filter::Incomplete,
      SortKey::DueDate
    );
    let second = project(
      &tasks,
      Filter::Incomplete,
      SortKey::DueDate
    );
    assert_eq!(first, second);
  }

  #[test]
  fn view_recomputes_only_on_changed_inputs() {
    let mut tasks = sample();
    let mut view = TaskView::new();

    view.get(
      &tasks,
      Filter::All,
      SortKey::Priority
    );
    view.get(
      &tasks,
      Filter::All,
      SortKey::Priority
    );
    assert_eq!(view.computations(), 1);

    view.get(
      &tasks,
      Filter::Complete,
      SortKey::Priority
    );
    assert_eq!(view.computations(), 2);

    tasks[0].completed = true;
    let out = view.get(
      &tasks,
      Filter::Complete,
      SortKey::Priority
    );
    assert_eq!(ids(out), vec![2, 1, 5]);
    assert_eq!(view.computations(), 3);
  }

  #[test]
  fn parses_view_names() {
    assert_eq!(
      "incomplete"
        .parse::<Filter>()
        .expect("filter"),
      Filter::Incomplete
    );
    assert_eq!(
      "due_date"
        .parse::<SortKey>()
        .expect("sort"),
      SortKey::DueDate
    );
    let err = "urgent"
      .parse::<SortKey>()
      .expect_err("unknown key");
    assert!(
      err.to_string().contains("priority")
    );
  }

  #[test]
  fn goal_progress_handles_empty_goal() {
    let empty = GoalProgress::of(&[]);
    assert_eq!(empty.ratio(), 0.0);

    let progress = GoalProgress::of(&sample());
    assert_eq!(progress.completed, 2);
    assert_eq!(progress.total, 6);
    assert_eq!(progress.percent(), 33);
  }
}
