use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::calendar::MonthGrid;
use crate::config::Config;
use crate::datetime::format_date;
use crate::resource::{Category, Goal};
use crate::task::{Priority, Task};
use crate::view::GoalProgress;

/// Id → display name lookups for the foreign keys a task carries.
#[derive(Debug, Clone, Default)]
pub struct Names {
    pub categories: HashMap<u64, String>,
    pub goals: HashMap<u64, String>,
}

impl Names {
    pub fn new(categories: &[Category], goals: &[Goal]) -> Self {
        Self {
            categories: categories.iter().map(|c| (c.id, c.name.clone())).collect(),
            goals: goals.iter().map(|g| (g.id, g.name.clone())).collect(),
        }
    }

    fn category(&self, id: Option<u64>) -> String {
        lookup(&self.categories, id)
    }

    fn goal(&self, id: Option<u64>) -> String {
        lookup(&self.goals, id)
    }
}

fn lookup(map: &HashMap<u64, String>, id: Option<u64>) -> String {
    match id {
        Some(id) => map.get(&id).cloned().unwrap_or_else(|| format!("#{id}")),
        None => String::new(),
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, tasks, names))]
    pub fn print_task_table(
        &self,
        tasks: &[Task],
        names: &Names,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        self.write_task_table(io::stdout().lock(), tasks, names, today)
    }

    pub fn write_task_table<W: Write>(
        &self,
        mut out: W,
        tasks: &[Task],
        names: &Names,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["ID", "Done", "Pri", "Due", "Category", "Goal", "Title"]
            .map(str::to_string)
            .to_vec();

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&task.id.to_string(), "33");
            let done = if task.completed { "x" } else { "" }.to_string();
            let priority = match task.priority {
                Priority::High => self.paint(task.priority.label(), "1"),
                _ => task.priority.label().to_string(),
            };
            let due = task.due_date.map(format_date).unwrap_or_default();
            let due = if task.is_overdue(today) {
                self.paint(&due, "31")
            } else {
                due
            };

            rows.push(vec![
                id,
                done,
                priority,
                due,
                names.category(task.category),
                names.goal(task.goal),
                task.title.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        writeln!(out)?;
        writeln!(out, "{} task{}", tasks.len(), if tasks.len() == 1 { "" } else { "s" })?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, names))]
    pub fn print_task_info(&self, task: &Task, names: &Names) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(
            out,
            "status      {}",
            if task.completed { "completed" } else { "open" }
        )?;
        writeln!(
            out,
            "priority    {} ({})",
            task.priority.label(),
            task.priority.value()
        )?;
        writeln!(out, "goal type   {:?}", task.goal_type)?;
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", format_date(due))?;
        }
        if task.category.is_some() {
            writeln!(out, "category    {}", names.category(task.category))?;
        }
        if task.goal.is_some() {
            writeln!(out, "goal        {}", names.goal(task.goal))?;
        }
        if let Some(created) = task.created_at {
            writeln!(out, "created     {}", created.format("%Y-%m-%d %H:%M UTC"))?;
        }
        if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(out)?;
            writeln!(out, "{desc}")?;
        }

        Ok(())
    }

    pub fn print_goals(&self, goals: &[Goal]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if goals.is_empty() {
            writeln!(out, "No goals yet.")?;
            return Ok(());
        }

        let headers = ["ID", "Name", "Start", "End", "Description"]
            .map(str::to_string)
            .to_vec();
        let rows = goals
            .iter()
            .map(|g| {
                vec![
                    self.paint(&g.id.to_string(), "33"),
                    g.name.clone(),
                    g.start_date.map(format_date).unwrap_or_default(),
                    g.end_date.map(format_date).unwrap_or_default(),
                    g.description.clone().unwrap_or_default(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    #[tracing::instrument(skip_all, fields(goal = goal.id))]
    pub fn print_goal_dashboard(
        &self,
        goal: &Goal,
        tasks: &[Task],
        names: &Names,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let progress = GoalProgress::of(tasks);
        {
            let mut out = io::stdout().lock();
            writeln!(out, "{}", self.paint(&goal.name, "1"))?;
            if let Some(desc) = goal.description.as_deref().filter(|d| !d.is_empty()) {
                writeln!(out, "{desc}")?;
            }
            match (goal.start_date, goal.end_date) {
                (None, None) => {}
                (start, end) => writeln!(
                    out,
                    "{} → {}",
                    start.map(format_date).unwrap_or_else(|| "…".to_string()),
                    end.map(format_date).unwrap_or_else(|| "…".to_string())
                )?,
            }
            writeln!(
                out,
                "{} {}% ({}/{})",
                progress_bar(&progress, 20),
                progress.percent(),
                progress.completed,
                progress.total
            )?;
            writeln!(out)?;
        }
        self.print_task_table(tasks, names, today)
    }

    pub fn print_categories(&self, categories: &[Category]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if categories.is_empty() {
            writeln!(out, "No categories yet.")?;
            return Ok(());
        }
        let headers = vec!["ID".to_string(), "Name".to_string()];
        let rows = categories
            .iter()
            .map(|c| vec![self.paint(&c.id.to_string(), "33"), c.name.clone()])
            .collect();
        write_table(&mut out, headers, rows)
    }

    pub fn print_calendar(&self, grid: &MonthGrid, today: NaiveDate) -> anyhow::Result<()> {
        self.write_calendar(io::stdout().lock(), grid, today)
    }

    /// Marked days get a trailing `*`; today is shown in reverse video.
    pub fn write_calendar<W: Write>(
        &self,
        mut out: W,
        grid: &MonthGrid,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{:^28}", grid.title())?;
        writeln!(out, " Su  Mo  Tu  We  Th  Fr  Sa")?;
        for week in &grid.weeks {
            for cell in week {
                if !cell.in_month {
                    write!(out, "    ")?;
                    continue;
                }
                let mark = if cell.marked { "*" } else { " " };
                let day = format!("{:>3}", cell.date.day());
                let day = if cell.date == today {
                    self.paint(&day, "7")
                } else {
                    day
                };
                write!(out, "{day}{mark}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn progress_bar(progress: &GoalProgress, width: usize) -> String {
    let filled = ((progress.ratio() * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date")
    }

    #[test]
    fn table_aligns_wide_characters() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Title".to_string()],
            vec![
                vec!["1".to_string(), "買い物".to_string()],
                vec!["22".to_string(), "x".to_string()],
            ],
        )
        .expect("write table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID Title  ");
        assert_eq!(lines[2], "1  買い物 ");
    }

    #[test]
    fn task_table_shows_names_and_count() {
        let categories = vec![Category {
            id: 4,
            name: "Home".to_string(),
        }];
        let names = Names::new(&categories, &[]);
        let mut task = Task::new(9, "Fix sink").with_due(date(1));
        task.category = Some(4);
        task.goal = Some(12);

        let mut buf = Vec::new();
        Renderer::plain()
            .write_task_table(&mut buf, &[task], &names, date(16))
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Home"));
        assert!(text.contains("#12"));
        assert!(text.contains("2026-10-01"));
        assert!(text.trim_end().ends_with("1 task"));
    }

    #[test]
    fn empty_task_table_says_so() {
        let mut buf = Vec::new();
        Renderer::plain()
            .write_task_table(&mut buf, &[], &Names::default(), date(16))
            .expect("render");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "No tasks.\n");
    }

    #[test]
    fn calendar_marks_days_with_tasks() {
        let marks: BTreeSet<NaiveDate> = [date(16)].into_iter().collect();
        let grid = MonthGrid::new(date(1), &marks);
        let mut buf = Vec::new();
        Renderer::plain()
            .write_calendar(&mut buf, &grid, date(2))
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains(" 16*"));
        assert!(text.contains(" 15 "));
        assert_eq!(text.lines().count(), 2 + grid.weeks.len());
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        let half = GoalProgress {
            completed: 1,
            total: 2,
        };
        assert_eq!(progress_bar(&half, 4), "[##--]");
        let none = GoalProgress {
            completed: 0,
            total: 0,
        };
        assert_eq!(progress_bar(&none, 4), "[----]");
    }
}
