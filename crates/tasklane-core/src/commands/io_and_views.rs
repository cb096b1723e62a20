use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{info, instrument, warn};

use super::task_ops::load_names;
use super::{App, explain, password_for};
use crate::calendar::{self, MonthGrid};
use crate::cli::Toggle;
use crate::datetime::{format_date, parse_date_expr, parse_month};
use crate::error::ApiError;

#[instrument(skip(app, password))]
pub(super) async fn cmd_login(
    app: &App,
    username: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = password_for(username, password)?;

    match app.api.login(username, &password).await {
        Ok(_) => {
            info!(username, "logged in");
            println!("Logged in as {username}.");
            Ok(())
        }
        Err(ApiError::LoginRejected { status }) => {
            Err(anyhow!("login failed ({status}): check username and password"))
        }
        Err(err) => Err(anyhow::Error::new(err).context("login failed")),
    }
}

pub(super) fn cmd_logout(app: &App) -> anyhow::Result<()> {
    app.api.logout().context("clearing stored session")?;
    println!("Logged out.");
    Ok(())
}

pub(super) fn cmd_status(app: &App) -> anyhow::Result<()> {
    let state = if app.api.session().is_authenticated() {
        "logged in"
    } else {
        "not logged in"
    };
    println!("backend     {}", app.api.base_url());
    println!("session     {state}");
    println!("data        {}", app.store.data_dir.display());
    Ok(())
}

/// Without `--day` prints the month grid, then the tasks due on the
/// selected day (today when it falls in the shown month).
#[instrument(skip(app))]
pub(super) async fn cmd_calendar(
    app: &App,
    month: Option<&str>,
    day: Option<&str>,
) -> anyhow::Result<()> {
    let today = app.today();
    let selected = day.map(|raw| parse_date_expr(raw, today)).transpose()?;
    let anchor = match (month, selected) {
        (Some(raw), _) => parse_month(raw)?,
        (None, Some(date)) => date,
        (None, None) => today,
    };

    let (tasks, names) = tokio::try_join!(
        async { app.api.list_tasks().await.map_err(explain) },
        load_names(app)
    )?;

    let grid = MonthGrid::new(anchor, &calendar::marked_dates(&tasks));
    app.renderer.print_calendar(&grid, today)?;

    if let Some(date) = focus_day(selected, anchor, today) {
        println!();
        println!("Due {}", format_date(date));
        let due = calendar::tasks_on(&tasks, date);
        app.renderer.print_task_table(&due, &names, today)?;
    }
    Ok(())
}

/// The day whose tasks are listed under the grid: the one asked for, else
/// today when the grid shows the current month.
pub(super) fn focus_day(
    selected: Option<NaiveDate>,
    anchor: NaiveDate,
    today: NaiveDate,
) -> Option<NaiveDate> {
    selected.or_else(|| {
        (today.year() == anchor.year() && today.month() == anchor.month()).then_some(today)
    })
}

#[instrument(skip(app))]
pub(super) async fn cmd_reminders(app: &App) -> anyhow::Result<()> {
    let settings = app.store.load_settings();
    if !settings.notifications_enabled {
        println!("Reminders are off; enable with `tasklane settings notifications on`.");
        return Ok(());
    }

    let today = app.today();
    let (tasks, names) = tokio::try_join!(
        async { app.api.list_tasks().await.map_err(explain) },
        load_names(app)
    )?;
    let due = calendar::due_reminders(&tasks, today);
    if due.is_empty() {
        println!("Nothing due.");
        return Ok(());
    }
    app.renderer.print_task_table(&due, &names, today)
}

pub(super) fn cmd_notifications(app: &App, state: Option<Toggle>) -> anyhow::Result<()> {
    let mut settings = app.store.load_settings();
    if let Some(state) = state {
        settings.notifications_enabled = state == Toggle::On;
        if let Err(err) = app.store.save_settings(&settings) {
            warn!(error = %err, "could not persist notification setting");
            return Err(anyhow::Error::new(err).context("saving settings"));
        }
    }
    let label = if settings.notifications_enabled { "on" } else { "off" };
    println!("notifications {label}");
    Ok(())
}

pub(super) fn cmd_config(app: &App) -> anyhow::Result<()> {
    let mut entries: Vec<(&String, &String)> = app.cfg.iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{key}={value}");
    }
    for path in &app.cfg.loaded_files {
        println!("# loaded {}", path.display());
    }
    Ok(())
}
