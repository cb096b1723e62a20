mod goal_ops;
mod io_and_views;
mod task_ops;

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Password};
use tracing::{debug, instrument};

use crate::api::ApiClient;
use crate::cli::{CategoryCommand, Command, GoalCommand, SettingsCommand, TaskCommand};
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{Zone, parse_date_expr};
use crate::error::ApiError;
use crate::render::Renderer;

/// Everything a command needs, built once per invocation.
pub struct App {
    pub api: ApiClient,
    pub store: DataStore,
    pub cfg: Config,
    pub renderer: Renderer,
    pub zone: Zone,
}

impl App {
    pub fn today(&self) -> NaiveDate {
        self.zone.today(Utc::now())
    }
}

#[instrument(skip(app, command))]
pub async fn dispatch(app: &App, command: Command) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Login { username, password } => {
            io_and_views::cmd_login(app, &username, password).await
        }
        Command::Logout => io_and_views::cmd_logout(app),
        Command::Status => io_and_views::cmd_status(app),
        Command::Tasks(args) => match args.command {
            None => task_ops::cmd_list(app, &args.list).await,
            Some(TaskCommand::List(list)) => task_ops::cmd_list(app, &list).await,
            Some(TaskCommand::Show { id }) => task_ops::cmd_show(app, id).await,
            Some(TaskCommand::Add(add)) => task_ops::cmd_add(app, add).await,
            Some(TaskCommand::Edit { id, fields }) => task_ops::cmd_edit(app, id, fields).await,
            Some(TaskCommand::Done { id }) => task_ops::cmd_set_done(app, id, true).await,
            Some(TaskCommand::Undo { id }) => task_ops::cmd_set_done(app, id, false).await,
            Some(TaskCommand::Delete { id, yes }) => task_ops::cmd_delete(app, id, yes).await,
        },
        Command::Goals { command } => match command.unwrap_or(GoalCommand::List) {
            GoalCommand::List => goal_ops::cmd_goal_list(app).await,
            GoalCommand::Show { id } => goal_ops::cmd_goal_show(app, id).await,
            GoalCommand::Add {
                name,
                description,
                start,
                end,
            } => goal_ops::cmd_goal_add(app, &name.join(" "), description, start, end).await,
            GoalCommand::Edit {
                id,
                name,
                description,
                start,
                end,
            } => goal_ops::cmd_goal_edit(app, id, name, description, start, end).await,
            GoalCommand::Delete { id, yes } => goal_ops::cmd_goal_delete(app, id, yes).await,
        },
        Command::Categories { command } => match command.unwrap_or(CategoryCommand::List) {
            CategoryCommand::List => goal_ops::cmd_category_list(app).await,
            CategoryCommand::Add { name } => {
                goal_ops::cmd_category_add(app, &name.join(" ")).await
            }
            CategoryCommand::Delete { id, yes } => {
                goal_ops::cmd_category_delete(app, id, yes).await
            }
        },
        Command::Calendar { month, day } => {
            io_and_views::cmd_calendar(app, month.as_deref(), day.as_deref()).await
        }
        Command::Reminders => io_and_views::cmd_reminders(app).await,
        Command::Settings {
            command: SettingsCommand::Notifications { state },
        } => io_and_views::cmd_notifications(app, state),
        Command::Config => io_and_views::cmd_config(app),
    }
}

/// Adds a next step to errors the user can act on.
fn explain(err: ApiError) -> anyhow::Error {
    match err {
        ApiError::Unauthenticated => anyhow!("not logged in; run `tasklane login <username>` first"),
        ApiError::Status { status, body } if status == reqwest::StatusCode::UNAUTHORIZED => {
            anyhow!(
                "backend rejected the stored session ({status}): {body}; \
                 run `tasklane login <username>` again"
            )
        }
        other => anyhow::Error::new(other),
    }
}

fn is_not_found(err: &ApiError) -> bool {
    matches!(err, ApiError::Status { status, .. } if *status == reqwest::StatusCode::NOT_FOUND)
}

/// Parses a date flag, where "none" means "clear the date".
fn parse_optional_date(raw: &str, today: NaiveDate) -> anyhow::Result<Option<NaiveDate>> {
    if raw.trim().eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    parse_date_expr(raw, today).map(Some)
}

fn parse_optional_id(raw: &str, what: &str) -> anyhow::Result<Option<u64>> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| anyhow!("invalid {what} id '{trimmed}'; expected a number or 'none'"))
}

/// y/N question on the terminal; anything but an explicit yes keeps the data.
fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(answer)
}

/// The password given on the command line or environment, else a masked
/// terminal prompt.
fn password_for(username: &str, given: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Password for {username}"))
        .allow_empty_password(true)
        .interact()?;
    Ok(password)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::tempdir;
    use url::Url;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::cli::TaskEditArgs;
    use crate::datastore::Settings;
    use crate::session::{MemoryTokenStore, SessionGate};

    fn app_for(server: &MockServer, data_dir: &Path) -> App {
        let base = Url::parse(&format!("{}/api/", server.uri())).expect("mock url");
        let session = SessionGate::new(Arc::new(MemoryTokenStore::with_token("abc123")));
        App {
            api: ApiClient::new(base, session).expect("client"),
            store: DataStore::open(data_dir).expect("open datastore"),
            cfg: Config::default(),
            renderer: Renderer::plain(),
            zone: Zone::Local,
        }
    }

    async fn mount_name_lists(server: &MockServer) {
        for route in ["/api/categories/", "/api/goals/"] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
                .mount(server)
                .await;
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    #[test]
    fn none_clears_optional_fields() {
        assert_eq!(parse_optional_date("none", today()).expect("none"), None);
        assert_eq!(
            parse_optional_date("+1d", today()).expect("+1d"),
            NaiveDate::from_ymd_opt(2026, 10, 17)
        );
        assert_eq!(parse_optional_id("None", "goal").expect("none"), None);
        assert_eq!(parse_optional_id("12", "goal").expect("id"), Some(12));
        assert!(parse_optional_id("twelve", "goal").is_err());
    }

    #[test]
    fn explains_missing_session() {
        let msg = explain(ApiError::Unauthenticated).to_string();
        assert!(msg.contains("tasklane login"));
    }

    #[test]
    fn password_flag_skips_the_prompt() {
        assert_eq!(
            password_for("ada", Some("secret".to_string())).expect("given"),
            "secret"
        );
    }

    #[tokio::test]
    async fn confirmed_delete_of_missing_task_is_already_gone() {
        let server = MockServer::start().await;
        let dir = tempdir().expect("tempdir");
        Mock::given(method("GET"))
            .and(path("/api/tasks/7/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/tasks/7/"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let app = app_for(&server, dir.path());
        task_ops::cmd_delete(&app, 7, true)
            .await
            .expect("missing task counts as deleted");
    }

    #[tokio::test]
    async fn confirmed_delete_sends_only_the_delete() {
        let server = MockServer::start().await;
        let dir = tempdir().expect("tempdir");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/tasks/8/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let app = app_for(&server, dir.path());
        task_ops::cmd_delete(&app, 8, true).await.expect("delete");
    }

    #[tokio::test]
    async fn goal_edit_merges_changes_into_a_put() {
        let server = MockServer::start().await;
        let dir = tempdir().expect("tempdir");
        Mock::given(method("GET"))
            .and(path("/api/goals/3/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 3,
                "name": "Marathon",
                "description": "spring race",
                "start_date": "2026-03-01",
                "end_date": "2026-04-30"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/goals/3/"))
            .and(body_json(json!({
                "name": "Half marathon",
                "description": "spring race",
                "start_date": "2026-03-01",
                "end_date": null
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 3,
                "name": "Half marathon",
                "description": "spring race",
                "start_date": "2026-03-01",
                "end_date": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = app_for(&server, dir.path());
        goal_ops::cmd_goal_edit(
            &app,
            3,
            Some("Half marathon".to_string()),
            None,
            None,
            Some("none".to_string()),
        )
        .await
        .expect("edit goal");
    }

    #[tokio::test]
    async fn edits_without_fields_send_nothing() {
        let server = MockServer::start().await;
        let dir = tempdir().expect("tempdir");
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let app = app_for(&server, dir.path());
        let err = task_ops::cmd_edit(&app, 5, TaskEditArgs::default())
            .await
            .expect_err("empty task edit");
        assert!(err.to_string().contains("nothing to change"));

        let err = goal_ops::cmd_goal_edit(&app, 3, None, None, None, None)
            .await
            .expect_err("empty goal edit");
        assert!(err.to_string().contains("nothing to change"));
    }

    #[tokio::test]
    async fn reminders_stay_quiet_when_notifications_are_off() {
        let server = MockServer::start().await;
        let dir = tempdir().expect("tempdir");
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let app = app_for(&server, dir.path());
        app.store
            .save_settings(&Settings {
                notifications_enabled: false,
            })
            .expect("save settings");
        io_and_views::cmd_reminders(&app).await.expect("reminders");
    }

    #[tokio::test]
    async fn reminders_fetch_tasks_when_notifications_are_on() {
        let server = MockServer::start().await;
        let dir = tempdir().expect("tempdir");
        Mock::given(method("GET"))
            .and(path("/api/tasks/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 1,
                "title": "pay rent",
                "completed": false,
                "priority": 3,
                "due_date": "2026-10-01"
            }])))
            .expect(1)
            .mount(&server)
            .await;
        mount_name_lists(&server).await;

        let app = app_for(&server, dir.path());
        io_and_views::cmd_reminders(&app).await.expect("reminders");
    }

    #[test]
    fn calendar_focuses_today_only_in_the_current_month() {
        let anchor = NaiveDate::from_ymd_opt(2026, 11, 1).expect("valid date");
        let picked = NaiveDate::from_ymd_opt(2026, 11, 20).expect("valid date");

        assert_eq!(io_and_views::focus_day(None, today(), today()), Some(today()));
        assert_eq!(io_and_views::focus_day(None, anchor, today()), None);
        assert_eq!(
            io_and_views::focus_day(Some(picked), anchor, today()),
            Some(picked)
        );
    }
}
