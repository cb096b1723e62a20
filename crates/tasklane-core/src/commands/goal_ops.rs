use anyhow::{Context, anyhow};
use tracing::{info, instrument};

use super::{App, confirm, explain, parse_optional_date};
use crate::datetime::parse_date_expr;
use crate::render::Names;
use crate::resource::{CategoryDraft, GoalDraft};

#[instrument(skip(app))]
pub(super) async fn cmd_goal_list(app: &App) -> anyhow::Result<()> {
    let goals = app.api.list_goals().await.map_err(explain)?;
    app.renderer.print_goals(&goals)
}

/// Goal details and its tasks are fetched together; either failing fails
/// the whole dashboard.
#[instrument(skip(app))]
pub(super) async fn cmd_goal_show(app: &App, id: u64) -> anyhow::Result<()> {
    let (goal, tasks, categories) = tokio::try_join!(
        app.api.get_goal(id),
        app.api.list_tasks_for_goal(id),
        app.api.list_categories()
    )
    .map_err(explain)
    .with_context(|| format!("loading goal {id}"))?;

    let names = Names::new(&categories, std::slice::from_ref(&goal));
    app.renderer
        .print_goal_dashboard(&goal, &tasks, &names, app.today())
}

#[instrument(skip(app, description))]
pub(super) async fn cmd_goal_add(
    app: &App,
    name: &str,
    description: Option<String>,
    start: Option<String>,
    end: Option<String>,
) -> anyhow::Result<()> {
    let today = app.today();
    let mut draft = GoalDraft::new(name);
    draft.description = description.filter(|d| !d.trim().is_empty());
    draft.start_date = start
        .as_deref()
        .map(|raw| parse_date_expr(raw, today))
        .transpose()?;
    draft.end_date = end
        .as_deref()
        .map(|raw| parse_date_expr(raw, today))
        .transpose()?;

    let goal = app.api.create_goal(&draft).await.map_err(explain)?;
    info!(id = goal.id, "created goal");
    println!("Created goal {}: {}", goal.id, goal.name);
    Ok(())
}

/// Goals have no PATCH route; edits are merged into the current goal and
/// sent back whole.
#[instrument(skip(app, description))]
pub(super) async fn cmd_goal_edit(
    app: &App,
    id: u64,
    name: Option<String>,
    description: Option<String>,
    start: Option<String>,
    end: Option<String>,
) -> anyhow::Result<()> {
    if name.is_none() && description.is_none() && start.is_none() && end.is_none() {
        return Err(anyhow!(
            "nothing to change; pass at least one of --name, --description, --start, --end"
        ));
    }

    let today = app.today();
    let current = app.api.get_goal(id).await.map_err(explain)?;
    let mut draft = GoalDraft::from(&current);
    if let Some(name) = name {
        draft.name = name;
    }
    if let Some(description) = description {
        draft.description = Some(description).filter(|d| !d.trim().is_empty());
    }
    if let Some(raw) = start.as_deref() {
        draft.start_date = parse_optional_date(raw, today)?;
    }
    if let Some(raw) = end.as_deref() {
        draft.end_date = parse_optional_date(raw, today)?;
    }

    let goal = app.api.update_goal(id, &draft).await.map_err(explain)?;
    info!(id = goal.id, "updated goal");
    println!("Updated goal {}: {}", goal.id, goal.name);
    Ok(())
}

#[instrument(skip(app))]
pub(super) async fn cmd_goal_delete(app: &App, id: u64, yes: bool) -> anyhow::Result<()> {
    if !yes {
        let goal = app.api.get_goal(id).await.map_err(explain)?;
        let prompt = format!(
            "Delete goal {id} \"{}\" and every task assigned to it?",
            goal.name
        );
        if !confirm(&prompt)? {
            println!("Kept goal {id}.");
            return Ok(());
        }
    }

    app.api
        .delete_goal(id)
        .await
        .map_err(explain)
        .with_context(|| format!("deleting goal {id}"))?;
    info!(id, "deleted goal");
    println!("Deleted goal {id}.");
    Ok(())
}

#[instrument(skip(app))]
pub(super) async fn cmd_category_list(app: &App) -> anyhow::Result<()> {
    let categories = app.api.list_categories().await.map_err(explain)?;
    app.renderer.print_categories(&categories)
}

#[instrument(skip(app))]
pub(super) async fn cmd_category_add(app: &App, name: &str) -> anyhow::Result<()> {
    let category = app
        .api
        .create_category(&CategoryDraft::new(name))
        .await
        .map_err(explain)?;
    info!(id = category.id, "created category");
    println!("Created category {}: {}", category.id, category.name);
    Ok(())
}

#[instrument(skip(app))]
pub(super) async fn cmd_category_delete(app: &App, id: u64, yes: bool) -> anyhow::Result<()> {
    let prompt = format!("Delete category {id}? Its tasks stay but lose the category.");
    if !yes && !confirm(&prompt)? {
        println!("Kept category {id}.");
        return Ok(());
    }

    app.api
        .delete_category(id)
        .await
        .map_err(explain)
        .with_context(|| format!("deleting category {id}"))?;
    info!(id, "deleted category");
    println!("Deleted category {id}.");
    Ok(())
}
