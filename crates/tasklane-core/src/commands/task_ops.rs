use anyhow::{Context, anyhow};
use tracing::{info, instrument};

use super::{App, confirm, explain, is_not_found, parse_optional_date, parse_optional_id};
use crate::cli::{ListArgs, TaskAddArgs, TaskEditArgs};
use crate::datetime::parse_date_expr;
use crate::render::Names;
use crate::task::{TaskDraft, TaskPatch};
use crate::view;

/// Category and goal names for the foreign-key columns.
pub(super) async fn load_names(app: &App) -> anyhow::Result<Names> {
    let (categories, goals) =
        tokio::try_join!(app.api.list_categories(), app.api.list_goals()).map_err(explain)?;
    Ok(Names::new(&categories, &goals))
}

#[instrument(skip(app))]
pub(super) async fn cmd_list(app: &App, args: &ListArgs) -> anyhow::Result<()> {
    let filter = match args.filter {
        Some(f) => f,
        None => app.cfg.view_filter()?,
    };
    let sort = match args.sort {
        Some(s) => s,
        None => app.cfg.view_sort()?,
    };

    let fetch = async {
        match args.goal {
            Some(goal) => app.api.list_tasks_for_goal(goal).await,
            None => app.api.list_tasks().await,
        }
    };
    let (tasks, names) = tokio::try_join!(async { fetch.await.map_err(explain) }, load_names(app))?;

    let shown = view::project(&tasks, filter, sort);
    info!(
        fetched = tasks.len(),
        shown = shown.len(),
        filter = filter.name(),
        sort = sort.name(),
        "listing tasks"
    );
    app.renderer.print_task_table(&shown, &names, app.today())
}

#[instrument(skip(app))]
pub(super) async fn cmd_show(app: &App, id: u64) -> anyhow::Result<()> {
    let (task, names) = tokio::try_join!(
        async { app.api.get_task(id).await.map_err(explain) },
        load_names(app)
    )?;
    app.renderer.print_task_info(&task, &names)
}

#[instrument(skip(app, args))]
pub(super) async fn cmd_add(app: &App, args: TaskAddArgs) -> anyhow::Result<()> {
    let mut draft = TaskDraft::new(args.title.join(" "));
    draft.description = args.description.filter(|d| !d.trim().is_empty());
    if let Some(priority) = args.priority {
        draft.priority = priority;
    }
    if let Some(due) = args.due.as_deref() {
        draft.due_date = Some(parse_date_expr(due, app.today())?);
    }
    draft.category = args.category;
    draft.goal = args.goal;
    if let Some(goal_type) = args.goal_type {
        draft.goal_type = goal_type;
    }

    let task = app.api.create_task(&draft).await.map_err(explain)?;
    info!(id = task.id, "created task");
    println!("Created task {}: {}", task.id, task.title);
    Ok(())
}

#[instrument(skip(app, fields))]
pub(super) async fn cmd_edit(app: &App, id: u64, fields: TaskEditArgs) -> anyhow::Result<()> {
    let today = app.today();
    let patch = TaskPatch {
        title: fields.title,
        description: fields.description,
        completed: None,
        priority: fields.priority,
        due_date: fields
            .due
            .as_deref()
            .map(|raw| parse_optional_date(raw, today))
            .transpose()?,
        category: fields
            .category
            .as_deref()
            .map(|raw| parse_optional_id(raw, "category"))
            .transpose()?,
        goal: fields
            .goal
            .as_deref()
            .map(|raw| parse_optional_id(raw, "goal"))
            .transpose()?,
        goal_type: fields.goal_type,
    };

    if patch.is_empty() {
        return Err(anyhow!(
            "nothing to change; pass at least one of --title, --description, --priority, \
             --due, --category, --goal, --goal-type"
        ));
    }

    let task = app.api.patch_task(id, &patch).await.map_err(explain)?;
    info!(id = task.id, "updated task");
    println!("Updated task {}: {}", task.id, task.title);
    Ok(())
}

#[instrument(skip(app))]
pub(super) async fn cmd_set_done(app: &App, id: u64, completed: bool) -> anyhow::Result<()> {
    let task = app
        .api
        .set_completed(id, completed)
        .await
        .map_err(explain)?;
    let state = if task.completed { "completed" } else { "open" };
    println!("Task {} is now {state}: {}", task.id, task.title);
    Ok(())
}

#[instrument(skip(app))]
pub(super) async fn cmd_delete(app: &App, id: u64, yes: bool) -> anyhow::Result<()> {
    if !yes {
        let title = match app.api.get_task(id).await {
            Ok(task) => task.title,
            Err(err) if is_not_found(&err) => {
                println!("Task {id} was already gone.");
                return Ok(());
            }
            Err(err) => return Err(explain(err)),
        };
        if !confirm(&format!("Delete task {id} \"{title}\"?"))? {
            println!("Kept task {id}.");
            return Ok(());
        }
    }

    match app.api.delete_task(id).await {
        Ok(()) => {}
        Err(err) if is_not_found(&err) => {
            println!("Task {id} was already gone.");
            return Ok(());
        }
        Err(err) => return Err(explain(err)).context(format!("deleting task {id}")),
    }
    info!(id, "deleted task");
    println!("Deleted task {id}.");
    Ok(())
}
