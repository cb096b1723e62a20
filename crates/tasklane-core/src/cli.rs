use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::task::{GoalType, Priority};
use crate::view::{Filter, SortKey};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tasklane",
    version,
    about = "Tasklane: terminal client for a goals and tasks backend",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rcfile", global = true)]
    pub rcfile: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and store the session token
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long, env = "TASKLANE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session token
    Logout,
    /// Show whether a session is stored and which backend is used
    Status,
    /// List and manage tasks (lists when no subcommand is given)
    Tasks(TasksArgs),
    /// List and manage goals
    Goals {
        #[command(subcommand)]
        command: Option<GoalCommand>,
    },
    /// List and manage categories
    Categories {
        #[command(subcommand)]
        command: Option<CategoryCommand>,
    },
    /// Month view of due dates, or the tasks due on one day
    Calendar {
        /// Month to show, as YYYY-MM
        #[arg(long)]
        month: Option<String>,
        /// List tasks due on this date
        #[arg(long)]
        day: Option<String>,
    },
    /// Incomplete tasks due today or earlier
    Reminders,
    /// Client-side settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub command: Option<TaskCommand>,

    #[command(flatten)]
    pub list: ListArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// all, incomplete or complete
    #[arg(long, short = 'f')]
    pub filter: Option<Filter>,

    /// priority or due_date
    #[arg(long, short = 's')]
    pub sort: Option<SortKey>,

    /// Only tasks belonging to this goal
    #[arg(long)]
    pub goal: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    List(ListArgs),
    Show {
        id: u64,
    },
    Add(TaskAddArgs),
    /// Change the given fields; use "none" to clear due, category or goal
    Edit {
        id: u64,
        #[command(flatten)]
        fields: TaskEditArgs,
    },
    /// Mark a task completed
    Done {
        id: u64,
    },
    /// Mark a task open again
    Undo {
        id: u64,
    },
    Delete {
        id: u64,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TaskAddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'p')]
    pub priority: Option<Priority>,

    /// YYYY-MM-DD, today, tomorrow, +3d, friday...
    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub category: Option<u64>,

    #[arg(long)]
    pub goal: Option<u64>,

    /// long, short or habit
    #[arg(long)]
    pub goal_type: Option<GoalType>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskEditArgs {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'p')]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub goal: Option<String>,

    #[arg(long)]
    pub goal_type: Option<GoalType>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum GoalCommand {
    List,
    /// Goal dashboard: details, progress and its tasks
    Show {
        id: u64,
    },
    Add {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
        #[arg(long, short = 'd')]
        description: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Replace the given fields; use "none" to clear a date
    Edit {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, short = 'd')]
        description: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Delete a goal and, on the backend, every task under it
    Delete {
        id: u64,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    List,
    Add {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Delete a category; its tasks become uncategorized
    Delete {
        id: u64,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Show or change the due-date reminder switch
    Notifications { state: Option<Toggle> },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of argv.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
