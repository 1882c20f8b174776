//! Todo CLI
//!
//! Command-line front-end for the todo backend: account management, task
//! listing with filters, edits and reordering.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_todos::{ApiClient, FileSession, SessionProvider, TaskPriority, TodoError};
use eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Manage your todo list from the terminal", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create an account and log into it
    Signup {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// Must repeat the password
        #[arg(long)]
        confirm_password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Show or edit the profile
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },

    /// Change the account password
    ChangePassword {
        #[arg(long)]
        old: String,

        #[arg(long)]
        new: String,
    },

    /// List tasks in position order
    List(ListArgs),

    /// Create a task
    Add {
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// extreme, moderate or low
        #[arg(short, long, default_value = "moderate")]
        priority: TaskPriority,

        /// Due date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Change fields of a task
    Edit {
        id: i64,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        priority: Option<TaskPriority>,

        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
    },

    /// Mark a task completed
    Done { id: i64 },

    /// Mark a task not completed
    Undo { id: i64 },

    /// Delete a task
    Rm { id: i64 },

    /// Move the task at slot FROM to slot TO (1-based, as shown by an unfiltered `list`)
    Mv { from: usize, to: usize },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Print the profile
    Show,

    /// Update profile fields
    Update {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        contact_number: Option<String>,

        /// YYYY-MM-DD
        #[arg(long)]
        birthday: Option<NaiveDate>,

        #[arg(long)]
        bio: Option<String>,

        /// Image file to upload as the profile picture
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

/// Filters for `list`
#[derive(Args, Debug, Default)]
struct ListArgs {
    /// Case-insensitive text in title or description
    #[arg(short, long)]
    search: Option<String>,

    /// Only tasks due on this date (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["today", "in_days"])]
    date: Option<NaiveDate>,

    /// Only tasks due today
    #[arg(long, conflicts_with = "in_days")]
    today: bool,

    /// Only tasks due this many days from today
    #[arg(long)]
    in_days: Option<u32>,

    #[arg(short, long)]
    priority: Option<TaskPriority>,

    /// Only completed tasks
    #[arg(long, conflicts_with = "pending")]
    completed: bool,

    /// Only tasks not yet completed
    #[arg(long)]
    pending: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let cli = Cli::parse();

    let session = Arc::new(FileSession::open(&config.session_file)?);
    let client = ApiClient::new(&config.client, session.clone())?;

    let result = commands::run(cli.command, client, &config).await;

    let unauthenticated = result
        .as_ref()
        .err()
        .and_then(|report| report.downcast_ref::<TodoError>())
        .is_some_and(TodoError::is_unauthenticated);
    if unauthenticated {
        if let Err(e) = session.clear_session() {
            warn!(error = %e, "Failed to clear rejected session");
        }
        eprintln!("Not logged in or session expired. Run `todo login` first.");
    }

    result
}
