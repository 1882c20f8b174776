//! Command handlers

use chrono::{Days, Local, NaiveDate};
use domain_todos::{
    AccountService, ApiClient, ChangePassword, CreateTask, LoginCredentials, ProfileImage,
    SignupData, SyncOutcome, Task, TaskFilter, TaskListSync, UpdateProfile, UpdateTask, User,
};
use eyre::{Report, Result, bail, eyre};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::{Commands, ListArgs, ProfileCommand};

pub async fn run(command: Commands, client: ApiClient, config: &Config) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let user = accounts(&client)
                .login(LoginCredentials::new(email, password))
                .await?;
            println!("Logged in as {} <{}>", user.full_name(), user.email);
        }

        Commands::Signup {
            first_name,
            last_name,
            email,
            password,
            confirm_password,
        } => {
            let user = accounts(&client)
                .signup(SignupData {
                    first_name,
                    last_name,
                    email,
                    password,
                    confirm_password,
                })
                .await?;
            println!("Welcome, {}!", user.full_name());
        }

        Commands::Logout => {
            accounts(&client).logout()?;
            println!("Logged out");
        }

        Commands::Whoami => match accounts(&client).restore().await? {
            Some(user) => println!("{} <{}>", user.full_name(), user.email),
            None => println!("Not logged in"),
        },

        Commands::Profile { action } => profile(&client, action).await?,

        Commands::ChangePassword { old, new } => {
            let detail = accounts(&client)
                .change_password(ChangePassword {
                    old_password: old,
                    new_password: new,
                })
                .await?;
            println!("{}", detail);
        }

        Commands::List(args) => {
            let sync = tasks(client, config);
            applied(&sync, sync.load(Some(args.into_filter(today()))).await)?;
            print_tasks(&sync.tasks());
        }

        Commands::Add {
            title,
            description,
            priority,
            due,
        } => {
            let sync = tasks(client, config);
            let mut draft = CreateTask::new(title).priority(priority);
            if let Some(description) = description {
                draft = draft.description(description);
            }
            if let Some(due) = due {
                draft = draft.due(due);
            }

            let task = sync.create(draft).await.ok_or_else(|| failure(&sync))?;
            println!("Added #{} {} at position {}", task.id, task.title, task.position);
        }

        Commands::Edit {
            id,
            title,
            description,
            priority,
            due,
            clear_due,
        } => {
            let changes = UpdateTask {
                title,
                description,
                priority,
                todo_date: if clear_due { Some(None) } else { due.map(Some) },
                ..Default::default()
            };
            if changes.is_empty() {
                bail!("Nothing to change; pass at least one field");
            }

            let sync = tasks(client, config);
            applied(&sync, sync.load(None).await)?;
            let task = sync.update(id, changes).await.ok_or_else(|| failure(&sync))?;
            println!("Updated #{} {}", task.id, task.title);
        }

        Commands::Done { id } => set_completed(client, config, id, true).await?,

        Commands::Undo { id } => set_completed(client, config, id, false).await?,

        Commands::Rm { id } => {
            let sync = tasks(client, config);
            applied(&sync, sync.load(None).await)?;
            sync.delete(id).await?;
            println!("Deleted #{}", id);
        }

        Commands::Mv { from, to } => {
            let (Some(from), Some(to)) = (from.checked_sub(1), to.checked_sub(1)) else {
                bail!("Slots start at 1");
            };

            let sync = tasks(client, config);
            applied(&sync, sync.load(None).await)?;
            match sync.reorder(from, to).await {
                SyncOutcome::Unchanged => println!("Already in place"),
                outcome => {
                    applied(&sync, outcome)?;
                    info!(from, to, "Moved task");
                    print_tasks(&sync.tasks());
                }
            }
        }
    }

    Ok(())
}

fn accounts(client: &ApiClient) -> AccountService<ApiClient> {
    AccountService::new(client.clone(), client.session().clone())
}

fn tasks(client: ApiClient, config: &Config) -> TaskListSync<ApiClient> {
    TaskListSync::from_config(client, &config.client)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// The error recorded by the last failed synchronizer operation.
fn failure(sync: &TaskListSync<ApiClient>) -> Report {
    sync.last_error()
        .map(Report::new)
        .unwrap_or_else(|| eyre!("Operation failed"))
}

fn applied(sync: &TaskListSync<ApiClient>, outcome: SyncOutcome) -> Result<()> {
    match outcome {
        SyncOutcome::Failed => Err(failure(sync)),
        _ => Ok(()),
    }
}

async fn set_completed(client: ApiClient, config: &Config, id: i64, done: bool) -> Result<()> {
    let sync = tasks(client, config);
    applied(&sync, sync.load(None).await)?;
    let task = sync
        .set_completed(id, done)
        .await
        .ok_or_else(|| failure(&sync))?;

    let state = if task.is_completed { "completed" } else { "open" };
    println!("#{} {} is {}", task.id, task.title, state);
    Ok(())
}

async fn profile(client: &ApiClient, action: ProfileCommand) -> Result<()> {
    let service = accounts(client);
    match action {
        ProfileCommand::Show => {
            let user = service.refresh_user().await?;
            print_user(&user);
        }
        ProfileCommand::Update {
            first_name,
            last_name,
            address,
            contact_number,
            birthday,
            bio,
            image,
        } => {
            let profile_image = match image {
                Some(path) => Some(read_image(&path).await?),
                None => None,
            };
            let user = service
                .update_profile(UpdateProfile {
                    first_name,
                    last_name,
                    address,
                    contact_number,
                    birthday,
                    bio,
                    profile_image,
                })
                .await?;
            print_user(&user);
        }
    }
    Ok(())
}

async fn read_image(path: &Path) -> Result<ProfileImage> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("profile-image");
    Ok(ProfileImage::new(file_name, bytes))
}

impl ListArgs {
    fn into_filter(self, today: NaiveDate) -> TaskFilter {
        let todo_date = self
            .date
            .or_else(|| self.today.then_some(today))
            .or_else(|| {
                self.in_days
                    .and_then(|days| today.checked_add_days(Days::new(days.into())))
            });

        let is_completed = match (self.completed, self.pending) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        TaskFilter {
            todo_date,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            priority: self.priority,
            is_completed,
        }
    }
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks");
        return;
    }

    for (index, task) in tasks.iter().enumerate() {
        let mark = if task.is_completed { "x" } else { " " };
        let due = task
            .todo_date
            .map(|date| format!(", due {}", date))
            .unwrap_or_default();
        println!(
            "{:>3}. [{}] {} ({}{}) #{}",
            index + 1,
            mark,
            task.title,
            task.priority,
            due,
            task.id
        );
        if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
            println!("       {}", description);
        }
    }
}

fn print_user(user: &User) {
    println!("{} <{}>", user.full_name(), user.email);
    let optional = [
        ("Address", &user.address),
        ("Contact", &user.contact_number),
        ("Birthday", &user.birthday),
        ("Bio", &user.bio),
        ("Image", &user.profile_image),
    ];
    for (label, value) in optional {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            println!("  {}: {}", label, value);
        }
    }
}
