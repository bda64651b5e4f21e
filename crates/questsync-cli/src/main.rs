//! questsync - sync a competency collection and show progress from the terminal.
//!
//! Commands:
//!   questsync entries <collection>
//!   questsync progress <collection> [user]
//!   questsync complete <collection> <subtask> [comment]
//!   questsync reopen <collection> <subtask> [comment]

use std::io;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use questsync_core::cache::CacheSlot;
use questsync_core::models::{CollectionId, EntryId, EntryStructure, UserId};
use questsync_core::utils::format_percent;
use questsync_core::{
    ApiClient, Config, EntryTree, LocalCache, ProgressAggregator, SyncEngine, UserTaskMap,
    UserTaskStore,
};

const USAGE: &str = "\
Usage:
  questsync entries <collection>
  questsync progress <collection> [user]
  questsync complete <collection> <subtask> [comment]
  questsync reopen <collection> <subtask> [comment]

Configuration is read from the questsync config.json and overridden by
QUESTSYNC_API_URL, QUESTSYNC_TOKEN and QUESTSYNC_USER_ID.";

#[derive(Debug, PartialEq)]
enum Command {
    Entries {
        collection_id: CollectionId,
    },
    Progress {
        collection_id: CollectionId,
        user_id: Option<UserId>,
    },
    SetCompleted {
        collection_id: CollectionId,
        subtask_id: EntryId,
        is_completed: bool,
        comment: String,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn parse_id(value: Option<&String>, what: &str) -> Result<i64> {
    let raw = value.ok_or_else(|| anyhow!("Missing {}\n\n{}", what, USAGE))?;
    raw.parse()
        .with_context(|| format!("{} must be a number, got {:?}", what, raw))
}

fn parse_args(args: &[String]) -> Result<Command> {
    let command = args.first().map(String::as_str);
    let collection_id = || parse_id(args.get(1), "collection id");

    match command {
        Some("entries") => Ok(Command::Entries {
            collection_id: collection_id()?,
        }),
        Some("progress") => Ok(Command::Progress {
            collection_id: collection_id()?,
            user_id: args
                .get(2)
                .map(|_| parse_id(args.get(2), "user id"))
                .transpose()?,
        }),
        Some(verb @ ("complete" | "reopen")) => Ok(Command::SetCompleted {
            collection_id: collection_id()?,
            subtask_id: parse_id(args.get(2), "subtask id")?,
            is_completed: verb == "complete",
            comment: args.get(3..).map(|rest| rest.join(" ")).unwrap_or_default(),
        }),
        Some(other) => bail!("Unknown command {:?}\n\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = Config::load().context("Failed to load configuration")?;
    debug!(api = %config.api_base_url, "Configuration loaded");

    let mut client = ApiClient::new(&config.api_base_url, config.request_timeout())?;
    if let Some(token) = config.token.clone() {
        client.set_token(token);
    }

    // One cache per run, shared by the engine and the task store
    let cache = Arc::new(LocalCache::new());
    let mut engine = SyncEngine::new(client.clone(), cache.clone());
    let mut store = UserTaskStore::new(client, cache.clone());

    match command {
        Command::Entries { collection_id } => {
            let tree = engine.fetch_entries(collection_id).await?;
            print_tree(tree, None, &mut ProgressAggregator::new());
            print_cache_age(&cache, collection_id);
        }

        Command::Progress {
            collection_id,
            user_id: Some(user_id),
        } => {
            let (tree, tasks) = futures::try_join!(
                engine.fetch_entries(collection_id),
                store.fetch_other_user_tasks(collection_id, user_id),
            )?;
            println!("Progress of user {}", user_id);
            print_tree(tree, Some(tasks), &mut ProgressAggregator::new());
            print_completion_summary(tree, tasks);
        }

        Command::Progress {
            collection_id,
            user_id: None,
        } => {
            store.set_active_user(active_user(&config)?);
            let (tree, tasks) = futures::try_join!(
                engine.fetch_entries(collection_id),
                store.fetch_own_tasks(collection_id),
            )?;
            print_tree(tree, Some(tasks), &mut ProgressAggregator::new());
            print_completion_summary(tree, tasks);
            print_cache_age(&cache, collection_id);
        }

        Command::SetCompleted {
            collection_id,
            subtask_id,
            is_completed,
            comment,
        } => {
            store.set_active_user(active_user(&config)?);
            futures::try_join!(
                engine.fetch_entries(collection_id),
                store.fetch_own_tasks(collection_id),
            )?;

            let tree = engine
                .tree(collection_id)
                .ok_or_else(|| anyhow!("Collection {} is not loaded", collection_id))?;
            let subtask = tree
                .subtask(subtask_id)
                .ok_or_else(|| anyhow!("Subtask {} is not in collection {}", subtask_id, collection_id))?;
            let task_id = subtask.task_id;

            store
                .update_task(collection_id, subtask_id, is_completed, &comment)
                .await?;
            info!(collection_id, subtask_id, is_completed, "Completion recorded");

            let tasks = store
                .tasks(collection_id)
                .ok_or_else(|| anyhow!("Tasks for collection {} are not loaded", collection_id))?;
            let mut progress = ProgressAggregator::new();
            println!(
                "{} {}: {} now at {}",
                if is_completed { "Completed" } else { "Reopened" },
                subtask.title,
                tree.task(task_id).map(|t| t.title.as_str()).unwrap_or("task"),
                format_percent(progress.task_progress(tree, tasks, task_id).unwrap_or(0.0)),
            );
        }
    }

    Ok(())
}

fn active_user(config: &Config) -> Result<UserId> {
    config
        .user_id
        .ok_or_else(|| anyhow!("No user id configured; set QUESTSYNC_USER_ID or user_id in config.json"))
}

fn print_cache_age(cache: &LocalCache, collection_id: CollectionId) {
    let read = cache.read::<EntryStructure>(&CacheSlot::entries(collection_id));
    if let Some(age) = read.age_display() {
        println!("\nEntries cached {}", age);
    }
}

fn print_completion_summary(tree: &EntryTree, tasks: &UserTaskMap) {
    println!(
        "\n{} of {} subtasks completed",
        tasks.completed_count(),
        tree.subtask_count()
    );
}

fn print_tree(tree: &EntryTree, tasks: Option<&UserTaskMap>, progress: &mut ProgressAggregator) {
    if tree.is_empty() {
        println!("Collection {} has no entries", tree.collection_id());
        return;
    }

    for supertask in tree.supertasks() {
        match tasks.and_then(|t| progress.supertask_progress(tree, t, supertask.id)) {
            Some(pct) => println!("{}  {}", supertask.title, format_percent(pct)),
            None => println!("{}", supertask.title),
        }

        for task_id in tree.task_ids(supertask.id).unwrap_or_default() {
            let Some(task) = tree.task(*task_id) else {
                continue;
            };
            match tasks.and_then(|t| progress.task_progress(tree, t, task.id)) {
                Some(pct) => println!("  {}  {}", task.title, format_percent(pct)),
                None => println!("  {}", task.title),
            }

            for subtask_id in tree.subtask_ids(task.id).unwrap_or_default() {
                let Some(subtask) = tree.subtask(*subtask_id) else {
                    continue;
                };
                match tasks {
                    Some(tasks) => {
                        let mark = if tasks.is_completed(subtask.id) { "x" } else { " " };
                        let comment = tasks
                            .get(subtask.id)
                            .map(|t| t.comment.as_str())
                            .filter(|c| !c.is_empty());
                        match comment {
                            Some(comment) => println!("    [{}] {}  ({})", mark, subtask.title, comment),
                            None => println!("    [{}] {}", mark, subtask.title),
                        }
                    }
                    None => println!("    {}", subtask.title),
                }
            }
        }
    }
}
