use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use tasksync_core::todo::{event_channel, TodoEventReceiver};
use tasksync_core::{
    Database, IncrementalOutcome, MappingStore, NewTodo, Priority, TodoItem, TodoPatch, TodoStore,
};

use super::{CmdResult, Scope};

#[derive(Subcommand)]
pub enum TodoAction {
    /// Add an item
    Add {
        text: String,
        /// high, medium or low
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_due)]
        due: Option<DateTime<Utc>>,
    },
    /// List items of the selected list
    List {
        #[arg(long)]
        json: bool,
    },
    /// Edit an item
    Edit {
        id: i64,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long, value_parser = parse_due, conflicts_with = "clear_due")]
        due: Option<DateTime<Utc>>,
        #[arg(long)]
        clear_due: bool,
    },
    /// Toggle an item's completion
    Toggle { id: i64 },
    /// Delete an item
    Rm { id: i64 },
}

fn parse_due(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| format!("invalid date '{s}' (expected YYYY-MM-DD or RFC 3339)"))
}

pub async fn run(action: TodoAction, scope: &Scope) -> CmdResult {
    let db = Database::open()?;
    let (tx, rx) = event_channel();
    let todos = TodoStore::with_events(tx);

    match action {
        TodoAction::List { json } => return list(&todos, &db, scope, json),
        TodoAction::Add {
            text,
            priority,
            due,
        } => {
            let item = todos.create_item(
                &db,
                NewTodo {
                    account_id: scope.account.clone(),
                    list_id: scope.list.clone(),
                    text,
                    priority,
                    due_date: due,
                    parent_goal_id: None,
                },
            )?;
            println!("created {}", format_item(&item));
        }
        TodoAction::Edit {
            id,
            text,
            priority,
            due,
            clear_due,
        } => {
            let due_date = if clear_due { Some(None) } else { due.map(Some) };
            let patch = TodoPatch {
                text,
                is_completed: None,
                priority,
                due_date,
            };
            let item = todos.update_item(&db, id, patch)?;
            println!("updated {}", format_item(&item));
        }
        TodoAction::Toggle { id } => {
            let item = todos.toggle_item(&db, id)?;
            println!("{}", format_item(&item));
        }
        TodoAction::Rm { id } => match todos.delete_item(&db, id)? {
            Some(item) => println!("deleted #{}", item.id),
            None => return Err(format!("todo item {id} not found").into()),
        },
    }

    drop(todos);
    forward_events(&db, scope, rx).await;
    Ok(())
}

fn list(todos: &TodoStore, db: &Database, scope: &Scope, json: bool) -> CmdResult {
    let items = todos.get_items(db, &scope.account, &scope.list)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("no items");
    } else {
        for item in &items {
            println!("{}", format_item(item));
        }
    }
    Ok(())
}

/// Hand committed mutations to the sync engine. The local write already
/// stands, so failures here are only reported.
async fn forward_events(db: &Database, scope: &Scope, mut rx: TodoEventReceiver) {
    match MappingStore::new().get_config(db, &scope.account, &scope.list) {
        Ok(Some(config)) if config.sync_tasks => {}
        Ok(_) => return,
        Err(e) => {
            tracing::warn!(error = %e, "could not read sync config");
            return;
        }
    }

    let engine = match super::engine() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("warning: change not synced: {e}");
            return;
        }
    };

    while let Ok(event) = rx.try_recv() {
        match engine.handle_event(db, &event).await {
            IncrementalOutcome::Failed(message) => {
                eprintln!("warning: change not synced: {message}");
            }
            outcome => tracing::debug!(kind = event.kind(), ?outcome, "incremental sync"),
        }
    }
}

fn format_item(item: &TodoItem) -> String {
    let mark = if item.is_completed { "x" } else { " " };
    let mut line = format!("#{} [{mark}] {}", item.id, item.text);
    match item.priority {
        Priority::High => line.push_str(" (high)"),
        Priority::Low => line.push_str(" (low)"),
        Priority::Medium => {}
    }
    if let Some(due) = item.due_date {
        line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
    }
    line
}
