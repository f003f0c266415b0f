use clap::Subcommand;
use tasksync_core::{Database, SyncOptions, SyncResult};

use super::{engine, CmdResult, Scope};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Enable task sync for the list and run an initial full sync
    Enable {
        /// Remote list name (defaults to remote.default_list_name)
        #[arg(long)]
        remote_list: Option<String>,
        /// Also mirror due dates to the calendar
        #[arg(long)]
        calendar: bool,
    },
    /// Disable sync for the list
    Disable {
        /// Also delete the remote list
        #[arg(long)]
        delete_remote_list: bool,
    },
    /// Run a full sync now
    Run {
        #[arg(long)]
        json: bool,
    },
    /// Show sync status for the list
    Status {
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(action: SyncAction, scope: &Scope) -> CmdResult {
    let db = Database::open()?;
    let engine = engine()?;

    match action {
        SyncAction::Enable {
            remote_list,
            calendar,
        } => {
            let options = SyncOptions {
                remote_list_name: remote_list,
                sync_calendar: calendar,
            };
            engine.enable_sync(&db, &scope.account, &scope.list, &options)?;
            println!("sync enabled for {}/{}", scope.account, scope.list);
            let result = engine.full_sync(&db, &scope.account, &scope.list).await?;
            print_result(&result);
        }
        SyncAction::Disable { delete_remote_list } => {
            if engine
                .disable_sync(&db, &scope.account, &scope.list, delete_remote_list)
                .await?
            {
                println!("sync disabled for {}/{}", scope.account, scope.list);
            } else {
                println!("sync was not configured for {}/{}", scope.account, scope.list);
            }
        }
        SyncAction::Run { json } => {
            let result = engine.full_sync(&db, &scope.account, &scope.list).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        SyncAction::Status { json } => {
            let report = engine.status(&db, &scope.account, &scope.list)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            let Some(report) = report else {
                println!("sync not configured for {}/{}", scope.account, scope.list);
                return Ok(());
            };
            println!("enabled:     {}", report.enabled);
            println!(
                "remote list: {}",
                report.remote_list_name.as_deref().unwrap_or("-")
            );
            println!("mapped:      {}", report.mapped_items);
            match report.last_sync_at {
                Some(at) => {
                    let status = report.last_sync_status.map_or("-", |s| s.as_str());
                    println!("last sync:   {} ({status})", at.to_rfc3339());
                }
                None => println!("last sync:   never"),
            }
            if let Some(error) = report.last_sync_error {
                println!("last error:  {error}");
            }
        }
    }
    Ok(())
}

fn print_result(result: &SyncResult) {
    println!(
        "pushed {}, pulled {}, conflicts {}, deleted locally {}, deleted remotely {}",
        result.pushed, result.pulled, result.conflicts, result.deleted_local, result.deleted_remote
    );
    for error in &result.errors {
        eprintln!("  failed: {error}");
    }
}
