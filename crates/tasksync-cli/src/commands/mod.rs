pub mod auth;
pub mod config;
pub mod sync;
pub mod todo;

use tasksync_core::{Config, SyncEngine};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Account and local list selected by the global flags.
pub struct Scope {
    pub account: String,
    pub list: String,
}

/// Build the sync engine from the saved configuration.
pub fn engine() -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    Ok(SyncEngine::from_config(&config)?)
}
