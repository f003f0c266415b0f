//! Remote task providers.
//!
//! [`RemoteTaskProvider`] is the seam; [`GoogleTasksClient`] is the one
//! concrete implementation. Which one is used is decided by configuration
//! through [`build_provider`].

pub mod codec;
pub mod google_tasks;
pub mod provider;


pub use google_tasks::GoogleTasksClient;
pub use provider::{ProviderError, RemoteTask, RemoteTaskList, RemoteTaskProvider, TaskDraft};

use crate::storage::{Config, ProviderKind};

/// Build the provider selected in `config.remote.provider`.
pub fn build_provider(config: &Config) -> Result<Box<dyn RemoteTaskProvider>, ProviderError> {
    let timeout = config.remote.request_timeout();
    match config.remote.provider {
        ProviderKind::GoogleTasks => Ok(Box::new(GoogleTasksClient::new(
            config.remote.api_base.clone(),
            timeout,
        )?)),
    }
}
