//! # tasksync Core Library
//!
//! Two-way sync between a local todo store and a remote task-list service,
//! including the OAuth credential lifecycle that authorizes it. The CLI is a
//! thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Credentials**: token storage, transparent refresh, revocation
//! - **Remote**: provider trait plus a Google Tasks client
//! - **Mapping**: local ⇄ remote correlations with per-side watermarks
//! - **Sync**: full and incremental reconciliation, last-write-wins
//! - **Todo**: local CRUD that publishes mutation events
//!
//! Every storage-touching call takes the [`Database`] handle explicitly.
//!
//! ## Key Components
//!
//! - [`SyncEngine`]: reconciliation entry points
//! - [`CredentialStore`]: valid access tokens per account
//! - [`RemoteTaskProvider`]: seam for concrete task APIs
//! - [`TodoStore`]: local todo CRUD

pub mod credentials;
pub mod error;
pub mod mapping;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod todo;

pub use credentials::{Credential, CredentialStore, OAuthConfig, TokenSet};
pub use error::{ConfigError, CoreError, DatabaseError, OAuthError, ValidationError};
pub use mapping::{LastSyncStatus, MappingStatus, MappingStore, SyncConfig, TaskMapping};
pub use remote::{build_provider, GoogleTasksClient, ProviderError, RemoteTaskProvider};
pub use storage::{Config, Database};
pub use sync::{
    IncrementalOutcome, SyncEngine, SyncError, SyncOptions, SyncResult, SyncStatusReport,
};
pub use todo::{NewTodo, Priority, TodoEvent, TodoItem, TodoPatch, TodoStore};
