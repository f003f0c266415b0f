//! Local todo items.
//!
//! Plain CRUD with no knowledge of sync. Mutations publish a [`TodoEvent`]
//! on an optional channel; whoever holds the receiver (normally the sync
//! engine's event loop) decides what to do with it.

pub mod events;
pub mod store;

pub use events::{event_channel, TodoEvent, TodoEventReceiver, TodoEventSender};
pub use store::{NewTodo, TodoFields, TodoPatch, TodoStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local priority. Stored as its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High = 1,
    #[default]
    Medium = 2,
    Low = 3,
}

impl Priority {
    /// Unknown values read as medium.
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => Priority::High,
            3 => Priority::Low,
            _ => Priority::Medium,
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "high" => Ok(Priority::High),
            "2" | "medium" => Ok(Priority::Medium),
            "3" | "low" => Ok(Priority::Low),
            other => Err(crate::error::ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("expected high, medium or low, got '{other}'"),
            }),
        }
    }
}

/// A local todo item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: i64,
    pub account_id: String,
    pub list_id: String,
    pub text: String,
    pub is_completed: bool,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub parent_goal_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
