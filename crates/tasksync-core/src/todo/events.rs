//! Local mutation events.

use tokio::sync::mpsc;

use super::TodoItem;

/// A committed local mutation. Carries the item as it stood after the write
/// (or just before deletion).
#[derive(Debug, Clone, PartialEq)]
pub enum TodoEvent {
    Created(TodoItem),
    Updated(TodoItem),
    Toggled(TodoItem),
    Deleted(TodoItem),
}

impl TodoEvent {
    pub fn item(&self) -> &TodoItem {
        match self {
            TodoEvent::Created(item)
            | TodoEvent::Updated(item)
            | TodoEvent::Toggled(item)
            | TodoEvent::Deleted(item) => item,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TodoEvent::Created(_) => "created",
            TodoEvent::Updated(_) => "updated",
            TodoEvent::Toggled(_) => "toggled",
            TodoEvent::Deleted(_) => "deleted",
        }
    }
}

pub type TodoEventSender = mpsc::UnboundedSender<TodoEvent>;
pub type TodoEventReceiver = mpsc::UnboundedReceiver<TodoEvent>;

/// Create a channel for local mutation events.
pub fn event_channel() -> (TodoEventSender, TodoEventReceiver) {
    mpsc::unbounded_channel()
}
