//! Task group tracker
//!
//! Counts finished sub-tasks per logical video and fires the group's completion
//! callback exactly once, when the count reaches the registered total. The group is
//! removed at that instant, so late or duplicate notifications are silent no-ops.

use crate::error::{Error, Result};
use crate::types::GroupCompletion;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Callback invoked once when every sub-task of a group has reported
pub type CompletionCallback = Box<dyn FnOnce(GroupCompletion) + Send + 'static>;

struct GroupState {
    total: usize,
    completed: usize,
    on_complete: CompletionCallback,
}

/// Registry of in-flight task groups
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct TaskGroupTracker {
    groups: Arc<Mutex<HashMap<String, GroupState>>>,
}

impl TaskGroupTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `id`, expecting `total` notifications
    ///
    /// Rejects an empty id (reserved for standalone tasks) and `total == 0`, which
    /// could never complete. Re-registering a pending id replaces its state.
    pub async fn register(&self, id: &str, total: usize, on_complete: CompletionCallback) -> Result<()> {
        if id.is_empty() {
            return Err(Error::InvalidGroup(
                "group id must not be empty".to_string(),
            ));
        }
        if total == 0 {
            return Err(Error::InvalidGroup(format!(
                "group {id} registered with zero subtasks"
            )));
        }

        let mut groups = self.groups.lock().await;
        let previous = groups.insert(
            id.to_string(),
            GroupState {
                total,
                completed: 0,
                on_complete,
            },
        );
        if let Some(previous) = previous {
            tracing::warn!(
                group_id = id,
                completed = previous.completed,
                total = previous.total,
                "Group re-registered before completing, previous state discarded"
            );
        }
        tracing::debug!(group_id = id, total, "Group registered");
        Ok(())
    }

    /// Record one finished sub-task of `id`
    ///
    /// Returns the completion record if this call completed the group. The callback runs
    /// after the registry lock is released. Unknown ids are ignored.
    pub async fn notify(&self, id: &str, output_dir: &Path) -> Option<GroupCompletion> {
        let (completion, on_complete) = {
            let mut groups = self.groups.lock().await;
            let state = match groups.get_mut(id) {
                Some(state) => state,
                None => {
                    tracing::debug!(group_id = id, "Notify for unknown or completed group ignored");
                    return None;
                }
            };
            state.completed += 1;
            tracing::debug!(
                group_id = id,
                completed = state.completed,
                total = state.total,
                "Group progress"
            );
            if state.completed < state.total {
                return None;
            }
            let state = groups.remove(id)?;
            (
                GroupCompletion {
                    group_id: id.to_string(),
                    output_dir: output_dir.to_path_buf(),
                    total_subtasks: state.total,
                },
                state.on_complete,
            )
        };

        tracing::info!(
            group_id = id,
            output_dir = %output_dir.display(),
            subtasks = completion.total_subtasks,
            "Group complete"
        );
        on_complete(completion.clone());
        Some(completion)
    }

    /// Progress of a pending group as `(completed, total)`
    pub async fn progress(&self, id: &str) -> Option<(usize, usize)> {
        self.groups
            .lock()
            .await
            .get(id)
            .map(|state| (state.completed, state.total))
    }

    /// Number of groups still waiting for notifications
    pub async fn pending(&self) -> usize {
        self.groups.lock().await.len()
    }
}
