//! Task intake and group registration.

use crate::error::{Error, Result};
use crate::types::{Event, GroupCompletion, Task};
use std::sync::atomic::Ordering;

use super::ArchiveDownloader;
use super::hooks::ArchiveHooks;

impl ArchiveDownloader {
    /// Enqueue a task for processing
    ///
    /// Returns as soon as the task is in the intake queue. When the queue is full this
    /// waits for space, which is the only backpressure producers see. The outcome of the
    /// task is reported through logs and events, never through this call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun.
    pub async fn add_task(&self, task: Task) -> Result<()> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let title = task.title.clone();
        let group_id = task.group_id.clone();
        self.queue_state
            .task_tx
            .send(task)
            .await
            .map_err(|_| Error::ShuttingDown)?;

        tracing::debug!(title = %title, group_id = ?group_id, "Task queued");
        self.emit_event(Event::TaskQueued { title });
        Ok(())
    }

    /// Declare a group of `total` tasks and the callback to run once all have finished
    ///
    /// Must be called before any task carrying `id` finishes. Every task of the group
    /// counts toward completion whether it succeeded, failed or was skipped. The callback
    /// runs exactly once, on the task that finishes last, and receives that task's
    /// output directory. An [`Event::GroupComplete`] is emitted alongside.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGroup`] for an empty id or `total == 0`.
    pub async fn register_task_group<F>(&self, id: &str, total: usize, on_complete: F) -> Result<()>
    where
        F: FnOnce(GroupCompletion) + Send + 'static,
    {
        self.tracker.register(id, total, Box::new(on_complete)).await
    }

    /// Declare a group whose completion runs the configured post-archive hooks
    ///
    /// Scripts and webhooks from `config.hooks` run in the background once all `total`
    /// tasks of the group have finished.
    pub async fn register_archived_group(&self, id: &str, total: usize) -> Result<()> {
        let hooks = ArchiveHooks::new(&self.config.hooks, self.event_tx.clone());
        self.register_task_group(id, total, move |completion| hooks.run(completion))
            .await
    }
}
