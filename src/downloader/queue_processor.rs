//! Queue processor: the single intake loop admitting tasks under the pool limit.

use crate::error::{Error, Result};
use crate::types::Event;

use super::ArchiveDownloader;

impl ArchiveDownloader {
    /// Start the queue processor task
    ///
    /// This method spawns a background task that continuously:
    /// 1. Waits for the next task in the intake queue (FIFO)
    /// 2. Acquires a permit from the concurrency pool (respects max_concurrent_tasks)
    /// 3. Spawns the task's lifecycle, which holds the permit until it is done
    /// 4. Repeats until shutdown
    ///
    /// Tasks are admitted in queue order but may finish in any order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the processor was started before.
    pub fn start_queue_processor(&self) -> Result<tokio::task::JoinHandle<()>> {
        let mut receiver = self
            .queue_state
            .task_rx
            .try_lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(Error::AlreadyStarted)?;

        let concurrent_limit = self.queue_state.concurrent_limit.clone();
        let shutdown = self.queue_state.shutdown.clone();
        let downloader = self.clone();

        Ok(tokio::spawn(async move {
            tracing::info!("Queue processor started");

            loop {
                let task = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    task = receiver.recv() => match task {
                        Some(task) => task,
                        None => break,
                    },
                };

                // Acquire a permit from the semaphore (blocks if the pool is saturated)
                let permit = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        tracing::warn!(title = %task.title, "Shutdown before admission, task dropped");
                        break;
                    }
                    permit = concurrent_limit.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                tracing::info!(title = %task.title, group_id = ?task.group_id, "Task admitted");
                downloader.emit_event(Event::TaskStarted {
                    title: task.title.clone(),
                });

                let downloader = downloader.clone();
                tokio::spawn(async move {
                    downloader.run_task(task, permit).await;
                });
            }

            receiver.close();
            let mut dropped = 0usize;
            while receiver.try_recv().is_ok() {
                dropped += 1;
            }
            if dropped > 0 {
                tracing::warn!(dropped, "Queued tasks discarded at shutdown");
            }
            tracing::info!("Queue processor stopped");
        }))
    }
}
