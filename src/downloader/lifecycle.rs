//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::ArchiveDownloader;

/// Upper bound on waiting for in-flight tasks during shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl ArchiveDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new tasks (`add_task` returns [`Error::ShuttingDown`](crate::Error::ShuttingDown))
    /// 2. Stops the intake loop; tasks still queued are discarded
    /// 3. Waits up to 30 seconds for in-flight tasks by reclaiming every pool permit
    ///    (pending pacing delays are cut short)
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// In-flight tasks that outlive the timeout keep running in the background.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new tasks
        self.queue_state.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new tasks");

        // 2. Stop the intake loop and interrupt pacing
        self.queue_state.shutdown.cancel();

        // 3. Wait for in-flight tasks with timeout
        let pool_size = self.config.download.max_concurrent_tasks as u32;
        let wait_result = tokio::time::timeout(
            SHUTDOWN_TIMEOUT,
            self.queue_state.concurrent_limit.acquire_many(pool_size),
        )
        .await;

        match wait_result {
            Ok(Ok(_permits)) => {
                tracing::info!("All in-flight tasks completed");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Concurrency pool closed while waiting for tasks");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for in-flight tasks, proceeding with shutdown");
            }
        }

        // 4. Emit shutdown event
        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutting_down(&self) -> bool {
        !self.queue_state.accepting_new.load(Ordering::SeqCst)
    }
}
