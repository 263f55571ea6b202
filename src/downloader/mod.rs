//! Download orchestrator split into focused submodules.
//!
//! The `ArchiveDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Task intake and group registration
//! - [`queue_processor`] - The single intake loop admitting tasks under the pool limit
//! - [`task`] - Per-task lifecycle: transfers, merge, cleanup, group notification, pacing
//! - [`hooks`] - Post-archive scripts and webhooks
//! - [`lifecycle`] - Shutdown coordination

mod hooks;
mod lifecycle;
mod queue;
mod queue_processor;
mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use hooks::ArchiveHooks;

use crate::config::Config;
use crate::error::Result;
use crate::merger::{self, Merger};
use crate::tracker::TaskGroupTracker;
use crate::transfer::TransferClient;
use crate::types::{Event, Task};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, Semaphore, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Intake queue and concurrency pool
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Producer side of the bounded intake queue
    pub(crate) task_tx: mpsc::Sender<Task>,
    /// Consumer side, taken exactly once by the intake loop
    pub(crate) task_rx: Arc<Mutex<Option<mpsc::Receiver<Task>>>>,
    /// Semaphore bounding simultaneously processed tasks (max_concurrent_tasks)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Flag to indicate whether new tasks are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled on shutdown; stops the intake loop and cuts pacing short
    pub(crate) shutdown: CancellationToken,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// Owns every piece of shared engine state: the HTTP client, the intake queue, the
/// concurrency pool and the task-group registry. Nothing is process-global.
#[derive(Clone)]
pub struct ArchiveDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Shared HTTP client and transfer settings
    pub(crate) transfer: TransferClient,
    /// Muxer for the video and audio streams (trait object for pluggable implementations)
    pub(crate) merger: Arc<dyn Merger>,
    /// Registry of pending task groups
    pub(crate) tracker: TaskGroupTracker,
    /// Output paths of tasks currently running, so a resubmitted page never touches them
    pub(crate) in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    /// Intake queue and concurrency pool
    pub(crate) queue_state: QueueState,
}

impl ArchiveDownloader {
    /// Create a downloader, locating ffmpeg per `config.tools`
    ///
    /// Fails only if the configuration is invalid or the HTTP client cannot be built.
    /// Call [`start_queue_processor`](Self::start_queue_processor) to begin processing.
    pub fn new(config: Config) -> Result<Self> {
        let merger = merger::from_config(&config.tools);
        Self::with_merger(config, merger)
    }

    /// Create a downloader with an explicit merger implementation
    pub fn with_merger(config: Config, merger: Arc<dyn Merger>) -> Result<Self> {
        config.validate()?;

        let transfer = TransferClient::new(&config)?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (task_tx, task_rx) = mpsc::channel(config.download.queue_capacity);

        let queue_state = QueueState {
            task_tx,
            task_rx: Arc::new(Mutex::new(Some(task_rx))),
            concurrent_limit: Arc::new(Semaphore::new(config.download.max_concurrent_tasks)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown: CancellationToken::new(),
        };

        tracing::info!(
            max_concurrent_tasks = config.download.max_concurrent_tasks,
            chunk_concurrency = config.download.chunk_concurrency,
            queue_capacity = config.download.queue_capacity,
            merger = merger.name(),
            "ArchiveDownloader initialized"
        );

        Ok(Self {
            event_tx,
            config: Arc::new(config),
            transfer,
            merger,
            tracker: TaskGroupTracker::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            queue_state,
        })
    }

    /// Subscribe to lifecycle events
    ///
    /// Each subscriber receives events emitted after it subscribed. A subscriber that
    /// falls more than the channel capacity behind observes `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the task-group registry
    pub fn tracker(&self) -> &TaskGroupTracker {
        &self.tracker
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}
