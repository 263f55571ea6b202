//! Per-task lifecycle: parallel transfers, merge, cleanup, group notification, pacing.

use crate::error::Error;
use crate::types::{Event, MediaKind, Stage, Task};
use crate::utils::{pacing_delay, remove_if_exists};
use std::path::Path;
use tokio::sync::OwnedSemaphorePermit;

use super::ArchiveDownloader;

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskOutcome {
    /// Output merged
    Merged,
    /// Output or a transfer destination already existed, or the page was already running
    Skipped,
    /// A transfer or the merge failed
    Failed,
}

impl ArchiveDownloader {
    /// Run one admitted task to completion
    ///
    /// `Queued -> (video || audio) -> merging -> completed | failed`. Whatever the
    /// outcome, the temporary artifacts are removed and the task's group is notified.
    /// A task whose output is already claimed by a running task is skipped untouched.
    /// Pacing applies only after a successful merge. The pool permit is released when
    /// this returns.
    pub(crate) async fn run_task(&self, task: Task, permit: OwnedSemaphorePermit) -> TaskOutcome {
        let output = task.output_path();

        if tokio::fs::try_exists(&output).await.unwrap_or(false) {
            tracing::info!(title = %task.title, path = %output.display(), "Output already exists, skipping");
            self.emit_event(Event::TaskSkipped {
                title: task.title.clone(),
                path: output,
            });
            self.notify_group(&task).await;
            drop(permit);
            return TaskOutcome::Skipped;
        }

        if !self.in_flight.lock().await.insert(output.clone()) {
            tracing::info!(title = %task.title, path = %output.display(), "Same page already in progress, skipping");
            self.emit_event(Event::TaskSkipped {
                title: task.title.clone(),
                path: output,
            });
            self.notify_group(&task).await;
            drop(permit);
            return TaskOutcome::Skipped;
        }

        let video_path = task.video_temp_path();
        let audio_path = task.audio_temp_path();

        let (video, audio) = tokio::join!(
            self.transfer.transfer(&task.video, &video_path),
            self.transfer.transfer(&task.audio, &audio_path),
        );

        let outcome = match (video, audio) {
            (Ok(video_bytes), Ok(audio_bytes)) => {
                tracing::debug!(
                    title = %task.title,
                    video_bytes,
                    audio_bytes,
                    "Transfers complete, merging"
                );
                match self.merger.merge(&video_path, &audio_path, &output).await {
                    Ok(()) => {
                        tracing::info!(title = %task.title, path = %output.display(), "Task complete");
                        self.emit_event(Event::TaskComplete {
                            title: task.title.clone(),
                            path: output.clone(),
                        });
                        TaskOutcome::Merged
                    }
                    Err(e) => {
                        tracing::error!(
                            title = %task.title,
                            merger = self.merger.name(),
                            error = %e,
                            code = e.error_code(),
                            "Merge failed"
                        );
                        self.emit_event(Event::TaskFailed {
                            title: task.title.clone(),
                            stage: Stage::Merge,
                            error: e.to_string(),
                        });
                        TaskOutcome::Failed
                    }
                }
            }
            (video, audio) => self.report_transfer_failure(
                &task,
                [(MediaKind::Video, video.err()), (MediaKind::Audio, audio.err())],
            ),
        };

        self.cleanup(&task.title, &[video_path.as_path(), audio_path.as_path()])
            .await;
        self.in_flight.lock().await.remove(&output);
        self.notify_group(&task).await;

        if outcome == TaskOutcome::Merged {
            self.pace(&task.title).await;
        }
        drop(permit);
        outcome
    }

    fn report_transfer_failure(
        &self,
        task: &Task,
        results: [(MediaKind, Option<Error>); 2],
    ) -> TaskOutcome {
        let mut skipped_at = None;
        let mut first_error = None;

        for (kind, error) in results {
            let Some(error) = error else { continue };
            if let Error::AlreadyExists(path) = &error {
                tracing::info!(title = %task.title, kind = %kind, path = %path.display(), "Transfer destination already exists");
                skipped_at.get_or_insert_with(|| path.clone());
                continue;
            }
            tracing::error!(
                title = %task.title,
                kind = %kind,
                error = %error,
                code = error.error_code(),
                "Transfer failed"
            );
            first_error.get_or_insert_with(|| format!("{kind}: {error}"));
        }

        match (first_error, skipped_at) {
            (Some(error), _) => {
                self.emit_event(Event::TaskFailed {
                    title: task.title.clone(),
                    stage: Stage::Transfer,
                    error,
                });
                TaskOutcome::Failed
            }
            (None, Some(path)) => {
                self.emit_event(Event::TaskSkipped {
                    title: task.title.clone(),
                    path,
                });
                TaskOutcome::Skipped
            }
            (None, None) => TaskOutcome::Failed,
        }
    }

    async fn cleanup(&self, title: &str, paths: &[&Path]) {
        for path in paths {
            if let Err(e) = remove_if_exists(path).await {
                tracing::warn!(title, path = %path.display(), error = %e, "Failed to remove temporary file");
            }
        }
    }

    async fn notify_group(&self, task: &Task) {
        let Some(group_id) = &task.group_id else {
            return;
        };
        if let Some(completion) = self.tracker.notify(group_id, &task.output_dir()).await {
            self.emit_event(Event::GroupComplete {
                group_id: completion.group_id,
                output_dir: completion.output_dir,
            });
        }
    }

    /// Sleep the pacing delay, cut short by shutdown
    async fn pace(&self, title: &str) {
        // ThreadRng is !Send; keep it out of the awaiting scope
        let delay = {
            let mut rng = rand::thread_rng();
            pacing_delay(&self.config.pacing, &mut rng)
        };
        let Some(delay) = delay else {
            return;
        };
        tracing::info!(title, delay_secs = delay.as_secs(), "Pacing before next task");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.queue_state.shutdown.cancelled() => {
                tracing::debug!(title, "Pacing interrupted by shutdown");
            }
        }
    }
}
