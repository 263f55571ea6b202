//! Core types and events

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Two independent origins for the same bytes (CDN redundancy)
///
/// Either URL may be empty; a pair with both empty can never pass admission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPair {
    /// Primary download URL
    pub primary: String,
    /// Backup download URL (empty if none)
    #[serde(default)]
    pub backup: String,
}

impl UrlPair {
    /// Create a pair from a primary and backup URL
    pub fn new(primary: impl Into<String>, backup: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
        }
    }

    /// Create a pair with only a primary URL
    pub fn single(primary: impl Into<String>) -> Self {
        Self::new(primary, String::new())
    }

    /// True when neither URL is set
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.backup.is_empty()
    }
}

/// One video page to download and merge
///
/// Immutable once enqueued. `destination` is the output path without the container
/// suffix; the merged file is written to `destination.mp4`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Group this page belongs to (`None` for standalone tasks)
    #[serde(default)]
    pub group_id: Option<String>,
    /// Human-readable title used in logs and events
    pub title: String,
    /// Video-only stream sources
    pub video: UrlPair,
    /// Audio-only stream sources
    pub audio: UrlPair,
    /// Output path without extension
    pub destination: PathBuf,
}

impl Task {
    /// Create a standalone task (no group)
    pub fn new(
        title: impl Into<String>,
        video: UrlPair,
        audio: UrlPair,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            group_id: None,
            title: title.into(),
            video,
            audio,
            destination: destination.into(),
        }
    }

    /// Attach the task to a group; an empty id leaves the task standalone
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        let group_id = group_id.into();
        self.group_id = (!group_id.is_empty()).then_some(group_id);
        self
    }

    /// Path of the temporary video-only artifact
    pub fn video_temp_path(&self) -> PathBuf {
        crate::utils::with_suffix(&self.destination, MediaKind::Video.temp_suffix())
    }

    /// Path of the temporary audio-only artifact
    pub fn audio_temp_path(&self) -> PathBuf {
        crate::utils::with_suffix(&self.destination, MediaKind::Audio.temp_suffix())
    }

    /// Path of the final merged container
    pub fn output_path(&self) -> PathBuf {
        crate::utils::with_suffix(&self.destination, OUTPUT_SUFFIX)
    }

    /// Directory reported to the group completion callback
    pub fn output_dir(&self) -> PathBuf {
        self.output_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Suffix of the final merged container
pub const OUTPUT_SUFFIX: &str = ".mp4";

/// Which stream a transfer carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video-only stream
    Video,
    /// Audio-only stream
    Audio,
}

impl MediaKind {
    /// Suffix of the temporary artifact for this stream
    pub fn temp_suffix(self) -> &'static str {
        match self {
            MediaKind::Video => ".mp4.1",
            MediaKind::Audio => ".mp3.1",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// Passed to a group's completion callback, exactly once per registered group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCompletion {
    /// Group id as registered
    pub group_id: String,
    /// Output directory of the task whose notification completed the group
    pub output_dir: PathBuf,
    /// Number of sub-tasks the group was registered with
    pub total_subtasks: usize,
}

/// Task lifecycle stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Video and audio transfers
    Transfer,
    /// External muxing
    Merge,
}

/// Event emitted during task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task accepted into the intake queue
    TaskQueued {
        /// Task title
        title: String,
    },

    /// Task admitted by the intake loop, transfers starting
    TaskStarted {
        /// Task title
        title: String,
    },

    /// Task skipped because its output already exists
    TaskSkipped {
        /// Task title
        title: String,
        /// Existing path that caused the skip
        path: PathBuf,
    },

    /// Task failed during transfer or merge
    TaskFailed {
        /// Task title
        title: String,
        /// Stage where failure occurred
        stage: Stage,
        /// Error message
        error: String,
    },

    /// Task transferred and merged successfully
    TaskComplete {
        /// Task title
        title: String,
        /// Final merged file
        path: PathBuf,
    },

    /// Every sub-task of a group has reported
    GroupComplete {
        /// Group id
        group_id: String,
        /// Output directory passed to the completion callback
        output_dir: PathBuf,
    },

    /// Post-archive script failed
    ScriptFailed {
        /// Script path
        script: PathBuf,
        /// Exit code if the script ran
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },

    /// Post-archive webhook failed
    WebhookFailed {
        /// Webhook URL
        url: String,
        /// Error message
        error: String,
    },

    /// Downloader shut down
    Shutdown,
}

/// JSON body posted to webhooks when a group is archived
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Event name ("archived")
    pub event: String,
    /// Group id
    pub group_id: String,
    /// Group output directory
    pub output_dir: PathBuf,
    /// Number of pages in the group
    pub subtasks: usize,
    /// Unix timestamp
    pub timestamp: i64,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task::new(
            "[1080P] Title P1",
            UrlPair::new("https://a/v", "https://b/v"),
            UrlPair::single("https://a/a"),
            "/archive/user/fav/2024-01-01-Title.Up/BV1xx-P1",
        )
    }

    #[test]
    fn artifact_paths_never_collide() {
        let task = sample_task();
        let video = task.video_temp_path();
        let audio = task.audio_temp_path();
        let output = task.output_path();

        assert_eq!(
            video,
            PathBuf::from("/archive/user/fav/2024-01-01-Title.Up/BV1xx-P1.mp4.1")
        );
        assert_eq!(
            audio,
            PathBuf::from("/archive/user/fav/2024-01-01-Title.Up/BV1xx-P1.mp3.1")
        );
        assert_eq!(
            output,
            PathBuf::from("/archive/user/fav/2024-01-01-Title.Up/BV1xx-P1.mp4")
        );
        assert_ne!(video, audio);
        assert_ne!(video, output);
        assert_eq!(
            task.output_dir(),
            PathBuf::from("/archive/user/fav/2024-01-01-Title.Up")
        );
    }

    #[test]
    fn destination_dots_are_preserved() {
        // "Title.Up" must not be treated as an extension to replace
        let task = Task::new("t", UrlPair::default(), UrlPair::default(), "dir/Title.Up");
        assert_eq!(task.output_path(), PathBuf::from("dir/Title.Up.mp4"));
    }

    #[test]
    fn empty_group_id_means_standalone() {
        let task = sample_task().in_group("");
        assert_eq!(task.group_id, None);

        let task = sample_task().in_group("BV1xx");
        assert_eq!(task.group_id.as_deref(), Some("BV1xx"));
    }

    #[test]
    fn url_pair_emptiness() {
        assert!(UrlPair::default().is_empty());
        assert!(!UrlPair::single("https://a").is_empty());
        assert!(!UrlPair::new("", "https://b").is_empty());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::TaskFailed {
            title: "t".into(),
            stage: Stage::Merge,
            error: "ffmpeg exited with 1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_failed");
        assert_eq!(json["stage"], "merge");
    }
}
