use super::*;
use crate::downloader::test_helpers::{
    RecordingMerger, collect_events, media_task, mount_missing, mount_task_media,
    start_test_downloader, test_config, wait_for_event,
};
use crate::error::Error;
use crate::types::{Event, GroupCompletion, Stage, Task};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

mod lifecycle;
