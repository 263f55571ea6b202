//! Shared test helpers: a mocked media origin, a recording merger and downloader setup.

use crate::config::Config;
use crate::downloader::ArchiveDownloader;
use crate::error::{Error, Result};
use crate::merger::Merger;
use crate::types::{Event, Task, UrlPair};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Serves `Range: bytes=a-b` requests out of an in-memory body
pub(crate) struct RangeResponder {
    pub(crate) body: Arc<Vec<u8>>,
    /// Answer every GET with the full body and status 200
    pub(crate) ignore_range: bool,
}

impl RangeResponder {
    pub(crate) fn new(body: &Arc<Vec<u8>>) -> Self {
        Self {
            body: Arc::clone(body),
            ignore_range: false,
        }
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.split_once('-'))
            .and_then(|(a, b)| Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?)));

        match range {
            Some((start, end)) if !self.ignore_range => ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {start}-{end}/{}", self.body.len()).as_str(),
                )
                .set_body_bytes(self.body[start..=end].to_vec()),
            _ => ResponseTemplate::new(200).set_body_bytes(self.body.as_ref().clone()),
        }
    }
}

/// Deterministic non-repeating-ish body
pub(crate) fn sample_body(size: usize) -> Arc<Vec<u8>> {
    Arc::new((0..size).map(|i| (i % 251) as u8).collect())
}

/// Mount HEAD and ranged GET handlers for `route`
pub(crate) async fn mount_media(server: &MockServer, route: &str, body: &Arc<Vec<u8>>) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.as_ref().clone()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(RangeResponder::new(body))
        .mount(server)
        .await;
}

/// Mount a HEAD handler that answers 404 for `route`
pub(crate) async fn mount_missing(server: &MockServer, route: &str) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

/// Merger stand-in: concatenates video and audio into the output and records calls
#[derive(Default)]
pub(crate) struct RecordingMerger {
    pub(crate) calls: std::sync::Mutex<Vec<PathBuf>>,
    pub(crate) fail: bool,
    pub(crate) delay: Duration,
    active: AtomicUsize,
    pub(crate) max_active: AtomicUsize,
}

impl RecordingMerger {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Merger for RecordingMerger {
    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(output.to_path_buf());

        tokio::time::sleep(self.delay).await;
        let result = if self.fail {
            Err(Error::Merge {
                output: output.to_path_buf(),
                reason: "incompatible streams".to_string(),
            })
        } else {
            let mut merged = tokio::fs::read(video).await?;
            merged.extend(tokio::fs::read(audio).await?);
            tokio::fs::write(output, merged).await.map_err(Error::from)
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Config tuned for tests: fast retries, small chunks, no pacing, no ffmpeg lookup
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.download.chunk_concurrency = 4;
    config.download.buffer_size = 4096;
    config.retry.delay = Duration::from_millis(10);
    config.tools.search_path = false;
    config
}

/// Build a downloader around `merger` and start its intake loop
pub(crate) fn start_test_downloader(
    config: Config,
    merger: Arc<RecordingMerger>,
) -> ArchiveDownloader {
    let downloader = ArchiveDownloader::with_merger(config, merger).unwrap();
    downloader.start_queue_processor().unwrap();
    downloader
}

/// A task whose video and audio are served from `server` under `name`
pub(crate) fn media_task(server: &MockServer, dir: &Path, name: &str) -> Task {
    Task::new(
        format!("[1080P] {name}"),
        UrlPair::single(format!("{}/{name}/video.m4s", server.uri())),
        UrlPair::single(format!("{}/{name}/audio.m4s", server.uri())),
        dir.join(name),
    )
}

/// Mount video and audio routes for a task created by [`media_task`]
pub(crate) async fn mount_task_media(server: &MockServer, name: &str, size: usize) {
    mount_media(server, &format!("/{name}/video.m4s"), &sample_body(size)).await;
    mount_media(server, &format!("/{name}/audio.m4s"), &sample_body(size / 2)).await;
}

/// Wait for the first event matching `pred`, panicking after five seconds
pub(crate) async fn wait_for_event<F>(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    mut pred: F,
) -> Event
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Collect `count` events matching `pred`
pub(crate) async fn collect_events<F>(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    count: usize,
    mut pred: F,
) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        out.push(wait_for_event(events, &mut pred).await);
    }
    out
}
