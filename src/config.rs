//! Configuration types for archiver-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

/// Transfer behavior configuration (concurrency, queue bound, HTTP client)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum number of tasks transferring simultaneously (default: 3)
    ///
    /// This is the size of the concurrency pool. It is independent of
    /// `chunk_concurrency`, which bounds parallelism inside one transfer.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Number of ranged chunks each transfer is split into (default: 10)
    #[serde(default = "default_chunk_concurrency")]
    pub chunk_concurrency: usize,

    /// Capacity of the intake queue; `add_task` blocks once it is full (default: 10)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Timeout applied to every outbound request (default: 10 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Size of the read buffer used when streaming a chunk body (default: 1 MiB)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Headers attached to every outbound request (default: platform Referer)
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    /// Optional User-Agent override
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            chunk_concurrency: default_chunk_concurrency(),
            queue_capacity: default_queue_capacity(),
            request_timeout: default_request_timeout(),
            buffer_size: default_buffer_size(),
            headers: default_headers(),
            user_agent: None,
        }
    }
}

/// Retry policy applied uniformly to probes and chunk fetches
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per network operation (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (default: 1 second)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
        }
    }
}

/// Delay inserted after each successfully merged task
///
/// The effective delay is `interval + uniform(-jitter, jitter)`, clamped at zero.
/// An `interval` of zero disables pacing entirely.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Base delay in seconds (default: 0 = disabled)
    #[serde(default, with = "duration_serde")]
    pub interval: Duration,

    /// Random offset bound in seconds (default: 0)
    #[serde(default, with = "duration_serde")]
    pub jitter: Duration,
}

/// Rewrite of throttled CDN hosts to a mirror host
///
/// When enabled, any URL whose text contains `throttled_host_marker` and carries the
/// `origin_query_param` query parameter has its host and port replaced by
/// `mirror_host_template` with `{origin}` substituted by the parameter's value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Whether the rewrite is applied (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Substring identifying a throttled host (default: "mcdn.bilivideo.cn")
    #[serde(default = "default_throttled_host_marker")]
    pub throttled_host_marker: String,

    /// Query parameter holding the origin key (default: "og")
    #[serde(default = "default_origin_query_param")]
    pub origin_query_param: String,

    /// Replacement host, optionally with a port; must contain `{origin}`
    /// (default: "upos-sz-mirror{origin}.bilivideo.com")
    #[serde(default = "default_mirror_host_template")]
    pub mirror_host_template: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            throttled_host_marker: default_throttled_host_marker(),
            origin_query_param: default_origin_query_param(),
            mirror_host_template: default_mirror_host_template(),
        }
    }
}

/// External tool paths
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Post-archive hooks run when a registered group completes
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Script configurations
    #[serde(default)]
    pub scripts: Vec<ScriptConfig>,

    /// Webhook configurations
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// Script execution configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Path to script/executable; invoked with the group output directory as its argument
    pub path: PathBuf,

    /// Timeout for script execution (default: 5 minutes)
    #[serde(default = "default_script_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Webhook configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for webhook requests (default: 30 seconds)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Main configuration for ArchiveDownloader
///
/// Every field has a serde default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry policy for probes and chunk fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Inter-task pacing
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Throttled host rewrite
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Post-archive scripts and webhooks
    #[serde(default)]
    pub hooks: HooksConfig,
}

impl Config {
    /// Load and validate a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            max_concurrent_tasks = config.download.max_concurrent_tasks,
            chunk_concurrency = config.download.chunk_concurrency,
            pacing_secs = config.pacing.interval.as_secs(),
            pacing_jitter_secs = config.pacing.jitter.as_secs(),
            mirror_rewrite = config.mirror.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Reject values that would make the engine stall or misbehave
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_tasks == 0 {
            return Err(Error::config(
                "max_concurrent_tasks must be at least 1",
                "download.max_concurrent_tasks",
            ));
        }
        if self.download.chunk_concurrency == 0 {
            return Err(Error::config(
                "chunk_concurrency must be at least 1",
                "download.chunk_concurrency",
            ));
        }
        if self.download.queue_capacity == 0 {
            return Err(Error::config(
                "queue_capacity must be at least 1",
                "download.queue_capacity",
            ));
        }
        if self.download.buffer_size == 0 {
            return Err(Error::config(
                "buffer_size must be at least 1",
                "download.buffer_size",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "max_attempts must be at least 1",
                "retry.max_attempts",
            ));
        }
        if !self.mirror.mirror_host_template.contains("{origin}") {
            return Err(Error::config(
                "mirror_host_template must contain the {origin} placeholder",
                "mirror.mirror_host_template",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_chunk_concurrency() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_buffer_size() -> usize {
    1024 * 1024
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "Referer".to_string(),
        "https://www.bilibili.com/".to_string(),
    )])
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_throttled_host_marker() -> String {
    "mcdn.bilivideo.cn".to_string()
}

fn default_origin_query_param() -> String {
    "og".to_string()
}

fn default_mirror_host_template() -> String {
    "upos-sz-mirror{origin}.bilivideo.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_script_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");

        assert_eq!(config.download.max_concurrent_tasks, 3);
        assert_eq!(config.download.chunk_concurrency, 10);
        assert_eq!(config.download.queue_capacity, 10);
        assert_eq!(config.download.request_timeout, Duration::from_secs(10));
        assert_eq!(
            config.download.headers.get("Referer").map(String::as_str),
            Some("https://www.bilibili.com/")
        );
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay, Duration::from_secs(1));
        assert_eq!(config.pacing.interval, Duration::ZERO);
        assert!(!config.mirror.enabled);
        assert!(config.tools.search_path);
        assert!(config.hooks.scripts.is_empty());
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn durations_are_whole_seconds_in_json() {
        let json = r#"{
            "pacing": { "interval": 60, "jitter": 30 },
            "retry": { "delay": 2 },
            "hooks": { "scripts": [ { "path": "/usr/local/bin/on-archive" } ] }
        }"#;
        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.pacing.interval, Duration::from_secs(60));
        assert_eq!(config.pacing.jitter, Duration::from_secs(30));
        assert_eq!(config.retry.delay, Duration::from_secs(2));
        assert_eq!(config.retry.max_attempts, 3, "unset fields keep defaults");
        assert_eq!(config.hooks.scripts[0].timeout, Duration::from_secs(300));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["pacing"]["interval"], 60);
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let cases: [(&str, fn(&mut Config)); 5] = [
            ("download.max_concurrent_tasks", |c| {
                c.download.max_concurrent_tasks = 0
            }),
            ("download.chunk_concurrency", |c| {
                c.download.chunk_concurrency = 0
            }),
            ("download.queue_capacity", |c| c.download.queue_capacity = 0),
            ("download.buffer_size", |c| c.download.buffer_size = 0),
            ("retry.max_attempts", |c| c.retry.max_attempts = 0),
        ];

        for (expected_key, mutate) in cases {
            let mut config = Config::default();
            mutate(&mut config);
            match config.validate() {
                Err(Error::Config { key, .. }) => {
                    assert_eq!(key.as_deref(), Some(expected_key));
                }
                other => panic!("{expected_key}: expected config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn validate_requires_origin_placeholder() {
        let mut config = Config::default();
        config.mirror.mirror_host_template = "mirror.example.com".to_string();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "download": { "max_concurrent_tasks": 5 } }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.download.max_concurrent_tasks, 5);

        std::fs::write(&path, r#"{ "download": { "chunk_concurrency": 0 } }"#).unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config { .. })));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Serialization(_))));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
