//! Utility functions for path manipulation, cleanup, pacing and URL rewriting

use crate::config::{MirrorConfig, PacingConfig};
use crate::error::{Error, Result};
use rand::Rng;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Append `suffix` to the final component of `path`
///
/// Unlike [`Path::with_extension`], this never replaces an existing dot-separated
/// part of the name (destination names routinely contain dots).
///
/// # Examples
///
/// ```
/// use archiver_dl::utils::with_suffix;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(with_suffix(Path::new("a/Title.Up-P1"), ".mp4"), PathBuf::from("a/Title.Up-P1.mp4"));
/// ```
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Placement check for a transfer destination
///
/// Creates the parent directory if absent, then fails with [`Error::AlreadyExists`]
/// if the destination file is already present. Re-runs never overwrite.
pub async fn ensure_destination(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create directory '{}': {}", parent.display(), e),
            ))
        })?;
    }
    if tokio::fs::try_exists(path).await? {
        return Err(Error::AlreadyExists(path.to_path_buf()));
    }
    Ok(())
}

/// Remove a file, treating a missing file as success
pub async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Delay to wait after a successfully merged task
///
/// Returns `interval + uniform(-jitter, jitter)` in whole seconds, clamped at zero.
/// Returns `None` when pacing is disabled (`interval` of zero).
pub fn pacing_delay<R: Rng + ?Sized>(pacing: &PacingConfig, rng: &mut R) -> Option<Duration> {
    let base = pacing.interval.as_secs() as i64;
    if base == 0 {
        return None;
    }
    let jitter = pacing.jitter.as_secs() as i64;
    let offset = if jitter > 0 {
        rng.gen_range(-jitter..=jitter)
    } else {
        0
    };
    Some(Duration::from_secs((base + offset).max(0) as u64))
}

/// Rewrite a throttled CDN URL to its mirror host
///
/// The host and port are replaced by the expanded template; path and query are kept.
///
/// Returns `None` when the rewrite is disabled, the URL does not contain the throttled
/// host marker, the URL does not parse, or the origin query parameter is absent.
///
/// # Examples
///
/// ```
/// use archiver_dl::config::MirrorConfig;
/// use archiver_dl::utils::rewrite_mirror_host;
///
/// let mirror = MirrorConfig { enabled: true, ..Default::default() };
/// let url = "https://xy1x2x3x4xy.mcdn.bilivideo.cn:4483/upgcxcode/v.m4s?og=cos&e=1";
/// assert_eq!(
///     rewrite_mirror_host(url, &mirror).as_deref(),
///     Some("https://upos-sz-mirrorcos.bilivideo.com/upgcxcode/v.m4s?og=cos&e=1"),
/// );
/// ```
pub fn rewrite_mirror_host(input: &str, mirror: &MirrorConfig) -> Option<String> {
    if !mirror.enabled || !input.contains(&mirror.throttled_host_marker) {
        return None;
    }
    let mut parsed = url::Url::parse(input).ok()?;
    let origin = parsed
        .query_pairs()
        .find(|(key, _)| key == mirror.origin_query_param.as_str())
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())?;
    // the template is the whole authority: the throttled host's port never carries over
    let authority = mirror.mirror_host_template.replace("{origin}", &origin);
    let mirror_url = url::Url::parse(&format!("{}://{}", parsed.scheme(), authority)).ok()?;
    parsed.set_host(mirror_url.host_str()).ok()?;
    parsed.set_port(mirror_url.port()).ok()?;
    Some(parsed.to_string())
}
