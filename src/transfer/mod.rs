//! Transfer unit: probe, admit, preallocate and fetch one resource in parallel ranges
//!
//! Split into focused submodules:
//! - [`probe`] - HEAD existence and size checks
//! - [`chunk`] - Partitioning `[0, size)` into ranged chunks
//! - `writer` - Preallocation and lock-free positional writes
//!
//! A transfer succeeds only if every chunk completes. On failure the partially written
//! destination is left in place; the task lifecycle removes it.

pub mod chunk;
pub mod probe;
mod writer;


pub use chunk::{Chunk, plan_chunks};
pub use probe::Probe;

use crate::config::{Config, MirrorConfig, RetryConfig};
use crate::error::{Error, Result, TransferError};
use crate::retry::with_retry;
use crate::types::UrlPair;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RANGE};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

/// HTTP side of the engine, shared by every transfer
///
/// Holds the single pooled `reqwest::Client` (timeout and platform headers applied to
/// every request) together with the retry, chunking and mirror settings.
#[derive(Clone)]
pub struct TransferClient {
    http: reqwest::Client,
    retry: RetryConfig,
    mirror: MirrorConfig,
    chunk_concurrency: usize,
    buffer_size: usize,
}

impl TransferClient {
    /// Build the shared client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.download.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::config(format!("invalid header name '{name}': {e}"), "download.headers")
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                Error::config(format!("invalid value for header '{name}': {e}"), "download.headers")
            })?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.download.request_timeout);
        if let Some(user_agent) = &config.download.user_agent {
            builder = builder.user_agent(user_agent);
        }

        Ok(Self {
            http: builder.build()?,
            retry: config.retry.clone(),
            mirror: config.mirror.clone(),
            chunk_concurrency: config.download.chunk_concurrency,
            buffer_size: config.download.buffer_size,
        })
    }

    /// Materialize the resource behind `sources` at `destination`
    ///
    /// Returns the number of bytes written. Fails with [`Error::InvalidSource`] when
    /// neither URL is usable, [`Error::AlreadyExists`] when the destination is present,
    /// and [`Error::Transfer`] or [`Error::Network`] when a chunk fails after its retries.
    pub async fn transfer(&self, sources: &UrlPair, destination: &Path) -> Result<u64> {
        let primary_url = self.resolve(&sources.primary);
        let backup_url = self.resolve(&sources.backup);

        let (primary, backup) = tokio::join!(
            probe::probe(&self.http, &self.retry, &primary_url),
            probe::probe(&self.http, &self.retry, &backup_url),
        );

        let (size, usable) = admit(&primary, &backup).ok_or_else(|| Error::InvalidSource {
            name: destination
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| destination.display().to_string()),
            primary_status: primary.status,
            backup_status: backup.status,
        })?;

        crate::utils::ensure_destination(destination).await?;
        let file = writer::preallocate(destination, size).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyExists(destination.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let file = Arc::new(file);

        let chunks = plan_chunks(size, self.chunk_concurrency, &usable);
        tracing::debug!(
            path = %destination.display(),
            size,
            chunks = chunks.len(),
            sources = usable.len(),
            "Starting chunked transfer"
        );

        let mut workers = JoinSet::new();
        for chunk in chunks {
            let http = self.http.clone();
            let retry = self.retry.clone();
            let file = Arc::clone(&file);
            let buffer_size = self.buffer_size;
            workers.spawn(async move {
                let label = format!("chunk {}", chunk.index);
                let (http, chunk, file) = (&http, &chunk, file.as_ref());
                with_retry(&retry, &label, || {
                    fetch_chunk(http, chunk, size, file, buffer_size)
                })
                .await
            });
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => Err(TransferError::Join(e.to_string()).into()),
            };
            if let Err(e) = outcome
                && first_error.is_none()
            {
                tracing::warn!(
                    path = %destination.display(),
                    error = %e,
                    "Chunk failed, aborting remaining chunks"
                );
                workers.abort_all();
                first_error = Some(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(size),
        }
    }

    /// Apply the mirror host rewrite, if configured and applicable
    fn resolve(&self, url: &str) -> String {
        match crate::utils::rewrite_mirror_host(url, &self.mirror) {
            Some(rewritten) => {
                tracing::warn!(from = url, to = %rewritten, "Rewrote throttled host to mirror");
                rewritten
            }
            None => url.to_string(),
        }
    }
}

/// Admission: pick the size and the usable source URLs
///
/// The size comes from the first usable probe (primary preferred). A backup whose size
/// disagrees with the primary is not used. Returns `None` if no probe is usable.
fn admit(primary: &Probe, backup: &Probe) -> Option<(u64, Vec<String>)> {
    let mut usable = [primary, backup].into_iter().filter(|p| p.is_usable());
    let first = usable.next()?;
    let size = first.size?;
    let mut urls = vec![first.url.clone()];

    if let Some(second) = usable.next() {
        if second.size == Some(size) {
            urls.push(second.url.clone());
        } else {
            tracing::warn!(
                primary = %first.url,
                backup = %second.url,
                primary_size = size,
                backup_size = second.size,
                "Source sizes disagree, using primary only"
            );
        }
    }
    Some((size, urls))
}

/// Fetch one chunk with a single ranged GET and write it at its offset
async fn fetch_chunk(
    http: &reqwest::Client,
    chunk: &Chunk,
    total: u64,
    file: &std::fs::File,
    buffer_size: usize,
) -> Result<()> {
    let response = http
        .get(&chunk.url)
        .header(RANGE, chunk.range_header())
        .send()
        .await?;

    let status = response.status();
    let whole_file = chunk.start == 0 && chunk.end + 1 == total;
    if !status.is_success() {
        return Err(TransferError::HttpStatus {
            url: chunk.url.clone(),
            status: status.as_u16(),
        }
        .into());
    }
    if status != reqwest::StatusCode::PARTIAL_CONTENT && !(status == reqwest::StatusCode::OK && whole_file)
    {
        return Err(TransferError::UnexpectedStatus {
            url: chunk.url.clone(),
            status: status.as_u16(),
        }
        .into());
    }

    let expected = chunk.byte_count();
    let mut offset = chunk.start;
    let mut buffer = Vec::with_capacity(buffer_size.min(expected as usize));
    let mut stream = response.bytes_stream();

    while let Some(item) = stream.next().await {
        let bytes = item?;
        let remaining = (chunk.end + 1 - offset) as usize - buffer.len();
        buffer.extend_from_slice(&bytes[..bytes.len().min(remaining)]);
        if buffer.len() >= buffer_size {
            flush(file, &mut buffer, &mut offset)?;
        }
        if offset + buffer.len() as u64 > chunk.end {
            break;
        }
    }
    flush(file, &mut buffer, &mut offset)?;

    let received = offset - chunk.start;
    if received < expected {
        return Err(TransferError::IncompleteChunk {
            start: chunk.start,
            end: chunk.end,
            received,
        }
        .into());
    }
    Ok(())
}

fn flush(file: &std::fs::File, buffer: &mut Vec<u8>, offset: &mut u64) -> Result<()> {
    if buffer.is_empty() {
        return Ok(());
    }
    writer::write_all_at(file, buffer, *offset).map_err(|source| TransferError::Write {
        offset: *offset,
        source,
    })?;
    *offset += buffer.len() as u64;
    buffer.clear();
    Ok(())
}
