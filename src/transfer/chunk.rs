//! Partitioning a transfer into ranged chunks

/// One contiguous byte range of a transfer, fetched with a single ranged GET
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the plan
    pub index: usize,
    /// First byte offset
    pub start: u64,
    /// Last byte offset (inclusive, as in `Range: bytes=start-end`)
    pub end: u64,
    /// URL this chunk is fetched from
    pub url: String,
}

impl Chunk {
    /// Number of bytes in the range (at least one for a planned chunk)
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value of the `Range` request header
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Split `[0, size)` into at most `count` equal chunks
///
/// Chunk length is `ceil(size / count)`; the last chunk is clamped to `size - 1` and
/// no chunk is produced once its start reaches `size`. Sources are assigned round-robin
/// by chunk index, so with two usable URLs even chunks use the first and odd chunks the
/// second. Returns no chunks for an empty file or an empty source list.
pub fn plan_chunks(size: u64, count: usize, sources: &[String]) -> Vec<Chunk> {
    if size == 0 || sources.is_empty() {
        return Vec::new();
    }
    let count = count.max(1) as u64;
    let chunk_len = size.div_ceil(count);

    (0..count)
        .map_while(|i| {
            let start = i * chunk_len;
            (start < size).then(|| Chunk {
                index: i as usize,
                start,
                end: (start + chunk_len - 1).min(size - 1),
                url: sources[i as usize % sources.len()].clone(),
            })
        })
        .collect()
}
