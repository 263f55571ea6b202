//! Destination file preallocation and positional writes

use std::path::Path;

/// Create the destination file and extend it to `size` bytes
///
/// Uses `create_new` so a file that appeared after the placement check is never truncated.
/// The returned handle is shared by every chunk writer of the transfer.
pub(crate) fn preallocate(path: &Path, size: u64) -> std::io::Result<std::fs::File> {
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.set_len(size)?;
    Ok(file)
}

/// Cross-platform positional file write.
///
/// Writes `buf` to `file` at the given byte `offset`, equivalent to Unix `pwrite`.
/// Takes `&File`, so chunk writers targeting disjoint ranges never need a lock.
#[cfg(unix)]
pub(crate) fn write_all_at(file: &std::fs::File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

/// Cross-platform positional file write.
///
/// Writes `buf` to `file` at the given byte `offset`, equivalent to Unix `pwrite`.
#[cfg(windows)]
pub(crate) fn write_all_at(file: &std::fs::File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut written = 0;
    while written < buf.len() {
        let n = file.seek_write(&buf[written..], offset + written as u64)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "failed to write whole buffer",
            ));
        }
        written += n;
    }
    Ok(())
}

/// Cross-platform positional file write.
#[cfg(not(any(unix, windows)))]
pub(crate) fn write_all_at(_file: &std::fs::File, _buf: &[u8], _offset: u64) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "positional writes not supported on this platform",
    ))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn preallocate_sets_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.mp4.1");

        let file = preallocate(&path, 4096).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 4096);
    }

    #[test]
    fn preallocate_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("v.mp4.1");
        std::fs::write(&path, b"keep").unwrap();

        let err = preallocate(&path, 10).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&path).unwrap(), b"keep");
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn disjoint_writes_land_at_their_offsets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp3.1");
        let file = preallocate(&path, 10).unwrap();

        // out of order on purpose
        write_all_at(&file, b"fghij", 5).unwrap();
        write_all_at(&file, b"abcde", 0).unwrap();
        drop(file);

        assert_eq!(std::fs::read(&path).unwrap(), b"abcdefghij");
    }
}
