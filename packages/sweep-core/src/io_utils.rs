//! I/O helpers shared by the record store and the snapshot swap.

use std::io::{ErrorKind, Read};

use crate::error::SweepError;

/// Classifies I/O errors into specific SweepError variants.
pub fn classify_io_error(error: std::io::Error, context: &str) -> SweepError {
    match error.kind() {
        ErrorKind::StorageFull | ErrorKind::OutOfMemory => {
            SweepError::DiskFull(format!("{}: {}", context, error))
        }
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            SweepError::TransientIo(format!("{}: {}", context, error))
        }
        _ => SweepError::Io(format!("{}: {}", context, error)),
    }
}

/// Retries an operation that may fail with transient I/O errors.
pub fn retry_io_operation<F, T>(
    mut operation: F,
    max_retries: u32,
    retry_delay_ms: u64,
    context: &str,
) -> Result<T, SweepError>
where
    F: FnMut() -> Result<T, SweepError>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(SweepError::TransientIo(msg)) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    "Transient I/O error in {} (attempt {}/{}): {}",
                    context,
                    attempt,
                    max_retries,
                    msg
                );
                if retry_delay_ms > 0 {
                    std::thread::sleep(std::time::Duration::from_millis(retry_delay_ms));
                }
            }
            Err(err) => return Err(err),
        }
    }
}

/// Reads until `buf` is full or the stream ends, returning the byte count.
///
/// Unlike `read_exact`, a short read at end-of-stream is reported rather
/// than turned into an error, so callers can tell a clean end from a
/// truncated record.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
