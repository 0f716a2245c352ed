use std::ops::Range;
use std::time::Duration;

const MB: u64 = 1024 * 1024;

/// Hard cap for a single file.
pub const MAX_FILE_SIZE: u64 = 500 * MB;

/// Hard cap for the combined size of one upload invocation.
pub const MAX_BATCH_SIZE: u64 = 500 * MB;

/// Fixed byte length of every chunk except the last one.
pub const CHUNK_SIZE: u64 = 5 * MB;

/// Synchronous request-body ceiling of the hosting platform. Batches above it
/// cannot travel as one multipart request.
pub const DIRECT_REQUEST_LIMIT: u64 = 30 * MB;

/// Files above this size always take the chunked path.
pub const CHUNK_THRESHOLD: u64 = 25 * MB;

/// Attempts per chunk before the whole file is given up.
pub const MAX_RETRIES: u32 = 3;

/// Backoff unit; attempt `n` waits `n * RETRY_BASE_DELAY` before the next one.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Server-side ceiling for every forwarded backend request.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// `ceil(total_bytes / CHUNK_SIZE)`
pub fn total_chunks(total_bytes: u64) -> u64 {
    total_bytes.div_ceil(CHUNK_SIZE)
}

/// Byte range covered by chunk `index` of a `total_bytes` long file.
pub fn chunk_range(index: u64, total_bytes: u64) -> Range<u64> {
    let start = index.saturating_mul(CHUNK_SIZE).min(total_bytes);
    let end = start.saturating_add(CHUNK_SIZE).min(total_bytes);
    start..end
}

/// Size in megabytes, rounded to one decimal place, for human-facing messages.
pub fn bytes_to_mb(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / MB as f64)
}

/// Integer percentage of `sent` over `total`, rounded to nearest.
pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (sent as f64 * 100.0 / total as f64).round();
    pct.clamp(0.0, 100.0) as u8
}
