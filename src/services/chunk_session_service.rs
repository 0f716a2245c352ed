use crate::error::{ProxyError, ProxyResult};
use crate::models::{
    bytes_to_mb, chunk_range, total_chunks, ChunkAck, ChunkInitRequest, MAX_FILE_SIZE,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Proxy-side view of one chunked upload. The bytes themselves live on the backend.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub file_name: String,
    pub total_bytes: u64,
    pub total_chunks: u64,
    /// Next chunk index the backend has not accepted yet
    pub next_index: u64,
    /// Index currently being relayed to the backend, if any
    pub in_flight: Option<u64>,
    pub bytes_received: u64,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl SessionEntry {
    pub fn is_complete(&self) -> bool {
        self.next_index == self.total_chunks
    }
}

/// What to do with an incoming chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// First delivery: the index is now reserved. Relay it, then commit or release.
    Relay,
    /// Already accepted earlier (client retried after a lost response): acknowledge only.
    Replay,
}

/// Correlates init/chunk/finalize calls by `uploadId`.
pub struct ChunkSessionService {
    sessions: DashMap<String, SessionEntry>,
    ttl: Duration,
}

impl ChunkSessionService {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn get(&self, upload_id: &str) -> Option<SessionEntry> {
        self.sessions.get(upload_id).map(|entry| entry.value().clone())
    }

    pub fn validate_init(request: &ChunkInitRequest) -> ProxyResult<()> {
        if request.file_name.trim().is_empty() {
            return Err(ProxyError::BadRequest("fileName is required".into()));
        }
        if request.total_bytes == 0 {
            return Err(ProxyError::BadRequest(format!(
                "{} is empty",
                request.file_name
            )));
        }
        if request.total_bytes > MAX_FILE_SIZE {
            return Err(ProxyError::PayloadTooLarge(format!(
                "{} is {} MB, exceeding the {} MB limit",
                request.file_name,
                bytes_to_mb(request.total_bytes),
                bytes_to_mb(MAX_FILE_SIZE)
            )));
        }
        let expected = total_chunks(request.total_bytes);
        if request.total_chunks != expected {
            return Err(ProxyError::BadRequest(format!(
                "totalChunks {} does not match {} bytes (expected {})",
                request.total_chunks, request.total_bytes, expected
            )));
        }
        Ok(())
    }

    pub fn register(&self, upload_id: &str, request: &ChunkInitRequest) {
        let now = Instant::now();
        let entry = SessionEntry {
            file_name: request.file_name.clone(),
            total_bytes: request.total_bytes,
            total_chunks: request.total_chunks,
            next_index: 0,
            in_flight: None,
            bytes_received: 0,
            created_at: now,
            last_activity: now,
        };
        if self.sessions.insert(upload_id.to_string(), entry).is_some() {
            tracing::warn!("Upload session {} re-initialized, progress reset", upload_id);
        }
        tracing::info!(
            "Upload session {} opened for {} ({} bytes, {} chunks)",
            upload_id,
            request.file_name,
            request.total_bytes,
            request.total_chunks
        );
    }

    pub fn check_chunk(
        &self,
        upload_id: &str,
        chunk_index: u64,
        len: u64,
    ) -> ProxyResult<ChunkDisposition> {
        let mut entry = self
            .sessions
            .get_mut(upload_id)
            .ok_or_else(|| ProxyError::SessionNotFound(upload_id.to_string()))?;
        entry.last_activity = Instant::now();

        if chunk_index >= entry.total_chunks {
            return Err(ProxyError::BadRequest(format!(
                "chunkIndex {} out of range, upload {} has {} chunks",
                chunk_index, upload_id, entry.total_chunks
            )));
        }
        if chunk_index > entry.next_index {
            return Err(ProxyError::ChunkOutOfOrder {
                upload_id: upload_id.to_string(),
                expected: entry.next_index,
                got: chunk_index,
            });
        }

        let range = chunk_range(chunk_index, entry.total_bytes);
        let expected_len = range.end - range.start;
        if len != expected_len {
            return Err(ProxyError::BadRequest(format!(
                "chunk {} of upload {} is {} bytes, expected {}",
                chunk_index, upload_id, len, expected_len
            )));
        }

        if chunk_index < entry.next_index {
            tracing::debug!(
                "Chunk {} of upload {} already accepted, acknowledging replay",
                chunk_index,
                upload_id
            );
            return Ok(ChunkDisposition::Replay);
        }
        if entry.in_flight == Some(chunk_index) {
            return Err(ProxyError::ChunkInFlight {
                upload_id: upload_id.to_string(),
                chunk_index,
            });
        }
        entry.in_flight = Some(chunk_index);
        Ok(ChunkDisposition::Relay)
    }

    /// Records a chunk the backend accepted. Safe to call for a replayed index.
    pub fn commit_chunk(
        &self,
        upload_id: &str,
        chunk_index: u64,
        len: u64,
    ) -> ProxyResult<ChunkAck> {
        let mut entry = self
            .sessions
            .get_mut(upload_id)
            .ok_or_else(|| ProxyError::SessionNotFound(upload_id.to_string()))?;
        if chunk_index == entry.next_index {
            entry.next_index += 1;
            entry.bytes_received += len;
        }
        if entry.in_flight == Some(chunk_index) {
            entry.in_flight = None;
        }
        entry.last_activity = Instant::now();

        Ok(ChunkAck {
            success: true,
            chunk_index,
            received_chunks: entry.next_index,
            total_chunks: entry.total_chunks,
        })
    }

    /// Frees a reservation whose relay did not complete.
    pub fn release_chunk(&self, upload_id: &str, chunk_index: u64) {
        if let Some(mut entry) = self.sessions.get_mut(upload_id) {
            if entry.in_flight == Some(chunk_index) {
                entry.in_flight = None;
                tracing::debug!(
                    "Released chunk {} of upload {} after a failed relay",
                    chunk_index,
                    upload_id
                );
            }
        }
    }

    /// Holds the reservation taken by a [`ChunkDisposition::Relay`] until dropped.
    pub fn reservation<'a>(
        &'a self,
        upload_id: &'a str,
        chunk_index: u64,
    ) -> ChunkReservation<'a> {
        ChunkReservation {
            service: self,
            upload_id,
            chunk_index,
        }
    }

    pub fn check_finalize(&self, upload_id: &str) -> ProxyResult<SessionEntry> {
        let entry = self
            .get(upload_id)
            .ok_or_else(|| ProxyError::SessionNotFound(upload_id.to_string()))?;
        if !entry.is_complete() {
            return Err(ProxyError::Incomplete {
                upload_id: upload_id.to_string(),
                received: entry.next_index,
                total: entry.total_chunks,
            });
        }
        Ok(entry)
    }

    pub fn complete(&self, upload_id: &str) -> Option<SessionEntry> {
        let removed = self.sessions.remove(upload_id).map(|(_, entry)| entry);
        if let Some(entry) = &removed {
            tracing::info!(
                "Upload session {} finalized for {} after {:?}",
                upload_id,
                entry.file_name,
                entry.created_at.elapsed()
            );
        }
        removed
    }

    /// Drops sessions idle for longer than the TTL as of `now`.
    pub fn sweep_expired_at(&self, now: Instant) -> Vec<(String, SessionEntry)> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.last_activity) > self.ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for upload_id in expired {
            if let Some((id, entry)) = self.sessions.remove(&upload_id) {
                tracing::warn!(
                    "Upload session {} for {} expired with {}/{} chunks, \
                     backend object left orphaned",
                    id,
                    entry.file_name,
                    entry.next_index,
                    entry.total_chunks
                );
                removed.push((id, entry));
            }
        }
        removed
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now()).len()
    }
}

/// Releases the chunk reservation when the relay ends, including when the
/// request future is dropped mid-relay.
pub struct ChunkReservation<'a> {
    service: &'a ChunkSessionService,
    upload_id: &'a str,
    chunk_index: u64,
}

impl Drop for ChunkReservation<'_> {
    fn drop(&mut self) {
        self.service.release_chunk(self.upload_id, self.chunk_index);
    }
}

/// 定期清理过期的分片上传会话
pub fn spawn_session_sweeper(
    service: Arc<ChunkSessionService>,
    interval: Duration,
    ct: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ct.cancelled() => {
                    tracing::info!("Upload session sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = service.sweep_expired();
                    if removed > 0 {
                        tracing::info!("Swept {} expired upload sessions", removed);
                    }
                }
            }
        }
    })
}
