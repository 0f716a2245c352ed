use super::error::UploadError;
use super::file::UploadFile;
use super::http::ProxyHttp;
use super::progress::{ProgressReporter, ProgressSample};
use crate::models::{
    chunk_fields, chunk_range, extract_file_urls, total_chunks, ChunkAck, ChunkInitRequest,
    ChunkInitResponse, FinalizeRequest, FinalizeResponse, CHUNK_SIZE, FILES_FIELD, MAX_RETRIES,
    METHOD_CHUNKED, METHOD_SINGLE, RETRY_BASE_DELAY,
};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::ops::Range;
use std::time::Duration;
use thiserror::Error;

pub const INIT_ENDPOINT: &str = "/api/upload/init";
pub const CHUNK_ENDPOINT: &str = "/api/upload/chunk";
pub const FINALIZE_ENDPOINT: &str = "/api/upload/finalize";
pub const SINGLE_ENDPOINT: &str = "/api/upload-single";

/// Per-chunk retry budget. `max_attempts` counts the first try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based): linear backoff.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: RETRY_BASE_DELAY,
        }
    }
}

/// Client-side cursor over one chunked upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSession {
    upload_id: String,
    total_bytes: u64,
    total_chunks: u64,
    chunk_index: u64,
    retry_count: u32,
}

impl ChunkSession {
    pub fn new(upload_id: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            upload_id: upload_id.into(),
            total_bytes,
            total_chunks: total_chunks(total_bytes),
            chunk_index: 0,
            retry_count: 0,
        }
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Next chunk to send.
    pub fn chunk_index(&self) -> u64 {
        self.chunk_index
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_complete(&self) -> bool {
        self.chunk_index >= self.total_chunks
    }

    /// Byte range of the next chunk.
    pub fn current_range(&self) -> Range<u64> {
        chunk_range(self.chunk_index, self.total_bytes)
    }

    /// Bytes acknowledged so far.
    pub fn bytes_sent(&self) -> u64 {
        chunk_range(self.chunk_index, self.total_bytes).start
    }

    fn record_retry(&mut self) {
        self.retry_count += 1;
    }

    fn advance(&mut self) {
        self.chunk_index += 1;
        self.retry_count = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedUploadResult {
    pub file_name: String,
    /// Backend reference of the assembled file
    pub url: String,
    /// `chunked`, or `single` for the one-request sub-case
    pub upload_method: String,
}

/// Unrecoverable failure of one file. Chunks already accepted are left on the backend.
#[derive(Debug, Error)]
#[error("upload of {file_name} failed: {error}")]
pub struct ChunkedUploadFailure {
    pub file_name: String,
    pub upload_id: Option<String>,
    pub chunks_sent: u64,
    #[source]
    pub error: UploadError,
}

/// Uploads one file at a time, chunks strictly in index order.
#[derive(Debug, Clone)]
pub struct ChunkedUploader {
    http: ProxyHttp,
    retry: RetryPolicy,
}

impl ChunkedUploader {
    pub fn new(http: ProxyHttp, retry: RetryPolicy) -> Self {
        Self { http, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub async fn upload_file(
        &self,
        file: &UploadFile,
        reporter: &dyn ProgressReporter,
    ) -> Result<ChunkedUploadResult, ChunkedUploadFailure> {
        if file.size() <= CHUNK_SIZE {
            return self.upload_single(file, reporter).await.map_err(|error| {
                tracing::error!("Single upload of {} failed: {}", file.name(), error);
                ChunkedUploadFailure {
                    file_name: file.name().to_string(),
                    upload_id: None,
                    chunks_sent: 0,
                    error,
                }
            });
        }

        let init = ChunkInitRequest {
            file_name: file.name().to_string(),
            total_bytes: file.size(),
            total_chunks: total_chunks(file.size()),
        };
        tracing::info!(
            "Chunked upload of {}: {} bytes in {} chunks",
            init.file_name,
            init.total_bytes,
            init.total_chunks
        );
        let init_response: ChunkInitResponse = self
            .http
            .post_json(INIT_ENDPOINT, &init)
            .await
            .map_err(|error| {
                tracing::error!("Init for {} failed: {}", file.name(), error);
                ChunkedUploadFailure {
                    file_name: file.name().to_string(),
                    upload_id: None,
                    chunks_sent: 0,
                    error,
                }
            })?;

        let mut session = ChunkSession::new(init_response.upload_id, file.size());
        match self.run_session(file, &mut session, reporter).await {
            Ok(result) => Ok(result),
            Err(error) => {
                tracing::error!(
                    "Chunked upload of {} aborted at chunk {}/{} (upload {} left unfinalized): {}",
                    file.name(),
                    session.chunk_index(),
                    session.total_chunks(),
                    session.upload_id(),
                    error
                );
                Err(ChunkedUploadFailure {
                    file_name: file.name().to_string(),
                    upload_id: Some(session.upload_id().to_string()),
                    chunks_sent: session.chunk_index(),
                    error,
                })
            }
        }
    }

    async fn run_session(
        &self,
        file: &UploadFile,
        session: &mut ChunkSession,
        reporter: &dyn ProgressReporter,
    ) -> Result<ChunkedUploadResult, UploadError> {
        reporter.report(ProgressSample::new(file.name(), 0, session.total_bytes()));

        while !session.is_complete() {
            let data = file.read_range(session.current_range()).await?;
            self.send_with_retry(file, session, data).await?;
            session.advance();
            reporter.report(ProgressSample::new(
                file.name(),
                session.bytes_sent(),
                session.total_bytes(),
            ));
        }

        let finalize = FinalizeRequest {
            upload_id: session.upload_id().to_string(),
        };
        let finalized: FinalizeResponse = self.http.post_json(FINALIZE_ENDPOINT, &finalize).await?;
        let url = finalized.url;
        tracing::info!("Chunked upload of {} finalized: {}", file.name(), url);

        Ok(ChunkedUploadResult {
            file_name: file.name().to_string(),
            url,
            upload_method: METHOD_CHUNKED.to_string(),
        })
    }

    async fn send_with_retry(
        &self,
        file: &UploadFile,
        session: &mut ChunkSession,
        data: Bytes,
    ) -> Result<ChunkAck, UploadError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.send_chunk(session, data.clone()).await {
                Ok(ack) => {
                    tracing::debug!(
                        "Chunk {}/{} of {} accepted",
                        ack.chunk_index + 1,
                        ack.total_chunks,
                        file.name()
                    );
                    return Ok(ack);
                }
                Err(error) if attempt >= max_attempts => {
                    return Err(UploadError::RetriesExhausted {
                        file_name: file.name().to_string(),
                        chunk_index: session.chunk_index(),
                        attempts: attempt,
                        last_error: Box::new(error),
                    });
                }
                Err(error) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "Chunk {} of {} failed (attempt {}/{}), retrying in {:?}: {}",
                        session.chunk_index(),
                        file.name(),
                        attempt,
                        max_attempts,
                        delay,
                        error
                    );
                    session.record_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_chunk(
        &self,
        session: &ChunkSession,
        data: Bytes,
    ) -> Result<ChunkAck, UploadError> {
        let len = data.len() as u64;
        let form = Form::new()
            .text(chunk_fields::UPLOAD_ID, session.upload_id().to_string())
            .text(chunk_fields::CHUNK_INDEX, session.chunk_index().to_string())
            .part(
                chunk_fields::CHUNK,
                Part::stream_with_length(data, len)
                    .file_name(format!("chunk-{}", session.chunk_index())),
            );
        self.http.post_multipart(CHUNK_ENDPOINT, form).await
    }

    async fn upload_single(
        &self,
        file: &UploadFile,
        reporter: &dyn ProgressReporter,
    ) -> Result<ChunkedUploadResult, UploadError> {
        tracing::info!(
            "Single upload of {} ({} bytes)",
            file.name(),
            file.size()
        );
        reporter.report(ProgressSample::new(file.name(), 0, file.size()));

        let form = Form::new().part(FILES_FIELD, super::direct::file_part(file).await?);
        let body: Value = self.http.post_multipart(SINGLE_ENDPOINT, form).await?;

        let url = single_reference(&body, file.name()).ok_or_else(|| {
            UploadError::InvalidResponse {
                endpoint: SINGLE_ENDPOINT.to_string(),
                message: format!("no reference for {} in {}", file.name(), body),
            }
        })?;
        reporter.report(ProgressSample::complete(file.name(), file.size()));

        Ok(ChunkedUploadResult {
            file_name: file.name().to_string(),
            url,
            upload_method: METHOD_SINGLE.to_string(),
        })
    }
}

/// Reference for a one-file upload: the usual batch shapes, then top-level url fields.
fn single_reference(body: &Value, file_name: &str) -> Option<String> {
    let names = [file_name.to_string()];
    if let Some(url) = extract_file_urls(body, &names).remove(file_name) {
        return Some(url);
    }
    ["url", "file_url", "public_url", "artifact_id"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
