//! Browser-side half of the upload pipeline.
//!
//! [`UploadClient::upload_files`] is the single entry point: it classifies the
//! selection, sends the direct batch in one request, then each chunked file in
//! turn, and reports per-file progress through a [`ProgressReporter`].

pub mod chunked;
pub mod classifier;
pub mod direct;
pub mod error;
pub mod file;
pub mod http;
pub mod progress;
pub mod task;

pub use chunked::{
    ChunkSession, ChunkedUploadFailure, ChunkedUploadResult, ChunkedUploader, RetryPolicy,
};
pub use classifier::{classify, classify_size, classify_sizes, UploadPlan, UploadStrategy};
pub use direct::{DirectUploadResult, DirectUploader};
pub use error::{UploadError, ValidationError};
pub use file::{FileSource, UploadFile};
pub use http::ProxyHttp;
pub use progress::{NoProgress, ProgressReporter, ProgressSample, ProgressTracker};
pub use task::{UploadStatus, UploadTask};

use crate::models::{METHOD_CHUNKED, METHOD_MIXED, METHOD_STANDARD};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Where the upload proxy is served, e.g. `http://localhost:3000`
    pub proxy_base_url: String,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(proxy_base_url: impl Into<String>) -> Self {
        Self {
            proxy_base_url: proxy_base_url.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Outcome of one [`UploadClient::upload_files`] call.
#[derive(Debug, Clone)]
pub struct UploadReport {
    tasks: Vec<UploadTask>,
    upload_method: String,
}

impl UploadReport {
    /// One task per input file, in input order.
    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    /// `standard`, `chunked` or `mixed`.
    pub fn upload_method(&self) -> &str {
        &self.upload_method
    }

    pub fn uploaded(&self) -> impl Iterator<Item = &UploadTask> {
        self.tasks
            .iter()
            .filter(|t| t.status() == UploadStatus::Uploaded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &UploadTask> {
        self.tasks
            .iter()
            .filter(|t| t.status() == UploadStatus::Failed)
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }

    /// References of the files that made it, keyed by file name.
    pub fn file_urls(&self) -> HashMap<String, String> {
        self.uploaded()
            .filter_map(|t| {
                t.remote_reference()
                    .map(|url| (t.file_name().to_string(), url.to_string()))
            })
            .collect()
    }

    /// Human-readable message naming every failed file, `None` when nothing failed.
    pub fn error_summary(&self) -> Option<String> {
        let failures: Vec<String> = self
            .failed()
            .map(|t| {
                format!(
                    "{}: {}",
                    t.file_name(),
                    t.error().unwrap_or("unknown error")
                )
            })
            .collect();
        if failures.is_empty() {
            return None;
        }
        Some(format!(
            "{} of {} files failed to upload. {}",
            failures.len(),
            self.tasks.len(),
            failures.join("; ")
        ))
    }
}

/// Constructed once and shared; clones reuse the same connection pool.
#[derive(Debug, Clone)]
pub struct UploadClient {
    direct: DirectUploader,
    chunked: ChunkedUploader,
}

impl UploadClient {
    pub fn new(config: ClientConfig) -> Result<Self, UploadError> {
        let http = ProxyHttp::new(&config.proxy_base_url)?;
        Ok(Self {
            direct: DirectUploader::new(http.clone()),
            chunked: ChunkedUploader::new(http, config.retry),
        })
    }

    pub fn classify(&self, files: &[UploadFile]) -> Result<UploadPlan, ValidationError> {
        classify(files)
    }

    /// Uploads `files`, direct batch first and then each chunked file in turn.
    ///
    /// Only a validation failure is returned as `Err`, before any request is
    /// made. Transfer failures are recorded per file in the report so the
    /// caller can carry on with the files that succeeded.
    pub async fn upload_files(
        &self,
        files: &[UploadFile],
        reporter: &dyn ProgressReporter,
    ) -> Result<UploadReport, UploadError> {
        let plan = classify(files)?;
        let mut tasks: Vec<UploadTask> = files
            .iter()
            .zip(plan.strategies())
            .map(|(file, strategy)| UploadTask::new(file.name(), file.size(), *strategy))
            .collect();

        let direct = plan.indices(UploadStrategy::Direct);
        let chunked = plan.indices(UploadStrategy::Chunked);
        tracing::info!(
            "Uploading {} files ({} bytes): {} direct, {} chunked",
            files.len(),
            plan.total_bytes(),
            direct.len(),
            chunked.len()
        );

        if !direct.is_empty() {
            self.run_direct(files, &direct, &mut tasks, reporter).await;
        }
        for index in chunked {
            self.run_chunked(&files[index], &mut tasks[index], reporter)
                .await;
        }

        let upload_method = if direct.is_empty() {
            METHOD_CHUNKED
        } else if plan.indices(UploadStrategy::Chunked).is_empty() {
            METHOD_STANDARD
        } else {
            METHOD_MIXED
        };

        let report = UploadReport {
            tasks,
            upload_method: upload_method.to_string(),
        };
        match report.error_summary() {
            Some(summary) => tracing::warn!("{}", summary),
            None => tracing::info!("All {} files uploaded", report.tasks.len()),
        }
        Ok(report)
    }

    async fn run_direct(
        &self,
        files: &[UploadFile],
        indices: &[usize],
        tasks: &mut [UploadTask],
        reporter: &dyn ProgressReporter,
    ) {
        let batch: Vec<&UploadFile> = indices.iter().map(|&i| &files[i]).collect();
        for &i in indices {
            tasks[i].start();
        }

        match self.direct.upload(&batch, reporter).await {
            Ok(result) => {
                for &i in indices {
                    let task = &mut tasks[i];
                    match result.file_urls.get(task.file_name()) {
                        Some(url) => task.succeed(url.clone(), result.upload_method.clone()),
                        None => task.fail(format!(
                            "upload accepted but no reference returned for {}",
                            task.file_name()
                        )),
                    }
                }
            }
            Err(error) => {
                tracing::error!("Direct upload of {} files failed: {}", batch.len(), error);
                let message = error.to_string();
                for &i in indices {
                    tasks[i].fail(message.clone());
                }
            }
        }
    }

    async fn run_chunked(
        &self,
        file: &UploadFile,
        task: &mut UploadTask,
        reporter: &dyn ProgressReporter,
    ) {
        task.start();
        let tracked = TaskProgress {
            inner: reporter,
            progress: std::sync::Mutex::new(0),
        };
        let outcome = self.chunked.upload_file(file, &tracked).await;
        task.set_progress(tracked.last());

        match outcome {
            Ok(result) => task.succeed(result.url, result.upload_method),
            Err(failure) => task.fail(failure.to_string()),
        }
    }
}

/// Forwards samples while remembering the last percentage for the task record.
struct TaskProgress<'a> {
    inner: &'a dyn ProgressReporter,
    progress: std::sync::Mutex<u8>,
}

impl TaskProgress<'_> {
    fn last(&self) -> u8 {
        self.progress.lock().map(|p| *p).unwrap_or(0)
    }
}

impl ProgressReporter for TaskProgress<'_> {
    fn report(&self, sample: ProgressSample) {
        if let Ok(mut progress) = self.progress.lock() {
            *progress = sample.percent;
        }
        self.inner.report(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str, status: UploadStatus) -> UploadTask {
        let mut task = UploadTask::new(name, 10, UploadStrategy::Direct);
        task.start();
        match status {
            UploadStatus::Uploaded => task.succeed(format!("gs://b/{}", name), METHOD_STANDARD),
            UploadStatus::Failed => task.fail("rejected"),
            _ => {}
        }
        task
    }

    #[test]
    fn test_report_subsets_and_summary() {
        let report = UploadReport {
            tasks: vec![
                task("a.pdf", UploadStatus::Uploaded),
                task("b.pdf", UploadStatus::Failed),
                task("c.pdf", UploadStatus::Uploaded),
            ],
            upload_method: METHOD_STANDARD.to_string(),
        };

        assert_eq!(report.uploaded().count(), 2);
        assert_eq!(report.failed().count(), 1);
        assert!(!report.all_succeeded());
        assert_eq!(
            report.file_urls().get("c.pdf").map(String::as_str),
            Some("gs://b/c.pdf")
        );
        assert_eq!(
            report.error_summary().as_deref(),
            Some("1 of 3 files failed to upload. b.pdf: rejected")
        );
    }

    #[test]
    fn test_invalid_proxy_url() {
        assert!(matches!(
            UploadClient::new(ClientConfig::new("not a url")),
            Err(UploadError::InvalidConfig(_))
        ));
    }
}
