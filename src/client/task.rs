use super::classifier::UploadStrategy;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Uploaded | UploadStatus::Failed)
    }
}

/// Per-file tracking record for one invocation.
///
/// Status only moves forward: `pending -> uploading -> uploaded | failed`.
/// The strategy is fixed when the task is created.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTask {
    file_name: String,
    size: u64,
    strategy: UploadStrategy,
    status: UploadStatus,
    progress: u8,
    remote_reference: Option<String>,
    error: Option<String>,
    upload_method: Option<String>,
}

impl UploadTask {
    pub fn new(file_name: impl Into<String>, size: u64, strategy: UploadStrategy) -> Self {
        Self {
            file_name: file_name.into(),
            size,
            strategy,
            status: UploadStatus::Pending,
            progress: 0,
            remote_reference: None,
            error: None,
            upload_method: None,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn strategy(&self) -> UploadStrategy {
        self.strategy
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Backend reference, set once the file is uploaded.
    pub fn remote_reference(&self) -> Option<&str> {
        self.remote_reference.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Path the file actually travelled: `standard`, `chunked` or `single`.
    pub fn upload_method(&self) -> Option<&str> {
        self.upload_method.as_deref()
    }

    pub fn start(&mut self) {
        if self.status == UploadStatus::Pending {
            self.status = UploadStatus::Uploading;
        }
    }

    pub fn set_progress(&mut self, percent: u8) {
        if !self.status.is_terminal() {
            self.progress = self.progress.max(percent.min(100));
        }
    }

    pub fn succeed(&mut self, reference: impl Into<String>, upload_method: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = UploadStatus::Uploaded;
        self.progress = 100;
        self.remote_reference = Some(reference.into());
        self.upload_method = Some(upload_method.into());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = UploadStatus::Failed;
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_lifecycle() {
        let mut task = UploadTask::new("budget.xlsx", 1024, UploadStrategy::Direct);
        assert_eq!(task.status(), UploadStatus::Pending);

        task.start();
        task.set_progress(40);
        task.set_progress(20);
        assert_eq!(task.status(), UploadStatus::Uploading);
        assert_eq!(task.progress(), 40);

        task.succeed("gs://bucket/budget.xlsx", "standard");
        assert_eq!(task.status(), UploadStatus::Uploaded);
        assert_eq!(task.progress(), 100);
        assert_eq!(task.remote_reference(), Some("gs://bucket/budget.xlsx"));
        assert_eq!(task.upload_method(), Some("standard"));
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut task = UploadTask::new("video.mp4", 10, UploadStrategy::Chunked);
        task.start();
        task.fail("chunk 3 failed");
        task.succeed("late", "chunked");
        task.start();

        assert_eq!(task.status(), UploadStatus::Failed);
        assert_eq!(task.error(), Some("chunk 3 failed"));
        assert_eq!(task.remote_reference(), None);
        assert_eq!(task.strategy(), UploadStrategy::Chunked);
    }
}
