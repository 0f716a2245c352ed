use super::error::UploadError;
use super::file::UploadFile;
use super::http::ProxyHttp;
use super::progress::{ProgressReporter, ProgressSample};
use crate::models::{UploadResponse, FILES_FIELD, METHOD_STANDARD};
use crate::utils::describe_files;
use reqwest::multipart::{Form, Part};
use std::collections::HashMap;

pub const UPLOAD_ENDPOINT: &str = "/api/upload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectUploadResult {
    /// Original file name -> backend reference
    pub file_urls: HashMap<String, String>,
    pub message: Option<String>,
    pub upload_method: String,
}

/// Sends a whole batch in one multipart request.
///
/// All or nothing: a non-success answer fails the batch, and nothing is retried
/// here. Re-invoke to try again.
#[derive(Debug, Clone)]
pub struct DirectUploader {
    http: ProxyHttp,
}

impl DirectUploader {
    pub fn new(http: ProxyHttp) -> Self {
        Self { http }
    }

    pub async fn upload(
        &self,
        files: &[&UploadFile],
        reporter: &dyn ProgressReporter,
    ) -> Result<DirectUploadResult, UploadError> {
        tracing::info!(
            "Direct upload of {} files: {}",
            files.len(),
            describe_files(files.iter().map(|f| (f.name(), f.size())))
        );

        let mut form = Form::new();
        for file in files {
            reporter.report(ProgressSample::new(file.name(), 0, file.size()));
            form = form.part(FILES_FIELD, file_part(file).await?);
        }

        let response: UploadResponse = self.http.post_multipart(UPLOAD_ENDPOINT, form).await?;
        if !response.success {
            return Err(UploadError::InvalidResponse {
                endpoint: UPLOAD_ENDPOINT.to_string(),
                message: response
                    .message
                    .unwrap_or_else(|| "upload reported success=false".to_string()),
            });
        }

        let file_urls = response.file_urls.unwrap_or_default();
        tracing::info!(
            "Direct upload accepted, {} references returned",
            file_urls.len()
        );
        for file in files {
            if file_urls.contains_key(file.name()) {
                reporter.report(ProgressSample::complete(file.name(), file.size()));
            }
        }

        Ok(DirectUploadResult {
            file_urls,
            message: response.message,
            upload_method: if response.upload_method.is_empty() {
                METHOD_STANDARD.to_string()
            } else {
                response.upload_method
            },
        })
    }
}

pub(crate) async fn file_part(file: &UploadFile) -> Result<Part, UploadError> {
    let data = file.read_all().await?;
    let len = data.len() as u64;
    Part::stream_with_length(data, len)
        .file_name(file.name().to_string())
        .mime_str(file.mime_type())
        .map_err(|e| {
            UploadError::InvalidConfig(format!(
                "invalid MIME type {} for {}: {}",
                file.mime_type(),
                file.name(),
                e
            ))
        })
}
