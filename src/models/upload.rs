use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Multipart field carrying file content on every upload endpoint.
pub const FILES_FIELD: &str = "files";

/// Upload-method tag for the single multipart request path.
pub const METHOD_STANDARD: &str = "standard";
/// Upload-method tag for the init/chunk/finalize path.
pub const METHOD_CHUNKED: &str = "chunked";
/// Upload-method tag for a small file sent alone through `/api/upload-single`.
pub const METHOD_SINGLE: &str = "single";
/// Upload-method tag for an invocation that used more than one path.
pub const METHOD_MIXED: &str = "mixed";

/// Normalized body returned by `POST /api/upload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_urls: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub upload_method: String,
}

/// Body of `POST /api/upload/init`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInitRequest {
    pub file_name: String,
    pub total_bytes: u64,
    pub total_chunks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInitResponse {
    pub upload_id: String,
}

/// Acknowledgement for one accepted chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    pub success: bool,
    pub chunk_index: u64,
    pub received_chunks: u64,
    pub total_chunks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub upload_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalizeResponse {
    pub url: String,
}

/// Error body shared by every proxy endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(default)]
    pub details: Value,
}

/// Multipart field names of `POST /api/upload/chunk`.
pub mod chunk_fields {
    pub const UPLOAD_ID: &str = "uploadId";
    pub const CHUNK_INDEX: &str = "chunkIndex";
    pub const CHUNK: &str = "chunk";
}

/// Builds the `file name -> reference` map out of whatever shape the backend's
/// upload endpoint returned.
///
/// Accepted shapes, first match wins:
/// - `{"file_urls": {"a.pdf": "https://..."}}`
/// - `{"documents": [{"filename": "a.pdf", "public_url": "..."}]}`
/// - `{"artifact_ids": ["..."]}`, zipped with `uploaded_names` in order
pub fn extract_file_urls(body: &Value, uploaded_names: &[String]) -> HashMap<String, String> {
    if let Some(map) = body.get("file_urls").and_then(Value::as_object) {
        return map
            .iter()
            .filter_map(|(name, url)| url.as_str().map(|u| (name.clone(), u.to_string())))
            .collect();
    }

    if let Some(documents) = body.get("documents").and_then(Value::as_array) {
        return documents
            .iter()
            .filter_map(|doc| {
                let name = doc.get("filename")?.as_str()?;
                let reference = ["public_url", "gcs_url", "artifact_id"]
                    .iter()
                    .find_map(|key| doc.get(*key).and_then(Value::as_str))?;
                Some((name.to_string(), reference.to_string()))
            })
            .collect();
    }

    if let Some(ids) = body.get("artifact_ids").and_then(Value::as_array) {
        return uploaded_names
            .iter()
            .zip(ids.iter())
            .filter_map(|(name, id)| id.as_str().map(|id| (name.clone(), id.to_string())))
            .collect();
    }

    HashMap::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_init_request_uses_camel_case() {
        let req = ChunkInitRequest {
            file_name: "budget.xlsx".into(),
            total_bytes: 10,
            total_chunks: 1,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({"fileName": "budget.xlsx", "totalBytes": 10, "totalChunks": 1})
        );
    }

    #[test]
    fn test_extract_file_urls_prefers_explicit_map() {
        let body = json!({
            "file_urls": {"a.pdf": "https://store/a.pdf"},
            "artifact_ids": ["ignored"]
        });
        let urls = extract_file_urls(&body, &["a.pdf".into()]);
        assert_eq!(urls.get("a.pdf").map(String::as_str), Some("https://store/a.pdf"));
    }

    #[test]
    fn test_extract_file_urls_from_documents() {
        let body = json!({
            "documents": [
                {"filename": "a.pdf", "public_url": "https://pub/a.pdf", "gcs_url": "gs://b/a.pdf"},
                {"filename": "b.pdf", "gcs_url": "gs://b/b.pdf"},
                {"filename": "c.pdf"}
            ]
        });
        let urls = extract_file_urls(&body, &[]);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls["a.pdf"], "https://pub/a.pdf");
        assert_eq!(urls["b.pdf"], "gs://b/b.pdf");
    }

    #[test]
    fn test_extract_file_urls_zips_artifact_ids() {
        let body = json!({"success": true, "artifact_ids": ["id-1", "id-2"]});
        let urls = extract_file_urls(&body, &["one.docx".into(), "two.docx".into()]);
        assert_eq!(urls["one.docx"], "id-1");
        assert_eq!(urls["two.docx"], "id-2");
    }
}
