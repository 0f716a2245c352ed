use crate::config::BackendConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::models::{chunk_fields, FILES_FIELD};
use axum::http::StatusCode;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// One file as received from the browser, ready to be re-sent upstream.
#[derive(Debug, Clone)]
pub struct ForwardFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl ForwardFile {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn into_part(self) -> ProxyResult<Part> {
        let len = self.len();
        let part = Part::stream_with_length(self.data, len).file_name(self.name);
        match self.content_type {
            Some(mime) => part.mime_str(&mime).map_err(|e| {
                ProxyError::BadRequest(format!("invalid content type {}: {}", mime, e))
            }),
            None => Ok(part),
        }
    }
}

/// Relay to the proposal service. Every request carries the configured timeout.
pub struct BackendService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    config: BackendConfig,
}

impl BackendService {
    pub fn new(config: BackendConfig) -> ProxyResult<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            ProxyError::Config(format!("invalid backend base url {}: {}", base_url, e))
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            timeout: config.timeout(),
            config,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ProxyResult<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw)
            .map_err(|e| ProxyError::Config(format!("invalid backend url {}: {}", raw, e)))
    }

    /// Sends `files` as one multipart request, every part under the `files` field.
    pub async fn forward_files(&self, path: &str, files: Vec<ForwardFile>) -> ProxyResult<Value> {
        let mut form = Form::new();
        for file in files {
            form = form.part(FILES_FIELD, file.into_part()?);
        }

        let url = self.endpoint(path)?;
        self.send(self.client.post(url).multipart(form), path).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> ProxyResult<Value> {
        let url = self.endpoint(path)?;
        self.send(self.client.post(url).json(body), path).await
    }

    pub async fn forward_chunk(
        &self,
        upload_id: &str,
        chunk_index: u64,
        data: Bytes,
    ) -> ProxyResult<Value> {
        let len = data.len() as u64;
        let form = Form::new()
            .text(chunk_fields::UPLOAD_ID, upload_id.to_string())
            .text(chunk_fields::CHUNK_INDEX, chunk_index.to_string())
            .part(
                chunk_fields::CHUNK,
                Part::stream_with_length(data, len).file_name(format!("chunk-{}", chunk_index)),
            );

        let path = self.config.chunk_path.clone();
        let url = self.endpoint(&path)?;
        self.send(self.client.post(url).multipart(form), &path).await
    }

    pub async fn health(&self) -> ProxyResult<Value> {
        let path = self.config.health_path.clone();
        let url = self.endpoint(&path)?;
        self.send(self.client.get(url), &path).await
    }

    pub async fn generate_proposal(&self, body: &Value) -> ProxyResult<Value> {
        let path = self.config.generate_path.clone();
        self.post_json(&path, body).await
    }

    async fn send(&self, request: reqwest::RequestBuilder, path: &str) -> ProxyResult<Value> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e, path))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        tracing::info!("Backend {} responded with {}", path, status);

        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e, path))?;
        let body = parse_body(&text);

        if !status.is_success() {
            tracing::error!("Backend {} error response: {}", path, text);
            return Err(ProxyError::Backend { status, body });
        }

        Ok(body)
    }

    fn map_transport_error(&self, err: reqwest::Error, path: &str) -> ProxyError {
        if err.is_timeout() {
            tracing::error!("Backend {} timed out after {:?}", path, self.timeout);
            ProxyError::Timeout(self.timeout.as_secs())
        } else {
            tracing::error!("Backend {} request failed: {}", path, err);
            ProxyError::Unreachable(err.to_string())
        }
    }
}

/// JSON when the backend sent JSON, the raw text otherwise, `null` for an empty body.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer, timeout_secs: u64) -> BackendService {
        let mut config = Settings::default().backend;
        config.base_url = format!("{}/", server.uri());
        config.timeout_secs = timeout_secs;
        BackendService::new(config).unwrap()
    }

    #[test]
    fn test_parse_body_variants() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"ok\":true}"), json!({"ok": true}));
        assert_eq!(parse_body("Internal Server Error"), json!("Internal Server Error"));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let mut config = Settings::default().backend;
        config.base_url = "not a url".into();
        assert!(BackendService::new(config).is_err());
    }

    #[tokio::test]
    async fn test_backend_error_body_forwarded_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload_documents"))
            .respond_with(
                ResponseTemplate::new(415).set_body_json(json!({"detail": "Unsupported format"})),
            )
            .mount(&server)
            .await;

        let service = service_for(&server, 5);
        let err = service
            .forward_files(
                "/upload_documents",
                vec![ForwardFile {
                    name: "a.exe".into(),
                    content_type: None,
                    data: Bytes::from_static(b"MZ"),
                }],
            )
            .await
            .unwrap_err();

        match err {
            ProxyError::Backend { status, body } => {
                assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
                assert_eq!(body, json!({"detail": "Unsupported format"}));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut config = Settings::default().backend;
        config.base_url = server.uri();
        let mut service = BackendService::new(config).unwrap();
        service.timeout = Duration::from_millis(200);

        let err = service.health().await.unwrap_err();
        assert!(matches!(err, ProxyError::Timeout(_)), "got {:?}", err);
    }
}
