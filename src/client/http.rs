use super::error::UploadError;
use crate::models::{ErrorBody, PROXY_TIMEOUT};
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Thin reqwest wrapper shared by the direct and chunked clients.
#[derive(Debug, Clone)]
pub struct ProxyHttp {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ProxyHttp {
    pub fn new(base_url: &str) -> Result<Self, UploadError> {
        Self::with_timeout(base_url, PROXY_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, UploadError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            UploadError::InvalidConfig(format!("invalid proxy base url {}: {}", base_url, e))
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T, UploadError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.url(endpoint)).json(body);
        self.send(request, endpoint).await
    }

    pub async fn post_multipart<T>(&self, endpoint: &str, form: Form) -> Result<T, UploadError>
    where
        T: DeserializeOwned,
    {
        let request = self.client.post(self.url(endpoint)).multipart(form);
        self.send(request, endpoint).await
    }

    async fn send<T>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<T, UploadError>
    where
        T: DeserializeOwned,
    {
        let transport = |source| UploadError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        tracing::debug!("{} responded with {}", endpoint, status);

        if !status.is_success() {
            return Err(proxy_error(endpoint, status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| UploadError::InvalidResponse {
            endpoint: endpoint.to_string(),
            message: format!("{}: {}", e, text),
        })
    }
}

/// Builds the error for a non-success answer, keeping the proxy's diagnostic body.
fn proxy_error(endpoint: &str, status: u16, text: &str) -> UploadError {
    let (message, details) = match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => (body.error, body.details),
        Err(_) => {
            let raw = serde_json::from_str::<Value>(text)
                .unwrap_or_else(|_| Value::String(text.to_string()));
            let message = if text.trim().is_empty() {
                format!("request failed with status {}", status)
            } else {
                text.trim().to_string()
            };
            (message, raw)
        }
    };
    UploadError::Proxy {
        endpoint: endpoint.to_string(),
        status,
        message,
        details,
    }
}
