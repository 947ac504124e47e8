//! reqwest-backed [`Backend`] implementation.

use async_trait::async_trait;
use world_map_models::QueryParams;

use crate::{Backend, ClientConfig, ClientError};

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 300;

/// Talks to the real backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Builds a backend from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built
    /// (e.g. TLS backend initialisation fails).
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Joins `path` onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends a GET and returns the response if its status is 2xx.
    async fn send(&self, path: &str, query: &QueryParams) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        log::debug!("GET {url}?{query}");

        let response = self
            .client
            .get(&url)
            .query(query.as_pairs())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        log::warn!("GET {url} failed with HTTP {status}: {message}");

        Err(ClientError::Status {
            url,
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_json(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<serde_json::Value, ClientError> {
        let text = self.send(path, query).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_bytes(&self, path: &str, query: &QueryParams) -> Result<Vec<u8>, ClientError> {
        let bytes = self.send(path, query).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Extracts the backend's error text from a failed response body.
///
/// The backend usually answers failures with `{"error": ..., "message": ...}`;
/// anything else is reduced to a short preview.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let field = |name: &str| value.get(name).and_then(serde_json::Value::as_str);
        match (field("error"), field("message")) {
            (Some(error), Some(message)) => return format!("{error}: {message}"),
            (Some(text), None) | (None, Some(text)) => return text.to_string(),
            (None, None) => {}
        }
    }

    if body.is_empty() {
        return "empty response body".to_string();
    }
    let mut end = body.len().min(BODY_PREVIEW_LEN);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    if end < body.len() {
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
