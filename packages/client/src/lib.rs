#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Typed client for the world map backend HTTP API.
//!
//! All network access goes through the [`Backend`] trait. The production
//! implementation is [`http::HttpBackend`] (reqwest); tests substitute
//! scripted backends. [`ApiClient`] layers the typed endpoints and the
//! `{success, data}` envelope handling on top.
//!
//! Requests are never retried: a failure is reported once to the caller,
//! which decides how to degrade.

pub mod api;
pub mod config;
pub mod http;

use async_trait::async_trait;
use thiserror::Error;
use world_map_models::QueryParams;

pub use api::{ApiClient, CityQuery};
pub use config::{ClientConfig, ConfigError};

/// Errors from backend requests.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connection refused, timeout, TLS, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error text extracted from the body, or a body preview.
        message: String,
    },

    /// The backend reported `success: false`.
    #[error("Backend error: {message}")]
    Backend {
        /// Error text supplied by the backend.
        message: String,
    },

    /// The response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw access to the backend API.
///
/// `path` is relative to the API base URL and starts with `/`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Performs a GET and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failure, non-success status or
    /// an unparseable body.
    async fn get_json(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<serde_json::Value, ClientError>;

    /// Performs a GET and returns the raw body bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failure or non-success status.
    async fn get_bytes(&self, path: &str, query: &QueryParams) -> Result<Vec<u8>, ClientError>;
}
