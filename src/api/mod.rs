//! eLabFTW REST API v2 access.
//!
//! [`endpoint`] holds the whitelist of endpoint names, [`client`] the async
//! request wrappers and fan-out, [`blocking`] the synchronous wrappers used
//! by the one-shot CLI commands.

pub mod blocking;
pub mod client;
pub mod endpoint;

pub use client::{ApiRequest, ApiResponse, Client, ClientSettings, fan_out_get, fan_out_get_until};
pub use endpoint::Endpoint;

use thiserror::Error;

/// Errors from building or sending API requests.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unsupported endpoint {name:?}; supported endpoints: {supported}")]
    UnsupportedEndpoint { name: String, supported: String },

    #[error("endpoint {endpoint:?} has no sub-endpoint {name:?}; supported: {supported}")]
    UnsupportedSubEndpoint {
        endpoint: String,
        name: String,
        supported: String,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("response from {url} is not valid JSON: {reason}")]
    NotJson { url: String, reason: String },

    #[error("interrupted")]
    Interrupted,

    #[error("request task failed: {0}")]
    Task(String),
}

impl ApiError {
    /// Timeouts and connection failures; worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Request { source, .. } => source.is_timeout() || source.is_connect(),
            _ => false,
        }
    }

    /// The HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
