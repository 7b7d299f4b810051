//! Synchronous counterparts of [`crate::api::Client`].
//!
//! Must not be used from inside a tokio runtime.

use reqwest::Method;

use crate::api::ApiError;
use crate::api::client::{ApiRequest, ApiResponse, ClientSettings, default_headers, finish};
use crate::constants::{MAX_CONNECTIONS, USER_AGENT};

#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::blocking::Client,
    settings: ClientSettings,
}

impl Client {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_headers(&settings.token)?)
            .timeout(settings.timeout)
            .pool_max_idle_per_host(MAX_CONNECTIONS)
            .danger_accept_invalid_certs(!settings.verify_ssl);
        if !settings.enable_http2 {
            builder = builder.http1_only();
        }
        Ok(Self {
            http: builder.build().map_err(ApiError::Client)?,
            settings,
        })
    }

    pub fn get(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.send(Method::GET, request, None)
    }

    pub fn post(
        &self,
        request: &ApiRequest,
        data: &serde_json::Value,
    ) -> Result<ApiResponse, ApiError> {
        self.send(Method::POST, request, Some(data))
    }

    pub fn patch(
        &self,
        request: &ApiRequest,
        data: &serde_json::Value,
    ) -> Result<ApiResponse, ApiError> {
        self.send(Method::PATCH, request, Some(data))
    }

    pub fn delete(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.send(Method::DELETE, request, None)
    }

    fn send(
        &self,
        method: Method,
        request: &ApiRequest,
        data: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = request.url(&self.settings.host)?;
        tracing::debug!(%method, %url, "sending request");

        let mut builder = self.http.request(method.clone(), url.clone());
        if let Some(data) = data {
            builder = builder.json(data);
        }
        let wrap = |source| ApiError::Request {
            url: url.to_string(),
            source,
        };
        let response = builder.send().map_err(wrap)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().map_err(wrap)?;
        finish(&method, &url, status, &headers, body)
    }
}
