//! Async request wrappers and bounded fan-out over `reqwest`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LOCATION};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::api::ApiError;
use crate::api::endpoint::Endpoint;
use crate::config::{ApiToken, Settings};
use crate::constants::{MAX_CONNECTIONS, USER_AGENT};

/// One API call: `{host}/{endpoint}[/{id}[/{sub}[/{sub_id}]]]?query`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiRequest {
    pub endpoint: String,
    pub id: Option<String>,
    pub sub: Option<String>,
    pub sub_id: Option<String>,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_sub(mut self, sub: impl Into<String>, sub_id: Option<String>) -> Self {
        self.sub = Some(sub.into());
        self.sub_id = sub_id;
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Check the endpoint whitelist and the id/sub nesting.
    pub fn validate(&self) -> Result<(), ApiError> {
        let endpoint = Endpoint::parse(&self.endpoint)?;
        if let Some(sub) = &self.sub {
            endpoint.validate_sub(sub)?;
            if self.id.is_none() {
                return Err(ApiError::InvalidRequest(format!(
                    "sub-endpoint {sub:?} requires an id"
                )));
            }
        }
        if self.sub_id.is_some() && self.sub.is_none() {
            return Err(ApiError::InvalidRequest(
                "a sub-endpoint id requires a sub-endpoint".to_string(),
            ));
        }
        Ok(())
    }

    pub fn url(&self, host: &str) -> Result<Url, ApiError> {
        self.validate()?;

        let mut raw = format!("{}/{}", host.trim_end_matches('/'), self.endpoint);
        for segment in [&self.id, &self.sub, &self.sub_id].into_iter().flatten() {
            raw.push('/');
            raw.push_str(segment.trim_matches('/'));
        }
        let mut url = Url::parse(&raw)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid URL {raw:?}: {e}")))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }
}

/// A completed request with a 2xx status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub url: String,
    pub status: u16,
    /// `Location` header; POST returns the new resource here.
    pub location: Option<String>,
    pub body: String,
}

impl ApiResponse {
    pub fn json(&self) -> Result<serde_json::Value, ApiError> {
        self.json_as()
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::NotJson {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }

    /// The trailing path segment of `Location`, usually the new id.
    pub fn created_id(&self) -> Option<&str> {
        self.location
            .as_deref()
            .and_then(|loc| loc.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
    }
}

/// Connection parameters, taken from validated [`Settings`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub host: String,
    pub token: ApiToken,
    pub timeout: Duration,
    pub verify_ssl: bool,
    pub enable_http2: bool,
}

impl From<&Settings> for ClientSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            token: settings.api_token.clone(),
            timeout: settings.timeout,
            verify_ssl: settings.verify_ssl,
            enable_http2: settings.enable_http2,
        }
    }
}

pub(crate) fn default_headers(token: &ApiToken) -> Result<HeaderMap, ApiError> {
    let mut auth = HeaderValue::from_str(token.expose()).map_err(|_| {
        ApiError::InvalidRequest("api_token contains characters not allowed in a header".into())
    })?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Ok(headers)
}

pub(crate) fn finish(
    method: &Method,
    url: &Url,
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
) -> Result<ApiResponse, ApiError> {
    if !status.is_success() {
        return Err(ApiError::Status {
            method: method.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(ApiResponse {
        url: url.to_string(),
        status: status.as_u16(),
        location: headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    })
}

/// Async eLabFTW client. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    settings: Arc<ClientSettings>,
}

impl Client {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_headers(&settings.token)?)
            .timeout(settings.timeout)
            .pool_max_idle_per_host(MAX_CONNECTIONS)
            .danger_accept_invalid_certs(!settings.verify_ssl);
        if !settings.enable_http2 {
            builder = builder.http1_only();
        }
        let http = builder.build().map_err(ApiError::Client)?;
        Ok(Self {
            http,
            settings: Arc::new(settings),
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub async fn get(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.send(Method::GET, request, None).await
    }

    pub async fn post(
        &self,
        request: &ApiRequest,
        data: &serde_json::Value,
    ) -> Result<ApiResponse, ApiError> {
        self.send(Method::POST, request, Some(data)).await
    }

    pub async fn patch(
        &self,
        request: &ApiRequest,
        data: &serde_json::Value,
    ) -> Result<ApiResponse, ApiError> {
        self.send(Method::PATCH, request, Some(data)).await
    }

    pub async fn delete(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.send(Method::DELETE, request, None).await
    }

    async fn send(
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
        let response = builder.send().await.map_err(wrap)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(wrap)?;
        finish(&method, &url, status, &headers, body)
    }
}

/// Run independent GETs concurrently, at most `limit` in flight.
///
/// The first failure, or Ctrl-C, aborts everything still running.
/// Results come back in completion order.
pub async fn fan_out_get(
    client: &Client,
    requests: Vec<ApiRequest>,
    limit: usize,
) -> Result<Vec<(ApiRequest, ApiResponse)>, ApiError> {
    let ctrl_c = async {
        // without a signal handler the fan-out just runs to completion
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    fan_out_get_until(client, requests, limit, ctrl_c).await
}

/// [`fan_out_get`] with a custom interrupt: when `interrupt` completes
/// first, outstanding requests are aborted and [`ApiError::Interrupted`]
/// is returned.
pub async fn fan_out_get_until(
    client: &Client,
    requests: Vec<ApiRequest>,
    limit: usize,
    interrupt: impl Future<Output = ()>,
) -> Result<Vec<(ApiRequest, ApiResponse)>, ApiError> {
    let semaphore = Arc::new(Semaphore::new(limit.clamp(1, MAX_CONNECTIONS)));
    let mut join_set = JoinSet::new();

    for request in requests {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| ApiError::Task(e.to_string()))?;
            let response = client.get(&request).await?;
            Ok::<_, ApiError>((request, response))
        });
    }

    let collect = async {
        let mut responses = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(pair)) => responses.push(pair),
                Ok(Err(err)) => return Err(err),
                Err(err) => return Err(ApiError::Task(err.to_string())),
            }
        }
        Ok(responses)
    };

    let outcome = tokio::select! {
        result = collect => result,
        () = interrupt => {
            tracing::warn!("interrupted, cancelling outstanding requests");
            Err(ApiError::Interrupted)
        }
    };
    join_set.abort_all();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const HOST: &str = "https://elab.example.org/api/v2";

    #[test]
    fn url_plain_endpoint() {
        let url = ApiRequest::new("users").url(HOST).unwrap();
        assert_eq!(url.as_str(), "https://elab.example.org/api/v2/users");
    }

    #[test]
    fn url_full_nesting_and_query() {
        let url = ApiRequest::new("experiments")
            .with_id(12)
            .with_sub("steps", Some("3".into()))
            .with_query("limit", "5")
            .url(&format!("{HOST}/"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://elab.example.org/api/v2/experiments/12/steps/3?limit=5"
        );
    }

    #[test]
    fn sub_without_id_is_rejected() {
        let err = ApiRequest::new("items")
            .with_sub("tags", None)
            .url(HOST)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn unknown_endpoint_fails_before_url() {
        let err = ApiRequest::new("nope").url(HOST).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedEndpoint { .. }));
    }

    #[test]
    fn response_json_and_created_id() {
        let response = ApiResponse {
            url: format!("{HOST}/items"),
            status: 201,
            location: Some(format!("{HOST}/items/42")),
            body: "{\"id\": 42}".into(),
        };
        assert_eq!(response.created_id(), Some("42"));
        assert_eq!(response.json().unwrap()["id"], 42);

        let broken = ApiResponse {
            body: "<html>".into(),
            ..response
        };
        assert!(matches!(broken.json(), Err(ApiError::NotJson { .. })));
    }

    /// Read headers plus a `content-length` body.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    /// Serves `count` connections, answering each with `body` and echoing
    /// the request line and headers back through the returned handle.
    async fn canned_server(
        status_line: &'static str,
        body: &'static str,
        count: usize,
    ) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..count {
                let (mut socket, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut socket).await);
                let reply = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\nlocation: /api/v2/items/7\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
            }
            seen
        });
        (format!("http://{addr}/api/v2"), handle)
    }

    fn test_client(host: String) -> Client {
        Client::new(ClientSettings {
            host,
            token: ApiToken::new("3-secret-token"),
            timeout: Duration::from_secs(5),
            verify_ssl: true,
            enable_http2: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn get_sends_auth_and_accept_headers() {
        let (host, server) = canned_server("200 OK", "[{\"userid\": 1}]", 1).await;
        let client = test_client(host);
        let response = client.get(&ApiRequest::new("users")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.json().unwrap()[0]["userid"], 1);

        let requests = server.await.unwrap();
        let raw = requests[0].to_lowercase();
        assert!(raw.starts_with("get /api/v2/users "));
        assert!(raw.contains("authorization: 3-secret-token"));
        assert!(raw.contains("accept: application/json"));
        assert!(raw.contains("user-agent: elapi/"));
    }

    #[tokio::test]
    async fn post_returns_location() {
        let (host, _server) = canned_server("201 Created", "", 1).await;
        let client = test_client(host);
        let response = client
            .post(&ApiRequest::new("items"), &serde_json::json!({"title": "x"}))
            .await
            .unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.created_id(), Some("7"));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (host, _server) = canned_server("404 Not Found", "{\"code\": 404}", 1).await;
        let client = test_client(host);
        let err = client
            .get(&ApiRequest::new("items").with_id(999))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn fan_out_collects_every_response() {
        let (host, _server) = canned_server("200 OK", "{}", 3).await;
        let client = test_client(host);
        let requests = (1..=3)
            .map(|id| ApiRequest::new("users").with_id(id))
            .collect();
        let mut responses = fan_out_get(&client, requests, 2).await.unwrap();
        responses.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        let ids: Vec<_> = responses.iter().map(|(r, _)| r.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn fan_out_stops_on_first_error() {
        let (host, _server) = canned_server("500 Internal Server Error", "oops", 1).await;
        let client = test_client(host);
        let err = fan_out_get(&client, vec![ApiRequest::new("teams")], 4)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn fan_out_interrupt_cancels_pending_requests() {
        // accepts connections but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = test_client(format!("http://{addr}/api/v2"));
        let requests = (1..=3)
            .map(|id| ApiRequest::new("users").with_id(id))
            .collect();
        let interrupt = tokio::time::sleep(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = fan_out_get_until(&client, requests, 2, interrupt)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Interrupted));
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
