use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crux_http::Http;

use crate::event::Event;
use crate::{
    HISTORY_PATH, HISTORY_TIMEOUT, LOGIN_PATH, LOGIN_TIMEOUT, NOTIFY_PATH, NOTIFY_TIMEOUT,
    PREDICT_PATH, PREDICT_TIMEOUT,
};

pub type HttpCapability = Http<Event>;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;
pub const MAX_RESPONSE_BODY_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Backend root every endpoint path is appended to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendUrl(String);

impl Default for BackendUrl {
    fn default() -> Self {
        Self(DEFAULT_BACKEND_URL.to_string())
    }
}

impl BackendUrl {
    pub fn parse(raw: &str) -> Result<Self, HttpError> {
        let raw = raw.trim();
        let invalid = |reason: &str| HttpError::InvalidUrl {
            url: truncate(raw),
            reason: reason.to_string(),
        };

        if raw.len() > MAX_URL_LENGTH {
            return Err(invalid("URL exceeds maximum length"));
        }
        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("only http and https are supported"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed"));
        }

        Ok(Self(url.as_str().trim_end_matches('/').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute URL of `path`, keeping any prefix the base carries.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

fn truncate(value: &str) -> String {
    if value.len() <= 100 {
        value.to_string()
    } else {
        let cut = (0..=100)
            .rev()
            .find(|i| value.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}...", &value[..cut])
    }
}

/// Per-endpoint deadline. Unknown paths get the default.
pub fn timeout_for(url: &str) -> Duration {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();

    [
        (LOGIN_PATH, LOGIN_TIMEOUT),
        (PREDICT_PATH, PREDICT_TIMEOUT),
        (HISTORY_PATH, HISTORY_TIMEOUT),
        (NOTIFY_PATH, NOTIFY_TIMEOUT),
    ]
    .into_iter()
    .find(|(endpoint, _)| path.ends_with(endpoint))
    .map_or(Duration::from_millis(DEFAULT_TIMEOUT_MS), |(_, timeout)| timeout)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    pub fn is_idempotent(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

/// One call to the backend, built up before it is handed to [`Http`].
pub struct ApiRequest {
    method: HttpMethod,
    url: String,
    bearer: Option<String>,
    body: Option<Vec<u8>>,
    request_id: String,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, backend: &BackendUrl, path: &str) -> Self {
        Self {
            method,
            url: backend.endpoint(path),
            bearer: None,
            body: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn get(backend: &BackendUrl, path: &str) -> Self {
        Self::new(HttpMethod::Get, backend, path)
    }

    pub fn post(backend: &BackendUrl, path: &str) -> Self {
        Self::new(HttpMethod::Post, backend, path)
    }

    #[must_use]
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.bearer = Some(format!("Bearer {token}"));
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, HttpError> {
        if !matches!(self.method, HttpMethod::Post) {
            return Err(HttpError::Request {
                reason: format!("{} requests cannot have a body", self.method.as_str()),
            });
        }

        let body = serde_json::to_vec(value).map_err(|e| HttpError::Request {
            reason: format!("failed to encode body: {e}"),
        })?;
        if body.len() > MAX_REQUEST_BODY_SIZE {
            return Err(HttpError::Request {
                reason: format!(
                    "body of {} bytes exceeds maximum of {MAX_REQUEST_BODY_SIZE} bytes",
                    body.len()
                ),
            });
        }

        self.body = Some(body);
        Ok(self)
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Hand the request to the shell. Every outcome, including non-2xx
    /// statuses, comes back through `make_event` as an [`HttpResult`].
    pub fn send<F>(self, http: &Http<Event>, make_event: F)
    where
        F: FnOnce(HttpResult) -> Event + Send + 'static,
    {
        let mut builder = match self.method {
            HttpMethod::Get => http.get(self.url.as_str()),
            HttpMethod::Post => http.post(self.url.as_str()),
        }
        .header(REQUEST_ID_HEADER, self.request_id.as_str());

        if let Some(bearer) = &self.bearer {
            builder = builder.header("Authorization", bearer.as_str());
        }
        if let Some(body) = self.body {
            builder = builder
                .body_bytes(body)
                .header("Content-Type", "application/json");
        }

        builder.send(move |result| make_event(HttpResponse::from_crux(result)));
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid request: {reason}")]
    Request { reason: String },

    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error("request timed out")]
    Timeout,

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl HttpError {
    /// Failures of the network itself rather than of the request we built.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HttpError::Connection { .. } | HttpError::Timeout | HttpError::InvalidResponse { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, HttpError::Connection { .. } | HttpError::Timeout)
    }
}

/// Status and body of a completed exchange, whatever the status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Fold `crux_http`'s outcome into a response. Error statuses are still
    /// responses; only transport failures become errors.
    pub fn from_crux(result: crux_http::Result<crux_http::Response<Vec<u8>>>) -> HttpResult {
        match result {
            Ok(mut response) => Ok(Self::new(
                u16::from(response.status()),
                response.take_body().unwrap_or_default(),
            )),
            Err(crux_http::HttpError::Http { code, body, .. }) => {
                Ok(Self::new(u16::from(code), body.unwrap_or_default()))
            }
            Err(crux_http::HttpError::Timeout) => Err(HttpError::Timeout),
            Err(crux_http::HttpError::Json(reason)) => Err(HttpError::InvalidResponse { reason }),
            Err(other) => Err(HttpError::Connection {
                message: other.to_string(),
            }),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        if self.body.len() > MAX_RESPONSE_BODY_SIZE {
            return Err(HttpError::InvalidResponse {
                reason: format!("body exceeds {MAX_RESPONSE_BODY_SIZE} bytes"),
            });
        }
        serde_json::from_slice(&self.body).map_err(|e| HttpError::InvalidResponse {
            reason: format!("failed to parse JSON: {e}"),
        })
    }
}

pub type HttpOutput = HttpResponse;
pub type HttpResult = Result<HttpResponse, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_url_validation() {
        assert!(BackendUrl::parse("http://localhost:8001").is_ok());
        assert!(BackendUrl::parse(" https://backend.example/ ").is_ok());
        assert!(BackendUrl::parse("").is_err());
        assert!(BackendUrl::parse("ftp://backend.example").is_err());
        assert!(BackendUrl::parse("https://backend.example/?q=1").is_err());
        assert!(matches!(
            BackendUrl::parse("not a url"),
            Err(HttpError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_endpoint_keeps_base_prefix() {
        let base = BackendUrl::parse("https://backend.example").unwrap();
        assert_eq!(
            base.endpoint(LOGIN_PATH),
            "https://backend.example/api/auth/login"
        );

        let prefixed = BackendUrl::parse("https://backend.example/v2/").unwrap();
        assert_eq!(
            prefixed.endpoint(LOGIN_PATH),
            "https://backend.example/v2/api/auth/login"
        );
    }

    #[test]
    fn test_default_backend_is_local() {
        assert_eq!(
            BackendUrl::default().endpoint(PREDICT_PATH),
            "http://localhost:8001/api/predict"
        );
    }

    #[test]
    fn test_timeouts_follow_endpoint() {
        let base = BackendUrl::default();
        assert_eq!(timeout_for(&base.endpoint(HISTORY_PATH)), HISTORY_TIMEOUT);
        assert_eq!(timeout_for(&base.endpoint(NOTIFY_PATH)), NOTIFY_TIMEOUT);
        assert_eq!(timeout_for(&base.endpoint(LOGIN_PATH)), LOGIN_TIMEOUT);
        assert_eq!(
            timeout_for("http://localhost:8001/other"),
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        );
    }

    #[test]
    fn test_get_cannot_carry_body() {
        let result = ApiRequest::get(&BackendUrl::default(), HISTORY_PATH)
            .with_json(&serde_json::json!({"a": 1}));
        assert!(matches!(result, Err(HttpError::Request { .. })));
    }

    #[test]
    fn test_request_ids_are_unique() {
        let base = BackendUrl::default();
        let a = ApiRequest::post(&base, PREDICT_PATH);
        let b = ApiRequest::post(&base, PREDICT_PATH);
        assert_ne!(a.request_id(), b.request_id());
        assert_eq!(a.url(), "http://localhost:8001/api/predict");
    }

    #[test]
    fn test_response_status_classes() {
        let ok = HttpResponse::new(200, b"{}".to_vec());
        assert!(ok.is_success());
        let server = HttpResponse::new(503, Vec::new());
        assert!(server.is_server_error());
        assert!(!server.is_success());
    }

    #[test]
    fn test_response_json_error_is_transport() {
        let response = HttpResponse::new(200, b"not json".to_vec());
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, HttpError::InvalidResponse { .. }));
        assert!(err.is_transport());
    }

    #[test]
    fn test_crux_failures_map_to_transport_errors() {
        assert_eq!(
            HttpResponse::from_crux(Err(crux_http::HttpError::Timeout)),
            Err(HttpError::Timeout)
        );
        let refused = HttpResponse::from_crux(Err(crux_http::HttpError::Io("refused".into())));
        assert!(matches!(refused, Err(HttpError::Connection { .. })));
    }

    #[test]
    fn test_error_classification() {
        assert!(HttpError::Connection {
            message: "refused".into()
        }
        .is_retryable());
        assert!(HttpError::Timeout.is_transport());
        assert!(!HttpError::Request {
            reason: "x".into()
        }
        .is_transport());
    }
}
