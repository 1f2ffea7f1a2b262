use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use crux_http::protocol::{HttpHeader, HttpRequest, HttpResponse, HttpResult};
use crux_http::HttpError;
use tracing::{debug, warn};
use url::Url;

use crate::capabilities::{timeout_for, MAX_RESPONSE_BODY_SIZE};
use crate::config::{ClientConfig, RetryPolicy};

use super::ShellError;

/// Carries out one HTTP request. Any status code is a successful exchange;
/// only transport-level failures are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> HttpResult;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ShellError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(concat!("h2oguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ShellError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }

    fn map_error(error: &reqwest::Error) -> HttpError {
        if error.is_timeout() {
            HttpError::Timeout
        } else if error.is_builder() {
            HttpError::Url(error.to_string())
        } else {
            HttpError::Io(error.to_string())
        }
    }

    async fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| HttpError::Url(format!("bad method {}: {e}", request.method)))?;
        let url = Url::parse(&request.url).map_err(|e| HttpError::Url(e.to_string()))?;
        let started = Instant::now();

        let mut builder = self
            .client
            .request(method, url)
            .timeout(timeout_for(&request.url));
        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| Self::map_error(&e))?;
        let status = response.status().as_u16();

        if let Some(len) = response.content_length() {
            let len = usize::try_from(len).unwrap_or(usize::MAX);
            if len > MAX_RESPONSE_BODY_SIZE {
                return Err(too_large(len));
            }
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                Some(HttpHeader {
                    name: name.as_str().to_string(),
                    value: value.to_str().ok()?.to_string(),
                })
            })
            .collect();

        let body = response.bytes().await.map_err(|e| Self::map_error(&e))?;
        if body.len() > MAX_RESPONSE_BODY_SIZE {
            return Err(too_large(body.len()));
        }

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            method = %request.method,
            url = %request.url,
            status,
            duration_ms,
            "http exchange complete"
        );

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

fn too_large(size: usize) -> HttpError {
    HttpError::Io(format!(
        "response of {size} bytes exceeds maximum of {MAX_RESPONSE_BODY_SIZE} bytes"
    ))
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> HttpResult {
        match self.exchange(request).await {
            Ok(response) => HttpResult::Ok(response),
            Err(error) => HttpResult::Err(error),
        }
    }
}

/// Retries GETs on transport failures, 5xx and 429 with exponential backoff.
/// Everything else goes through exactly once.
pub struct RetryingTransport {
    inner: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn should_retry(result: &HttpResult) -> bool {
        match result {
            HttpResult::Ok(response) => {
                (500..600).contains(&response.status) || response.status == 429
            }
            HttpResult::Err(e) => matches!(e, HttpError::Io(_) | HttpError::Timeout),
        }
    }
}

#[async_trait]
impl HttpTransport for RetryingTransport {
    async fn execute(&self, request: &HttpRequest) -> HttpResult {
        if !request.method.eq_ignore_ascii_case("GET") {
            return self.inner.execute(request).await;
        }

        let mut attempt = 1;
        loop {
            let result = self.inner.execute(request).await;
            if attempt >= self.policy.max_attempts || !Self::should_retry(&result) {
                return result;
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                url = %request.url,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
