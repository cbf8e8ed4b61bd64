//! Transport capability and the reqwest-backed CRM transport
//!
//! A transport performs exactly one request and classifies what came back.
//! It never retries and never sleeps; that is the controller's job.

use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Longest body excerpt carried in a failure reason
const REASON_EXCERPT_CHARS: usize = 200;

/// Browser user agent the CRM web endpoints expect
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// One sub-resource to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchDescriptor {
    /// Caller-chosen key, unique within a batch
    pub key: String,
    /// Absolute URL
    pub url: String,
    /// Query parameters in send order
    pub params: Vec<(String, String)>,
}

impl FetchDescriptor {
    /// Create descriptor without parameters
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            params: Vec::new(),
        }
    }

    /// Append a query parameter
    #[inline]
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// Classified result of a single request
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Parsed JSON document
    Success(Value),
    /// Quota signal or transient failure; worth retrying later
    RateLimited(String),
    /// Session rejected; nothing else in the batch will succeed
    HardError(String),
    /// This item is bad; retrying will not help
    ItemError(String),
}

impl FetchOutcome {
    /// Short label for logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::RateLimited(_) => "rate_limited",
            Self::HardError(_) => "hard_error",
            Self::ItemError(_) => "item_error",
        }
    }
}

/// Performs one request
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch one descriptor and classify the response
    async fn fetch(&self, descriptor: &FetchDescriptor) -> FetchOutcome;
}

/// Classify a raw HTTP response
///
/// The CRM answers quota exhaustion in several ways: a 429, a 5xx, or a
/// 200 carrying an HTML login page. All of them are treated as rate limiting.
#[must_use]
pub fn classify_response(status: u16, body: &str) -> FetchOutcome {
    match status {
        204 => FetchOutcome::Success(Value::Null),
        200..=299 => match serde_json::from_str::<Value>(body) {
            Ok(value) => FetchOutcome::Success(value),
            Err(_) => FetchOutcome::RateLimited(format!(
                "HTTP {status} with non-JSON body: {}",
                excerpt(body)
            )),
        },
        401 => FetchOutcome::HardError(format!("HTTP 401: {}", excerpt(body))),
        429 | 500..=599 => FetchOutcome::RateLimited(format!("HTTP {status}: {}", excerpt(body))),
        _ => FetchOutcome::ItemError(format!("HTTP {status}: {}", excerpt(body))),
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= REASON_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(REASON_EXCERPT_CHARS).collect();
    format!("{cut}...")
}

/// Browser session values the CRM web endpoints authenticate with
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    /// Full `Cookie` header value
    pub cookie: String,
    /// CSRF token, including its `crmcsrfparam=` prefix
    pub csrf_token: String,
    /// Organization id
    pub org_id: String,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("cookie", &"[REDACTED]")
            .field("csrf_token", &"[REDACTED]")
            .field("org_id", &self.org_id)
            .finish()
    }
}

/// reqwest-backed transport carrying the CRM session headers
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client with session headers and a per-request timeout
    ///
    /// # Errors
    /// Returns [`FetchError::TransportSetup`] if a credential is not a valid
    /// header value or the client cannot be built.
    pub fn new(credentials: &SessionCredentials, timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, header_value("cookie", &credentials.cookie)?);
        headers.insert(
            HeaderName::from_static("x-zcsrf-token"),
            header_value("csrf token", &credentials.csrf_token)?,
        );
        headers.insert(
            HeaderName::from_static("x-crm-org"),
            header_value("org id", &credentials.org_id)?,
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::TransportSetup(e.to_string()))?;

        Ok(Self { client })
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, FetchError> {
    let mut value = HeaderValue::from_str(value.trim())
        .map_err(|e| FetchError::TransportSetup(format!("invalid {name}: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, descriptor: &FetchDescriptor) -> FetchOutcome {
        let response = match self
            .client
            .get(&descriptor.url)
            .query(&descriptor.params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return FetchOutcome::ItemError(format!("bad request for {}: {e}", descriptor.url))
            }
            Err(e) => return FetchOutcome::RateLimited(format!("request failed: {e}")),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => classify_response(status, &body),
            Err(e) => FetchOutcome::RateLimited(format!("HTTP {status}, body unreadable: {e}")),
        }
    }
}
