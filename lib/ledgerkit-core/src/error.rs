//! Error types for ledgerkit.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::{Decoded, Extensions, Method};

/// Header names whose values never appear in diagnostics.
const REDACTED_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for ledgerkit operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The server answered with a non-2xx status.
    #[display("{_0}")]
    #[from(skip)]
    Api(#[error(not(source))] Box<ApiError>),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// A single attempt exceeded its timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The caller cancelled the call.
    #[display("request cancelled")]
    #[from(skip)]
    Cancelled,

    /// The request value could not be serialized (JSON body or query string).
    #[display("encoding error: {_0}")]
    #[from(skip)]
    Encoding(#[error(not(source))] String),

    /// The response body did not match the expected shape.
    #[display("decode error at '{path}': {message}")]
    #[from(skip)]
    Decode {
        /// Path to the offending field (e.g. `account.balance`).
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid request configuration (header, method, ...).
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// Invalid client configuration.
    #[display("invalid configuration: {_0}")]
    #[from(skip)]
    Config(#[error(not(source))] String),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// A transport failure of a sent request, with the request attached.
    #[display("{source} on {} {}", request.method, request.url)]
    #[from(skip)]
    Transport {
        /// The underlying failure (connection, TLS, timeout, ...).
        #[error(source)]
        source: Box<Error>,
        /// The last attempt, secrets redacted.
        request: Box<RequestSnapshot>,
    },
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an encoding error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    /// Create a decode error with path context.
    #[must_use]
    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Attach the request that failed.
    ///
    /// API errors already carry their request and are returned unchanged.
    #[must_use]
    pub fn with_request(self, request: RequestSnapshot) -> Self {
        match self {
            Self::Api(_) | Self::Transport { .. } => self,
            source => Self::Transport {
                source: Box::new(source),
                request: Box::new(request),
            },
        }
    }

    /// The failure without its request context.
    #[must_use]
    pub fn kind(&self) -> &Self {
        match self {
            Self::Transport { source, .. } => source.kind(),
            other => other,
        }
    }

    /// Snapshot of the request that failed, when the request was sent.
    #[must_use]
    pub fn request(&self) -> Option<&RequestSnapshot> {
        match self {
            Self::Api(error) => Some(&error.request),
            Self::Transport { request, .. } => Some(request),
            _ => None,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind(), Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self.kind(), Self::Connection(_))
    }

    /// Returns `true` if the caller cancelled the call.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if a fresh attempt of the same request may succeed.
    ///
    /// Connection errors, timeouts and API errors with status 429 or 5xx
    /// qualify. The `X-Should-Retry: false` response header is not consulted
    /// here; the request pipeline applies it on top.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            Self::Connection(_) | Self::Timeout => true,
            Self::Api(error) => is_retryable_status(error.status),
            _ => false,
        }
    }

    /// The API error, if the server answered with a non-2xx status.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this is an API error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.api_error().map(ApiError::status)
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Returns `true` if this is a 404 Not Found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Statuses worth another attempt: 429 and 5xx.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500..=599)
}

impl From<ApiError> for Error {
    fn from(error: ApiError) -> Self {
        Self::Api(Box::new(error))
    }
}

// ============================================================================
// API Error
// ============================================================================

/// A non-2xx response, with enough context to reproduce the failing call.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: u16,
    headers: HashMap<String, String>,
    body: ErrorBody,
    request: RequestSnapshot,
}

impl ApiError {
    /// Build an API error from a response.
    ///
    /// The body is decoded as [`ApiErrorBody`] when it is a JSON object and
    /// kept as raw bytes otherwise. This never fails.
    #[must_use]
    pub fn new(
        status: u16,
        headers: HashMap<String, String>,
        body: Bytes,
        request: RequestSnapshot,
    ) -> Self {
        let body = match crate::from_json::<Decoded<ApiErrorBody>>(&body) {
            Ok(decoded) => ErrorBody::Decoded(decoded),
            Err(_) => ErrorBody::Raw(body),
        };
        Self {
            status,
            headers,
            body,
            request,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Response body, decoded when possible.
    #[must_use]
    pub const fn body(&self) -> &ErrorBody {
        &self.body
    }

    /// Snapshot of the request that produced this error.
    #[must_use]
    pub const fn request(&self) -> &RequestSnapshot {
        &self.request
    }

    /// Human-readable message: the body's detail or title, else the status reason.
    #[must_use]
    pub fn message(&self) -> String {
        if let ErrorBody::Decoded(body) = &self.body
            && let Some(text) = body.detail.as_ref().or(body.title.as_ref())
        {
            return text.clone();
        }
        http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("unknown status")
            .to_string()
    }

    /// Decode the raw body as a caller-supplied type.
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_json(self.body.as_bytes())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API error {} on {} {}: {}",
            self.status,
            self.request.method,
            self.request.url,
            self.message()
        )
    }
}

impl std::error::Error for ApiError {}

/// The body of an error response.
#[derive(Debug, Clone)]
pub enum ErrorBody {
    /// The body matched the service's error schema.
    Decoded(Decoded<ApiErrorBody>),
    /// The body was not a JSON object.
    Raw(Bytes),
}

impl ErrorBody {
    /// The body bytes as received.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Decoded(decoded) => decoded.raw_json().as_bytes(),
            Self::Raw(bytes) => bytes,
        }
    }

    /// The decoded body, if the schema matched.
    #[must_use]
    pub fn decoded(&self) -> Option<&ApiErrorBody> {
        match self {
            Self::Decoded(decoded) => Some(decoded),
            Self::Raw(_) => None,
        }
    }
}

/// The service's error schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable error type (e.g. `invalid_parameters_error`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Short summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Status echoed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Any other keys.
    #[serde(flatten)]
    pub extra: Extensions,
}

// ============================================================================
// Request Snapshot
// ============================================================================

/// Outgoing request captured for diagnostics, secrets redacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    /// HTTP method.
    pub method: Method,
    /// Full URL including the query string.
    pub url: String,
    /// Headers sorted by name, secret values replaced by `[REDACTED]`.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Bytes>,
}

impl RequestSnapshot {
    /// Capture a request.
    #[must_use]
    pub fn capture(request: &crate::Request<Bytes>) -> Self {
        Self {
            method: request.method(),
            url: request.url().to_string(),
            headers: redact_headers(request.headers()),
            body: request.body().cloned(),
        }
    }
}

/// Copy headers sorted by name with secret values replaced.
#[must_use]
pub fn redact_headers(headers: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut redacted: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            let value = if REDACTED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect();
    redacted.sort();
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;

    fn snapshot() -> RequestSnapshot {
        let url = url::Url::parse("https://api.example.com/accounts").expect("valid URL");
        let request = Request::builder(Method::Post, url)
            .header("Authorization", "Bearer secret-key")
            .header("Idempotency-Key", "key-1")
            .body(Bytes::from_static(br#"{"name":"Payroll"}"#))
            .build();
        RequestSnapshot::capture(&request)
    }

    #[test]
    fn error_display() {
        let err = Error::Timeout;
        assert_eq!(err.to_string(), "request timeout");

        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "connection error: failed to connect");

        let err = Error::decode("account.balance", "invalid type: string, expected i64");
        assert_eq!(
            err.to_string(),
            "decode error at 'account.balance': invalid type: string, expected i64"
        );

        assert_eq!(Error::Cancelled.to_string(), "request cancelled");
    }

    #[test]
    fn retryable_classes() {
        assert!(Error::Timeout.is_retryable());
        assert!(Error::connection("reset").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::decode("id", "bad").is_retryable());
        assert!(!Error::encoding("bad").is_retryable());

        for status in [429, 500, 503] {
            let err = Error::from(ApiError::new(status, HashMap::new(), Bytes::new(), snapshot()));
            assert!(err.is_retryable(), "{status}");
        }
        for status in [400, 401, 404, 408, 409, 422] {
            let err = Error::from(ApiError::new(status, HashMap::new(), Bytes::new(), snapshot()));
            assert!(!err.is_retryable(), "{status}");
        }
    }

    #[test]
    fn transport_errors_carry_the_request() {
        let err = Error::Timeout.with_request(snapshot());
        assert!(err.is_timeout());
        assert!(err.is_retryable());
        assert!(matches!(err.kind(), Error::Timeout));
        assert_eq!(
            err.to_string(),
            "request timeout on POST https://api.example.com/accounts"
        );

        let request = err.request().expect("request");
        assert_eq!(request.method, Method::Post);
        assert!(
            request
                .headers
                .contains(&("authorization".to_string(), "[REDACTED]".to_string()))
        );

        let err = Error::connection("reset").with_request(snapshot());
        assert!(err.is_connection());
        assert!(std::error::Error::source(&err).is_some());

        // Already attached, or carried by the API error itself.
        let twice = err.with_request(snapshot());
        assert!(matches!(twice.kind(), Error::Connection(_)));
        let api = Error::from(ApiError::new(503, HashMap::new(), Bytes::new(), snapshot()));
        assert!(matches!(api.with_request(snapshot()), Error::Api(_)));

        assert!(Error::Cancelled.request().is_none());
    }

    #[test]
    fn snapshot_redacts_secrets() {
        let snapshot = snapshot();
        assert_eq!(
            snapshot.headers,
            vec![
                ("authorization".to_string(), "[REDACTED]".to_string()),
                ("idempotency-key".to_string(), "key-1".to_string()),
            ]
        );
        assert_eq!(snapshot.url, "https://api.example.com/accounts");
    }

    #[test]
    fn api_error_decodes_schema_body() {
        let body = Bytes::from_static(
            br#"{"type":"invalid_parameters_error","title":"Invalid","detail":"amount must be positive","status":400,"errors":[{"field":"amount"}]}"#,
        );
        let err = ApiError::new(400, HashMap::new(), body.clone(), snapshot());

        let decoded = err.body().decoded().expect("decoded body");
        assert_eq!(decoded.kind.as_deref(), Some("invalid_parameters_error"));
        assert_eq!(decoded.status, Some(400));
        assert!(decoded.extra.get("errors").is_some());
        assert_eq!(err.body().as_bytes(), body.as_ref());
        assert_eq!(err.message(), "amount must be positive");

        let err = Error::from(err);
        assert_eq!(err.status(), Some(400));
        assert!(err.is_client_error());
        assert_eq!(
            err.to_string(),
            "API error 400 on POST https://api.example.com/accounts: amount must be positive"
        );
    }

    #[test]
    fn api_error_keeps_invalid_json_raw() {
        let body = Bytes::from_static(b"<html>Bad Gateway</html>");
        let err = ApiError::new(502, HashMap::new(), body.clone(), snapshot());

        assert!(err.body().decoded().is_none());
        assert_eq!(err.body().as_bytes(), body.as_ref());
        assert_eq!(err.message(), "Bad Gateway");

        let err = ApiError::new(500, HashMap::new(), Bytes::new(), snapshot());
        assert!(matches!(err.body(), ErrorBody::Raw(bytes) if bytes.is_empty()));
        assert!(Error::from(err).is_server_error());
    }

    #[test]
    fn api_error_decode_body() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Custom {
            code: String,
        }

        let body = Bytes::from_static(br#"{"code":"insufficient_funds"}"#);
        let err = ApiError::new(409, HashMap::new(), body, snapshot());
        let custom: Custom = err.decode_body().expect("decode");
        assert_eq!(
            custom,
            Custom {
                code: "insufficient_funds".to_string()
            }
        );
    }
}
