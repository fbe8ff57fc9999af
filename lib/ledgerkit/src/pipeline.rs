//! Request pipeline: option resolution, retries, decoding.
//!
//! [`Client::execute`] takes a [`RequestConfig`] through these steps:
//!
//! 1. Default headers and client defaults are filled in, then client options
//!    and call options are applied in order.
//! 2. The URL is built from the base URL, the path and the query pairs; the
//!    JSON body is encoded for methods that carry one. Unsafe methods get an
//!    `Idempotency-Key` reused by every attempt.
//! 3. Each attempt is raced against the per-attempt timeout and the
//!    cancellation token. Transient failures are retried with backoff
//!    (see [`RetryPolicy`]).
//! 4. A final non-2xx response becomes [`Error::Api`]; a 2xx body is decoded.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;

use ledgerkit_core::{
    ApiError, ContentType, HttpClient, QuerySettings, RequestSnapshot, encode_pairs,
    escape_component, redact_headers, to_query_pairs,
};

use crate::options::{RequestOption, ResponseSlot};
use crate::pagination::CursorSource;
use crate::retry::RetryPolicy;
use crate::{Client, Error, Method, Request, Response, Result};

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("ledgerkit/", env!("CARGO_PKG_VERSION"));

/// Query parameter carrying the page cursor.
pub const CURSOR_PARAM: &str = "cursor";

/// One logical API call: what to send and how.
///
/// Generated service methods build one per call. Options edit it through the
/// `set_*` methods before it is sent; the pipeline never mutates the value
/// passed in, so a config can be replayed (pagination does).
///
/// # Example
///
/// ```
/// use ledgerkit::{Field, Method, RequestConfig};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct ListAccounts {
///     #[serde(skip_serializing_if = "Field::is_omitted")]
///     status: Field<String>,
///     #[serde(skip_serializing_if = "Field::is_omitted")]
///     limit: Field<u32>,
/// }
///
/// let params = ListAccounts { status: Field::present("open".into()), limit: Field::omitted() };
/// let config = RequestConfig::new(Method::Get, "/accounts").query(&params)?;
/// assert_eq!(config.query_pairs(), [("status".to_string(), "open".to_string())]);
/// # Ok::<(), ledgerkit::Error>(())
/// ```
#[derive(Clone)]
pub struct RequestConfig {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    options: Vec<RequestOption>,
    cursor_source: CursorSource,
    cursor_param: String,
    base_url: Option<Url>,
    headers: HashMap<String, String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    idempotency_key: Option<String>,
    cancellation: Option<CancellationToken>,
    response_slot: Option<ResponseSlot>,
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("options", &self.options)
            .field("cursor_source", &self.cursor_source)
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("headers", &redact_headers(&self.headers))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl RequestConfig {
    /// A request for `path`, relative to the base URL.
    ///
    /// Path parameters must already be substituted, each encoded with
    /// [`path_segment`](crate::path_segment).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            options: Vec::new(),
            cursor_source: CursorSource::default(),
            cursor_param: CURSOR_PARAM.to_string(),
            base_url: None,
            headers: HashMap::new(),
            timeout: None,
            max_retries: None,
            idempotency_key: None,
            cancellation: None,
            response_slot: None,
        }
    }

    /// Add query parameters from a struct or map, with default conventions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if `params` is not a struct or map.
    pub fn query<T: Serialize + ?Sized>(self, params: &T) -> Result<Self> {
        self.query_with(params, QuerySettings::default())
    }

    /// Add query parameters with explicit array and nesting conventions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if `params` is not a struct or map.
    pub fn query_with<T: Serialize + ?Sized>(
        mut self,
        params: &T,
        settings: QuerySettings,
    ) -> Result<Self> {
        self.query.extend(to_query_pairs(params, settings)?);
        Ok(self)
    }

    /// Set the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| Error::encoding(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Add a call option, applied after the client's options.
    #[must_use]
    pub fn option(mut self, option: RequestOption) -> Self {
        self.options.push(option);
        self
    }

    /// Add call options.
    #[must_use]
    pub fn options(mut self, options: impl IntoIterator<Item = RequestOption>) -> Self {
        self.options.extend(options);
        self
    }

    /// Read the next cursor from `source` when paginating.
    #[must_use]
    pub fn cursor_source(mut self, source: CursorSource) -> Self {
        self.cursor_source = source;
        self
    }

    /// Query parameter used to send the cursor (default `cursor`).
    #[must_use]
    pub fn cursor_param(mut self, name: impl Into<String>) -> Self {
        self.cursor_param = name.into();
        self
    }

    /// Add a call option in place.
    pub fn push_option(&mut self, option: RequestOption) {
        self.options.push(option);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Path relative to the base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query pairs in order, `%` and `,` escaped within each component.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// JSON body.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Mutable JSON body.
    pub fn body_mut(&mut self) -> &mut Option<Value> {
        &mut self.body
    }

    /// Call options.
    #[must_use]
    pub fn request_options(&self) -> &[RequestOption] {
        &self.options
    }

    /// Where the next cursor is read from.
    #[must_use]
    pub const fn cursor(&self) -> &CursorSource {
        &self.cursor_source
    }

    /// Query parameter carrying the cursor.
    #[must_use]
    pub fn cursor_param_name(&self) -> &str {
        &self.cursor_param
    }

    /// Base URL set by an option.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Header value, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Headers, keyed by lowercase name.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Maximum retries.
    #[must_use]
    pub const fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Explicit idempotency key.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    /// Cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Slot receiving the raw response.
    #[must_use]
    pub const fn response_slot(&self) -> Option<&ResponseSlot> {
        self.response_slot.as_ref()
    }

    // ========================================================================
    // Mutators used by options
    // ========================================================================

    /// Replace the base URL.
    pub fn set_base_url(&mut self, base_url: Url) {
        self.base_url = Some(base_url);
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Remove a header.
    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(&name.to_ascii_lowercase());
    }

    /// Replace every value of a query parameter with `value`.
    ///
    /// The parameter keeps the position of its first occurrence.
    pub fn set_query_param(&mut self, key: &str, value: impl Into<String>) {
        let key = escape_component(key);
        let key = key.as_str();
        let value = escape_component(&value.into());
        match self.query.iter().position(|(k, _)| k == key) {
            Some(first) => {
                let mut index = 0;
                self.query.retain(|(k, _)| {
                    let keep = k != key || index == first;
                    index += 1;
                    keep
                });
                if let Some(pair) = self.query.get_mut(first) {
                    pair.1 = value;
                }
            }
            None => self.query.push((key.to_string(), value)),
        }
    }

    /// Append a query parameter.
    pub fn add_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query
            .push((escape_component(&key.into()), escape_component(&value.into())));
    }

    /// Remove every value of a query parameter.
    pub fn remove_query_param(&mut self, key: &str) {
        let key = escape_component(key);
        self.query.retain(|(k, _)| *k != key);
    }

    /// Set the per-attempt timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Set the maximum retries.
    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = Some(max_retries);
    }

    /// Set the idempotency key.
    pub fn set_idempotency_key(&mut self, key: impl Into<String>) {
        self.idempotency_key = Some(key.into());
    }

    /// Set the cancellation token.
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = Some(token);
    }

    /// Set the slot receiving the raw response.
    pub fn set_response_slot(&mut self, slot: ResponseSlot) {
        self.response_slot = Some(slot);
    }

    // ========================================================================
    // Building
    // ========================================================================

    /// Final URL: base URL, path, then query pairs.
    fn url(&self) -> Result<Url> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| Error::config("no base URL configured"))?;

        let mut url = base.clone();
        let prefix = base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}/{}", self.path.trim_start_matches('/')));

        let query = encode_pairs(&self.query);
        url.set_query((!query.is_empty()).then_some(query.as_str()));
        Ok(url)
    }

    /// Build the transport request shared by every attempt.
    fn build_request(&self) -> Result<Request<Bytes>> {
        let mut headers = self.headers.clone();

        let body = match (&self.body, self.method.has_body()) {
            (Some(body), true) => {
                headers
                    .entry("content-type".to_string())
                    .or_insert_with(|| ContentType::Json.to_string());
                Some(ledgerkit_core::to_json(body)?)
            }
            _ => None,
        };

        if !self.method.is_safe() {
            let key = self
                .idempotency_key
                .clone()
                .or_else(|| headers.get("idempotency-key").cloned())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            headers.insert("idempotency-key".to_string(), key);
        }

        let builder = Request::builder(self.method, self.url()?).headers(headers);
        Ok(match body {
            Some(body) => builder.body(body).build(),
            None => builder.build(),
        })
    }
}

// ============================================================================
// Execution
// ============================================================================

impl<C: HttpClient> Client<C> {
    /// Send `config` and decode a 2xx body into `T`.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<_>` targets
    /// accept `204 No Content`.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] for a final non-2xx response
    /// - [`Error::Transport`] wrapping a connection, TLS or timeout failure
    ///   once retries are exhausted, with the last attempt attached
    /// - [`Error::Cancelled`] if the cancellation token fired
    /// - [`Error::Decode`] if the body does not match `T`
    /// - [`Error::Encoding`], [`Error::InvalidUrl`] for a malformed request
    pub async fn execute<T: DeserializeOwned>(&self, config: RequestConfig) -> Result<T> {
        let response = self.execute_raw(config).await?;
        response.json()
    }

    /// Send `config` and return the raw 2xx response.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute), minus decoding.
    pub async fn execute_raw(&self, config: RequestConfig) -> Result<Response> {
        let span = info_span!(
            "ledgerkit.request",
            method = %config.method(),
            path = %config.path(),
        );
        self.send(config).instrument(span).await
    }

    fn resolve(&self, mut config: RequestConfig) -> Result<RequestConfig> {
        config
            .headers
            .entry("accept".to_string())
            .or_insert_with(|| ContentType::Json.to_string());
        config
            .headers
            .entry("user-agent".to_string())
            .or_insert_with(|| USER_AGENT.to_string());
        config
            .timeout
            .get_or_insert(self.options().timeout_value());
        config
            .max_retries
            .get_or_insert(self.options().retry_config().max_retries);

        let call_options = std::mem::take(&mut config.options);
        for option in self.default_options().iter().chain(&call_options) {
            option.apply(&mut config)?;
            debug!(option = option.name(), "applied request option");
        }
        config.options = call_options;
        Ok(config)
    }

    async fn send(&self, config: RequestConfig) -> Result<Response> {
        let config = self.resolve(config)?;
        let request = config.build_request()?;

        let cancel = config.cancellation.clone().unwrap_or_default();
        let timeout = config
            .timeout
            .unwrap_or(crate::ClientOptions::DEFAULT_TIMEOUT);
        let max_retries = config.max_retries.unwrap_or_default();
        let policy = self.retry_policy();

        let mut retry: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut attempt = request.clone();
            attempt.set_header("x-retry-count", retry.to_string());
            debug!(retry, url = %attempt.url(), "sending request");

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                result = tokio::time::timeout(timeout, self.http().execute(attempt.clone())) => {
                    result.unwrap_or_else(|_elapsed| Err(Error::Timeout))
                }
            };

            let (error, delay) = match outcome {
                Ok(response) if response.is_success() => {
                    if let Some(slot) = &config.response_slot {
                        slot.store(response.clone());
                    }
                    info!(status = response.status(), attempts = retry + 1, "request completed");
                    return Ok(response);
                }
                Ok(response) => {
                    let delay = RetryPolicy::should_retry_response(&response)
                        .then(|| policy.delay(retry, Some(&response)));
                    let (status, headers, body) = response.into_parts();
                    let snapshot = RequestSnapshot::capture(&attempt);
                    let error = Error::from(ApiError::new(status, headers, body, snapshot));
                    (error, delay)
                }
                Err(error) => {
                    let delay =
                        RetryPolicy::should_retry_error(&error).then(|| policy.delay(retry, None));
                    (error, delay)
                }
            };

            let Some(delay) = delay.filter(|_| retry < max_retries) else {
                warn!(error = %error, attempts = retry + 1, "request failed");
                return Err(error.with_request(RequestSnapshot::capture(&attempt)));
            };

            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            warn!(error = %error, retry = retry + 1, delay_ms, "retrying request");

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
            retry += 1;
        }
    }
}
