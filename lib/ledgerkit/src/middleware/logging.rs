//! Exchange logging.
//!
//! Logs each physical exchange with `tracing`. At debug level, headers are
//! dumped with credentials redacted, and bodies as lossy UTF-8.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use tower::{Layer, Service};
use tracing::{Instrument, Level, debug, info, span, warn};

use ledgerkit_core::redact_headers;

use crate::{Error, Request, Response, Result};

/// Longest body prefix written to debug logs.
const MAX_LOGGED_BODY: usize = 4096;

/// Layer that logs every exchange.
///
/// # Example
///
/// ```no_run
/// use ledgerkit::HyperClient;
/// use ledgerkit::middleware::LoggingLayer;
///
/// let http = HyperClient::builder().layer(LoggingLayer::new()).build();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

/// How much the logging middleware writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Redacted headers and bodies, at debug level.
    Debug,
    /// Method, URL, status and latency.
    #[default]
    Info,
}

impl LoggingLayer {
    /// Summary logging.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detailed logging with redacted headers and bodies.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }

    /// The configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            level: self.level,
        }
    }
}

/// Service produced by [`LoggingLayer`].
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    level: LogLevel,
}

fn body_preview(body: &[u8]) -> String {
    let end = body.len().min(MAX_LOGGED_BODY);
    let mut preview = String::from_utf8_lossy(body.get(..end).unwrap_or_default()).into_owned();
    if body.len() > end {
        preview.push_str("...");
    }
    preview
}

impl<S> Service<Request<Bytes>> for Logging<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let method = request.method();
        let url = request.url().to_string();
        let level = self.level;

        let span = span!(Level::INFO, "ledgerkit.exchange", %method, %url);

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let start = Instant::now();

                match level {
                    LogLevel::Debug => {
                        debug!(
                            headers = ?redact_headers(request.headers()),
                            body = %request.body().map(|b| body_preview(b)).unwrap_or_default(),
                            "sending request"
                        );
                    }
                    LogLevel::Info => info!("sending request"),
                }

                let result = inner.call(request).await;
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) => {
                        let status = response.status();
                        if level == LogLevel::Debug {
                            debug!(
                                status,
                                headers = ?redact_headers(response.headers()),
                                body = %body_preview(response.body()),
                                "received response"
                            );
                        }
                        if response.is_success() {
                            info!(status, elapsed_ms, "exchange completed");
                        } else {
                            warn!(status, elapsed_ms, "exchange returned an error status");
                        }
                    }
                    Err(err) => warn!(error = %err, elapsed_ms, "exchange failed"),
                }

                result
            }
            .instrument(span),
        )
    }
}
