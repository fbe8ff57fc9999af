//! HTTP transport trait.
//!
//! [`HttpClient`] is the only boundary between the request pipeline and the
//! network. The `ledgerkit` crate ships a hyper-based implementation; tests
//! and embedders may plug their own.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use crate::{Request, Response, Result};

/// Core HTTP client trait.
///
/// Implementations perform exactly one physical exchange per call: retries,
/// timeouts and cancellation live in the request pipeline above.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use ledgerkit_core::{HttpClient, Request, Response, Result};
/// use std::collections::HashMap;
///
/// struct Canned;
///
/// impl HttpClient for Canned {
///     async fn execute(&self, _request: Request<Bytes>) -> Result<Response<Bytes>> {
///         Ok(Response::new(200, HashMap::new(), Bytes::from_static(b"{}")))
///     }
/// }
/// ```
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and return the response.
    ///
    /// Any status code is a successful exchange; only transport failures are
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](crate::Error::Connection) or
    /// [`Error::Tls`](crate::Error::Tls) when the exchange could not complete.
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send;
}

impl<T: HttpClient> HttpClient for Arc<T> {
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        T::execute(self, request)
    }
}
