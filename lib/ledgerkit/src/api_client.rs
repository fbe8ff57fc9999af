//! The API client handle.
//!
//! [`Client`] pairs an [`HttpClient`] transport with [`ClientOptions`]. It is
//! cheap to clone and shares its connection pool between clones. Requests go
//! through [`Client::execute`] and [`Client::list`].

use std::fmt;
use std::sync::Arc;

use crate::config::ClientOptions;
use crate::options::{RequestOption, with_api_key, with_base_url};
use crate::retry::RetryPolicy;
use crate::{HttpClient, HyperClient, Result};

/// Handle to the ledgerkit API.
///
/// # Example
///
/// ```no_run
/// use ledgerkit::{Client, ClientOptions, Environment, Method, RequestConfig};
///
/// # async fn run() -> ledgerkit::Result<()> {
/// let client = Client::new(
///     ClientOptions::new()
///         .api_key("sk_test_123")
///         .environment(Environment::Sandbox),
/// )?;
///
/// let account: serde_json::Value = client
///     .execute(RequestConfig::new(Method::Get, "/accounts/acct_1"))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Client<C = HyperClient> {
    inner: Arc<ClientInner<C>>,
}

struct ClientInner<C> {
    http: C,
    options: ClientOptions,
    defaults: Arc<[RequestOption]>,
    policy: RetryPolicy,
}

impl<C> Clone for Client<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.inner.options)
            .field("defaults", &self.inner.defaults)
            .finish_non_exhaustive()
    }
}

impl Client<HyperClient> {
    /// Create a client over the default transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) or
    /// [`Error::InvalidUrl`](crate::Error::InvalidUrl) if the base URL cannot
    /// be resolved.
    pub fn new(options: ClientOptions) -> Result<Self> {
        Self::with_http(HyperClient::new(), options)
    }

    /// Create a client configured from `LEDGERKIT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for an unknown
    /// environment name or a malformed base URL.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientOptions::from_env()?)
    }
}

impl<C: HttpClient> Client<C> {
    /// Create a client over a custom transport.
    ///
    /// The base URL is resolved once here. The API key, when present, becomes
    /// an `Authorization` option applied before any option of
    /// `options` or of a call.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot be resolved.
    pub fn with_http(http: C, options: ClientOptions) -> Result<Self> {
        let base_url = options.base_url()?;

        let mut defaults = vec![with_base_url(base_url.as_str())];
        if let Some(api_key) = options.api_key_value() {
            defaults.push(with_api_key(api_key));
        }
        defaults.extend(options.extra_options().iter().cloned());

        let policy = RetryPolicy::new(*options.retry_config());
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                options,
                defaults: defaults.into(),
                policy,
            }),
        })
    }
}

impl<C> Client<C> {
    /// A copy of this client with `options` appended to its defaults.
    ///
    /// The copy shares the transport and its connection pool.
    #[must_use]
    pub fn with_options(&self, options: impl IntoIterator<Item = RequestOption>) -> Self
    where
        C: Clone,
    {
        let defaults = self
            .inner
            .defaults
            .iter()
            .cloned()
            .chain(options)
            .collect::<Vec<_>>();

        Self {
            inner: Arc::new(ClientInner {
                http: self.inner.http.clone(),
                options: self.inner.options.clone(),
                defaults: defaults.into(),
                policy: self.inner.policy,
            }),
        }
    }

    /// The transport.
    #[must_use]
    pub fn http(&self) -> &C {
        &self.inner.http
    }

    /// The options this client was built from.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Options applied to every request, in order.
    #[must_use]
    pub fn default_options(&self) -> &[RequestOption] {
        &self.inner.defaults
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    use assert2::{check, let_assert};
    use bytes::Bytes;

    use super::*;
    use crate::config::Environment;
    use crate::options::with_header;
    use crate::{Error, Method, Request, RequestConfig, Response};

    /// Transport that records requests and answers `200 {}`.
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<Request<Bytes>>>>,
    }

    impl HttpClient for Recorder {
        fn execute(
            &self,
            request: Request<Bytes>,
        ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
            self.seen.lock().expect("lock").push(request);
            async { Ok(Response::new(200, HashMap::new(), Bytes::from_static(b"{}"))) }
        }
    }

    #[test]
    fn defaults_order() {
        let options = ClientOptions::new()
            .api_key("sk_test_1")
            .option(with_header("X-Tenant", "t1"));
        let client = Client::with_http(Recorder::default(), options).expect("client");

        let names = client
            .default_options()
            .iter()
            .map(RequestOption::name)
            .collect::<Vec<_>>();
        check!(names == ["base_url", "api_key", "header"]);
    }

    #[test]
    fn without_api_key_there_is_no_auth_option() {
        let client = Client::with_http(Recorder::default(), ClientOptions::new()).expect("client");
        check!(client.default_options().len() == 1);
    }

    #[test]
    fn invalid_base_url_fails_construction() {
        let options = ClientOptions::from_lookup(|name| {
            (name == crate::config::BASE_URL_ENV).then(|| "not a url".to_string())
        });
        let_assert!(Err(Error::Config(_) | Error::InvalidUrl(_)) =
            options.and_then(|options| Client::with_http(Recorder::default(), options)));
    }

    #[tokio::test]
    async fn with_options_shares_transport() {
        let recorder = Recorder::default();
        let client = Client::with_http(
            recorder.clone(),
            ClientOptions::new().environment(Environment::Sandbox),
        )
        .expect("client");
        let tenant = client.with_options([with_header("X-Tenant", "t2")]);

        let _: serde_json::Value = tenant
            .execute(RequestConfig::new(Method::Get, "/accounts"))
            .await
            .expect("response");
        let _: serde_json::Value = client
            .execute(RequestConfig::new(Method::Get, "/accounts"))
            .await
            .expect("response");

        let seen = recorder.seen.lock().expect("lock");
        check!(seen.len() == 2);
        check!(seen[0].url().as_str() == "https://sandbox.ledgerkit.com/accounts");
        check!(seen[0].header("x-tenant") == Some("t2"));
        check!(seen[1].header("x-tenant").is_none());
        check!(seen[1].header("user-agent") == Some(crate::pipeline::USER_AGENT));
    }

    #[tokio::test]
    async fn call_options_override_client_options() {
        let recorder = Recorder::default();
        let client = Client::with_http(
            recorder.clone(),
            ClientOptions::new()
                .api_key("sk_test_1")
                .option(with_header("X-Tenant", "client")),
        )
        .expect("client");

        let config = RequestConfig::new(Method::Get, "/accounts")
            .option(with_header("x-tenant", "call"))
            .option(crate::options::with_header_removed("accept"));
        let _: serde_json::Value = client.execute(config).await.expect("response");

        let seen = recorder.seen.lock().expect("lock");
        let_assert!(Some(request) = seen.first());
        check!(request.header("x-tenant") == Some("call"));
        check!(request.header("authorization") == Some("Bearer sk_test_1"));
        check!(request.header("accept").is_none());
        check!(request.header("x-retry-count") == Some("0"));
    }
}
