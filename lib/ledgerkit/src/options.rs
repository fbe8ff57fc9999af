//! Per-request options.
//!
//! A [`RequestOption`] is a named function that edits a [`RequestConfig`]
//! before it is sent. Client-level options run first, then the options of
//! the call, so a later option wins over an earlier one for the same key.
//!
//! # Example
//!
//! ```no_run
//! use ledgerkit::options::{with_header, with_idempotency_key, with_max_retries};
//! use ledgerkit::{Client, ClientOptions, Method, RequestConfig};
//!
//! # async fn run() -> ledgerkit::Result<()> {
//! let client = Client::new(ClientOptions::from_env()?)?;
//! let config = RequestConfig::new(Method::Post, "/accounts")
//!     .json(&serde_json::json!({ "name": "Payroll" }))?
//!     .option(with_idempotency_key("create-payroll-1"))
//!     .option(with_max_retries(5))
//!     .option(with_header("X-Request-Source", "batch"));
//! let account: serde_json::Value = client.execute(config).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::Environment;
use crate::pipeline::RequestConfig;
use crate::{Error, Response, Result};

type ApplyFn = dyn Fn(&mut RequestConfig) -> Result<()> + Send + Sync;

/// A named edit of a [`RequestConfig`].
#[derive(Clone)]
pub struct RequestOption {
    name: &'static str,
    apply: Arc<ApplyFn>,
}

impl fmt::Debug for RequestOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestOption").field(&self.name).finish()
    }
}

impl RequestOption {
    /// Build a custom option.
    pub fn new<F>(name: &'static str, apply: F) -> Self
    where
        F: Fn(&mut RequestConfig) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name,
            apply: Arc::new(apply),
        }
    }

    /// Name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Apply the option to `config`.
    ///
    /// # Errors
    ///
    /// Returns the option's own error, e.g. a malformed base URL.
    pub fn apply(&self, config: &mut RequestConfig) -> Result<()> {
        (self.apply)(config)
    }
}

/// Shared cell receiving the raw response of a successful call.
#[derive(Debug, Clone, Default)]
pub struct ResponseSlot(Arc<Mutex<Option<Response>>>);

impl ResponseSlot {
    /// An empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a response, replacing any previous one.
    pub fn store(&self, response: Response) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(response);
    }

    /// Take the stored response, leaving the slot empty.
    #[must_use]
    pub fn take(&self) -> Option<Response> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// A copy of the stored response.
    #[must_use]
    pub fn get(&self) -> Option<Response> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Send requests to `base_url` instead of the environment's URL.
pub fn with_base_url(base_url: impl Into<String>) -> RequestOption {
    let base_url = base_url.into();
    RequestOption::new("base_url", move |config| {
        config.set_base_url(Url::parse(&base_url)?);
        Ok(())
    })
}

/// Send requests to an environment's URL.
#[must_use]
pub fn with_environment(environment: Environment) -> RequestOption {
    with_base_url(environment.base_url())
}

/// Authenticate with `Authorization: Bearer <api_key>`.
pub fn with_api_key(api_key: impl Into<String>) -> RequestOption {
    let value = format!("Bearer {}", api_key.into());
    RequestOption::new("api_key", move |config| {
        config.set_header("Authorization", value.clone());
        Ok(())
    })
}

/// Set a header, replacing any previous value.
pub fn with_header(name: impl Into<String>, value: impl Into<String>) -> RequestOption {
    let name = name.into();
    let value = value.into();
    RequestOption::new("header", move |config| {
        config.set_header(&name, value.clone());
        Ok(())
    })
}

/// Remove a header, including one the pipeline would set by default.
pub fn with_header_removed(name: impl Into<String>) -> RequestOption {
    let name = name.into();
    RequestOption::new("header_removed", move |config| {
        config.remove_header(&name);
        Ok(())
    })
}

/// Set a query parameter, replacing every previous value of the key.
pub fn with_query(key: impl Into<String>, value: impl Into<String>) -> RequestOption {
    let key = key.into();
    let value = value.into();
    RequestOption::new("query", move |config| {
        config.set_query_param(&key, value.clone());
        Ok(())
    })
}

/// Append a query parameter, keeping previous values of the key.
pub fn with_query_added(key: impl Into<String>, value: impl Into<String>) -> RequestOption {
    let key = key.into();
    let value = value.into();
    RequestOption::new("query_added", move |config| {
        config.add_query_param(key.clone(), value.clone());
        Ok(())
    })
}

/// Remove every value of a query parameter.
pub fn with_query_removed(key: impl Into<String>) -> RequestOption {
    let key = key.into();
    RequestOption::new("query_removed", move |config| {
        config.remove_query_param(&key);
        Ok(())
    })
}

/// Bound each physical attempt by `timeout`.
#[must_use]
pub fn with_request_timeout(timeout: Duration) -> RequestOption {
    RequestOption::new("request_timeout", move |config| {
        config.set_timeout(timeout);
        Ok(())
    })
}

/// Retry transient failures up to `max_retries` times.
#[must_use]
pub fn with_max_retries(max_retries: u32) -> RequestOption {
    RequestOption::new("max_retries", move |config| {
        config.set_max_retries(max_retries);
        Ok(())
    })
}

/// Send this `Idempotency-Key` instead of a generated one.
pub fn with_idempotency_key(key: impl Into<String>) -> RequestOption {
    let key = key.into();
    RequestOption::new("idempotency_key", move |config| {
        config.set_idempotency_key(key.clone());
        Ok(())
    })
}

/// Abort the call when `token` is cancelled.
#[must_use]
pub fn with_cancellation(token: CancellationToken) -> RequestOption {
    RequestOption::new("cancellation", move |config| {
        config.set_cancellation(token.clone());
        Ok(())
    })
}

/// Store the raw response of a successful call into `slot`.
#[must_use]
pub fn with_response_into(slot: &ResponseSlot) -> RequestOption {
    let slot = slot.clone();
    RequestOption::new("response_into", move |config| {
        config.set_response_slot(slot.clone());
        Ok(())
    })
}

/// Set a top-level key of the JSON body.
///
/// A missing body becomes an object; a body that is not an object is an
/// [`Error::Encoding`].
pub fn with_json_set(key: impl Into<String>, value: impl Serialize) -> RequestOption {
    let key = key.into();
    let value = serde_json::to_value(value).map_err(|e| e.to_string());
    RequestOption::new("json_set", move |config| {
        let value = value.clone().map_err(Error::encoding)?;
        let body = config
            .body_mut()
            .get_or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        match body.as_object_mut() {
            Some(object) => {
                object.insert(key.clone(), value);
                Ok(())
            }
            None => Err(Error::encoding(format!(
                "cannot set `{key}` on a non-object JSON body"
            ))),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert2::{check, let_assert};
    use serde_json::json;

    use super::*;
    use crate::Method;

    fn config() -> RequestConfig {
        RequestConfig::new(Method::Post, "/accounts")
    }

    #[test]
    fn later_options_win() {
        let mut config = config();
        for option in [
            with_base_url("https://one.example.com"),
            with_header("X-Trace", "a"),
            with_base_url("https://two.example.com"),
            with_header("x-trace", "b"),
        ] {
            option.apply(&mut config).expect("apply");
        }

        check!(config.base_url().map(Url::as_str) == Some("https://two.example.com/"));
        check!(config.header("X-Trace") == Some("b"));
    }

    #[test]
    fn api_key_sets_bearer_header() {
        let mut config = config();
        with_api_key("sk_test_1").apply(&mut config).expect("apply");
        check!(config.header("authorization") == Some("Bearer sk_test_1"));

        with_header_removed("Authorization")
            .apply(&mut config)
            .expect("apply");
        check!(config.header("authorization").is_none());
    }

    #[test]
    fn query_options() {
        let mut config = config();
        for option in [
            with_query("status", "pending"),
            with_query_added("status", "complete"),
            with_query("limit", "10"),
            with_query("limit", "20"),
            with_query_added("tag", "x"),
            with_query_removed("tag"),
        ] {
            option.apply(&mut config).expect("apply");
        }

        check!(
            config.query_pairs()
                == [
                    ("status".to_string(), "pending".to_string()),
                    ("status".to_string(), "complete".to_string()),
                    ("limit".to_string(), "20".to_string()),
                ]
        );
    }

    #[test]
    fn scalar_options() {
        let mut config = config();
        let token = CancellationToken::new();
        for option in [
            with_request_timeout(Duration::from_secs(5)),
            with_max_retries(7),
            with_idempotency_key("key-1"),
            with_cancellation(token.clone()),
        ] {
            option.apply(&mut config).expect("apply");
        }

        check!(config.timeout() == Some(Duration::from_secs(5)));
        check!(config.max_retries() == Some(7));
        check!(config.idempotency_key() == Some("key-1"));
        token.cancel();
        check!(config.cancellation().is_some_and(CancellationToken::is_cancelled));
    }

    #[test]
    fn invalid_base_url_fails_on_apply() {
        let mut config = config();
        let_assert!(Err(Error::InvalidUrl(_)) = with_base_url("::nope").apply(&mut config));
    }

    #[test]
    fn json_set_edits_body() {
        let mut config = config()
            .json(&json!({"name": "Payroll"}))
            .expect("body");
        with_json_set("program_id", "prog_1")
            .apply(&mut config)
            .expect("apply");
        check!(config.body() == Some(&json!({"name": "Payroll", "program_id": "prog_1"})));

        let mut empty = config.clone();
        *empty.body_mut() = None;
        with_json_set("a", 1).apply(&mut empty).expect("apply");
        check!(empty.body() == Some(&json!({"a": 1})));

        let mut list = RequestConfig::new(Method::Post, "/batch")
            .json(&json!([1, 2]))
            .expect("body");
        let_assert!(Err(Error::Encoding(_)) = with_json_set("a", 1).apply(&mut list));
    }

    #[test]
    fn response_slot_stores_and_takes() {
        let slot = ResponseSlot::new();
        let mut config = config();
        with_response_into(&slot).apply(&mut config).expect("apply");

        let sink = config.response_slot().expect("slot");
        sink.store(Response::new(200, HashMap::new(), bytes::Bytes::from_static(b"{}")));

        check!(slot.get().map(|r| r.status()) == Some(200));
        check!(slot.take().is_some());
        check!(slot.take().is_none());
    }

    #[test]
    fn debug_shows_name() {
        check!(format!("{:?}", with_max_retries(1)) == r#"RequestOption("max_retries")"#);
    }
}
