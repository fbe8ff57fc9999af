//! Async client runtime for the ledgerkit banking API.
//!
//! Generated service methods are thin: they build a [`RequestConfig`] and
//! hand it to [`Client::execute`] or [`Client::list`]. This crate does the
//! rest:
//!
//! - option composition ([`options`]) and authentication
//! - retries with exponential backoff and jitter, honouring `Retry-After`
//! - per-attempt timeouts and cooperative cancellation
//! - decoding into typed values, or a structured [`ApiError`]
//! - cursor pagination ([`Page`], [`AutoPager`])
//!
//! The transport is [`HyperClient`] (hyper-util, rustls, tower middleware);
//! any [`HttpClient`] can replace it.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::TryStreamExt;
//! use ledgerkit::prelude::*;
//!
//! #[derive(Debug, Serialize)]
//! struct CreateAccount {
//!     name: String,
//!     #[serde(skip_serializing_if = "Field::is_omitted")]
//!     nickname: Field<String>,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct Account {
//!     id: String,
//!     #[serde(default)]
//!     nickname: Field<String>,
//!     #[serde(flatten)]
//!     extra: Extensions,
//! }
//!
//! # async fn run() -> ledgerkit::Result<()> {
//! let client = Client::from_env()?;
//!
//! let params = CreateAccount { name: "Payroll".into(), nickname: Field::null() };
//! let account: Account = client
//!     .execute(RequestConfig::new(Method::Post, "/accounts").json(&params)?)
//!     .await?;
//!
//! let path = format!("/accounts/{}/transactions", path_segment(&account.id));
//! let transactions: Vec<serde_json::Value> = client
//!     .list(RequestConfig::new(Method::Get, path))
//!     .await?
//!     .auto_paging()
//!     .try_collect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod api_client;
mod client;
mod config;
pub mod middleware;
pub mod options;
mod pagination;
mod pipeline;
pub mod prelude;
mod retry;

pub use api_client::Client;
pub use client::{BoxedService, HyperClient, HyperClientBuilder, ServiceFuture};
pub use config::{
    API_KEY_ENV, BASE_URL_ENV, ClientOptions, ENVIRONMENT_ENV, Environment, RetryConfig,
    TransportConfig, TransportConfigBuilder,
};
pub use options::{RequestOption, ResponseSlot};
pub use pagination::{AutoPager, CursorPage, CursorSource, Page};
pub use pipeline::{CURSOR_PARAM, RequestConfig, USER_AGENT};
pub use retry::RetryPolicy;

// Re-export tower for middleware composition
pub use tower;

// Re-export cancellation for `options::with_cancellation`
pub use tokio_util::sync::CancellationToken;

// Re-export core types
pub use ledgerkit_core::{
    ApiError, ApiErrorBody, ArrayFormat, ContentType, Decoded, Error, ErrorBody, Extensions,
    Field, HttpClient, Method, NestedFormat, QuerySettings, Request, RequestBuilder,
    RequestSnapshot, Response, Result, encode_pairs, escape_component, from_json, is_retryable_status, one_of,
    path_segment, to_json, to_query_pairs, to_query_string,
};

// Re-export http types for status codes and headers
pub use ledgerkit_core::{StatusCode, header};
