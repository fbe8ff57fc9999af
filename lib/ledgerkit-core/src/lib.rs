//! Core types and traits for the ledgerkit API client runtime.
//!
//! This crate has no network code. It provides:
//! - [`Field`] - omitted / null / present request and response values
//! - [`to_json`], [`from_json`], [`Decoded`], [`Extensions`] and [`one_of!`] - the JSON codec
//! - [`to_query_string`] and [`QuerySettings`] - query-string serialization
//! - [`Method`], [`Request`], [`RequestBuilder`], [`Response`] - HTTP exchange types
//! - [`HttpClient`] - the transport trait
//! - [`Error`], [`ApiError`] and [`Result`] - error handling
//! - [`StatusCode`] and [`header`] - re-exported from the `http` crate

mod client;
mod codec;
mod error;
mod field;
mod method;
pub mod prelude;
mod query;
mod request;
mod response;
mod tagged;

pub use client::HttpClient;
pub use codec::{ContentType, Decoded, Extensions, from_json, to_json};
pub use error::{
    ApiError, ApiErrorBody, Error, ErrorBody, RequestSnapshot, Result, is_retryable_status,
    redact_headers,
};
pub use field::Field;
pub use method::Method;
pub use query::{
    ArrayFormat, NestedFormat, QueryError, QuerySettings, encode_pairs, escape_component,
    to_query_pairs, to_query_string,
};
pub use request::{Request, RequestBuilder, path_segment};
pub use response::Response;

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};

/// Items used by [`one_of!`] expansions.
#[doc(hidden)]
pub mod __private {
    pub use serde;
    pub use serde_json;

    pub use crate::tagged::{Variant, split_variant};
}
