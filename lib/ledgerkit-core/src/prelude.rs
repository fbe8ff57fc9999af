//! Prelude module for convenient imports.
//!
//! ```
//! use ledgerkit_core::prelude::*;
//! ```

pub use crate::{
    ApiError, Decoded, Error, Extensions, Field, HttpClient, Method, QuerySettings, Request,
    Response, Result, from_json, one_of, to_json,
};
