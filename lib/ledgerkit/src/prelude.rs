//! Prelude module for convenient imports.
//!
//! ```
//! use ledgerkit::prelude::*;
//! ```

pub use crate::{
    ApiError, CancellationToken, Client, ClientOptions, Environment, Error, Extensions, Field,
    HttpClient, HyperClient, Method, Page, RequestConfig, RequestOption, Result, RetryConfig,
    path_segment,
};
pub use serde::{Deserialize, Serialize};
