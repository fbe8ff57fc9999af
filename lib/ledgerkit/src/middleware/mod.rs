//! Tower middleware for the [`HyperClient`](crate::HyperClient) transport.
//!
//! Layers wrap the single physical exchange. They see every retry attempt
//! separately, after the pipeline has resolved options and headers.
//!
//! - [`LoggingLayer`] - logs exchanges using `tracing`
//!
//! Any `tower::Layer` over [`BoxedService`](crate::BoxedService) can be added
//! with [`HyperClientBuilder::layer`](crate::HyperClientBuilder::layer).
//!
//! # Example
//!
//! ```no_run
//! use ledgerkit::HyperClient;
//! use ledgerkit::tower::limit::ConcurrencyLimitLayer;
//!
//! let http = HyperClient::builder()
//!     .layer(ConcurrencyLimitLayer::new(8))
//!     .with_logging()
//!     .build();
//! ```

mod logging;

pub use logging::{LogLevel, Logging, LoggingLayer};
