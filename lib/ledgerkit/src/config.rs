//! Client configuration types.
//!
//! - [`ClientOptions`] - API key, environment, retries and timeout for a [`Client`](crate::Client)
//! - [`RetryConfig`] - backoff parameters
//! - [`TransportConfig`] - connection settings for [`HyperClient`](crate::HyperClient)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::options::RequestOption;
use crate::{Error, Result};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "LEDGERKIT_API_KEY";
/// Environment variable selecting `production` or `sandbox`.
pub const ENVIRONMENT_ENV: &str = "LEDGERKIT_ENVIRONMENT";
/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "LEDGERKIT_BASE_URL";

// ============================================================================
// Environment
// ============================================================================

/// Deployment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Live money.
    #[default]
    Production,
    /// Test money.
    Sandbox,
}

impl Environment {
    /// Base URL of this environment.
    #[must_use]
    pub const fn base_url(&self) -> &'static str {
        match self {
            Self::Production => "https://api.ledgerkit.com",
            Self::Sandbox => "https://sandbox.ledgerkit.com",
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(Error::config(format!(
                "unknown environment `{other}`, expected `production` or `sandbox`"
            ))),
        }
    }
}

// ============================================================================
// Retry
// ============================================================================

/// Retry parameters.
///
/// The delay before retry `n` (0-based) is `initial_delay * 2^n`, capped at
/// `max_delay`, then reduced by up to 25% of random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for the computed delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    /// A single attempt, never retried.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
}

// ============================================================================
// Client Options
// ============================================================================

/// Settings for a [`Client`](crate::Client), fixed at construction.
///
/// # Example
///
/// ```
/// use ledgerkit::{ClientOptions, Environment, RetryConfig};
/// use std::time::Duration;
///
/// let options = ClientOptions::new()
///     .api_key("sk_test_123")
///     .environment(Environment::Sandbox)
///     .retry(RetryConfig::default().max_retries(4))
///     .timeout(Duration::from_secs(30));
/// assert_eq!(options.base_url().expect("url").as_str(), "https://sandbox.ledgerkit.com/");
/// ```
#[derive(Clone, Default)]
pub struct ClientOptions {
    api_key: Option<String>,
    environment: Environment,
    base_url: Option<Url>,
    retry: RetryConfig,
    timeout: Option<Duration>,
    extra: Vec<RequestOption>,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("extra", &self.extra)
            .finish()
    }
}

impl ClientOptions {
    /// Per-attempt timeout used when none is configured.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Options with defaults: production, no API key, two retries, 60 s timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `LEDGERKIT_API_KEY`, `LEDGERKIT_ENVIRONMENT` and `LEDGERKIT_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown environment name and
    /// [`Error::InvalidUrl`] for a malformed base URL.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name| lookup(name).filter(|value: &String| !value.trim().is_empty());

        let mut options = Self::new();
        if let Some(api_key) = non_empty(API_KEY_ENV) {
            options.api_key = Some(api_key);
        }
        if let Some(environment) = non_empty(ENVIRONMENT_ENV) {
            options.environment = environment.parse()?;
        }
        if let Some(base_url) = non_empty(BASE_URL_ENV) {
            options.base_url = Some(Url::parse(base_url.trim())?);
        }
        Ok(options)
    }

    /// Set the API key sent as a bearer token.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Select the environment.
    #[must_use]
    pub const fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Override the environment's base URL.
    #[must_use]
    pub fn base_url_override(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the retry parameters.
    #[must_use]
    pub const fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add an option applied to every request, after the built-in ones.
    #[must_use]
    pub fn option(mut self, option: RequestOption) -> Self {
        self.extra.push(option);
        self
    }

    /// The configured API key.
    #[must_use]
    pub fn api_key_value(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// The selected environment.
    #[must_use]
    pub const fn environment_value(&self) -> Environment {
        self.environment
    }

    /// Effective base URL: the override, else the environment's URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the environment URL cannot be parsed.
    pub fn base_url(&self) -> Result<Url> {
        match &self.base_url {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(self.environment.base_url())?),
        }
    }

    /// Retry parameters.
    #[must_use]
    pub const fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Per-attempt timeout.
    #[must_use]
    pub fn timeout_value(&self) -> Duration {
        self.timeout.unwrap_or(Self::DEFAULT_TIMEOUT)
    }

    /// Extra options.
    #[must_use]
    pub fn extra_options(&self) -> &[RequestOption] {
        &self.extra
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Connection settings for [`HyperClient`](crate::HyperClient).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl TransportConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }
}

/// Builder for [`TransportConfig`].
#[derive(Debug, Clone, Default)]
pub struct TransportConfigBuilder {
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
}

impl TransportConfigBuilder {
    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> TransportConfig {
        let defaults = TransportConfig::default();
        TransportConfig {
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
        }
    }
}
