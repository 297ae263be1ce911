//! Connection configuration and environment selection.
use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ConfigError;

pub const PRODUCTION_URL: &str = "https://api.ticketbaiws.eus/";
pub const TEST_URL: &str = "https://api-test.ticketbaiws.eus/";

/// Requests that take longer than this are abandoned by the transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// TicketBaiWS environment. Only the base URL differs between the two.
///
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use ticketbai_core::Environment;
///
/// let env = Environment::from_str("test")?;
/// assert_eq!(env.base_url(), "https://api-test.ticketbaiws.eus/");
/// # Ok::<(), ticketbai_core::config::EnvironmentParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Test,
}

/// Error returned when parsing an [`Environment`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid environment: {input}")]
pub struct EnvironmentParseError {
    pub input: String,
}

impl FromStr for Environment {
    type Err = EnvironmentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            _ => Err(EnvironmentParseError {
                input: s.to_string(),
            }),
        }
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_URL,
            Environment::Test => TEST_URL,
        }
    }
}

/// Everything the client needs to talk to TicketBaiWS.
///
/// The token is never serialized and is redacted from `Debug` output.
///
/// # Examples
/// ```rust
/// use ticketbai_core::{ClientConfig, Environment};
///
/// let config = ClientConfig::new(Environment::Test, "my-token", "B12345678");
/// assert_eq!(config.base_url(), "https://api-test.ticketbaiws.eus/");
/// assert!(!config.verify_tls());
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RawClientConfig")]
pub struct ClientConfig {
    environment: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(skip_serializing)]
    token: String,
    nif: String,
    verify_tls: bool,
    debug: bool,
    timeout_ms: u64,
}

/// Wire form of [`ClientConfig`]; validated and normalized on the way in.
#[derive(Deserialize)]
struct RawClientConfig {
    #[serde(default)]
    environment: Environment,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    token: String,
    nif: String,
    #[serde(default)]
    verify_tls: bool,
    #[serde(default)]
    debug: bool,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

impl TryFrom<RawClientConfig> for ClientConfig {
    type Error = ConfigError;

    fn try_from(raw: RawClientConfig) -> Result<Self, Self::Error> {
        let mut config = ClientConfig::new(raw.environment, raw.token, raw.nif)
            .with_verify_tls(raw.verify_tls)
            .with_debug(raw.debug);
        if let Some(url) = raw.base_url {
            config = config.with_base_url(url);
        }
        config.timeout_ms = nonzero_timeout("timeout_ms", raw.timeout_ms)?;
        Ok(config)
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn nonzero_timeout(var: &'static str, ms: u64) -> Result<u64, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: ms.to_string(),
        });
    }
    Ok(ms)
}

impl ClientConfig {
    pub fn new(environment: Environment, token: impl Into<String>, nif: impl Into<String>) -> Self {
        Self {
            environment,
            base_url: None,
            token: token.into(),
            nif: nif.into(),
            verify_tls: false,
            debug: false,
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Point the client at another host, e.g. a local mock of the service.
    /// A trailing slash is added when missing.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut url = base_url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.base_url = Some(url);
        self
    }

    /// Set the per-request timeout. Millisecond precision is kept; a timeout
    /// that rounds down to zero is rejected.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.timeout_ms = nonzero_timeout("timeout", ms)?;
        Ok(self)
    }

    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Build a configuration from `TICKETBAI_*` environment variables.
    ///
    /// `TICKETBAI_TOKEN` and `TICKETBAI_NIF` are required. `TICKETBAI_ENV`,
    /// `TICKETBAI_BASE_URL`, `TICKETBAI_VERIFY_TLS`, `TICKETBAI_DEBUG` and
    /// `TICKETBAI_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let environment = match lookup("TICKETBAI_ENV") {
            Some(value) => value.parse::<Environment>().map_err(|_| ConfigError::Invalid {
                var: "TICKETBAI_ENV",
                value,
            })?,
            None => Environment::default(),
        };

        let mut config = Self::new(
            environment,
            required("TICKETBAI_TOKEN")?,
            required("TICKETBAI_NIF")?,
        );

        if let Some(url) = lookup("TICKETBAI_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Some(value) = lookup("TICKETBAI_VERIFY_TLS") {
            config.verify_tls = parse_flag("TICKETBAI_VERIFY_TLS", value)?;
        }
        if let Some(value) = lookup("TICKETBAI_DEBUG") {
            config.debug = parse_flag("TICKETBAI_DEBUG", value)?;
        }
        if let Some(value) = lookup("TICKETBAI_TIMEOUT_SECS") {
            let invalid = || ConfigError::Invalid {
                var: "TICKETBAI_TIMEOUT_SECS",
                value: value.clone(),
            };
            let secs = value.trim().parse::<u64>().map_err(|_| invalid())?;
            if secs == 0 {
                return Err(invalid());
            }
            config.timeout_ms = secs.saturating_mul(1000);
        }

        Ok(config)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn nif(&self) -> &str {
        &self.nif
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn set_verify_tls(&mut self, verify_tls: bool) {
        self.verify_tls = verify_tls;
    }

    pub(crate) fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url())
            .field("token", &"***")
            .field("nif", &self.nif)
            .field("verify_tls", &self.verify_tls)
            .field("debug", &self.debug)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}
