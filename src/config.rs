//! Configuration for the relay server and its upstream client

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const ENV_BIND: &str = "RANGE_RELAY_BIND";
const ENV_USER_AGENT: &str = "RANGE_RELAY_USER_AGENT";
const ENV_CONNECT_TIMEOUT: &str = "RANGE_RELAY_CONNECT_TIMEOUT_SECS";
const ENV_REQUEST_TIMEOUT: &str = "RANGE_RELAY_REQUEST_TIMEOUT_SECS";

/// Server and upstream client settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address the HTTP server listens on (default: 0.0.0.0:3000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// User-Agent sent to upstream servers
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream connect timeout in seconds (default: 10)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Overall upstream request timeout in seconds, covering the body
    /// transfer. None = unlimited, so large downloads are not cut off.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            bind_address: default_bind_address(),
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
        }
    }
}

impl RelayConfig {
    /// Defaults overridden by any `RANGE_RELAY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = RelayConfig::default();

        if let Some(value) = lookup(ENV_BIND) {
            config.bind_address = parse_value(ENV_BIND, &value)?;
        }
        if let Some(value) = lookup(ENV_USER_AGENT) {
            config.user_agent = value;
        }
        if let Some(value) = lookup(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout_secs = parse_value(ENV_CONNECT_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT) {
            config.request_timeout_secs = Some(parse_value(ENV_REQUEST_TIMEOUT, &value)?);
        }

        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| Error::Config {
        key: key.to_string(),
        message: format!("{value:?}: {e}"),
    })
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}
