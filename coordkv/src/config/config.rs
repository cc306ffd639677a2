//! Client runtime configuration.

use std::time::Duration;

use anyerror::AnyError;
use clap::Parser;
use serde::Deserialize;
use serde::Serialize;

use crate::config::error::ConfigError;
use crate::endpoint::Endpoint;

/// The runtime configuration for a [`Client`](crate::Client).
///
/// Every option can be given as a command line flag or through an environment variable, so that
/// an application can embed the client options into its own command line with `#[clap(flatten)]`.
///
/// Only the seed `endpoint` has to point at a live member: on `connect()` the client asks it for
/// the full membership list and switches to the leader it reports.
#[derive(Clone, Debug, Serialize, Deserialize, Parser)]
pub struct Config {
    /// Base address of the member to bootstrap from, e.g. `http://127.0.0.1:4001`.
    #[clap(long, env = "COORDKV_ENDPOINT", default_value = "http://127.0.0.1:4001")]
    pub endpoint: String,

    /// The protocol version segment appended to every member address.
    #[clap(long, env = "COORDKV_PROTOCOL_VERSION", default_value = "v1")]
    pub protocol_version: String,

    /// Timeout in milliseconds for an ordinary request.
    ///
    /// Long-poll watches are never subject to this timeout.
    #[clap(long, env = "COORDKV_REQUEST_TIMEOUT", default_value = "5000")]
    pub request_timeout: u64,

    /// Timeout in milliseconds for establishing a connection to a member.
    ///
    /// A member that can not be connected to within this time is treated as down and the
    /// request is retried against the next known member.
    #[clap(long, env = "COORDKV_CONNECT_TIMEOUT", default_value = "1000")]
    pub connect_timeout: u64,

    /// The maximum number of redirects followed for one request.
    ///
    /// If unset, the number of known members is used.
    #[clap(long, env = "COORDKV_MAX_REDIRECTS")]
    pub max_redirects: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        <Self as Parser>::parse_from(Vec::<&'static str>::new())
    }
}

impl Config {
    /// Build a `Config` instance from a series of command line arguments.
    ///
    /// The first element in `args` must be the application name.
    pub fn build(args: &[&str]) -> Result<Config, ConfigError> {
        let config = <Self as Parser>::try_parse_from(args).map_err(|e| ConfigError::ParseError {
            source: AnyError::new(&e),
            args: args.iter().map(|x| x.to_string()).collect(),
        })?;
        config.validate()
    }

    /// Validate the state of this config.
    pub fn validate(self) -> Result<Config, ConfigError> {
        self.seed_endpoint()?;

        let v = &self.protocol_version;
        if v.is_empty() || v.contains('/') || v.trim() != v {
            return Err(ConfigError::InvalidProtocolVersion { invalid: v.clone() });
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::ZeroTimeout {
                name: "request_timeout",
            });
        }

        if self.connect_timeout == 0 {
            return Err(ConfigError::ZeroTimeout {
                name: "connect_timeout",
            });
        }

        if self.max_redirects == Some(0) {
            return Err(ConfigError::MaxRedirectsIs0);
        }

        Ok(self)
    }

    /// The parsed seed endpoint.
    pub fn seed_endpoint(&self) -> Result<Endpoint, ConfigError> {
        Endpoint::parse(&self.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            invalid: self.endpoint.clone(),
            reason: e.to_string(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }
}
