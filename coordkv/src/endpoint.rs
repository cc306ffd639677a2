use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use url::Url;

/// Error returned when a string can not be turned into an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid endpoint {input:?}: {reason}")]
pub struct InvalidEndpoint {
    pub input: String,
    pub reason: String,
}

impl InvalidEndpoint {
    fn new(input: &str, reason: impl ToString) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Base address of one cluster member: `scheme://host[:port]`.
///
/// It never ends with a `/` and never carries a path, so that the protocol version and the
/// action segments can be appended to it directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
pub struct Endpoint(String);

impl Endpoint {
    /// Parse an endpoint from `host:port`, `scheme://host:port` or any absolute URL.
    ///
    /// Path, query and fragment of a URL are dropped. `http` is assumed if there is no scheme.
    pub fn parse(input: &str) -> Result<Self, InvalidEndpoint> {
        let s = input.trim();
        if s.is_empty() {
            return Err(InvalidEndpoint::new(input, "empty address"));
        }

        let with_scheme = if s.contains("://") {
            s.to_string()
        } else {
            format!("http://{}", s)
        };

        let url = Url::parse(&with_scheme).map_err(|e| InvalidEndpoint::new(input, e))?;

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => return Err(InvalidEndpoint::new(input, "no host")),
        };

        let base = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        Ok(Self(base))
    }

    /// Extract the endpoint from the `Location` header of a redirect.
    ///
    /// A `Location` must be an absolute URL: a bare `host:port` is not accepted here because it
    /// can not be told apart from a relative path.
    pub fn from_location(location: &str) -> Result<Self, InvalidEndpoint> {
        if !location.contains("://") {
            return Err(InvalidEndpoint::new(location, "not an absolute URL"));
        }
        Self::parse(location)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether two endpoints refer to the same member.
    ///
    /// Addresses reported by the membership endpoint and addresses seen in redirects are not
    /// always spelled the same way, so one being a prefix of the other is considered a match, as
    /// long as the prefix ends at a path boundary: `http://a:2379` does not match `http://a:23790`.
    pub fn matches(&self, other: &Endpoint) -> bool {
        prefix_at_boundary(self.as_str(), other.as_str()) || prefix_at_boundary(other.as_str(), self.as_str())
    }
}

fn prefix_at_boundary(s: &str, prefix: &str) -> bool {
    match s.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
