use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// HTTP methods used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single HTTP request to one member.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,

    /// Absolute URL, without query string.
    pub url: String,

    pub query: Vec<(String, String)>,

    /// JSON body.
    pub body: Option<serde_json::Value>,

    /// Upper bound for the whole exchange.
    ///
    /// `None` for long-poll requests, which block until the server has something to say.
    pub timeout: Option<Duration>,
}

/// The raw answer of a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,

    /// Value of the `Location` header, if any.
    pub location: Option<String>,

    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl ToString) -> Self {
        Self {
            status,
            location: None,
            body: body.to_string(),
        }
    }

    /// A redirect response pointing to `location`.
    pub fn redirect(location: impl ToString) -> Self {
        Self {
            status: 307,
            location: Some(location.to_string()),
            body: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

/// A component that delivers [`HttpRequest`]s to cluster members.
///
/// An implementation must not follow redirects: a redirect tells the client who the leader is,
/// and the router handles it itself.
///
/// A request that can not reach the member at all, because the connection is refused or the
/// request times out, must be reported as [`TransportError::Unreachable`]. Any HTTP status,
/// including errors, is a valid [`HttpResponse`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError>;
}
