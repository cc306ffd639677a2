//! Error types exposed by this crate.

use std::error::Error;

use anyerror::AnyError;

use crate::ConfigError;

/// Error that indicates a transport failure other than a timeout or a refused connection,
/// e.g., a broken response body.
///
/// Unlike [`Unreachable`], it does not imply that the member is down, thus the request is not
/// retried on another member.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("NetworkError: {source}")]
pub struct NetworkError {
    #[from]
    source: AnyError,
}

impl NetworkError {
    /// Create a new NetworkError from an error.
    pub fn new<E: Error + 'static>(e: &E) -> Self {
        Self {
            source: AnyError::new(e),
        }
    }
}

/// Error indicating a member did not answer: the connection was refused or timed out.
///
/// The router treats the member as down and moves on to the next known member.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unreachable node: {source}")]
pub struct Unreachable {
    #[from]
    source: AnyError,
}

impl Unreachable {
    /// Create a new Unreachable error from an error.
    pub fn new<E: Error + 'static>(e: &E) -> Self {
        Self {
            source: AnyError::new(e),
        }
    }
}

/// Error returned by a [`Transport`](crate::network::Transport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Unreachable(#[from] Unreachable),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// A response body could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to decode {what}: {source}")]
pub struct DecodeError {
    pub what: String,
    pub source: AnyError,
}

impl DecodeError {
    pub fn new<E: Error + 'static>(what: impl ToString, e: &E) -> Self {
        Self {
            what: what.to_string(),
            source: AnyError::new(e),
        }
    }
}

/// Error returned by the API methods of [`Client`](crate::Client).
///
/// A missing key or a rejected compare-and-swap is not an error: those are reported through the
/// return value of the corresponding method.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// `connect()` could not find a working leader.
    #[error("failed to connect to cluster: {source}")]
    Connection { source: AnyError },

    /// Every known member has been tried for this request and none answered.
    #[error("all known cluster members are down")]
    AllNodesDown,

    /// A single member did not answer.
    ///
    /// The router recovers from it by failing over, it is only seen by callers of
    /// [`Router::refresh`](crate::router::Router::refresh).
    #[error(transparent)]
    Unreachable(#[from] Unreachable),

    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Redirects kept coming after `limit` re-issued requests.
    #[error("too many redirects: gave up after {limit}")]
    TooManyRedirects { limit: u64 },

    /// A redirect response without a usable `Location` header.
    #[error("invalid redirect: {reason}")]
    InvalidRedirect { reason: String },

    /// A write or watch request was answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The client can not be built from the given configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A background task stopped without returning a result.
    #[error("task aborted: {source}")]
    Aborted { source: AnyError },
}

impl ClientError {
    /// Wrap an error that happened while bootstrapping into [`ClientError::Connection`].
    pub(crate) fn connection(e: &ClientError) -> Self {
        match e {
            ClientError::Connection { .. } => e.clone(),
            _ => ClientError::Connection {
                source: AnyError::new(e),
            },
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unreachable(e) => ClientError::Unreachable(e),
            TransportError::Network(e) => ClientError::Network(e),
        }
    }
}
