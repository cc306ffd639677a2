use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::network::ReqwestTransport;
use crate::network::Transport;
use crate::router::Router;
use crate::Config;
use crate::ConfigError;

/// A handle to a cluster of the coordination service.
///
/// A `Client` is cheap to clone: every clone, and every [`Observer`](crate::Observer) started from
/// it, shares the same router, thus the same view of the active member and of the membership.
///
/// Call [`Client::connect`] once before use, so that requests go to the leader right away instead
/// of being redirected.
pub struct Client<T = ReqwestTransport>
where T: Transport
{
    router: Arc<Router<T>>,
}

impl<T> Clone for Client<T>
where T: Transport
{
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
        }
    }
}

impl Client<ReqwestTransport> {
    /// Create a client that talks HTTP to the cluster.
    pub fn http(config: Config) -> Result<Self, ClientError> {
        let config = config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::new(config, transport)?)
    }
}

impl<T> Client<T>
where T: Transport
{
    /// Create a client over an arbitrary [`Transport`].
    ///
    /// No request is sent until [`Client::connect`] or an operation is called.
    pub fn new(config: Config, transport: T) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let seed = config.seed_endpoint()?;

        tracing::debug!(config = debug(&config), "create client");

        let router = Router::new(Arc::new(config), transport, seed);
        Ok(Self {
            router: Arc::new(router),
        })
    }

    /// Load the membership from the seed endpoint and switch to the leader it reports.
    ///
    /// Returns the leader. Every failure is reported as [`ClientError::Connection`].
    pub async fn connect(&self) -> Result<Endpoint, ClientError> {
        self.router.connect().await
    }

    /// The member requests are currently sent to.
    pub fn current_endpoint(&self) -> Endpoint {
        self.router.current_endpoint()
    }

    /// The cached members, presumed leader first.
    pub fn members(&self) -> Vec<Endpoint> {
        self.router.members()
    }

    pub fn config(&self) -> &Arc<Config> {
        self.router.config()
    }

    pub fn router(&self) -> &Arc<Router<T>> {
        &self.router
    }
}
