//! The request router: sends each request to the leader and follows the leader around.
//!
//! Two signals move the router to another member:
//!
//! - A redirect, which names the leader. The router switches to it, reloads the member list
//!   from it and sends the request again.
//! - An unreachable member. The router drops it from the member list, switches to the next
//!   known member and sends the request again, until no member is left.

mod state;


use std::sync::Arc;
use std::sync::Mutex;

pub use state::normalize_key;
pub use state::Api;
pub use state::RouterState;

use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::error::TransportError;
use crate::error::Unreachable;
use crate::membership::MembershipCache;
use crate::network::HttpRequest;
use crate::network::HttpResponse;
use crate::network::Method;
use crate::network::Transport;
use crate::Config;

/// One logical operation, independent of the member it is eventually sent to.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub api: Api,
    pub key: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,

    /// A long-poll request is not subject to the request timeout.
    pub long_poll: bool,
}

impl Request {
    pub fn new(method: Method, api: Api, key: impl ToString) -> Self {
        Self {
            method,
            api,
            key: key.to_string(),
            query: vec![],
            body: None,
            long_poll: false,
        }
    }

    pub fn get(api: Api, key: impl ToString) -> Self {
        Self::new(Method::Get, api, key)
    }

    pub fn post(api: Api, key: impl ToString, body: serde_json::Value) -> Self {
        Self::new(Method::Post, api, key).with_body(body)
    }

    pub fn delete(api: Api, key: impl ToString) -> Self {
        Self::new(Method::Delete, api, key)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, name: impl ToString, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn long_poll(mut self) -> Self {
        self.long_poll = true;
        self
    }
}

/// Routes requests to the current leader.
///
/// The active member and the member list are shared by every request sent through one router,
/// including those sent from background watch tasks. Both live behind short critical sections
/// that are never held across a network call.
pub struct Router<T>
where T: Transport
{
    config: Arc<Config>,
    transport: T,

    /// The snapshot of the active member. Replaced, never modified in place.
    state: Mutex<Arc<RouterState>>,

    /// Lock order: `members` before `state`.
    members: Mutex<MembershipCache>,
}

impl<T> Router<T>
where T: Transport
{
    /// Create a router that targets `seed` and knows no other member yet.
    pub fn new(config: Arc<Config>, transport: T, seed: Endpoint) -> Self {
        let state = RouterState::new(0, seed, &config.protocol_version);
        Self {
            config,
            transport,
            state: Mutex::new(Arc::new(state)),
            members: Mutex::new(MembershipCache::new()),
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The current snapshot of the active member.
    pub fn current(&self) -> Arc<RouterState> {
        self.state.lock().unwrap().clone()
    }

    pub fn current_endpoint(&self) -> Endpoint {
        self.current().endpoint().clone()
    }

    /// The cached members, presumed leader first.
    pub fn members(&self) -> Vec<Endpoint> {
        self.members.lock().unwrap().members()
    }

    /// Switch to `endpoint`. This is the only way the active member changes.
    pub fn change_endpoint(&self, endpoint: Endpoint) -> Arc<RouterState> {
        let mut state = self.state.lock().unwrap();
        let next = Arc::new(state.next(endpoint, &self.config.protocol_version));

        tracing::info!(
            from = display(state.endpoint()),
            to = display(next.endpoint()),
            version = next.version(),
            "change active endpoint"
        );

        *state = next.clone();
        next
    }

    /// Reload the member list from the active member and replace the cache with it.
    ///
    /// It sends exactly one request: an unreachable member is reported as
    /// [`ClientError::Unreachable`] rather than failed over.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn refresh(&self) -> Result<Vec<Endpoint>, ClientError> {
        let state = self.current();
        let req = Request::get(Api::Machines, "");

        let resp = self.send_to(&state, &req).await?;
        if !resp.is_ok() {
            return Err(ClientError::UnexpectedStatus {
                status: resp.status,
                body: resp.body,
            });
        }

        let members = MembershipCache::parse_machines(&resp.body)?;
        self.replace_members(members.clone());

        tracing::debug!(from = display(state.endpoint()), members = debug(&members), "refreshed members");
        Ok(members)
    }

    pub(crate) fn replace_members(&self, members: Vec<Endpoint>) {
        self.members.lock().unwrap().replace(members);
    }

    /// Bootstrap: load the member list from the seed and switch to the presumed leader.
    ///
    /// Returns the leader it switched to. Every failure is reported as
    /// [`ClientError::Connection`].
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn connect(&self) -> Result<Endpoint, ClientError> {
        let seed = self.config.seed_endpoint().map_err(|e| ClientError::Connection {
            source: anyerror::AnyError::new(&e),
        })?;
        self.change_endpoint(seed.clone());

        self.refresh().await.map_err(|e| ClientError::connection(&e))?;

        let leader = {
            let members = self.members.lock().unwrap();
            members.leader().cloned()
        };

        let leader = leader.ok_or_else(|| ClientError::connection(&ClientError::AllNodesDown))?;
        self.change_endpoint(leader.clone());

        tracing::info!(seed = display(&seed), leader = display(&leader), "connected");
        Ok(leader)
    }

    /// Perform one logical operation on the leader.
    ///
    /// Redirects are followed by switching to the named member; unreachable members are
    /// replaced by the next known member. Both loops are bounded: see
    /// [`Config::max_redirects`] for redirects; failover stops when no member is left.
    #[tracing::instrument(level = "debug", skip_all, fields(method = %req.method, api = %req.api, key = %req.key))]
    pub async fn perform(&self, req: &Request) -> Result<HttpResponse, ClientError> {
        let known = self.members.lock().unwrap().len() as u64;

        let redirect_limit = self.config.max_redirects.unwrap_or_else(|| known.max(1));
        let mut redirects = 0;

        // The active member plus every cached member.
        let mut failovers_left = known + 1;

        loop {
            let state = self.current();

            match self.send_to(&state, req).await {
                Ok(resp) if resp.is_redirect() => {
                    redirects += 1;
                    if redirects > redirect_limit {
                        tracing::warn!(limit = redirect_limit, "too many redirects");
                        return Err(ClientError::TooManyRedirects { limit: redirect_limit });
                    }

                    self.follow_redirect(&state, &resp).await?;

                    let known = self.members.lock().unwrap().len() as u64;
                    failovers_left = failovers_left.max(known + 1);
                }
                Ok(resp) => return Ok(resp),
                Err(TransportError::Unreachable(e)) => {
                    if failovers_left == 0 {
                        return Err(ClientError::AllNodesDown);
                    }
                    failovers_left -= 1;

                    self.handle_leader_down(&state, &e)?;
                }
                Err(TransportError::Network(e)) => return Err(e.into()),
            }
        }
    }

    /// Switch to the member named by a redirect and reload the member list from it.
    async fn follow_redirect(&self, state: &RouterState, resp: &HttpResponse) -> Result<(), ClientError> {
        let location = resp.location.as_deref().ok_or_else(|| ClientError::InvalidRedirect {
            reason: format!("status {} without Location header", resp.status),
        })?;

        let leader = Endpoint::from_location(location).map_err(|e| ClientError::InvalidRedirect {
            reason: e.to_string(),
        })?;

        tracing::debug!(from = display(state.endpoint()), to = display(&leader), "redirected");
        self.change_endpoint(leader);

        match self.refresh().await {
            Ok(_) => Ok(()),
            // The new leader is down as well: the next attempt finds out and fails over.
            Err(ClientError::Unreachable(e)) => {
                tracing::warn!(error = display(&e), "failed to refresh members after redirect");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Give up on the member `state` points to and switch to the next known one.
    ///
    /// If another request has already switched away from that member, only the cache is pruned
    /// and the caller retries on the newer member.
    fn handle_leader_down(&self, state: &RouterState, err: &Unreachable) -> Result<(), ClientError> {
        let failed = state.endpoint();
        tracing::warn!(endpoint = display(failed), error = display(err), "member unreachable");

        let mut members = self.members.lock().unwrap();
        let mut current = self.state.lock().unwrap();

        if current.version() != state.version() {
            members.remove(failed);
            tracing::debug!(
                failed = display(failed),
                current = display(current.endpoint()),
                "active endpoint already changed by another request"
            );
            return Ok(());
        }

        let next = members.next_candidate(failed)?;
        let next = Arc::new(current.next(next, &self.config.protocol_version));

        tracing::info!(
            from = display(failed),
            to = display(next.endpoint()),
            version = next.version(),
            "fail over to next member"
        );

        *current = next;
        Ok(())
    }

    async fn send_to(&self, state: &RouterState, req: &Request) -> Result<HttpResponse, TransportError> {
        let http_req = HttpRequest {
            method: req.method,
            url: state.uri(req.api, &req.key),
            query: req.query.clone(),
            body: req.body.clone(),
            timeout: if req.long_poll {
                None
            } else {
                Some(self.config.request_timeout())
            },
        };

        tracing::debug!(method = %http_req.method, url = %http_req.url, "send request");

        self.transport.send(http_req).await
    }
}
