//! An in-memory cluster of the coordination service, for testing `coordkv`.
//!
//! [`MemCluster`] implements [`Transport`]: requests never leave the process. Every simulated
//! member shares one [`KvStore`]; only the leader serves key and watch requests, the others
//! redirect to it, like the real service does.
//!
//! Members can be made unreachable or failing, and requests can be delayed, to exercise the
//! failover paths of the client.

pub mod store;


use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::env;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyerror::AnyError;
use async_trait::async_trait;
use chrono::Utc;
use coordkv::network::HttpRequest;
use coordkv::network::HttpResponse;
use coordkv::network::Method;
use coordkv::network::Transport;
use coordkv::router::Api;
use coordkv::Endpoint;
use coordkv::NetworkError;
use coordkv::TransportError;
use coordkv::Unreachable;
use serde::Deserialize;
use tokio::sync::watch;
use url::Url;

use crate::store::Entry;
use crate::store::Found;
use crate::store::KvStore;
use crate::store::StoreError;

/// Body of a write request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteBody {
    value: String,
    prev_value: Option<String>,
    ttl: Option<u64>,
}

/// Error body, in the shape the service answers with.
fn error_body(code: u32, e: &impl std::fmt::Display) -> String {
    serde_json::json!({"errorCode": code, "message": e.to_string()}).to_string()
}

fn entry_response(entry: &Entry) -> HttpResponse {
    match serde_json::to_string(entry) {
        Ok(body) => HttpResponse::new(200, body),
        Err(e) => HttpResponse::new(500, error_body(300, &e)),
    }
}

fn store_error_response(e: &StoreError) -> HttpResponse {
    let code = match e {
        StoreError::KeyNotFound(_) => 100,
        StoreError::CompareFailed { .. } => 101,
        StoreError::NotAFile(_) => 102,
    };
    HttpResponse::new(e.status(), error_body(code, e))
}

/// Membership and failure injection state.
#[derive(Debug, Default)]
struct Members {
    /// Every member, in the order they were added.
    all: Vec<Endpoint>,

    leader: Option<Endpoint>,

    /// Members a request to which fails as if the member were down.
    unreachable: HashSet<Endpoint>,

    /// Members a request to which fails with a broken connection.
    network_failure: HashSet<Endpoint>,
}

struct Inner {
    protocol_version: String,

    members: Mutex<Members>,

    store: Mutex<KvStore>,

    /// Carries the index of the last change, to wake up blocked watches.
    changed: watch::Sender<u64>,

    /// To emulate network delay for sending, in milliseconds.
    /// 0 means no delay.
    send_delay: AtomicU64,

    /// Count of requests received, per member and API section.
    request_count: Mutex<HashMap<(Endpoint, Api), u64>>,
}

/// A simulated cluster. Clones share the same cluster.
#[derive(Clone)]
pub struct MemCluster {
    inner: Arc<Inner>,
}

pub struct Builder {
    nodes: u16,
    base_port: u16,
    protocol_version: String,
    send_delay: u64,
}

impl Builder {
    /// Number of members. The first one is the leader.
    pub fn nodes(mut self, n: u16) -> Self {
        self.nodes = n;
        self
    }

    /// Members listen on `127.0.0.1:base_port`, `127.0.0.1:base_port+1`, and so on.
    pub fn base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    pub fn protocol_version(mut self, v: impl ToString) -> Self {
        self.protocol_version = v.to_string();
        self
    }

    pub fn send_delay(mut self, ms: u64) -> Self {
        self.send_delay = ms;
        self
    }

    pub fn build(self) -> MemCluster {
        let send_delay = {
            let send_delay = env::var("COORDKV_MEMCLUSTER_SEND_DELAY").ok();

            if let Some(d) = send_delay.and_then(|d| d.parse::<u64>().ok()) {
                tracing::info!("COORDKV_MEMCLUSTER_SEND_DELAY set send-delay to {} ms", d);
                d
            } else {
                self.send_delay
            }
        };

        let mut members = Members::default();
        for i in 0..self.nodes {
            let addr = format!("http://127.0.0.1:{}", self.base_port + i);
            // A `host:port` built from a valid port always parses.
            if let Ok(ep) = Endpoint::parse(&addr) {
                members.all.push(ep);
            }
        }
        members.leader = members.all.first().cloned();

        let (changed, _) = watch::channel(0);

        MemCluster {
            inner: Arc::new(Inner {
                protocol_version: self.protocol_version,
                members: Mutex::new(members),
                store: Mutex::new(KvStore::new()),
                changed,
                send_delay: AtomicU64::new(send_delay),
                request_count: Default::default(),
            }),
        }
    }
}

impl MemCluster {
    pub fn builder() -> Builder {
        Builder {
            nodes: 3,
            base_port: 4001,
            protocol_version: "v1".to_string(),
            send_delay: 0,
        }
    }

    /// A cluster of `n` members, the first of which is the leader.
    pub fn new(n: u16) -> Self {
        Self::builder().nodes(n).build()
    }

    /// Every member, in the order they were added.
    pub fn members(&self) -> Vec<Endpoint> {
        self.inner.members.lock().unwrap().all.clone()
    }

    /// The `i`-th member.
    pub fn member(&self, i: usize) -> Endpoint {
        self.inner.members.lock().unwrap().all[i].clone()
    }

    pub fn leader(&self) -> Option<Endpoint> {
        self.inner.members.lock().unwrap().leader.clone()
    }

    /// Make `leader` the leader, as if an election took place.
    #[tracing::instrument(level = "debug", skip_all, fields(leader = display(leader)))]
    pub fn set_leader(&self, leader: &Endpoint) {
        let mut m = self.inner.members.lock().unwrap();
        m.leader = Some(leader.clone());
    }

    /// Set to `true` to fail every request to `member` with [`Unreachable`].
    pub fn set_unreachable(&self, member: &Endpoint, unreachable: bool) {
        let mut m = self.inner.members.lock().unwrap();
        if unreachable {
            m.unreachable.insert(member.clone());
        } else {
            m.unreachable.remove(member);
        }
    }

    /// Set to `true` to fail every request to `member` with [`NetworkError`].
    pub fn set_network_failure(&self, member: &Endpoint, failure: bool) {
        let mut m = self.inner.members.lock().unwrap();
        if failure {
            m.network_failure.insert(member.clone());
        } else {
            m.network_failure.remove(member);
        }
    }

    pub fn network_send_delay(&self, ms: u64) {
        self.inner.send_delay.store(ms, Ordering::Relaxed);
    }

    /// The index of the last change in the store.
    pub fn current_index(&self) -> u64 {
        self.inner.store.lock().unwrap().index()
    }

    /// Every change recorded so far, in index order.
    pub fn history(&self) -> Vec<Entry> {
        self.inner.store.lock().unwrap().history().to_vec()
    }

    pub fn get_request_count(&self) -> HashMap<(Endpoint, Api), u64> {
        self.inner.request_count.lock().unwrap().clone()
    }

    /// Requests received by `member`, per API section.
    pub fn requests_to(&self, member: &Endpoint) -> BTreeMap<&'static str, u64> {
        let counts = self.inner.request_count.lock().unwrap();
        counts.iter().filter(|((ep, _), _)| ep == member).map(|((_, api), n)| (api.as_str(), *n)).collect()
    }

    fn count_request(&self, member: &Endpoint, api: Api) {
        let mut counts = self.inner.request_count.lock().unwrap();
        let count = counts.entry((member.clone(), api)).or_insert(0);
        *count += 1;
    }

    async fn send_delay(&self) {
        let send_delay = self.inner.send_delay.load(Ordering::Relaxed);
        if send_delay == 0 {
            return;
        }

        tokio::time::sleep(Duration::from_millis(send_delay)).await;
    }

    fn check_reachable(&self, member: &Endpoint) -> Result<(), TransportError> {
        let m = self.inner.members.lock().unwrap();

        if m.network_failure.contains(member) {
            let err = NetworkError::new(&AnyError::error(format!("connection reset: {}", member)));
            return Err(err.into());
        }

        if m.unreachable.contains(member) || !m.all.contains(member) {
            let err = Unreachable::new(&AnyError::error(format!("unreachable: {}", member)));
            return Err(err.into());
        }

        Ok(())
    }

    /// Split a request URL into member, API section and key.
    fn route(&self, url: &str) -> Result<(Endpoint, Option<Api>, String), TransportError> {
        let u = Url::parse(url).map_err(|e| NetworkError::new(&e))?;
        let member = Endpoint::parse(url).map_err(|e| NetworkError::new(&e))?;

        let path = u.path().trim_start_matches('/');
        let mut parts = path.splitn(3, '/');

        let version = parts.next().unwrap_or_default();
        let api = parts.next().unwrap_or_default();
        let key = parts.next().unwrap_or_default();

        if version != self.inner.protocol_version {
            return Ok((member, None, key.to_string()));
        }

        let api = match api {
            "keys" => Some(Api::Keys),
            "watch" => Some(Api::Watch),
            "leader" => Some(Api::Leader),
            "machines" => Some(Api::Machines),
            _ => None,
        };

        Ok((member, api, key.to_string()))
    }

    fn handle_machines(&self) -> HttpResponse {
        let m = self.inner.members.lock().unwrap();

        let mut list = vec![];
        if let Some(l) = &m.leader {
            list.push(l.to_string());
        }
        for ep in m.all.iter() {
            if Some(ep) != m.leader.as_ref() {
                list.push(ep.to_string());
            }
        }

        HttpResponse::new(200, list.join(", "))
    }

    fn handle_leader(&self) -> HttpResponse {
        match self.leader() {
            Some(l) => HttpResponse::new(200, l),
            None => HttpResponse::new(503, "no leader"),
        }
    }

    fn handle_keys(&self, req: &HttpRequest, key: &str) -> HttpResponse {
        let now = Utc::now();

        let res = {
            let mut store = self.inner.store.lock().unwrap();
            let before = store.index();
            store.expire(now);

            let res = match req.method {
                Method::Get => match store.get(key, now) {
                    Ok(Found::Key(entry)) => Ok(entry_response(&entry)),
                    Ok(Found::Dir(children)) => match serde_json::to_string(&children) {
                        Ok(body) => Ok(HttpResponse::new(200, body)),
                        Err(e) => Ok(HttpResponse::new(500, error_body(300, &e))),
                    },
                    Err(e) => Err(e),
                },
                Method::Post => {
                    let body: WriteBody = match req.body.clone().map(serde_json::from_value::<WriteBody>) {
                        Some(Ok(b)) => b,
                        Some(Err(e)) => return HttpResponse::new(400, error_body(200, &e)),
                        None => return HttpResponse::new(400, error_body(200, &"Value is Required")),
                    };
                    store
                        .set(key, &body.value, body.prev_value.as_deref(), body.ttl, now)
                        .map(|e| entry_response(&e))
                }
                Method::Delete => store.delete(key).map(|e| entry_response(&e)),
            };

            if store.index() != before {
                self.inner.changed.send_replace(store.index());
            }

            res
        };

        match res {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(key, error = display(&e), "key request refused");
                store_error_response(&e)
            }
        }
    }

    /// Block until there is a change under `prefix` at or after `since`.
    ///
    /// Without `since`, wait for the next change from now on.
    async fn handle_watch(&self, prefix: &str, since: Option<u64>) -> HttpResponse {
        let since = match since {
            Some(i) => i,
            None => self.current_index() + 1,
        };

        loop {
            let mut rx = self.inner.changed.subscribe();

            let next_expiration = {
                let mut store = self.inner.store.lock().unwrap();
                if store.expire(Utc::now()) > 0 {
                    self.inner.changed.send_replace(store.index());
                }

                if let Some(change) = store.find_change(prefix, since) {
                    return entry_response(&change);
                }

                store.next_expiration()
            };

            tracing::debug!(prefix, since, "watch blocks");

            match next_expiration {
                Some(t) => {
                    let wait = (t - Utc::now()).to_std().unwrap_or_default();
                    tokio::select! {
                        _ = rx.changed() => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                None => {
                    let _ = rx.changed().await;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for MemCluster {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (member, api, key) = self.route(&req.url)?;

        let api = match api {
            Some(api) => api,
            None => return Ok(HttpResponse::new(404, "404 page not found")),
        };

        tracing::debug!(method = %req.method, member = %member, api = %api, key = %key, "memcluster receives request");

        self.count_request(&member, api);
        self.check_reachable(&member)?;
        self.send_delay().await;

        if matches!(api, Api::Keys | Api::Watch) {
            let leader = self.leader();
            if leader.as_ref() != Some(&member) {
                let leader = match leader {
                    Some(l) => l,
                    None => return Ok(HttpResponse::new(503, "no leader")),
                };

                let path = Url::parse(&req.url).map(|u| u.path().to_string()).unwrap_or_default();
                let location = format!("{}{}", leader, path);

                tracing::debug!(member = %member, location = %location, "redirect to leader");
                return Ok(HttpResponse::redirect(location));
            }
        }

        let resp = match api {
            Api::Machines => self.handle_machines(),
            Api::Leader => self.handle_leader(),
            Api::Keys => self.handle_keys(&req, &key),
            Api::Watch => {
                if req.method != Method::Get {
                    return Ok(HttpResponse::new(405, "method not allowed"));
                }

                let since = req.query.iter().find(|(k, _)| k == "index").and_then(|(_, v)| v.parse::<u64>().ok());
                self.handle_watch(&key, since).await
            }
        };

        Ok(resp)
    }
}
