//! Test utilities shared by unit tests.

use std::sync::Arc;
use std::sync::Mutex;

use anyerror::AnyError;
use async_trait::async_trait;

use crate::error::TransportError;
use crate::error::Unreachable;
use crate::network::HttpRequest;
use crate::network::HttpResponse;
use crate::network::Transport;
use crate::Config;
use crate::Endpoint;

type Reply = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// A transport that answers with a fixed function and records every request.
pub(crate) struct ScriptedTransport {
    reply: Reply,
    pub(crate) sent: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub(crate) fn new(
        reply: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            reply: Box::new(reply),
            sent: Arc::new(Mutex::new(vec![])),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(req.clone());
        (self.reply)(&req)
    }
}

pub(crate) fn ep(s: &str) -> Endpoint {
    Endpoint::parse(s).unwrap()
}

pub(crate) fn unreachable() -> TransportError {
    TransportError::Unreachable(Unreachable::from(AnyError::error("connection refused")))
}

/// A valid config seeded with `http://a:1`.
pub(crate) fn config() -> Config {
    Config {
        endpoint: "http://a:1".to_string(),
        ..Default::default()
    }
    .validate()
    .unwrap()
}

pub(crate) fn urls(sent: &Arc<Mutex<Vec<HttpRequest>>>) -> Vec<String> {
    sent.lock().unwrap().iter().map(|r| r.url.clone()).collect()
}
