//! Watching keys for changes.
//!
//! [`Client::watch`] waits for one change. [`Client::observe`] keeps watching in the background
//! and hands every change to a [`WatchHandler`], without missing or repeating any.

mod observer;


use tokio::sync::mpsc;

pub use observer::Observer;

use crate::error::ClientError;
use crate::key_info::decode_entry;
use crate::key_info::KeyInfo;
use crate::network::Transport;
use crate::router::Api;
use crate::router::Request;
use crate::Client;

/// Receives the changes found by a watch.
///
/// Any `FnMut(Option<&str>, &str, &KeyInfo)` closure is a handler.
pub trait WatchHandler {
    /// Called with the new value (`None` for a removal or a directory), the changed key and
    /// everything else known about the change.
    fn on_change(&mut self, value: Option<&str>, key: &str, info: &KeyInfo);
}

impl<F> WatchHandler for F
where F: FnMut(Option<&str>, &str, &KeyInfo)
{
    fn on_change(&mut self, value: Option<&str>, key: &str, info: &KeyInfo) {
        self(value, key, info)
    }
}

/// Forwards every change to a channel, for consumers running on their own task.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<KeyInfo>,
}

impl ChannelHandler {
    pub fn new(tx: mpsc::UnboundedSender<KeyInfo>) -> Self {
        Self { tx }
    }
}

impl WatchHandler for ChannelHandler {
    fn on_change(&mut self, _value: Option<&str>, key: &str, info: &KeyInfo) {
        if self.tx.send(info.clone()).is_err() {
            tracing::debug!(key, index = info.index, "receiver is closed, drop change");
        }
    }
}

impl<T> Client<T>
where T: Transport
{
    /// Wait for the next change under `prefix`, at or after `index` if given.
    ///
    /// It blocks until the service reports a change: no timeout applies. The change is passed to
    /// `handler` and returned.
    #[tracing::instrument(level = "debug", skip(self, handler))]
    pub async fn watch<H>(&self, prefix: &str, index: Option<u64>, handler: &mut H) -> Result<KeyInfo, ClientError>
    where H: WatchHandler {
        let info = self.poll_watch(prefix, index).await?;
        handler.on_change(info.value.as_deref(), &info.key, &info);
        Ok(info)
    }

    /// Keep watching `prefix` in a background task, starting at `index` if given.
    pub fn observe<H>(&self, prefix: &str, index: Option<u64>, handler: H) -> Observer
    where H: WatchHandler + Send + 'static {
        Observer::spawn(self.clone(), prefix, index, handler)
    }

    /// Like [`observe`](Self::observe), delivering the changes through a channel.
    pub fn observe_channel(&self, prefix: &str, index: Option<u64>) -> (Observer, mpsc::UnboundedReceiver<KeyInfo>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = self.observe(prefix, index, ChannelHandler::new(tx));
        (observer, rx)
    }

    /// Send one long-poll watch request and decode the change it returns.
    pub(crate) async fn poll_watch(&self, prefix: &str, index: Option<u64>) -> Result<KeyInfo, ClientError> {
        let mut req = Request::get(Api::Watch, prefix).long_poll();
        if let Some(index) = index {
            req = req.with_query("index", index);
        }

        let resp = self.router().perform(&req).await?;

        if !resp.is_ok() {
            return Err(ClientError::UnexpectedStatus {
                status: resp.status,
                body: resp.body,
            });
        }

        Ok(decode_entry(&resp.body)?)
    }
}
