//! Key operations on top of the router.

use std::collections::BTreeMap;

use serde_json::json;
use serde_json::Map;
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::key_info::decode_entry;
use crate::key_info::decode_lookup;
use crate::key_info::KeyInfo;
use crate::key_info::Lookup;
use crate::membership::MembershipCache;
use crate::network::HttpResponse;
use crate::network::Transport;
use crate::router::Api;
use crate::router::Request;
use crate::Client;

fn write_body(value: &str, prev_value: Option<&str>, ttl: Option<u64>) -> Value {
    let mut m = Map::new();
    m.insert("value".to_string(), json!(value));
    if let Some(prev) = prev_value {
        m.insert("prevValue".to_string(), json!(prev));
    }
    if let Some(ttl) = ttl {
        m.insert("ttl".to_string(), json!(ttl));
    }
    Value::Object(m)
}

fn unexpected(resp: HttpResponse) -> ClientError {
    ClientError::UnexpectedStatus {
        status: resp.status,
        body: resp.body,
    }
}

impl<T> Client<T>
where T: Transport
{
    /// Read a key.
    ///
    /// A directory is returned as a map from the key of each direct child to its value.
    /// Children without a value, i.e. sub-directories, are left out. A directory with no child
    /// that has a value is returned as `None`.
    ///
    /// Returns `None` if the key does not exist.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<Lookup<String>>, ClientError> {
        let found = match self.lookup(key).await? {
            None => return Ok(None),
            Some(x) => x,
        };

        let res = match found {
            Lookup::Key(info) => info.value.map(Lookup::Key),
            Lookup::Dir(children) => {
                let values: BTreeMap<_, _> =
                    children.into_iter().filter_map(|(k, info)| info.value.map(|v| (k, v))).collect();
                if values.is_empty() {
                    None
                } else {
                    Some(Lookup::Dir(values))
                }
            }
        };

        Ok(res)
    }

    /// Like [`get`](Self::get) but returns everything known about the key.
    ///
    /// `action` is always cleared: it only makes sense for watch notifications.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn info(&self, key: &str) -> Result<Option<Lookup<KeyInfo>>, ClientError> {
        let found = self.lookup(key).await?;

        let res = found.map(|l| match l {
            Lookup::Key(info) => Lookup::Key(KeyInfo { action: None, ..info }),
            Lookup::Dir(children) => Lookup::Dir(
                children.into_iter().map(|(k, info)| (k, KeyInfo { action: None, ..info })).collect::<BTreeMap<_, _>>(),
            ),
        });

        Ok(res)
    }

    /// Whether a key exists, or a directory holding at least one key with a value.
    pub async fn exists(&self, key: &str) -> Result<bool, ClientError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Write a key, optionally expiring after `ttl` seconds.
    ///
    /// Returns the value it replaced.
    #[tracing::instrument(level = "debug", skip(self, value))]
    pub async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<Option<String>, ClientError> {
        let req = Request::post(Api::Keys, key, write_body(value, None, ttl));
        let resp = self.router().perform(&req).await?;

        if !resp.is_ok() {
            return Err(unexpected(resp));
        }

        let info = decode_entry(&resp.body)?;
        Ok(info.prev_value)
    }

    /// Write a key only if its current value is `expected`.
    ///
    /// Returns `false` if the comparison failed or the key does not exist.
    #[tracing::instrument(level = "debug", skip(self, value, expected))]
    pub async fn update(&self, key: &str, value: &str, expected: &str, ttl: Option<u64>) -> Result<bool, ClientError> {
        let req = Request::post(Api::Keys, key, write_body(value, Some(expected), ttl));
        let resp = self.router().perform(&req).await?;

        tracing::debug!(status = resp.status, "compare and swap");
        Ok(resp.is_ok())
    }

    /// Remove a key.
    ///
    /// Returns the removed value, or `None` if there was no such key.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn delete(&self, key: &str) -> Result<Option<String>, ClientError> {
        let resp = self.router().perform(&Request::delete(Api::Keys, key)).await?;

        if !resp.is_ok() {
            return Ok(None);
        }

        let info = decode_entry(&resp.body)?;
        Ok(info.prev_value)
    }

    /// Ask the leader for the cluster members and refresh the cached membership with them.
    ///
    /// Returns the members, leader first.
    pub async fn machines(&self) -> Result<Vec<Endpoint>, ClientError> {
        let resp = self.router().perform(&Request::get(Api::Machines, "")).await?;

        if !resp.is_ok() {
            return Err(unexpected(resp));
        }

        let members = MembershipCache::parse_machines(&resp.body)?;
        self.router().replace_members(members.clone());

        Ok(members)
    }

    /// The address the service reports as its leader.
    pub async fn leader(&self) -> Result<String, ClientError> {
        let resp = self.router().perform(&Request::get(Api::Leader, "")).await?;

        if !resp.is_ok() {
            return Err(unexpected(resp));
        }

        Ok(resp.body.trim().to_string())
    }

    async fn lookup(&self, key: &str) -> Result<Option<Lookup<KeyInfo>>, ClientError> {
        let resp = self.router().perform(&Request::get(Api::Keys, key)).await?;

        if !resp.is_ok() {
            tracing::debug!(key, status = resp.status, "key not found");
            return Ok(None);
        }

        Ok(Some(decode_lookup(&resp.body)?))
    }
}
