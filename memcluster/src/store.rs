//! The key space shared by every simulated member.

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// An entry or a change, in the shape the service answers with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    pub key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_key: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,

    pub index: u64,
}

/// Why a key operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Key Not Found: {0}")]
    KeyNotFound(String),

    #[error("Compare failed: [{expected} != {actual}]")]
    CompareFailed { expected: String, actual: String },

    #[error("Not A File: {0}")]
    NotAFile(String),
}

impl StoreError {
    /// The HTTP status this error is answered with.
    pub fn status(&self) -> u16 {
        match self {
            StoreError::KeyNotFound(_) => 404,
            StoreError::CompareFailed { .. } => 412,
            StoreError::NotAFile(_) => 403,
        }
    }
}

/// The result of reading a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    Key(Entry),
    Dir(Vec<Entry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    value: String,
    modified_index: u64,
    expiration: Option<DateTime<Utc>>,
}

/// Keys with their change history.
///
/// Directories are implicit: a key is a directory if another key lives under it.
/// Expired keys are removed lazily, by the first operation that looks at the store after they
/// expire; the removal is recorded as an `expire` change.
#[derive(Debug, Default)]
pub struct KvStore {
    nodes: BTreeMap<String, Node>,
    history: Vec<Entry>,
    index: u64,
}

/// Normalize a key to start with exactly one `/` and to not end with one.
pub fn normalize(key: &str) -> String {
    let k = key.trim_matches('/');
    format!("/{}", k)
}

/// Whether `key` is `prefix` or lives under it.
pub fn under(prefix: &str, key: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    key == prefix || (key.starts_with(prefix) && key[prefix.len()..].starts_with('/'))
}

fn format_expiration(t: &Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.to_rfc3339())
}

fn ttl_left(t: &Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    t.map(|t| (t - now).num_seconds().max(0) + 1)
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The index of the last change.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn history(&self) -> &[Entry] {
        &self.history
    }

    /// Remove every key that has expired by `now`.
    ///
    /// Returns the number of removed keys.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.expiration.map(|t| t <= now).unwrap_or(false))
            .map(|(k, _)| k.clone())
            .collect();

        for key in expired.iter() {
            if let Some(node) = self.nodes.remove(key) {
                tracing::debug!(key = display(key), "key expired");
                let index = self.index + 1;
                self.record(Entry {
                    action: Some("expire".to_string()),
                    key: key.clone(),
                    prev_value: Some(node.value),
                    index,
                    ..Default::default()
                });
            }
        }

        expired.len()
    }

    /// The earliest expiration of any key.
    pub fn next_expiration(&self) -> Option<DateTime<Utc>> {
        self.nodes.values().filter_map(|n| n.expiration).min()
    }

    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Found, StoreError> {
        let key = normalize(key);

        if let Some(node) = self.nodes.get(&key) {
            return Ok(Found::Key(Entry {
                action: Some("get".to_string()),
                key,
                value: Some(node.value.clone()),
                expiration: format_expiration(&node.expiration),
                ttl: ttl_left(&node.expiration, now),
                index: node.modified_index,
                ..Default::default()
            }));
        }

        let children = self.children(&key, now);
        if children.is_empty() {
            return Err(StoreError::KeyNotFound(key));
        }

        Ok(Found::Dir(children))
    }

    /// The direct children of directory `dir`, sub-directories included.
    fn children(&self, dir: &str, now: DateTime<Utc>) -> Vec<Entry> {
        let mut res: Vec<Entry> = vec![];

        for (k, node) in self.nodes.iter() {
            if k.as_str() == dir || !under(dir, k) {
                continue;
            }

            let rest = if dir == "/" { &k[1..] } else { &k[dir.len() + 1..] };

            match rest.find('/') {
                None => res.push(Entry {
                    action: Some("get".to_string()),
                    key: k.clone(),
                    value: Some(node.value.clone()),
                    expiration: format_expiration(&node.expiration),
                    ttl: ttl_left(&node.expiration, now),
                    index: node.modified_index,
                    ..Default::default()
                }),
                Some(pos) => {
                    let child = if dir == "/" {
                        format!("/{}", &rest[..pos])
                    } else {
                        format!("{}/{}", dir, &rest[..pos])
                    };

                    let idx = node.modified_index;
                    if let Some(d) = res.iter_mut().find(|e| e.key == child) {
                        d.index = d.index.max(idx);
                    } else {
                        res.push(Entry {
                            action: Some("get".to_string()),
                            key: child,
                            dir: Some(true),
                            index: idx,
                            ..Default::default()
                        });
                    }
                }
            }
        }

        res
    }

    /// Write a key, optionally only if its current value is `prev_value`.
    pub fn set(
        &mut self,
        key: &str,
        value: &str,
        prev_value: Option<&str>,
        ttl: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Entry, StoreError> {
        let key = normalize(key);

        // Neither a directory nor under a key that has a value.
        if self.nodes.keys().any(|k| k != &key && (under(&key, k) || under(k, &key))) {
            return Err(StoreError::NotAFile(key));
        }

        let current = self.nodes.get(&key).map(|n| n.value.clone());

        if let Some(expected) = prev_value {
            match &current {
                None => return Err(StoreError::KeyNotFound(key)),
                Some(actual) if actual != expected => {
                    return Err(StoreError::CompareFailed {
                        expected: expected.to_string(),
                        actual: actual.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        let expiration = ttl.map(|t| now + Duration::seconds(t as i64));
        let index = self.index + 1;

        self.nodes.insert(key.clone(), Node {
            value: value.to_string(),
            modified_index: index,
            expiration,
        });

        let action = if prev_value.is_some() { "compareAndSwap" } else { "set" };

        let entry = Entry {
            action: Some(action.to_string()),
            key,
            value: Some(value.to_string()),
            new_key: if current.is_none() { Some(true) } else { None },
            prev_value: current,
            expiration: format_expiration(&expiration),
            ttl: ttl.map(|t| t as i64),
            index,
            ..Default::default()
        };

        self.record(entry.clone());
        Ok(entry)
    }

    pub fn delete(&mut self, key: &str) -> Result<Entry, StoreError> {
        let key = normalize(key);

        let node = match self.nodes.remove(&key) {
            Some(n) => n,
            None => return Err(StoreError::KeyNotFound(key)),
        };

        let entry = Entry {
            action: Some("delete".to_string()),
            key,
            prev_value: Some(node.value),
            index: self.index + 1,
            ..Default::default()
        };

        self.record(entry.clone());
        Ok(entry)
    }

    /// The first change at or after index `since` to a key under `prefix`.
    pub fn find_change(&self, prefix: &str, since: u64) -> Option<Entry> {
        let prefix = normalize(prefix);

        self.history.iter().find(|e| e.index >= since && under(&prefix, &e.key)).cloned()
    }

    fn record(&mut self, entry: Entry) {
        self.index = entry.index;
        self.history.push(entry);
    }
}
