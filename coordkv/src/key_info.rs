//! Decoding of key entries as returned by the service.

use std::collections::BTreeMap;
use std::fmt;

use anyerror::AnyError;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::error::DecodeError;

/// The kind of mutation that produced an observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Get,
    Set,
    Create,
    Update,
    Delete,
    Expire,
    CompareAndSwap,

    /// A tag this client does not know, lower-cased.
    Other(String),
}

impl Action {
    /// Parse an action tag, case-insensitively.
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim().to_lowercase();
        match tag.as_str() {
            "get" => Action::Get,
            "set" => Action::Set,
            "create" => Action::Create,
            "update" => Action::Update,
            "delete" => Action::Delete,
            "expire" => Action::Expire,
            "compareandswap" | "testandset" => Action::CompareAndSwap,
            _ => Action::Other(tag),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Get => "get",
            Action::Set => "set",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Expire => "expire",
            Action::CompareAndSwap => "compareandswap",
            Action::Other(s) => s,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action::parse(&s)
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        a.as_str().to_string()
    }
}

/// Everything the service reported about one key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// The change-index of the last mutation of this key.
    pub index: u64,

    /// Seconds left until the key expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,

    /// Set if the key is a directory, which has no value of its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<bool>,

    /// Set if the mutation created the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_key: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_value: Option<String>,

    /// Only meaningful for watch notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl KeyInfo {
    pub fn is_dir(&self) -> bool {
        self.dir.unwrap_or(false)
    }
}

/// An entry exactly as it is on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    action: Option<String>,
    key: String,
    value: Option<String>,
    index: u64,
    ttl: Option<i64>,
    expiration: Option<String>,
    dir: Option<bool>,
    new_key: Option<bool>,
    prev_value: Option<String>,
}

/// Result of looking up a key: the key itself or the direct children of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Key(T),
    Dir(BTreeMap<String, T>),
}

impl<T> Lookup<T> {
    /// The single value, if this is not a directory listing.
    pub fn into_key(self) -> Option<T> {
        match self {
            Lookup::Key(v) => Some(v),
            Lookup::Dir(_) => None,
        }
    }

    /// The directory listing, if this is one.
    pub fn into_dir(self) -> Option<BTreeMap<String, T>> {
        match self {
            Lookup::Key(_) => None,
            Lookup::Dir(d) => Some(d),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Lookup::Dir(_))
    }
}

/// Build a [`KeyInfo`] from one decoded entry object.
pub fn extract_info(raw: &serde_json::Value) -> Result<KeyInfo, DecodeError> {
    let raw = RawEntry::deserialize(raw).map_err(|e| DecodeError::new("key entry", &e))?;

    let expiration = match raw.expiration {
        None => None,
        Some(ts) => {
            let t = DateTime::parse_from_rfc3339(&ts).map_err(|e| DecodeError::new("expiration", &e))?;
            Some(t.with_timezone(&Utc))
        }
    };

    Ok(KeyInfo {
        key: raw.key,
        value: raw.value,
        index: raw.index,
        ttl: raw.ttl,
        expiration,
        dir: raw.dir,
        new_key: raw.new_key,
        prev_value: raw.prev_value,
        action: raw.action.map(|a| Action::parse(&a)),
    })
}

/// Decode a response body that holds either one entry or a list of entries.
pub(crate) fn decode_lookup(body: &str) -> Result<Lookup<KeyInfo>, DecodeError> {
    let v: serde_json::Value = serde_json::from_str(body).map_err(|e| DecodeError::new("response body", &e))?;

    match &v {
        serde_json::Value::Array(items) => {
            let mut dir = BTreeMap::new();
            for item in items.iter() {
                let info = extract_info(item)?;
                dir.insert(info.key.clone(), info);
            }
            Ok(Lookup::Dir(dir))
        }
        serde_json::Value::Object(_) => Ok(Lookup::Key(extract_info(&v)?)),
        other => Err(DecodeError {
            what: "response body".to_string(),
            source: AnyError::error(format!("expect an object or a list, got: {}", other)),
        }),
    }
}

/// Decode a response body that must hold exactly one entry.
pub(crate) fn decode_entry(body: &str) -> Result<KeyInfo, DecodeError> {
    match decode_lookup(body)? {
        Lookup::Key(info) => Ok(info),
        Lookup::Dir(_) => Err(DecodeError {
            what: "response body".to_string(),
            source: AnyError::error("expect a single entry, got a list"),
        }),
    }
}
