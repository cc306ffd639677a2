use std::fmt;

use crate::endpoint::Endpoint;

/// The API sections of a member, the path segment right after the protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    Keys,
    Watch,
    Leader,
    Machines,
}

impl Api {
    pub fn as_str(&self) -> &'static str {
        match self {
            Api::Keys => "keys",
            Api::Watch => "watch",
            Api::Leader => "leader",
            Api::Machines => "machines",
        }
    }

    /// Whether the section is addressed by a key.
    pub fn takes_key(&self) -> bool {
        matches!(self, Api::Keys | Api::Watch)
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalize a key to start with exactly one `/`.
pub fn normalize_key(key: &str) -> String {
    format!("/{}", key.trim_start_matches('/'))
}

/// An immutable snapshot of the member the router talks to.
///
/// Every change of the active member produces a new snapshot with a greater `version`, which
/// lets a request that failed on an old snapshot find out that another request has already
/// moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterState {
    version: u64,
    endpoint: Endpoint,
    base_uri: String,
    leader_uri: String,
    machines_uri: String,
}

impl RouterState {
    pub(crate) fn new(version: u64, endpoint: Endpoint, protocol_version: &str) -> Self {
        let base_uri = format!("{}/{}", endpoint, protocol_version);
        let leader_uri = format!("{}/{}", base_uri, Api::Leader);
        let machines_uri = format!("{}/{}", base_uri, Api::Machines);

        Self {
            version,
            endpoint,
            base_uri,
            leader_uri,
            machines_uri,
        }
    }

    /// Build the snapshot that follows this one, targeting `endpoint`.
    pub(crate) fn next(&self, endpoint: Endpoint, protocol_version: &str) -> Self {
        Self::new(self.version + 1, endpoint, protocol_version)
    }

    /// The absolute URI of `key` in the `api` section.
    ///
    /// Sections that are not addressed by key ignore it.
    pub fn uri(&self, api: Api, key: &str) -> String {
        match api {
            Api::Keys | Api::Watch => format!("{}/{}{}", self.base_uri, api, normalize_key(key)),
            Api::Leader => self.leader_uri.clone(),
            Api::Machines => self.machines_uri.clone(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn leader_uri(&self) -> &str {
        &self.leader_uri
    }

    pub fn machines_uri(&self) -> &str {
        &self.machines_uri
    }
}
