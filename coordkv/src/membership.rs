use std::collections::VecDeque;

use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::error::DecodeError;

/// The last known members of the cluster, leader first.
///
/// It is replaced as a whole whenever the membership endpoint is queried, and shrinks as members
/// are found unreachable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipCache {
    members: VecDeque<Endpoint>,
}

impl MembershipCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the body of a membership response: a comma separated list of member addresses,
    /// leader first.
    pub fn parse_machines(body: &str) -> Result<Vec<Endpoint>, DecodeError> {
        let mut res = Vec::new();

        for item in body.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }

            let endpoint = Endpoint::parse(item).map_err(|e| DecodeError::new("membership list", &e))?;
            res.push(endpoint);
        }

        Ok(res)
    }

    /// Replace the cached members. Duplicates are dropped, the first occurrence wins.
    pub fn replace(&mut self, members: impl IntoIterator<Item = Endpoint>) {
        self.members.clear();

        for m in members {
            if !self.members.contains(&m) {
                self.members.push_back(m);
            }
        }
    }

    /// Forget the failed member and take the next one to try.
    ///
    /// The returned member is removed from the cache too: it is only put back by the next
    /// membership refresh.
    pub fn next_candidate(&mut self, failed: &Endpoint) -> Result<Endpoint, ClientError> {
        self.remove(failed);
        self.members.pop_front().ok_or(ClientError::AllNodesDown)
    }

    /// Forget a member found unreachable.
    pub fn remove(&mut self, failed: &Endpoint) {
        self.members.retain(|x| !x.matches(failed));
    }

    /// The presumed leader.
    pub fn leader(&self) -> Option<&Endpoint> {
        self.members.front()
    }

    pub fn members(&self) -> Vec<Endpoint> {
        self.members.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
