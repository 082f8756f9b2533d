//! Cluster member entity and peer-URL validation.
//!
//! A `Member` is proposed by a caller, validated, submitted to the
//! consensus layer, and only then carries a committed ID. Validation is
//! shared by the client and server halves of the facade so both reject
//! identical bad input identically.

use std::time::SystemTime;

use http::Uri;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A participant in the cluster.
///
/// `id` is zero until the consensus layer commits the membership change
/// and assigns one; it is immutable afterwards and never reused. `name`
/// and `client_urls` stay empty until the member itself starts and
/// publishes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub name: String,
    /// Addresses other members use to reach this member. Non-empty and
    /// well-formed at creation time.
    pub peer_urls: Vec<String>,
    /// Addresses external clients use; may be empty until published.
    pub client_urls: Vec<String>,
    /// True while the member replicates the log without voting.
    pub is_learner: bool,
    /// True for a learner the consensus layer promotes on its own once it
    /// has caught up with the leader. Meaningful only while `is_learner`.
    pub auto_promote: bool,
    /// Proposal timestamp, set by the server's add path. Not carried on
    /// the wire.
    #[serde(skip)]
    pub created: Option<SystemTime>,
}

impl Member {
    /// Create a voting member proposal from already-validated peer URLs.
    pub fn new_node(peer_urls: Vec<String>, now: SystemTime) -> Self {
        Self::new(peer_urls, false, false, now)
    }

    /// Create a learner proposal (replicates, does not vote).
    pub fn new_learner(peer_urls: Vec<String>, now: SystemTime) -> Self {
        Self::new(peer_urls, true, false, now)
    }

    /// Create a learner proposal that the consensus layer promotes to a
    /// voting member by itself once the learner has caught up.
    pub fn new_auto_promoting_node(peer_urls: Vec<String>, now: SystemTime) -> Self {
        Self::new(peer_urls, true, true, now)
    }

    fn new(peer_urls: Vec<String>, is_learner: bool, auto_promote: bool, now: SystemTime) -> Self {
        Self {
            id: 0,
            name: String::new(),
            peer_urls,
            client_urls: Vec::new(),
            is_learner,
            auto_promote,
            created: Some(now),
        }
    }
}

/// Response metadata identifying the responding node.
///
/// Attached to every response so a caller can detect whether two
/// sequential responses came from a node that still believes it is part
/// of the same cluster and term lineage. The facade does not enforce
/// this; comparison is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub cluster_id: u64,
    /// The responder's own member ID, not the target member's.
    pub member_id: u64,
    pub raft_term: u64,
}

impl ResponseHeader {
    /// Whether `other` came from the same cluster identity at the same or
    /// a later term. A `false` result means the responder stepped down,
    /// was replaced, or belongs to a different cluster.
    pub fn same_lineage(&self, other: &ResponseHeader) -> bool {
        self.cluster_id == other.cluster_id && other.raft_term >= self.raft_term
    }
}

/// Validate a peer-address list before it goes anywhere near the
/// consensus layer.
///
/// Every address must be an absolute `http` or `https` URL with a host
/// and nothing else (no path, no query). An empty list is rejected: a
/// member nobody can reach must never enter committed configuration.
pub fn validate_peer_urls(urls: &[String]) -> Result<()> {
    if urls.is_empty() {
        return Err(Error::InvalidPeerUrls("no peer URLs given".to_string()));
    }
    for url in urls {
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::InvalidPeerUrls(format!("{url}: {e}")))?;
        match uri.scheme_str() {
            Some("http") | Some("https") => {}
            Some(other) => {
                return Err(Error::InvalidPeerUrls(format!(
                    "{url}: unsupported scheme {other:?}"
                )));
            }
            None => {
                return Err(Error::InvalidPeerUrls(format!("{url}: missing scheme")));
            }
        }
        if uri.authority().is_none() {
            return Err(Error::InvalidPeerUrls(format!("{url}: missing host")));
        }
        if uri.path() != "/" && !uri.path().is_empty() {
            return Err(Error::InvalidPeerUrls(format!(
                "{url}: must not contain a path"
            )));
        }
        if uri.query().is_some() {
            return Err(Error::InvalidPeerUrls(format!(
                "{url}: must not contain a query"
            )));
        }
    }
    Ok(())
}
