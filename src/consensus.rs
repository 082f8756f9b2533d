//! Capability traits for the consensus layer backing the facade.
//!
//! The facade never implements agreement itself. It validates and shapes
//! membership changes, then hands them to a `ConsensusServer`, which is
//! the sole authority on whether a change commits. Test doubles implement
//! these traits instead of dragging in a full consensus engine.

use std::sync::Arc;

use thiserror::Error;

use crate::member::Member;

/// Rejections the consensus layer can produce for a membership change.
///
/// These are surfaced verbatim through the RPC boundary; the facade never
/// swallows or retries them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("member {0} not found")]
    MemberNotFound(u64),

    #[error("member ID already exists")]
    MemberIdExists,

    #[error("peer URL already exists")]
    PeerUrlExists,

    #[error("member {0} is not a learner")]
    MemberNotLearner(u64),

    #[error("learner {0} has not caught up enough to be promoted")]
    LearnerNotReady(u64),

    #[error("too many learner members in cluster")]
    TooManyLearners,

    #[error("removing member {0} would break quorum viability")]
    QuorumViolation(u64),

    #[error("consensus error: {0}")]
    Internal(String),
}

/// Read-only view of the authoritative membership list and cluster
/// identity. Owned by the consensus layer; the facade only reads it.
pub trait ClusterView: Send + Sync {
    /// The cluster's identity.
    fn id(&self) -> u64;

    /// The current committed membership.
    fn members(&self) -> Vec<Member>;
}

/// The consensus-backed server the facade delegates membership changes
/// to. Each mutating call returns the full post-change member list.
///
/// Ordering and mutual exclusion between concurrent membership changes
/// are this layer's responsibility; the facade stays a stateless
/// pass-through and must not serialize calls itself.
#[tonic::async_trait]
pub trait ConsensusServer: Send + Sync {
    /// Propose adding `member` to the cluster. The consensus layer
    /// assigns the committed ID.
    async fn add_member(&self, member: Member) -> Result<Vec<Member>, ConsensusError>;

    /// Propose removing the member with `id`. Rejected if removal would
    /// break quorum viability.
    async fn remove_member(&self, id: u64) -> Result<Vec<Member>, ConsensusError>;

    /// Republish peer URLs for an existing member. `member` carries only
    /// the target ID and the new peer URLs.
    async fn update_member(&self, member: Member) -> Result<Vec<Member>, ConsensusError>;

    /// Convert a learner into a voting member. The consensus layer alone
    /// decides whether the learner has caught up enough.
    async fn promote_member(&self, id: u64) -> Result<Vec<Member>, ConsensusError>;

    /// This node's own member ID.
    fn id(&self) -> u64;

    /// This node's current consensus term.
    fn term(&self) -> u64;

    /// The authoritative cluster view.
    fn cluster(&self) -> Arc<dyn ClusterView>;
}
