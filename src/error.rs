//! Error types for the membership facade.

use thiserror::Error;

/// Result type for membership operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the membership client and the shared
/// validation layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or empty peer-address list, rejected before any remote or
    /// consensus interaction. Never worth retrying.
    #[error("invalid peer URLs: {0}")]
    InvalidPeerUrls(String),

    /// Channel or connection failure before a response was produced.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The call reached the wire but no usable response came back
    /// (unavailable, deadline exceeded, cancelled). Safe to retry only for
    /// operations classified retry-safe.
    #[error("server unavailable: {0}")]
    Unavailable(tonic::Status),

    /// The consensus layer refused the change (unknown member, quorum
    /// safety, promotion of a non-learner, ...). Never retried blindly.
    #[error("membership change rejected: {0}")]
    ConsensusRejected(tonic::Status),
}
