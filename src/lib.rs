pub mod consensus;
pub mod error;
pub mod grpc;
pub mod member;

pub use consensus::{ClusterView, ConsensusError, ConsensusServer};
pub use error::{Error, Result};
pub use grpc::{
    start_membership_server, MemberAddResponse, MemberListResponse, MemberPromoteResponse,
    MemberRemoveResponse, MemberUpdateResponse, MembershipClient, MembershipServerHandle,
    MembershipService, Operation,
};
pub use member::{validate_peer_urls, Member, ResponseHeader};
