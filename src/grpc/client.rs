//! Client half of the membership facade.
//!
//! `MembershipClient` is a typed stub over the generated gRPC client. It
//! performs the same peer-URL validation the server does, before anything
//! crosses the wire, and maps transport and remote failures into the
//! crate's error taxonomy. It never retries internally; retry policy
//! belongs to the channel, guided by [`Operation::retry_safe`].

use slog::{debug, Logger};
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use crate::error::{Error, Result};
use crate::grpc::proto;
use crate::grpc::proto::membership_client::MembershipClient as MembershipGrpcClient;
use crate::member::{validate_peer_urls, Member, ResponseHeader};

/// The five membership operations, classified by retry safety.
///
/// Only `Update` (republishing the same peer URLs for an existing ID is
/// idempotent) and `List` (pure read) are safe to retry blindly. `Add`
/// assigns a fresh ID on every call, so a retry can double-add a member;
/// `Remove` and `Promote` mutate voting topology and are not guaranteed
/// safe across all failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Remove,
    Update,
    Promote,
    List,
}

impl Operation {
    /// Whether a channel-level retry policy may reissue this operation
    /// after an ambiguous failure.
    pub const fn retry_safe(self) -> bool {
        matches!(self, Operation::Update | Operation::List)
    }
}

/// Response to a member add: the newly committed member plus the full
/// post-change membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberAddResponse {
    pub header: ResponseHeader,
    pub member: Member,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRemoveResponse {
    pub header: ResponseHeader,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberUpdateResponse {
    pub header: ResponseHeader,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberListResponse {
    pub header: ResponseHeader,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPromoteResponse {
    pub header: ResponseHeader,
    pub members: Vec<Member>,
}

/// Typed client for the membership service.
pub struct MembershipClient {
    remote: MembershipGrpcClient<Channel>,
    logger: Logger,
}

impl MembershipClient {
    /// Connect to a membership server at `address` (host:port).
    pub async fn connect(address: &str, logger: Logger) -> Result<Self> {
        let endpoint = format!("http://{}", address);
        let channel = Endpoint::from_shared(endpoint)?.connect().await?;
        Ok(Self::from_channel(channel, logger))
    }

    /// Build a client over an already-established channel. The channel
    /// owns connection management and any retry policy.
    pub fn from_channel(channel: Channel, logger: Logger) -> Self {
        Self {
            remote: MembershipGrpcClient::new(channel),
            logger,
        }
    }

    /// Add a new voting member.
    pub async fn member_add_as_node(&mut self, peer_urls: &[String]) -> Result<MemberAddResponse> {
        self.member_add(peer_urls, false, false).await
    }

    /// Add a new learner (replicates, does not vote).
    pub async fn member_add_as_learner(
        &mut self,
        peer_urls: &[String],
    ) -> Result<MemberAddResponse> {
        self.member_add(peer_urls, true, false).await
    }

    /// Add a new learner that the consensus layer promotes to a voting
    /// member by itself once it has caught up with the leader.
    pub async fn member_add_as_auto_promoting_node(
        &mut self,
        peer_urls: &[String],
    ) -> Result<MemberAddResponse> {
        self.member_add(peer_urls, true, true).await
    }

    async fn member_add(
        &mut self,
        peer_urls: &[String],
        is_learner: bool,
        auto_promote: bool,
    ) -> Result<MemberAddResponse> {
        // Fail fast on bad addresses before the request crosses the wire;
        // same rule the server applies.
        validate_peer_urls(peer_urls)?;

        debug!(self.logger, "adding member";
            "is_learner" => is_learner,
            "auto_promote" => auto_promote,
        );
        let request = proto::MemberAddRequest {
            peer_urls: peer_urls.to_vec(),
            is_learner,
            auto_promote,
        };
        let resp = self
            .remote
            .member_add(request)
            .await
            .map_err(classify_status)?
            .into_inner();
        Ok(MemberAddResponse {
            header: header_from_proto(resp.header),
            member: resp.member.map(member_from_proto).unwrap_or_default(),
            members: members_from_proto(resp.members),
        })
    }

    /// Remove an existing member by ID. Not safe to retry blindly.
    pub async fn member_remove(&mut self, id: u64) -> Result<MemberRemoveResponse> {
        let resp = self
            .remote
            .member_remove(proto::MemberRemoveRequest { id })
            .await
            .map_err(classify_status)?
            .into_inner();
        Ok(MemberRemoveResponse {
            header: header_from_proto(resp.header),
            members: members_from_proto(resp.members),
        })
    }

    /// Republish the peer URLs of an existing member.
    ///
    /// It is safe to retry on update.
    pub async fn member_update(
        &mut self,
        id: u64,
        peer_urls: &[String],
    ) -> Result<MemberUpdateResponse> {
        validate_peer_urls(peer_urls)?;

        let request = proto::MemberUpdateRequest {
            id,
            peer_urls: peer_urls.to_vec(),
        };
        let resp = self
            .remote
            .member_update(request)
            .await
            .map_err(classify_status)?
            .into_inner();
        Ok(MemberUpdateResponse {
            header: header_from_proto(resp.header),
            members: members_from_proto(resp.members),
        })
    }

    /// List the current cluster membership.
    ///
    /// It is safe to retry on list.
    pub async fn member_list(&mut self) -> Result<MemberListResponse> {
        let resp = self
            .remote
            .member_list(proto::MemberListRequest {})
            .await
            .map_err(classify_status)?
            .into_inner();
        Ok(MemberListResponse {
            header: header_from_proto(resp.header),
            members: members_from_proto(resp.members),
        })
    }

    /// Promote a learner to a voting member. The server side reports the
    /// consensus layer's accept/reject verbatim.
    pub async fn member_promote(&mut self, id: u64) -> Result<MemberPromoteResponse> {
        let resp = self
            .remote
            .member_promote(proto::MemberPromoteRequest { id })
            .await
            .map_err(classify_status)?
            .into_inner();
        Ok(MemberPromoteResponse {
            header: header_from_proto(resp.header),
            members: members_from_proto(resp.members),
        })
    }
}

/// Split remote failures into transport-kind errors (the call may not
/// have reached the server) and consensus rejections (it did, and was
/// refused).
fn classify_status(status: Status) -> Error {
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled | Code::Unknown => {
            Error::Unavailable(status)
        }
        _ => Error::ConsensusRejected(status),
    }
}

fn header_from_proto(header: Option<proto::ResponseHeader>) -> ResponseHeader {
    let header = header.unwrap_or_default();
    ResponseHeader {
        cluster_id: header.cluster_id,
        member_id: header.member_id,
        raft_term: header.raft_term,
    }
}

fn member_from_proto(member: proto::Member) -> Member {
    Member {
        id: member.id,
        name: member.name,
        peer_urls: member.peer_urls,
        client_urls: member.client_urls,
        is_learner: member.is_learner,
        auto_promote: false,
        created: None,
    }
}

fn members_from_proto(members: Vec<proto::Member>) -> Vec<Member> {
    members.into_iter().map(member_from_proto).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_safety_table() {
        assert!(!Operation::Add.retry_safe());
        assert!(!Operation::Remove.retry_safe());
        assert!(Operation::Update.retry_safe());
        assert!(!Operation::Promote.retry_safe());
        assert!(Operation::List.retry_safe());
    }

    #[test]
    fn test_classify_status() {
        let transportish = [
            Code::Unavailable,
            Code::DeadlineExceeded,
            Code::Cancelled,
            Code::Unknown,
        ];
        for code in transportish {
            assert!(matches!(
                classify_status(Status::new(code, "x")),
                Error::Unavailable(_)
            ));
        }
        for code in [
            Code::NotFound,
            Code::FailedPrecondition,
            Code::AlreadyExists,
            Code::InvalidArgument,
        ] {
            assert!(matches!(
                classify_status(Status::new(code, "x")),
                Error::ConsensusRejected(_)
            ));
        }
    }

    #[test]
    fn test_member_from_proto_defaults() {
        let m = member_from_proto(proto::Member {
            id: 8,
            name: String::new(),
            peer_urls: vec!["http://10.0.0.2:2380".to_string()],
            client_urls: vec![],
            is_learner: true,
        });
        assert_eq!(m.id, 8);
        assert!(m.is_learner);
        assert!(!m.auto_promote);
        assert!(m.created.is_none());
    }
}
