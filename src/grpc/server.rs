//! Server half of the membership facade.
//!
//! `MembershipService` receives membership-change requests, validates
//! them, builds the `Member` proposal, and delegates to the consensus
//! layer. It holds no mutable state of its own; all ordering guarantees
//! for concurrent changes belong to the consensus layer.

use std::sync::Arc;
use std::time::SystemTime;

use slog::{info, Logger};
use tokio::sync::oneshot;
use tonic::{transport::Server, Request, Response, Status};
use tonic_reflection::server::Builder as ReflectionBuilder;

use crate::consensus::{ClusterView, ConsensusError, ConsensusServer};
use crate::grpc::proto;
use crate::grpc::proto::membership_server::{Membership, MembershipServer};
use crate::member::{validate_peer_urls, Member};

/// gRPC service implementation for membership administration.
pub struct MembershipService {
    server: Arc<dyn ConsensusServer>,
    cluster: Arc<dyn ClusterView>,
    logger: Logger,
}

impl MembershipService {
    pub fn new(server: Arc<dyn ConsensusServer>, logger: Logger) -> Self {
        let cluster = server.cluster();
        Self { server, cluster, logger }
    }

    /// Header built from the responder's own identity, attached to every
    /// response so callers can detect cluster or term changes across
    /// calls.
    fn header(&self) -> proto::ResponseHeader {
        proto::ResponseHeader {
            cluster_id: self.cluster.id(),
            member_id: self.server.id(),
            raft_term: self.server.term(),
        }
    }
}

#[tonic::async_trait]
impl Membership for MembershipService {
    async fn member_add(
        &self,
        request: Request<proto::MemberAddRequest>,
    ) -> Result<Response<proto::MemberAddResponse>, Status> {
        let req = request.into_inner();
        validate_peer_urls(&req.peer_urls)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        let now = SystemTime::now();
        let member = if req.is_learner {
            if req.auto_promote {
                Member::new_auto_promoting_node(req.peer_urls.clone(), now)
            } else {
                Member::new_learner(req.peer_urls.clone(), now)
            }
        } else {
            // A plain node ignores auto_promote; there is nothing to
            // promote it to.
            Member::new_node(req.peer_urls.clone(), now)
        };
        info!(self.logger, "adding member";
            "peer_urls" => req.peer_urls.join(","),
            "is_learner" => member.is_learner,
            "auto_promote" => member.auto_promote,
        );

        let members = self
            .server
            .add_member(member)
            .await
            .map_err(consensus_error_to_status)?;

        // The consensus layer assigned the ID at commit time; recover the
        // new member from the authoritative post-change list. Peer URLs
        // are unique in committed configuration, so the match is exact.
        let added = members
            .iter()
            .find(|m| m.peer_urls == req.peer_urls)
            .ok_or_else(|| Status::internal("added member missing from post-change list"))?;

        Ok(Response::new(proto::MemberAddResponse {
            header: Some(self.header()),
            member: Some(proto::Member {
                id: added.id,
                peer_urls: added.peer_urls.clone(),
                is_learner: added.is_learner,
                // Name and client URLs stay unset until the member starts
                // and publishes itself.
                ..Default::default()
            }),
            members: members_to_proto(&members),
        }))
    }

    async fn member_remove(
        &self,
        request: Request<proto::MemberRemoveRequest>,
    ) -> Result<Response<proto::MemberRemoveResponse>, Status> {
        let req = request.into_inner();
        let members = self
            .server
            .remove_member(req.id)
            .await
            .map_err(consensus_error_to_status)?;
        Ok(Response::new(proto::MemberRemoveResponse {
            header: Some(self.header()),
            members: members_to_proto(&members),
        }))
    }

    async fn member_update(
        &self,
        request: Request<proto::MemberUpdateRequest>,
    ) -> Result<Response<proto::MemberUpdateResponse>, Status> {
        let req = request.into_inner();
        validate_peer_urls(&req.peer_urls)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        // Only the target ID and the new peer URLs matter here; an update
        // republishes addresses without touching quorum size.
        let member = Member {
            id: req.id,
            peer_urls: req.peer_urls,
            ..Default::default()
        };
        let members = self
            .server
            .update_member(member)
            .await
            .map_err(consensus_error_to_status)?;
        Ok(Response::new(proto::MemberUpdateResponse {
            header: Some(self.header()),
            members: members_to_proto(&members),
        }))
    }

    async fn member_list(
        &self,
        _request: Request<proto::MemberListRequest>,
    ) -> Result<Response<proto::MemberListResponse>, Status> {
        // Pure read of the cluster view; no consensus round trip.
        let members = members_to_proto(&self.cluster.members());
        Ok(Response::new(proto::MemberListResponse {
            header: Some(self.header()),
            members,
        }))
    }

    async fn member_promote(
        &self,
        request: Request<proto::MemberPromoteRequest>,
    ) -> Result<Response<proto::MemberPromoteResponse>, Status> {
        let req = request.into_inner();
        // The consensus layer alone decides whether the learner has caught
        // up enough; no catch-up check here.
        let members = self
            .server
            .promote_member(req.id)
            .await
            .map_err(consensus_error_to_status)?;
        Ok(Response::new(proto::MemberPromoteResponse {
            header: Some(self.header()),
            members: members_to_proto(&members),
        }))
    }
}

/// Translate a consensus-layer rejection into a gRPC status, once, at the
/// boundary.
fn consensus_error_to_status(err: ConsensusError) -> Status {
    match err {
        ConsensusError::MemberNotFound(_) => Status::not_found(err.to_string()),
        ConsensusError::MemberIdExists | ConsensusError::PeerUrlExists => {
            Status::already_exists(err.to_string())
        }
        ConsensusError::MemberNotLearner(_)
        | ConsensusError::LearnerNotReady(_)
        | ConsensusError::TooManyLearners
        | ConsensusError::QuorumViolation(_) => Status::failed_precondition(err.to_string()),
        ConsensusError::Internal(_) => Status::internal(err.to_string()),
    }
}

fn members_to_proto(members: &[Member]) -> Vec<proto::Member> {
    members
        .iter()
        .map(|m| proto::Member {
            id: m.id,
            name: m.name.clone(),
            peer_urls: m.peer_urls.clone(),
            client_urls: m.client_urls.clone(),
            is_learner: m.is_learner,
        })
        .collect()
}

/// Handle for the running membership server with graceful shutdown
/// support.
pub struct MembershipServerHandle {
    shutdown_tx: oneshot::Sender<()>,
}

impl MembershipServerHandle {
    /// Trigger graceful shutdown of the server
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Start the membership gRPC server on the given address.
///
/// Registers the membership service and a reflection service, and returns
/// a handle that shuts the server down when dropped into `shutdown`.
pub async fn start_membership_server(
    address: String,
    server: Arc<dyn ConsensusServer>,
    logger: Logger,
) -> Result<MembershipServerHandle, Box<dyn std::error::Error>> {
    let addr = address.parse()?;
    let service = MembershipService::new(server, logger.clone());

    let reflection_service = ReflectionBuilder::configure()
        .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    info!(logger, "membership server listening"; "address" => &address);
    tokio::spawn(async move {
        Server::builder()
            .add_service(MembershipServer::new(service))
            .add_service(reflection_service)
            .serve_with_shutdown(addr, async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("membership gRPC server failed");
    });

    Ok(MembershipServerHandle { shutdown_tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::{o, Drain};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tonic::Code;

    fn test_logger() -> Logger {
        let decorator = slog_term::PlainDecorator::new(std::io::sink());
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Logger::root(drain, o!())
    }

    /// Consensus double that rejects everything and counts how often it
    /// was reached.
    struct RejectingConsensus {
        calls: AtomicUsize,
    }

    struct EmptyView;

    impl ClusterView for EmptyView {
        fn id(&self) -> u64 {
            77
        }
        fn members(&self) -> Vec<Member> {
            Vec::new()
        }
    }

    #[tonic::async_trait]
    impl ConsensusServer for RejectingConsensus {
        async fn add_member(&self, _member: Member) -> Result<Vec<Member>, ConsensusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ConsensusError::Internal("down".to_string()))
        }
        async fn remove_member(&self, id: u64) -> Result<Vec<Member>, ConsensusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ConsensusError::MemberNotFound(id))
        }
        async fn update_member(&self, member: Member) -> Result<Vec<Member>, ConsensusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ConsensusError::MemberNotFound(member.id))
        }
        async fn promote_member(&self, id: u64) -> Result<Vec<Member>, ConsensusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ConsensusError::MemberNotLearner(id))
        }
        fn id(&self) -> u64 {
            42
        }
        fn term(&self) -> u64 {
            9
        }
        fn cluster(&self) -> Arc<dyn ClusterView> {
            Arc::new(EmptyView)
        }
    }

    fn service_with_counter() -> (MembershipService, Arc<RejectingConsensus>) {
        let consensus = Arc::new(RejectingConsensus { calls: AtomicUsize::new(0) });
        let service = MembershipService::new(consensus.clone(), test_logger());
        (service, consensus)
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ConsensusError::MemberNotFound(5), Code::NotFound),
            (ConsensusError::MemberIdExists, Code::AlreadyExists),
            (ConsensusError::PeerUrlExists, Code::AlreadyExists),
            (ConsensusError::MemberNotLearner(5), Code::FailedPrecondition),
            (ConsensusError::LearnerNotReady(5), Code::FailedPrecondition),
            (ConsensusError::TooManyLearners, Code::FailedPrecondition),
            (ConsensusError::QuorumViolation(5), Code::FailedPrecondition),
            (
                ConsensusError::Internal("x".to_string()),
                Code::Internal,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(consensus_error_to_status(err).code(), code);
        }
    }

    #[tokio::test]
    async fn test_add_rejects_bad_urls_before_delegating() {
        let (service, consensus) = service_with_counter();
        let status = service
            .member_add(Request::new(proto::MemberAddRequest {
                peer_urls: vec!["not a url".to_string()],
                is_learner: false,
                auto_promote: false,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(consensus.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_empty_urls_before_delegating() {
        let (service, consensus) = service_with_counter();
        let status = service
            .member_update(Request::new(proto::MemberUpdateRequest {
                id: 3,
                peer_urls: vec![],
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(consensus.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_header_reflects_responder_identity() {
        let (service, _) = service_with_counter();
        let resp = service
            .member_list(Request::new(proto::MemberListRequest {}))
            .await
            .unwrap()
            .into_inner();
        let header = resp.header.unwrap();
        assert_eq!(header.cluster_id, 77);
        assert_eq!(header.member_id, 42);
        assert_eq!(header.raft_term, 9);
    }

    #[tokio::test]
    async fn test_remove_surfaces_consensus_rejection() {
        let (service, _) = service_with_counter();
        let status = service
            .member_remove(Request::new(proto::MemberRemoveRequest { id: 999999 }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }
}
