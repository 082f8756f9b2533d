//! gRPC surface of the membership facade: generated wire types plus the
//! server and client halves of the protocol.

pub mod client;
pub mod server;

// Include the generated protobuf code
pub mod proto {
    tonic::include_proto!("memberlink");

    // File descriptor for gRPC reflection
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("memberlink_descriptor");
}

pub use client::{
    MemberAddResponse, MemberListResponse, MemberPromoteResponse, MemberRemoveResponse,
    MemberUpdateResponse, MembershipClient, Operation,
};
pub use server::{start_membership_server, MembershipServerHandle, MembershipService};
