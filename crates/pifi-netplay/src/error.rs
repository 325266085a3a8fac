//! Netplay error types.

use pifi_netproto::constants::INITIALS_LEN;
use thiserror::Error;

/// Why the HTTP half of a join failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinFailure {
    /// The request never produced a usable response.
    Network,
    /// The appliance answered but refused the request (bad config, non-2xx, `success: false`).
    ServerRejected,
}

#[derive(Error, Debug)]
pub enum NetplayError {
    #[error("join request failed ({kind:?}): {reason}")]
    JoinRequestFailed { kind: JoinFailure, reason: String },

    #[error("appliance request failed: {0}")]
    Api(String),

    #[error("socket failed to open: {0}")]
    SocketOpenFailed(String),

    #[error("socket closed unexpectedly: {0}")]
    SocketClosedUnexpectedly(String),

    #[error("all {0} local player slots are taken")]
    SlotCapacityReached(usize),

    #[error("initials must be {INITIALS_LEN} letters, got {0:?}")]
    InvalidInitials(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] pifi_netproto::error::ProtoError),
}

impl NetplayError {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::JoinRequestFailed {
            kind: JoinFailure::Network,
            reason: reason.into(),
        }
    }

    pub fn server_rejected(reason: impl Into<String>) -> Self {
        Self::JoinRequestFailed {
            kind: JoinFailure::ServerRejected,
            reason: reason.into(),
        }
    }
}
