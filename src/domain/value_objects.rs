//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use sha2::{Digest, Sha256};
use std::fmt;
use std::net::SocketAddr;

/// Identity of one client transport connection.
///
/// Derived from the (local, remote) endpoint pair with SHA-256, so it is
/// stable for the lifetime of the connection and unique among the
/// connections that are open at the same time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId([u8; 32]);

impl ConnectionId {
    /// Compute the identity of a connection from its endpoints.
    pub fn from_endpoints(local: SocketAddr, remote: SocketAddr) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(local.to_string().as_bytes());
        hasher.update(remote.to_string().as_bytes());
        Self(hasher.finalize().into())
    }

    /// Abbreviated form used in log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.short())
    }
}

/// Protocol-level result of a bind or search, as reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    /// Generic failure; covers unreachable upstream and upstream rejections alike.
    OperationsError,
}

impl ResultCode {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Search scope requested by a client.
///
/// The proxy records it but always searches the whole subtree upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject,
    SingleLevel,
    WholeSubtree,
    Children,
}

impl SearchScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaseObject => "base",
            Self::SingleLevel => "one",
            Self::WholeSubtree => "sub",
            Self::Children => "children",
        }
    }
}
