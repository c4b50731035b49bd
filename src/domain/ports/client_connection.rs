//! Client Connection Port
//!
//! The view of a client transport connection that the core needs.

use crate::domain::value_objects::ConnectionId;
use std::net::SocketAddr;

/// A client connection owned by the transport.
pub trait ClientConnection: Send + Sync {
    fn local_addr(&self) -> SocketAddr;

    fn remote_addr(&self) -> SocketAddr;

    /// Ask the transport to close the connection.
    fn close(&self);

    /// Identity used as the session key.
    fn id(&self) -> ConnectionId {
        ConnectionId::from_endpoints(self.local_addr(), self.remote_addr())
    }
}
