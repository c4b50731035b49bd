//! Upstream Directory Port
//!
//! Defines how the core dials the upstream directory server and what it
//! can do with the resulting connection.

use crate::domain::entities::{DirectoryEntry, SearchRequest};
use crate::domain::error::{DialError, UpstreamError};
use async_trait::async_trait;
use std::sync::Arc;

/// A live connection to the upstream directory server.
///
/// Exactly one handle exists per session. Once `close` has been called
/// every further operation fails with an `UpstreamError`.
#[async_trait]
pub trait UpstreamDirectory: Send + Sync {
    /// Forward a simple bind.
    async fn bind(&self, dn: &str, password: &str) -> Result<(), UpstreamError>;

    /// Issue a search and collect the returned entries.
    ///
    /// Implementations never dereference aliases.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>, UpstreamError>;

    /// Close the connection. Calling it more than once is a no-op.
    async fn close(&self);

    /// Whether `close` has already been called.
    fn is_closed(&self) -> bool;
}

/// Dials new upstream connections.
///
/// This is an outbound port; the LDAP adapter implements it on top of an
/// async LDAP client, tests implement it with in-memory fakes.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Establish a new connection to the configured upstream address.
    async fn connect(&self) -> Result<Arc<dyn UpstreamDirectory>, DialError>;

    /// The configured upstream `host:port`.
    fn addr(&self) -> &str;
}
