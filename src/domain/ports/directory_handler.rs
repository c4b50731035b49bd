//! Directory Handler Port
//!
//! The callback contract the listener invokes per client operation.

use crate::domain::entities::{SearchRequest, SearchResult};
use crate::domain::error::ProxyError;
use crate::domain::ports::ClientConnection;
use async_trait::async_trait;

/// Handler for the three operations the proxy supports.
///
/// This is an inbound port: the listener decodes requests and calls into
/// it, then encodes whatever it returns. Errors map to the generic
/// operations error result code.
#[async_trait]
pub trait DirectoryHandler: Send + Sync {
    /// Simple bind on behalf of the client.
    async fn bind(
        &self,
        dn: &str,
        password: &str,
        conn: &dyn ClientConnection,
    ) -> Result<(), ProxyError>;

    /// Search on behalf of the client.
    async fn search(
        &self,
        request: SearchRequest,
        conn: &dyn ClientConnection,
    ) -> Result<SearchResult, ProxyError>;

    /// The client connection is going away. Never fails.
    async fn close(&self, conn: &dyn ClientConnection);
}
