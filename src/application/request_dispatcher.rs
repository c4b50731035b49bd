//! Request Dispatcher - Main application use case
//!
//! Implements bind, search and close for one client connection at a time
//! by composing the session store with the filter rewriter.

use crate::application::SessionStore;
use crate::domain::entities::{SearchRequest, SearchResult};
use crate::domain::error::ProxyError;
use crate::domain::ports::{ClientConnection, DirectoryHandler};
use crate::domain::services::rewrite_filter;
use crate::domain::value_objects::SearchScope;
use async_trait::async_trait;
use std::sync::Arc;

/// Forwards client operations to each client's own upstream session.
///
/// Search is accepted whether or not the client has bound; authorization
/// is left to the upstream server.
pub struct RequestDispatcher {
    store: Arc<SessionStore>,
    users_dn: String,
}

impl RequestDispatcher {
    pub fn new(store: Arc<SessionStore>, users_dn: impl Into<String>) -> Self {
        Self {
            store,
            users_dn: users_dn.into(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}

#[async_trait]
impl DirectoryHandler for RequestDispatcher {
    async fn bind(
        &self,
        dn: &str,
        password: &str,
        conn: &dyn ClientConnection,
    ) -> Result<(), ProxyError> {
        let id = conn.id();
        tracing::info!("bind request from {} as {:?}", conn.remote_addr(), dn);

        let session = self
            .store
            .resolve(id, conn.remote_addr())
            .await
            .inspect_err(|e| {
                tracing::error!("session {}: {}", id.short(), e);
            })?;

        session.upstream.bind(dn, password).await.inspect_err(|e| {
            tracing::warn!("session {}: bind as {:?}: {}", id.short(), dn, e);
        })?;

        tracing::debug!("session {}: bound as {:?}", id.short(), dn);
        Ok(())
    }

    async fn search(
        &self,
        request: SearchRequest,
        conn: &dyn ClientConnection,
    ) -> Result<SearchResult, ProxyError> {
        let id = conn.id();

        let session = match self.store.resolve(id, conn.remote_addr()).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("session {}: {}", id.short(), e);
                return Ok(SearchResult::operations_error());
            }
        };

        let filter = rewrite_filter(&request.filter, &self.users_dn);
        if filter != request.filter {
            tracing::debug!("session {}: rewrote {} -> {}", id.short(), request.filter, filter);
        }

        let upstream_request = SearchRequest {
            base_dn: request.base_dn,
            scope: SearchScope::WholeSubtree,
            filter,
            attributes: request.attributes,
        };

        let entries = session
            .upstream
            .search(&upstream_request)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    "session {}: search {} under {:?}: {}",
                    id.short(),
                    upstream_request.filter,
                    upstream_request.base_dn,
                    e
                );
            })?;

        tracing::debug!(
            "session {}: search OK: {} -> {} entries (client scope {})",
            id.short(),
            upstream_request.filter,
            entries.len(),
            request.scope.as_str()
        );

        Ok(SearchResult::success(entries))
    }

    async fn close(&self, conn: &dyn ClientConnection) {
        conn.close();
        if !self.store.remove(&conn.id()).await {
            tracing::debug!("connection from {} closed without a session", conn.remote_addr());
        }
    }
}
