//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the proxy domain.
//! They carry no protocol encoding; adapters translate to and from the wire.

use crate::domain::ports::UpstreamDirectory;
use crate::domain::value_objects::{ConnectionId, ResultCode, SearchScope};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// One client's forwarding channel to the upstream directory server.
///
/// Owned by the session store. The upstream handle is created once per
/// session and closed when the store drops the entry.
#[derive(Clone)]
pub struct Session {
    /// Connection identity (primary key)
    pub id: ConnectionId,
    /// Remote endpoint of the client, for logging
    pub client_addr: SocketAddr,
    /// Dedicated connection to the upstream server
    pub upstream: Arc<dyn UpstreamDirectory>,
    /// When the session was admitted to the store
    pub created_at: Instant,
}

impl Session {
    pub fn new(
        id: ConnectionId,
        client_addr: SocketAddr,
        upstream: Arc<dyn UpstreamDirectory>,
    ) -> Self {
        Self {
            id,
            client_addr,
            upstream,
            created_at: Instant::now(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("client_addr", &self.client_addr)
            .field("upstream_closed", &self.upstream.is_closed())
            .finish()
    }
}

/// A search as submitted by a client, or as issued upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: SearchScope,
    /// Filter in RFC 4515 string form
    pub filter: String,
    pub attributes: Vec<String>,
}

/// A single attribute of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryAttribute {
    pub name: String,
    pub values: Vec<Vec<u8>>,
}

/// An entry returned by the upstream server, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: Vec<DirectoryAttribute>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Builder-style helper for text attributes.
    pub fn with_attribute(mut self, name: &str, values: &[&str]) -> Self {
        self.attributes.push(DirectoryAttribute {
            name: name.to_string(),
            values: values.iter().map(|v| v.as_bytes().to_vec()).collect(),
        });
        self
    }
}

/// Entries plus the result code for the search-done message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub entries: Vec<DirectoryEntry>,
    pub result_code: ResultCode,
}

impl SearchResult {
    pub fn success(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            entries,
            result_code: ResultCode::Success,
        }
    }

    /// Empty result set tagged with an operations error.
    pub fn operations_error() -> Self {
        Self {
            entries: Vec::new(),
            result_code: ResultCode::OperationsError,
        }
    }
}
