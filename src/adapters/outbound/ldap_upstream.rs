//! LDAP Upstream Adapter
//!
//! Implements the upstream ports on top of the async `ldap3` client.
//! Each session gets its own TCP connection to the directory server.

use crate::domain::entities::{DirectoryAttribute, DirectoryEntry, SearchRequest};
use crate::domain::error::{DialError, UpstreamError};
use crate::domain::ports::{UpstreamConnector, UpstreamDirectory};
use crate::domain::value_objects::SearchScope;
use async_trait::async_trait;
use ldap3::asn1::StructureTag;
use ldap3::{DerefAliases, Ldap, LdapConnAsync, Scope, SearchOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Dials plain LDAP connections to a fixed `host:port`.
pub struct LdapConnector {
    addr: String,
    url: String,
}

impl LdapConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let url = format!("ldap://{}", addr);
        Self { addr, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl UpstreamConnector for LdapConnector {
    async fn connect(&self) -> Result<Arc<dyn UpstreamDirectory>, DialError> {
        let (conn, ldap) = LdapConnAsync::new(&self.url)
            .await
            .map_err(|e| DialError::new(&self.addr, e))?;

        // The connection future owns the socket and must be polled for the
        // handle to make progress.
        let addr = self.addr.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::debug!("upstream connection to {} ended: {}", addr, e);
            }
        });

        Ok(Arc::new(LdapUpstream::new(ldap)))
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

/// One live connection to the upstream server.
pub struct LdapUpstream {
    ldap: Ldap,
    closed: AtomicBool,
}

impl LdapUpstream {
    fn new(ldap: Ldap) -> Self {
        Self {
            ldap,
            closed: AtomicBool::new(false),
        }
    }
}

fn ldap_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::BaseObject => Scope::Base,
        SearchScope::SingleLevel => Scope::OneLevel,
        SearchScope::WholeSubtree | SearchScope::Children => Scope::Subtree,
    }
}

// SearchResultEntry ::= [APPLICATION 4] SEQUENCE { objectName, attributes }
const SEARCH_RESULT_ENTRY: u64 = 4;

/// Decode a search result entry as sent, keeping attribute order and raw
/// values. Returns `None` for anything that is not a well-formed entry.
fn to_directory_entry(tag: StructureTag) -> Option<DirectoryEntry> {
    let mut parts = tag
        .match_id(SEARCH_RESULT_ENTRY)?
        .expect_constructed()?
        .into_iter();
    let dn = String::from_utf8(parts.next()?.expect_primitive()?).ok()?;
    let attributes = parts
        .next()?
        .expect_constructed()?
        .into_iter()
        .map(to_directory_attribute)
        .collect::<Option<Vec<_>>>()?;

    Some(DirectoryEntry { dn, attributes })
}

// PartialAttribute ::= SEQUENCE { type, vals SET OF value }
fn to_directory_attribute(tag: StructureTag) -> Option<DirectoryAttribute> {
    let mut parts = tag.expect_constructed()?.into_iter();
    let name = String::from_utf8(parts.next()?.expect_primitive()?).ok()?;
    let values = parts
        .next()?
        .expect_constructed()?
        .into_iter()
        .map(StructureTag::expect_primitive)
        .collect::<Option<Vec<_>>>()?;

    Some(DirectoryAttribute { name, values })
}

#[async_trait]
impl UpstreamDirectory for LdapUpstream {
    async fn bind(&self, dn: &str, password: &str) -> Result<(), UpstreamError> {
        if self.is_closed() {
            return Err(UpstreamError::closed("bind"));
        }

        let mut ldap = self.ldap.clone();
        ldap.simple_bind(dn, password)
            .await
            .and_then(|res| res.success())
            .map(|_| ())
            .map_err(|e| UpstreamError::new("bind", e))
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>, UpstreamError> {
        if self.is_closed() {
            return Err(UpstreamError::closed("search"));
        }

        let mut ldap = self.ldap.clone();
        let (entries, _) = ldap
            .with_search_options(SearchOptions::new().deref(DerefAliases::Never))
            .search(
                &request.base_dn,
                ldap_scope(request.scope),
                &request.filter,
                request.attributes.clone(),
            )
            .await
            .and_then(|res| res.success())
            .map_err(|e| UpstreamError::new("search", e))?;

        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.is_ref() {
                tracing::debug!("ignoring search reference under {:?}", request.base_dn);
                continue;
            }
            let entry = to_directory_entry(entry.0)
                .ok_or_else(|| UpstreamError::new("search", "malformed search result entry"))?;
            out.push(entry);
        }
        Ok(out)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut ldap = self.ldap.clone();
        if let Err(e) = ldap.unbind().await {
            tracing::debug!("upstream unbind failed: {}", e);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
