//! In-memory upstream used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ldap_proxy::{
    ClientConnection, DialError, DirectoryEntry, SearchRequest, UpstreamConnector,
    UpstreamDirectory, UpstreamError,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const USERS_DN: &str = "ou=users,dc=example,dc=com";

/// Upstream connection that records what it was asked to do.
#[derive(Default)]
pub struct FakeUpstream {
    closed: AtomicBool,
    reject_bind: bool,
    pub binds: Mutex<Vec<(String, String)>>,
    pub searches: Mutex<Vec<SearchRequest>>,
}

#[async_trait]
impl UpstreamDirectory for FakeUpstream {
    async fn bind(&self, dn: &str, password: &str) -> Result<(), UpstreamError> {
        if self.is_closed() {
            return Err(UpstreamError::closed("bind"));
        }
        self.binds.lock().push((dn.to_string(), password.to_string()));
        if self.reject_bind {
            return Err(UpstreamError::new("bind", "invalidCredentials"));
        }
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>, UpstreamError> {
        if self.is_closed() {
            return Err(UpstreamError::closed("search"));
        }
        self.searches.lock().push(request.clone());
        Ok(vec![DirectoryEntry::new("cn=admins,ou=groups,dc=example,dc=com")
            .with_attribute("cn", &["admins"])
            .with_attribute("member", &["cn=alice,ou=users,dc=example,dc=com"])])
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl FakeUpstream {
    /// Whether the store has closed this upstream.
    pub fn is_closed_flag(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connector handing out `FakeUpstream`s and keeping them for inspection.
#[derive(Default)]
pub struct FakeConnector {
    pub dials: AtomicUsize,
    pub fail: AtomicBool,
    pub reject_bind: bool,
    handles: Mutex<Vec<Arc<FakeUpstream>>>,
}

impl FakeConnector {
    /// Connector whose upstreams reject every bind.
    pub fn rejecting_binds() -> Self {
        Self {
            reject_bind: true,
            ..Default::default()
        }
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn handle(&self, n: usize) -> Arc<FakeUpstream> {
        self.handles.lock()[n].clone()
    }

    pub fn handles(&self) -> Vec<Arc<FakeUpstream>> {
        self.handles.lock().clone()
    }
}

#[async_trait]
impl UpstreamConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn UpstreamDirectory>, DialError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DialError::new("fake:389", "connection refused"));
        }
        let upstream = Arc::new(FakeUpstream {
            reject_bind: self.reject_bind,
            ..Default::default()
        });
        self.handles.lock().push(upstream.clone());
        Ok(upstream)
    }

    fn addr(&self) -> &str {
        "fake:389"
    }
}

/// Client connection that only remembers whether it was closed.
pub struct FakeClient {
    remote: SocketAddr,
    pub closed: AtomicBool,
}

impl FakeClient {
    pub fn new(port: u16) -> Self {
        Self {
            remote: SocketAddr::from(([198, 51, 100, 7], port)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ClientConnection for FakeClient {
    fn local_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 3389))
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
