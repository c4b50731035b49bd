//! Session Store
//!
//! Bounded map from client connection identity to upstream session.
//! Sessions are created lazily on first use and evicted strictly in
//! creation order once the store is full; access does not refresh an entry.

use crate::domain::entities::Session;
use crate::domain::error::DialError;
use crate::domain::ports::UpstreamConnector;
use crate::domain::value_objects::ConnectionId;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

struct Slot {
    seq: u64,
    session: Session,
}

/// Sessions indexed by identity plus their creation order.
///
/// Every id in `order` is a key of `sessions` and vice versa.
#[derive(Default)]
struct StoreInner {
    sessions: HashMap<ConnectionId, Slot>,
    order: BTreeMap<u64, ConnectionId>,
    next_seq: u64,
}

impl StoreInner {
    fn get(&self, id: &ConnectionId) -> Option<Session> {
        self.sessions.get(id).map(|slot| slot.session.clone())
    }

    fn insert(&mut self, session: Session) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, session.id);
        self.sessions.insert(session.id, Slot { seq, session });
    }

    fn remove(&mut self, id: &ConnectionId) -> Option<Session> {
        let slot = self.sessions.remove(id)?;
        self.order.remove(&slot.seq);
        Some(slot.session)
    }

    fn pop_oldest(&mut self) -> Option<Session> {
        let (_, id) = self.order.pop_first()?;
        self.sessions.remove(&id).map(|slot| slot.session)
    }
}

/// Concurrency-safe, capacity-bounded session store.
///
/// Lookups take a shared lock. Insert, evict and remove take the exclusive
/// lock, and only for the structural change itself: the upstream dial and
/// any upstream close run outside of it. Concurrent first use of one id
/// is funnelled through a per-id dial gate so that id is dialed once.
pub struct SessionStore {
    connector: Arc<dyn UpstreamConnector>,
    max_sessions: usize,
    inner: RwLock<StoreInner>,
    dial_gates: DashMap<ConnectionId, Arc<Mutex<()>>>,
    evictions: AtomicU64,
}

impl SessionStore {
    /// Create an empty store. `max_sessions` is clamped to at least 1.
    pub fn new(connector: Arc<dyn UpstreamConnector>, max_sessions: usize) -> Self {
        Self {
            connector,
            max_sessions: max_sessions.max(1),
            inner: RwLock::new(StoreInner::default()),
            dial_gates: DashMap::new(),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the session for `id`, dialing upstream if there is none yet.
    ///
    /// A successful dial into a full store evicts the oldest session and
    /// closes its upstream handle. Eviction waits for the dial to succeed,
    /// so a failed dial on a full store keeps every existing session.
    pub async fn resolve(
        &self,
        id: ConnectionId,
        client_addr: SocketAddr,
    ) -> Result<Session, DialError> {
        loop {
            if let Some(session) = self.get(&id) {
                return Ok(session);
            }

            let gate = self
                .dial_gates
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            let _guard = gate.lock().await;

            // The gate may have been retired while we waited on it.
            let current = self
                .dial_gates
                .get(&id)
                .map(|g| Arc::ptr_eq(g.value(), &gate))
                .unwrap_or(false);
            if !current {
                continue;
            }

            if let Some(session) = self.get(&id) {
                self.retire_gate(&id, &gate);
                return Ok(session);
            }

            let upstream = match self.connector.connect().await {
                Ok(upstream) => upstream,
                Err(e) => {
                    self.retire_gate(&id, &gate);
                    return Err(e);
                }
            };

            let session = Session::new(id, client_addr, upstream);
            let evicted = {
                let mut inner = self.inner.write();
                let evicted = if inner.sessions.len() >= self.max_sessions {
                    inner.pop_oldest()
                } else {
                    None
                };
                inner.insert(session.clone());
                evicted
            };
            self.retire_gate(&id, &gate);

            tracing::info!(
                "new upstream session {} for {} via {}",
                id.short(),
                client_addr,
                self.connector.addr()
            );

            if let Some(old) = evicted {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    "session store full ({}), evicted oldest session {} ({}, age {:?})",
                    self.max_sessions,
                    old.id.short(),
                    old.client_addr,
                    old.created_at.elapsed()
                );
                old.upstream.close().await;
            }

            return Ok(session);
        }
    }

    /// Remove the session for `id` and close its upstream handle.
    ///
    /// Returns whether a session was present; removing an absent id is a no-op.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        let removed = self.inner.write().remove(id);
        match removed {
            Some(session) => {
                tracing::info!("closed session {} ({})", id.short(), session.client_addr);
                session.upstream.close().await;
                true
            }
            None => false,
        }
    }

    /// Close and drop every session.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Session> = {
            let mut inner = self.inner.write();
            let ids: Vec<ConnectionId> = inner.order.values().copied().collect();
            ids.iter().filter_map(|id| inner.remove(id)).collect()
        };

        let count = drained.len();
        for session in drained {
            session.upstream.close().await;
        }
        if count > 0 {
            tracing::info!("closed {} upstream sessions", count);
        }
        count
    }

    /// Look up a session without creating one.
    pub fn get(&self, id: &ConnectionId) -> Option<Session> {
        self.inner.read().get(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.inner.read().sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Session ids, oldest first.
    pub fn ids_in_order(&self) -> Vec<ConnectionId> {
        self.inner.read().order.values().copied().collect()
    }

    /// Number of sessions evicted for capacity so far.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn retire_gate(&self, id: &ConnectionId, gate: &Arc<Mutex<()>>) {
        self.dial_gates.remove_if(id, |_, g| Arc::ptr_eq(g, gate));
    }
}
