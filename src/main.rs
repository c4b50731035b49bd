//! ldap-proxy - transparent LDAP proxy
//!
//! This is the composition root that wires together all the components.

use ldap_proxy::adapters::inbound::{LdapServer, TlsConfig};
use ldap_proxy::adapters::outbound::LdapConnector;
use ldap_proxy::infrastructure::{shutdown_signal, ShutdownController};
use ldap_proxy::{load_config, RequestDispatcher, SessionStore};
use std::sync::Arc;
use std::time::Duration;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment; any problem stops us here
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    tracing::info!(
        "starting ldap-proxy listen={} upstream={} max_sessions={}",
        cfg.listen_addr,
        cfg.ldap_server,
        cfg.max_sessions
    );

    // TLS material is loaded before anything is bound
    let tls_config = match cfg.tls_paths() {
        Some((cert, key)) => Some(TlsConfig::from_pem_files(cert, key)?),
        None => None,
    };

    // ===== COMPOSITION ROOT =====
    let connector = Arc::new(LdapConnector::new(cfg.ldap_server.clone()));
    let store = Arc::new(SessionStore::new(connector, cfg.max_sessions));
    let dispatcher = Arc::new(RequestDispatcher::new(store.clone(), cfg.users_dn.clone()));

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server = LdapServer::new(dispatcher, cfg.listen_addr.clone(), tls_config, shutdown.clone());
    let result = server.run().await;

    // The listener only returns on shutdown or a bind failure
    shutdown.shutdown();
    shutdown.wait_for_drain(DRAIN_TIMEOUT).await;
    store.close_all().await;

    result
}
