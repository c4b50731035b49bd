//! LDAP Server Adapter
//!
//! Accepts client connections (plain or TLS), decodes LDAP messages and
//! hands bind, search and close to the directory handler.

use crate::adapters::inbound::TlsConfig;
use crate::domain::entities::{DirectoryEntry, SearchRequest};
use crate::domain::ports::{ClientConnection, DirectoryHandler};
use crate::domain::value_objects::{ResultCode, SearchScope};
use crate::infrastructure::ShutdownController;
use futures::{SinkExt, StreamExt};
use ldap3_proto::proto::{
    LdapFilter, LdapMsg, LdapPartialAttribute, LdapResultCode, LdapSearchResultEntry,
    LdapSearchScope,
};
use ldap3_proto::simple::{DisconnectionNotice, ServerOps, SimpleBindRequest};
use ldap3_proto::LdapCodec;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

const GENERIC_FAILURE: &str = "proxy operation failed";

/// A client connection as seen by the directory handler.
pub struct TransportConnection {
    local: SocketAddr,
    remote: SocketAddr,
    closed: CancellationToken,
}

impl TransportConnection {
    pub fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        Self::with_token(local, remote, CancellationToken::new())
    }

    /// Connection whose loop also stops when `closed` is cancelled elsewhere.
    pub fn with_token(local: SocketAddr, remote: SocketAddr, closed: CancellationToken) -> Self {
        Self {
            local,
            remote,
            closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl ClientConnection for TransportConnection {
    fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

/// LDAP Server - inbound adapter for client connections.
///
/// This adapter:
/// 1. Accepts TCP connections, terminating TLS when configured
/// 2. Frames LDAP messages on each connection
/// 3. Calls the handler for bind and search, replying with its result
/// 4. Calls the handler's close once the connection ends
pub struct LdapServer {
    handler: Arc<dyn DirectoryHandler>,
    listen_addr: String,
    tls_config: Option<TlsConfig>,
    shutdown: ShutdownController,
}

impl LdapServer {
    pub fn new(
        handler: Arc<dyn DirectoryHandler>,
        listen_addr: String,
        tls_config: Option<TlsConfig>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            handler,
            listen_addr,
            tls_config,
            shutdown,
        }
    }

    /// Bind the listen address and serve until shutdown.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let local = listener.local_addr()?;
        tracing::info!(
            "ldap-proxy listening on {}{}",
            local,
            if self.tls_config.is_some() { " (TLS)" } else { "" }
        );

        loop {
            if self.shutdown.is_shutdown() {
                break;
            }

            let (stream, addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!("accept failed: {:?}", e);
                        continue;
                    }
                },
                _ = self.shutdown.cancelled() => break,
            };

            let handler = self.handler.clone();
            let acceptor = self.tls_config.as_ref().map(|tls| tls.acceptor.clone());
            let guard = self.shutdown.connection_guard();
            let closed = self.shutdown.client_token();

            tokio::spawn(async move {
                let _guard = guard;
                if let Err(e) =
                    Self::accept_connection(handler, stream, addr, acceptor, closed).await
                {
                    tracing::debug!("connection from {} dropped: {:?}", addr, e);
                }
            });
        }

        tracing::info!("listener on {} stopped", local);
        Ok(())
    }

    async fn accept_connection(
        handler: Arc<dyn DirectoryHandler>,
        stream: TcpStream,
        remote: SocketAddr,
        acceptor: Option<tokio_rustls::TlsAcceptor>,
        closed: CancellationToken,
    ) -> anyhow::Result<()> {
        let local = stream.local_addr()?;
        let conn = TransportConnection::with_token(local, remote, closed);

        match acceptor {
            Some(acceptor) => {
                let tls_stream = acceptor
                    .accept(stream)
                    .await
                    .map_err(|e| anyhow::anyhow!("TLS handshake failed: {}", e))?;
                Self::handle_connection(handler, tls_stream, conn).await;
            }
            None => Self::handle_connection(handler, stream, conn).await,
        }
        Ok(())
    }

    /// Serve one client until it unbinds, disconnects or is closed.
    async fn handle_connection<S>(
        handler: Arc<dyn DirectoryHandler>,
        stream: S,
        conn: TransportConnection,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (reader, writer) = tokio::io::split(stream);
        let mut requests = FramedRead::new(reader, LdapCodec::default());
        let mut responses = FramedWrite::new(writer, LdapCodec::default());

        tracing::debug!("client connected from {} ({})", conn.remote, conn.id().short());

        'conn: loop {
            let next = tokio::select! {
                msg = requests.next() => msg,
                // Also fires on process shutdown
                _ = conn.closed.cancelled() => break,
            };

            let msg = match next {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    tracing::debug!("decode error from {}: {:?}", conn.remote, e);
                    break;
                }
                None => break,
            };

            let replies = match ServerOps::try_from(msg) {
                Ok(ServerOps::SimpleBind(req)) => vec![Self::bind(&*handler, req, &conn).await],
                Ok(ServerOps::Search(req)) => Self::search(&*handler, req, &conn).await,
                Ok(ServerOps::Unbind(_)) => break,
                _ => {
                    tracing::debug!("unsupported operation from {}", conn.remote);
                    let notice = DisconnectionNotice::gen(
                        LdapResultCode::UnwillingToPerform,
                        "unsupported operation",
                    );
                    let _ = responses.send(notice).await;
                    break;
                }
            };

            for reply in replies {
                if let Err(e) = responses.send(reply).await {
                    tracing::debug!("write to {} failed: {:?}", conn.remote, e);
                    break 'conn;
                }
            }
        }

        handler.close(&conn).await;
    }

    async fn bind(
        handler: &dyn DirectoryHandler,
        req: SimpleBindRequest,
        conn: &TransportConnection,
    ) -> LdapMsg {
        match handler.bind(&req.dn, &req.pw, conn).await {
            Ok(()) => req.gen_success(),
            Err(e) => req.gen_error(ldap_result_code(e.result_code()), GENERIC_FAILURE.to_string()),
        }
    }

    async fn search(
        handler: &dyn DirectoryHandler,
        req: ldap3_proto::simple::SearchRequest,
        conn: &TransportConnection,
    ) -> Vec<LdapMsg> {
        let request = SearchRequest {
            base_dn: req.base.clone(),
            scope: search_scope(&req.scope),
            filter: filter_to_string(&req.filter),
            attributes: req.attrs.clone(),
        };

        match handler.search(request, conn).await {
            Ok(result) => {
                let mut replies: Vec<LdapMsg> = result
                    .entries
                    .into_iter()
                    .map(|entry| req.gen_result_entry(to_ldap_entry(entry)))
                    .collect();
                replies.push(match result.result_code {
                    ResultCode::Success => req.gen_success(),
                    code => req.gen_error(ldap_result_code(code), GENERIC_FAILURE.to_string()),
                });
                replies
            }
            Err(e) => vec![req.gen_error(ldap_result_code(e.result_code()), GENERIC_FAILURE.to_string())],
        }
    }
}

fn ldap_result_code(code: ResultCode) -> LdapResultCode {
    match code {
        ResultCode::Success => LdapResultCode::Success,
        ResultCode::OperationsError => LdapResultCode::OperationsError,
    }
}

fn search_scope(scope: &LdapSearchScope) -> SearchScope {
    match scope {
        LdapSearchScope::Base => SearchScope::BaseObject,
        LdapSearchScope::OneLevel => SearchScope::SingleLevel,
        LdapSearchScope::Subtree => SearchScope::WholeSubtree,
        LdapSearchScope::Children => SearchScope::Children,
    }
}

fn to_ldap_entry(entry: DirectoryEntry) -> LdapSearchResultEntry {
    LdapSearchResultEntry {
        dn: entry.dn,
        attributes: entry
            .attributes
            .into_iter()
            .map(|attr| LdapPartialAttribute {
                atype: attr.name,
                vals: attr.values,
            })
            .collect(),
    }
}

/// Render a decoded filter back into its RFC 4515 string form.
pub fn filter_to_string(filter: &LdapFilter) -> String {
    match filter {
        LdapFilter::And(parts) => format!("(&{})", join_filters(parts)),
        LdapFilter::Or(parts) => format!("(|{})", join_filters(parts)),
        LdapFilter::Not(inner) => format!("(!{})", filter_to_string(inner)),
        LdapFilter::Equality(attr, value) => format!("({}={})", attr, ldap3::ldap_escape(value)),
        LdapFilter::Substring(attr, sub) => {
            let mut out = format!("({}=", attr);
            if let Some(initial) = &sub.initial {
                out.push_str(&ldap3::ldap_escape(initial));
            }
            out.push('*');
            for any in &sub.any {
                out.push_str(&ldap3::ldap_escape(any));
                out.push('*');
            }
            if let Some(final_) = &sub.final_ {
                out.push_str(&ldap3::ldap_escape(final_));
            }
            out.push(')');
            out
        }
        LdapFilter::GreaterOrEqual(attr, value) => {
            format!("({}>={})", attr, ldap3::ldap_escape(value))
        }
        LdapFilter::LessOrEqual(attr, value) => {
            format!("({}<={})", attr, ldap3::ldap_escape(value))
        }
        LdapFilter::Present(attr) => format!("({}=*)", attr),
        LdapFilter::Approx(attr, value) => format!("({}~={})", attr, ldap3::ldap_escape(value)),
        LdapFilter::Extensible(rule) => {
            let mut out = String::from("(");
            if let Some(attr) = &rule.type_ {
                out.push_str(attr);
            }
            if rule.dn_attributes {
                out.push_str(":dn");
            }
            if let Some(matching_rule) = &rule.matching_rule {
                out.push(':');
                out.push_str(matching_rule);
            }
            out.push_str(":=");
            out.push_str(&ldap3::ldap_escape(&rule.match_value));
            out.push(')');
            out
        }
    }
}

fn join_filters(parts: &[LdapFilter]) -> String {
    parts.iter().map(filter_to_string).collect()
}
