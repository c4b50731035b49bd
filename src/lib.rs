//! ldap-proxy Library
//!
//! Transparent LDAP proxy: one upstream connection per client connection,
//! held in a bounded session store, with sudoUser group lookups rewritten
//! into member lookups.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{RequestDispatcher, SessionStore};
pub use config::{load_config, Config, ConfigError};
pub use domain::entities::{DirectoryEntry, SearchRequest, SearchResult, Session};
pub use domain::error::{DialError, ProxyError, UpstreamError};
pub use domain::ports::{ClientConnection, DirectoryHandler, UpstreamConnector, UpstreamDirectory};
pub use domain::services::rewrite_filter;
pub use domain::value_objects::{ConnectionId, ResultCode, SearchScope};
