//! Adapters Layer
//!
//! Inbound: the LDAP listener clients talk to.
//! Outbound: the LDAP client that talks to the upstream server.

pub mod inbound;
pub mod outbound;
