mod ldap_server;
mod tls;

pub use ldap_server::{filter_to_string, LdapServer, TransportConnection};
pub use tls::TlsConfig;
