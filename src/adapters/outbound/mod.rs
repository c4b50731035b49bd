mod ldap_upstream;

pub use ldap_upstream::{LdapConnector, LdapUpstream};
