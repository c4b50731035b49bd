use std::path::Path;

pub const DEFAULT_MAX_SESSIONS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // Proxy endpoints
    pub ldap_server: String,
    pub listen_addr: String,

    // Base DN used to rewrite sudoUser assertions
    pub users_dn: String,

    // TLS settings
    pub use_tls: bool,
    pub cert_file: Option<String>,
    pub cert_key_file: Option<String>,

    // Session store capacity
    pub max_sessions: usize,

    pub debug: bool,
}

/// Startup configuration problem. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Config {
    /// Build and validate a config from a variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let ldap_server = required("LDAP_SERVER")?;
        let listen_addr = required("LISTEN")?;
        let users_dn = required("USERS_DN")?;

        let use_tls = match get("USE_TLS") {
            Some(v) => parse_bool("USE_TLS", &v)?,
            None => false,
        };
        let cert_file = get("CERT_FILE");
        let cert_key_file = get("CERT_KEY_FILE");
        if use_tls {
            if cert_file.is_none() {
                return Err(ConfigError::Missing("CERT_FILE"));
            }
            if cert_key_file.is_none() {
                return Err(ConfigError::Missing("CERT_KEY_FILE"));
            }
        }

        let max_sessions = match get("MAX_SESSIONS") {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        key: "MAX_SESSIONS",
                        value: v,
                        reason: "must be at least 1",
                    })
                }
                Ok(n) => n,
                Err(_) => {
                    return Err(ConfigError::Invalid {
                        key: "MAX_SESSIONS",
                        value: v,
                        reason: "expected a positive integer",
                    })
                }
            },
            None => DEFAULT_MAX_SESSIONS,
        };

        let debug = lookup("DEBUG").is_some();

        Ok(Config {
            ldap_server,
            listen_addr,
            users_dn,
            use_tls,
            cert_file,
            cert_key_file,
            max_sessions,
            debug,
        })
    }

    /// Certificate and key paths, when TLS is enabled.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        if !self.use_tls {
            return None;
        }
        match (&self.cert_file, &self.cert_key_file) {
            (Some(cert), Some(key)) => Some((Path::new(cert), Path::new(key))),
            _ => None,
        }
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected true or false",
        }),
    }
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    Config::from_lookup(|key| std::env::var(key).ok())
}
