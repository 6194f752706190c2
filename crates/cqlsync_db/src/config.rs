//! Connection descriptor for the target cluster.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use cqlsync_protocol::defaults::DEFAULT_CQL_PORT;
use cqlsync_protocol::secret::{ENDPOINT_KEY, PASSWORD_KEY, PORT_KEY, USERNAME_KEY};
use cqlsync_protocol::ConnectionSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Credentials are missing '{0}'")]
    MissingKey(&'static str),

    #[error("Credential '{0}' is not valid UTF-8")]
    InvalidUtf8(&'static str),
}

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub endpoint: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    DEFAULT_CQL_PORT
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: endpoint.into(),
            port,
            username: String::new(),
            password: String::new(),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Build from a credentials map (`endpoint`, `port`, `username`, `password`).
    ///
    /// A missing or unparsable port falls back to the native protocol port.
    pub fn from_credentials<K, V>(creds: &HashMap<K, V>) -> Result<Self, ConfigError>
    where
        K: Borrow<str> + Hash + Eq,
        V: AsRef<[u8]>,
    {
        let read = |key: &'static str| -> Result<Option<String>, ConfigError> {
            creds
                .get(key)
                .map(|raw| {
                    std::str::from_utf8(raw.as_ref())
                        .map(|s| s.trim().to_string())
                        .map_err(|_| ConfigError::InvalidUtf8(key))
                })
                .transpose()
        };

        let endpoint = read(ENDPOINT_KEY)?
            .filter(|e| !e.is_empty())
            .ok_or(ConfigError::MissingKey(ENDPOINT_KEY))?;
        let port = read(PORT_KEY)?
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_CQL_PORT);

        Ok(Self {
            endpoint,
            port,
            username: read(USERNAME_KEY)?.unwrap_or_default(),
            password: read(PASSWORD_KEY)?.unwrap_or_default(),
        })
    }

    /// `endpoint:port` as handed to the driver.
    pub fn known_node(&self) -> String {
        format!("{}:{}", self.endpoint, self.port)
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    /// Login details for another user of this same cluster.
    pub fn connection_details(&self, username: &str, password: &str) -> ConnectionSecret {
        ConnectionSecret {
            username: username.to_string(),
            password: password.to_string(),
            endpoint: self.endpoint.clone(),
            port: self.port,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
