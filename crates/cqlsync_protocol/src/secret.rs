//! Connection secret emitted when a role is created.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Credential map keys, shared with connection configuration parsing.
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const ENDPOINT_KEY: &str = "endpoint";
pub const PORT_KEY: &str = "port";

/// Everything a client needs to log in as a freshly created role.
///
/// Ownership passes to whoever publishes it; controllers never read it back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSecret {
    pub username: String,
    pub password: String,
    pub endpoint: String,
    pub port: u16,
}

impl ConnectionSecret {
    /// Flatten into the credential-map layout used by secret stores.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (USERNAME_KEY, self.username.clone()),
            (PASSWORD_KEY, self.password.clone()),
            (ENDPOINT_KEY, self.endpoint.clone()),
            (PORT_KEY, self.port.to_string()),
        ])
    }
}

impl fmt::Debug for ConnectionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSecret")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("port", &self.port)
            .finish()
    }
}
