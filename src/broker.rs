//! MQTT broker configuration (component C9).

/// One MQTT broker an edge node may connect to.
///
/// Ordering and `primary` drive broker selection; failover beyond the
/// primary index is a Non-goal (see DESIGN.md) and is stubbed.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerInfo {
    /// MQTT client identifier presented on connect.
    pub client_id: String,
    /// Broker hostname or IP address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Optional username for authentication.
    pub username: Option<String>,
    /// Optional password for authentication.
    pub password: Option<String>,
    /// `true` if this is the edge node's primary broker.
    pub primary: bool,
    /// `true` to connect over TLS. Defaults to `true`.
    pub use_tls: bool,
    /// Optional human-readable broker name, for logging.
    pub name: Option<String>,
}

impl BrokerInfo {
    /// Creates a broker entry with `use_tls` defaulted to `true` per
    /// the external-interface default in spec §6.
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            client_id: client_id.into(),
            host: host.into(),
            port,
            username: None,
            password: None,
            primary: false,
            use_tls: true,
            name: None,
        }
    }

    /// Marks this broker as the edge node's primary.
    pub fn as_primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Sets username/password credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Disables TLS for this broker (e.g. for local testing).
    pub fn without_tls(mut self) -> Self {
        self.use_tls = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_tls_enabled_and_non_primary() {
        let b = BrokerInfo::new("edge-1", "localhost", 1883);
        assert!(b.use_tls);
        assert!(!b.primary);
    }

    #[test]
    fn as_primary_marks_broker_primary() {
        let b = BrokerInfo::new("edge-1", "localhost", 1883).as_primary();
        assert!(b.primary);
    }
}
