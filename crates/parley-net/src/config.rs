//! Network configuration loaded from environment variables.
//!
//! Every setting has a default so two peers on a LAN can talk with zero
//! configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use parley_shared::constants::{
    DEFAULT_HANDSHAKE_PORT, DEFAULT_INITIATOR_PORT, DEFAULT_RESPONDER_PORT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetConfig {
    /// Port the responder accepts handshakes on.
    /// Env: `PARLEY_HANDSHAKE_PORT`
    /// Default: `5200`
    pub handshake_port: u16,

    /// Port the initiator listens on for the responder's dial.
    /// `0` picks an ephemeral port, announced during the handshake.
    /// Env: `PARLEY_INITIATOR_PORT`
    /// Default: `5201`
    pub initiator_listen_port: u16,

    /// Port the responder listens on for the initiator's dial.
    /// Env: `PARLEY_RESPONDER_PORT`
    /// Default: `5202`
    pub responder_listen_port: u16,

    /// IP address all listeners bind to.
    /// Env: `PARLEY_BIND_ADDR`
    /// Default: `0.0.0.0`
    pub bind_addr: IpAddr,

    /// Bound on each handshake step.
    /// Env: `PARLEY_HANDSHAKE_TIMEOUT_SECS` (0 = none)
    /// Default: `30`
    pub handshake_timeout: Option<Duration>,

    /// Bound on tunnel reads and writes. Off by default so an idle chat
    /// does not expire.
    /// Env: `PARLEY_IO_TIMEOUT_SECS` (0 = none)
    /// Default: `0`
    pub io_timeout: Option<Duration>,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            handshake_port: DEFAULT_HANDSHAKE_PORT,
            initiator_listen_port: DEFAULT_INITIATOR_PORT,
            responder_listen_port: DEFAULT_RESPONDER_PORT,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            handshake_timeout: Some(Duration::from_secs(30)),
            io_timeout: None,
        }
    }
}

impl NetConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = parse_var(&lookup, "PARLEY_HANDSHAKE_PORT") {
            config.handshake_port = port;
        }
        if let Some(port) = parse_var(&lookup, "PARLEY_INITIATOR_PORT") {
            config.initiator_listen_port = port;
        }
        if let Some(port) = parse_var(&lookup, "PARLEY_RESPONDER_PORT") {
            config.responder_listen_port = port;
        }
        if let Some(addr) = parse_var(&lookup, "PARLEY_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "PARLEY_HANDSHAKE_TIMEOUT_SECS") {
            config.handshake_timeout = seconds(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "PARLEY_IO_TIMEOUT_SECS") {
            config.io_timeout = seconds(secs);
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(var = key, value = %value, "Invalid value, using default");
            None
        }
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = NetConfig::from_lookup(lookup(&[]));
        assert_eq!(config, NetConfig::default());
        assert_eq!(config.handshake_port, 5200);
        assert_eq!(config.initiator_listen_port, 5201);
        assert_eq!(config.responder_listen_port, 5202);
        assert_eq!(config.handshake_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.io_timeout, None);
    }

    #[test]
    fn test_overrides() {
        let config = NetConfig::from_lookup(lookup(&[
            ("PARLEY_HANDSHAKE_PORT", "6000"),
            ("PARLEY_INITIATOR_PORT", "0"),
            ("PARLEY_BIND_ADDR", "127.0.0.1"),
            ("PARLEY_HANDSHAKE_TIMEOUT_SECS", "0"),
            ("PARLEY_IO_TIMEOUT_SECS", "90"),
        ]));
        assert_eq!(config.handshake_port, 6000);
        assert_eq!(config.initiator_listen_port, 0);
        assert_eq!(config.responder_listen_port, 5202);
        assert_eq!(config.bind_addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.handshake_timeout, None);
        assert_eq!(config.io_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = NetConfig::from_lookup(lookup(&[
            ("PARLEY_HANDSHAKE_PORT", "70000"),
            ("PARLEY_BIND_ADDR", "not-an-ip"),
            ("PARLEY_IO_TIMEOUT_SECS", "-1"),
        ]));
        assert_eq!(config, NetConfig::default());
    }
}
