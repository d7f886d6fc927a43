//! Node topology and key routing
//!
//! A topic's nodes are split into an ordered master pool and an ordered slave
//! pool. Keys are mapped onto one node of a pool by CRC32, so the order and
//! length of each pool must stay stable for the lifetime of a dispatcher.

mod pool;
mod router;

pub use pool::NodePool;
pub use router::{HashRouter, Routing};

use crate::config::ConfigError;
use std::fmt;

/// Node role within a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Master,
    Slave,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Slave => write!(f, "slave"),
        }
    }
}

/// Address of one store node, validated as `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddr(String);

impl NodeAddr {
    /// Parse and validate an address
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        match raw.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(NodeAddr(raw.to_string()))
            }
            _ => Err(ConfigError::InvalidAddress(raw.to_string())),
        }
    }

    /// Split into host and port
    pub fn host_port(&self) -> (&str, u16) {
        // validated in parse()
        let (host, port) = self.0.rsplit_once(':').unwrap_or((self.0.as_str(), "0"));
        (host, port.parse().unwrap_or(0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
