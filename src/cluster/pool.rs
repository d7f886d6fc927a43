//! Node pools derived from a topic configuration

use super::{NodeAddr, Role};
use crate::config::{ConfigError, TopicConfig};
use std::collections::HashMap;

/// Master and slave pools of one topic plus the credentials for each node
#[derive(Debug, Clone)]
pub struct NodePool {
    masters: Vec<NodeAddr>,
    slaves: Vec<NodeAddr>,
    auth_overrides: HashMap<NodeAddr, String>,
    master_auth: Option<String>,
    slave_auth: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl NodePool {
    /// Derive the pools of `topic` from its configuration
    ///
    /// Empty address strings are skipped. Fails when both pools end up empty
    /// or when an address is not `host:port`.
    pub fn from_config(topic: &str, config: &TopicConfig) -> Result<Self, ConfigError> {
        let mut masters = Vec::new();
        let mut slaves = Vec::new();
        let mut auth_overrides = HashMap::new();

        for node in &config.nodes {
            if let Some(raw) = non_empty(&node.master) {
                let addr = NodeAddr::parse(raw)?;
                if let Some(secret) = non_empty(&node.master_auth) {
                    auth_overrides.insert(addr.clone(), secret.to_string());
                }
                masters.push(addr);
            }
            if let Some(raw) = non_empty(&node.slave) {
                let addr = NodeAddr::parse(raw)?;
                if let Some(secret) = non_empty(&node.slave_auth) {
                    auth_overrides.insert(addr.clone(), secret.to_string());
                }
                slaves.push(addr);
            }
        }

        if masters.is_empty() && slaves.is_empty() {
            return Err(ConfigError::EmptyNodeList(topic.to_string()));
        }

        Ok(NodePool {
            masters,
            slaves,
            auth_overrides,
            master_auth: non_empty(&config.master_auth).map(str::to_string),
            slave_auth: non_empty(&config.slave_auth).map(str::to_string),
        })
    }

    pub fn masters(&self) -> &[NodeAddr] {
        &self.masters
    }

    pub fn slaves(&self) -> &[NodeAddr] {
        &self.slaves
    }

    /// Pool serving `role`
    pub fn nodes(&self, role: Role) -> &[NodeAddr] {
        match role {
            Role::Master => &self.masters,
            Role::Slave => &self.slaves,
        }
    }

    /// Secret to authenticate `addr` with, when acting as `role`
    ///
    /// A per-node secret wins over the role default. `None` means no AUTH is sent.
    pub fn credentials(&self, addr: &NodeAddr, role: Role) -> Option<&str> {
        if let Some(secret) = self.auth_overrides.get(addr) {
            return Some(secret.as_str());
        }
        match role {
            Role::Master => self.master_auth.as_deref(),
            Role::Slave => self.slave_auth.as_deref(),
        }
    }
}
