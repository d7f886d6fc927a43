//! Topic configuration
//!
//! A topic names one group of master/slave nodes together with the
//! credentials and flags every dispatcher for that topic uses. Topics are
//! loaded once, when the dispatcher is created, and never change afterwards.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Errors raised while loading or deriving a topic's configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration found for topic '{0}'")]
    TopicNotFound(String),

    #[error("topic '{0}' has no master or slave nodes")]
    EmptyNodeList(String),

    #[error("invalid node address '{0}', expected host:port")]
    InvalidAddress(String),

    #[error("failed to parse topic configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One master/slave pair as written in the configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub master: Option<String>,

    #[serde(default)]
    pub slave: Option<String>,

    /// Overrides the topic-level `master_auth` for this master
    #[serde(default)]
    pub master_auth: Option<String>,

    /// Overrides the topic-level `slave_auth` for this slave
    #[serde(default)]
    pub slave_auth: Option<String>,
}

/// Immutable per-topic record
#[derive(Debug, Clone, Deserialize)]
pub struct TopicConfig {
    /// Ordered node pairs; the order is the hash-routing domain
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeConfig>,

    /// Database index selected on every new connection
    #[serde(default)]
    pub db: Option<u32>,

    /// Grants access to system-level operations
    #[serde(default)]
    pub is_sys: bool,

    #[serde(default)]
    pub master_auth: Option<String>,

    #[serde(default)]
    pub slave_auth: Option<String>,

    /// Emit request/response trace lines
    #[serde(default)]
    pub debug: bool,

    /// Disable request statistics
    #[serde(default)]
    pub no_statistic: bool,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Probe cached connections with PING before reuse
    #[serde(default = "default_ping_before_use")]
    pub ping_before_use: bool,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_ping_before_use() -> bool {
    true
}

impl Default for TopicConfig {
    fn default() -> Self {
        TopicConfig {
            nodes: Vec::new(),
            db: None,
            is_sys: false,
            master_auth: None,
            slave_auth: None,
            debug: false,
            no_statistic: false,
            connect_timeout_ms: default_connect_timeout_ms(),
            ping_before_use: default_ping_before_use(),
        }
    }
}

impl TopicConfig {
    /// Convenience constructor for a topic made of `(master, slave)` pairs
    pub fn with_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) -> Self {
        TopicConfig {
            nodes: pairs
                .into_iter()
                .map(|(master, slave)| NodeConfig {
                    master: Some(master.to_string()),
                    slave: slave.map(str::to_string),
                    ..NodeConfig::default()
                })
                .collect(),
            ..TopicConfig::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Source of topic configurations
pub trait TopicSource: Send + Sync {
    /// Look up a topic by name; `None` when the topic is not configured
    fn load_topic(&self, name: &str) -> Option<TopicConfig>;
}

/// On-disk layout: `{ "topics": { "<name>": { ... } } }`
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    topics: HashMap<String, TopicConfig>,
}

/// Topics held in memory, usually loaded from a JSON file
#[derive(Debug, Default, Clone)]
pub struct StaticTopics {
    topics: HashMap<String, TopicConfig>,
}

impl StaticTopics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        Ok(StaticTopics { topics: file.topics })
    }

    /// Read and parse a JSON configuration file
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        Ok(Self::from_json_str(&raw)?)
    }

    /// Add or replace a topic
    pub fn insert(&mut self, name: impl Into<String>, config: TopicConfig) {
        self.topics.insert(name.into(), config);
    }
}

impl TopicSource for StaticTopics {
    fn load_topic(&self, name: &str) -> Option<TopicConfig> {
        self.topics.get(name).cloned()
    }
}
