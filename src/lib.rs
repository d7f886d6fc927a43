//! FerrumRoute - routing and connection management for master/slave key-value nodes
//!
//! FerrumRoute sits between application code and a group of RESP nodes:
//! - Each operation is classified against fixed allow/deny lists
//! - Keys are hashed onto the master or slave pool of a topic
//! - One live connection per node is kept, health-checked and re-established
//! - Writes can be batched into one pipeline per master

pub mod protocol;
pub mod config;
pub mod cluster;
pub mod commands;
pub mod client;
pub mod connection;
pub mod pipeline;
pub mod dispatch;
pub mod trace;
pub mod registry;

/// Re-export commonly used types
pub use protocol::RespValue;
pub use config::{ConfigError, StaticTopics, TopicConfig, TopicSource};
pub use cluster::{NodeAddr, Role, Routing};
pub use client::{Connector, StoreClient, TcpConnector};
pub use dispatch::{DispatchError, DispatchResult, Dispatcher, ErrorKind};
pub use pipeline::PipelineSession;
pub use registry::Registry;
