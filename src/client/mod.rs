//! Store client abstraction
//!
//! The dispatcher never speaks to a node directly. It goes through a
//! [`StoreClient`] obtained from a [`Connector`], which keeps the wire protocol
//! outside of the routing core and lets tests swap in simulated nodes.

mod resp_client;

#[cfg(test)]
pub(crate) mod mock;

pub use resp_client::{RespClient, TcpConnector};

use crate::cluster::NodeAddr;
use crate::protocol::{RespError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Errors raised by a store client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] RespError),

    #[error("server disconnected")]
    Disconnected,

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("unexpected reply to {command}: {reply}")]
    Unexpected { command: &'static str, reply: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// One operation waiting in a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub op: String,
    pub args: Vec<Bytes>,
}

impl QueuedCommand {
    pub fn new(op: &str, args: &[Bytes]) -> Self {
        QueuedCommand {
            op: op.to_string(),
            args: args.to_vec(),
        }
    }

    /// Wire frame for this command
    pub fn to_frame(&self) -> RespValue {
        RespValue::command(&self.op, &self.args)
    }
}

/// A live session with one node
#[async_trait]
pub trait StoreClient: Send {
    /// Send `op args...` and return the node's reply
    ///
    /// Error replies (`-ERR ...`) are returned as [`RespValue::Error`];
    /// `Err` is reserved for faults that leave the session unusable.
    async fn invoke(&mut self, op: &str, args: &[Bytes]) -> Result<RespValue, ClientError>;

    /// Authenticate the session
    async fn auth(&mut self, secret: &str) -> Result<(), ClientError> {
        let reply = self
            .invoke("AUTH", &[Bytes::copy_from_slice(secret.as_bytes())])
            .await?;
        match reply {
            ref r if r.is_status("OK") => Ok(()),
            RespValue::Error(e) => Err(ClientError::AuthFailed(e)),
            other => Err(ClientError::AuthFailed(format!("unexpected response to AUTH: {}", other))),
        }
    }

    /// Switch the session to database `db`
    async fn select(&mut self, db: u32) -> Result<(), ClientError> {
        let reply = self.invoke("SELECT", &[Bytes::from(db.to_string())]).await?;
        if reply.is_status("OK") {
            Ok(())
        } else {
            Err(ClientError::Unexpected {
                command: "SELECT",
                reply: reply.to_string(),
            })
        }
    }

    /// Liveness probe; true when the node answered `+PONG`
    async fn ping(&mut self) -> Result<bool, ClientError> {
        Ok(self.invoke("PING", &[]).await?.is_status("PONG"))
    }

    /// Send a batch of commands and collect one reply per command, in order
    async fn pipeline(&mut self, commands: &[QueuedCommand]) -> Result<Vec<RespValue>, ClientError> {
        let mut replies = Vec::with_capacity(commands.len());
        for cmd in commands {
            replies.push(self.invoke(&cmd.op, &cmd.args).await?);
        }
        Ok(replies)
    }
}

/// Opens sessions to nodes
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, addr: &NodeAddr) -> Result<Box<dyn StoreClient>, ClientError>;
}
