//! Connection manager
//!
//! Keeps at most one live session per node address. Each address has its own
//! slot guarded by an async mutex; a caller owns the slot through a [`Lease`]
//! from acquire until the reply is read, so concurrent callers never interleave
//! frames on one socket or race to replace the same session.

use crate::client::{ClientError, Connector, QueuedCommand, StoreClient};
use crate::cluster::NodeAddr;
use crate::config::TopicConfig;
use crate::protocol::RespValue;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

type Slot = Arc<Mutex<Option<Box<dyn StoreClient>>>>;

/// Connection knobs
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    /// Bound on a single connect attempt
    pub connect_timeout: Duration,

    /// PING cached sessions before handing them out
    pub health_check: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            connect_timeout: Duration::from_secs(10),
            health_check: true,
        }
    }
}

impl ConnectionOptions {
    pub fn from_topic(config: &TopicConfig) -> Self {
        ConnectionOptions {
            connect_timeout: config.connect_timeout(),
            health_check: config.ping_before_use,
        }
    }
}

/// Exclusive use of one node's cached session
///
/// The session leaves its slot while a call is on the wire and goes back only
/// once the reply has been read. A lease dropped mid-call (a cancelled future)
/// therefore leaves the slot empty and the next acquire reconnects, so an
/// unread reply is never handed to a later caller.
pub struct Lease {
    addr: NodeAddr,
    guard: OwnedMutexGuard<Option<Box<dyn StoreClient>>>,
}

impl Lease {
    pub async fn invoke(&mut self, op: &str, args: &[Bytes]) -> Result<RespValue, ClientError> {
        let mut client = self.guard.take().ok_or(ClientError::Disconnected)?;
        let reply = client.invoke(op, args).await?;
        *self.guard = Some(client);
        Ok(reply)
    }

    pub async fn pipeline(&mut self, commands: &[QueuedCommand]) -> Result<Vec<RespValue>, ClientError> {
        let mut client = self.guard.take().ok_or(ClientError::Disconnected)?;
        let replies = client.pipeline(commands).await?;
        *self.guard = Some(client);
        Ok(replies)
    }

    /// Drop the session; the next acquire reconnects
    pub fn evict(mut self) {
        warn!("Evicting connection to {}", self.addr);
        *self.guard = None;
    }
}

/// Owns the per-address sessions of one dispatcher
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    options: ConnectionOptions,
    slots: Mutex<HashMap<NodeAddr, Slot>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, options: ConnectionOptions) -> Self {
        ConnectionManager {
            connector,
            options,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, addr: &NodeAddr) -> Slot {
        let mut slots = self.slots.lock().await;
        slots.entry(addr.clone()).or_default().clone()
    }

    /// Get a live session to `addr`
    ///
    /// A cached session is probed first (when health checks are on) and
    /// dropped if the probe fails. A new session is connected with one retry,
    /// then authenticated and switched to `db`. On failure nothing is cached.
    pub async fn acquire(
        &self,
        addr: &NodeAddr,
        auth: Option<&str>,
        db: Option<u32>,
    ) -> Result<Lease, ClientError> {
        let mut guard = self.slot(addr).await.lock_owned().await;

        if self.options.health_check {
            if let Some(mut client) = guard.take() {
                match client.ping().await {
                    Ok(true) => *guard = Some(client),
                    Ok(false) => {
                        warn!("Health check on {} got an unexpected reply, reconnecting", addr)
                    }
                    Err(e) => warn!("Health check on {} failed: {}, reconnecting", addr, e),
                }
            }
        }

        if guard.is_none() {
            *guard = Some(self.establish(addr, auth, db).await?);
        }

        Ok(Lease {
            addr: addr.clone(),
            guard,
        })
    }

    async fn establish(
        &self,
        addr: &NodeAddr,
        auth: Option<&str>,
        db: Option<u32>,
    ) -> Result<Box<dyn StoreClient>, ClientError> {
        let mut client = match self.connect_once(addr).await {
            Ok(client) => client,
            Err(e) => {
                debug!("Connect to {} failed ({}), retrying once", addr, e);
                self.connect_once(addr).await.map_err(|e| {
                    warn!("Connect to {} failed twice: {}", addr, e);
                    e
                })?
            }
        };

        if let Some(secret) = auth {
            client.auth(secret).await?;
        }
        if let Some(db) = db {
            client.select(db).await?;
        }

        debug!("Connection to {} established", addr);
        Ok(client)
    }

    async fn connect_once(&self, addr: &NodeAddr) -> Result<Box<dyn StoreClient>, ClientError> {
        let timeout = self.options.connect_timeout;
        match tokio::time::timeout(timeout, self.connector.connect(addr)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(timeout)),
        }
    }

    /// Drop the cached session of `addr`, if any
    pub async fn evict(&self, addr: &NodeAddr) {
        let slot = self.slots.lock().await.get(addr).cloned();
        if let Some(slot) = slot {
            *slot.lock().await = None;
        }
    }

    /// Whether a session to `addr` is cached
    pub async fn is_cached(&self, addr: &NodeAddr) -> bool {
        let slot = self.slots.lock().await.get(addr).cloned();
        match slot {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    /// Addresses with a cached session, sorted
    pub async fn cached_addrs(&self) -> Vec<NodeAddr> {
        let slots: Vec<(NodeAddr, Slot)> = self
            .slots
            .lock()
            .await
            .iter()
            .map(|(addr, slot)| (addr.clone(), slot.clone()))
            .collect();

        let mut cached = Vec::new();
        for (addr, slot) in slots {
            if slot.lock().await.is_some() {
                cached.push(addr);
            }
        }
        cached.sort();
        cached
    }
}
