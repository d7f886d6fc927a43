//! Pipeline manager
//!
//! Opens one batch per master node, lets callers queue operations into the
//! batch their key routes to, then executes every batch and forgets them.
//! Sessions are single use: open, queue, execute once.

use crate::client::QueuedCommand;
use crate::cluster::{HashRouter, NodeAddr, NodePool, Role, Routing};
use crate::commands::OperationClassifier;
use crate::connection::ConnectionManager;
use crate::dispatch::{admit, DispatchError};
use crate::protocol::RespValue;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Per-node results of one pipeline execution
pub type PipelineResults = HashMap<NodeAddr, Result<Vec<RespValue>, DispatchError>>;

/// Handle to the batch bound to one master node
///
/// Clones share the same queue.
#[derive(Clone)]
pub struct PipelineSession {
    addr: NodeAddr,
    queue: Arc<Mutex<Vec<QueuedCommand>>>,
    classifier: Arc<OperationClassifier>,
    allow_system: bool,
}

impl PipelineSession {
    fn new(addr: NodeAddr, classifier: Arc<OperationClassifier>, allow_system: bool) -> Self {
        PipelineSession {
            addr,
            queue: Arc::new(Mutex::new(Vec::new())),
            classifier,
            allow_system,
        }
    }

    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }

    /// Add an operation to the batch
    ///
    /// The same allow/deny rules as a direct dispatch apply. Returns the number
    /// of queued operations.
    pub fn queue(&self, op: &str, args: &[Bytes]) -> Result<usize, DispatchError> {
        let category = self.classifier.classify_invocation(op, args);
        admit(op, category, self.allow_system)?;

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.push(QueuedCommand::new(op, args));
        Ok(queue.len())
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self) -> Vec<QueuedCommand> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

/// Registry of open sessions, keyed by master address
pub struct PipelineManager {
    sessions: AsyncMutex<HashMap<NodeAddr, PipelineSession>>,
    classifier: Arc<OperationClassifier>,
    allow_system: bool,
}

impl PipelineManager {
    pub fn new(classifier: Arc<OperationClassifier>, allow_system: bool) -> Self {
        PipelineManager {
            sessions: AsyncMutex::new(HashMap::new()),
            classifier,
            allow_system,
        }
    }

    /// Open a session on every master, replacing any session still open
    ///
    /// Masters that cannot be reached are skipped.
    pub async fn open_all(
        &self,
        connections: &ConnectionManager,
        pool: &NodePool,
        db: Option<u32>,
    ) -> HashMap<NodeAddr, PipelineSession> {
        let mut opened = HashMap::new();

        for addr in pool.masters() {
            let auth = pool.credentials(addr, Role::Master);
            match connections.acquire(addr, auth, db).await {
                Ok(_lease) => {
                    let session =
                        PipelineSession::new(addr.clone(), self.classifier.clone(), self.allow_system);
                    opened.insert(addr.clone(), session);
                }
                Err(e) => warn!("Cannot open pipeline on {}: {}", addr, e),
            }
        }

        debug!("Opened {} of {} pipelines", opened.len(), pool.masters().len());
        *self.sessions.lock().await = opened.clone();
        opened
    }

    /// Session of the master `key` routes to, if one is open
    ///
    /// `routing` is only evaluated once a lookup will actually happen: not for
    /// an empty key, and not while no session is open.
    pub async fn session_for(
        &self,
        key: &[u8],
        masters: &[NodeAddr],
        routing: impl FnOnce() -> Routing,
    ) -> Option<PipelineSession> {
        if key.is_empty() {
            return None;
        }
        let sessions = self.sessions.lock().await;
        if sessions.is_empty() {
            return None;
        }
        let addr = HashRouter::route(key, masters, routing())?;
        sessions.get(addr).cloned()
    }

    /// Execute every open session and clear the registry
    pub async fn exec_all(
        &self,
        connections: &ConnectionManager,
        pool: &NodePool,
        db: Option<u32>,
    ) -> PipelineResults {
        let mut sessions = std::mem::take(&mut *self.sessions.lock().await);
        let mut results = HashMap::new();

        for addr in pool.masters() {
            let Some(session) = sessions.remove(addr) else {
                continue;
            };
            let commands = session.take();
            if commands.is_empty() {
                results.insert(addr.clone(), Ok(Vec::new()));
                continue;
            }

            let auth = pool.credentials(addr, Role::Master);
            let outcome = match connections.acquire(addr, auth, db).await {
                Ok(mut lease) => match lease.pipeline(&commands).await {
                    Ok(replies) => {
                        debug!("Pipeline on {} executed {} commands", addr, replies.len());
                        Ok(replies)
                    }
                    Err(e) => {
                        lease.evict();
                        Err(DispatchError::InvocationFault {
                            addr: addr.clone(),
                            message: e.to_string(),
                        })
                    }
                },
                Err(e) => Err(DispatchError::ConnectionFailed {
                    addr: addr.clone(),
                    reason: e.to_string(),
                }),
            };
            results.insert(addr.clone(), outcome);
        }

        results
    }

    /// Number of sessions currently open
    pub async fn open_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
