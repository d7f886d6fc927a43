//! Command dispatcher
//!
//! Ties classification, routing, connections and pipelines together for one
//! topic. Every call walks the same steps: classify the operation, pick the
//! pool (reads go to slaves, writes and allowed system operations to masters),
//! hash the first argument onto a node, obtain that node's session and forward
//! the call. Failures come back as a typed [`DispatchError`], never as a panic.

mod error;
mod hooks;

pub use error::{DispatchError, ErrorKind};
pub(crate) use error::admit;
pub use hooks::{RequestHooks, RequestReport, RequestStats, SlaHooks, StatsSnapshot};

use crate::client::Connector;
use crate::cluster::{HashRouter, NodeAddr, NodePool, Role, Routing};
use crate::commands::OperationClassifier;
use crate::config::{ConfigError, TopicConfig};
use crate::connection::{ConnectionManager, ConnectionOptions};
use crate::pipeline::{PipelineManager, PipelineResults, PipelineSession};
use crate::protocol::RespValue;
use crate::trace::{TraceLine, TraceSink};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Reply of a dispatched call
pub type DispatchResult = Result<RespValue, DispatchError>;

/// Dispatcher for one configuration topic
pub struct Dispatcher {
    topic: String,
    config: TopicConfig,
    pool: NodePool,
    classifier: Arc<OperationClassifier>,
    connections: ConnectionManager,
    pipelines: PipelineManager,
    hooks: Arc<dyn RequestHooks>,
    stats: Option<Arc<RequestStats>>,
    trace: Option<Arc<dyn TraceSink>>,

    /// One-shot override: the next routed call goes to the first node.
    /// Shared by every caller of this instance.
    force_first: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher for `topic`
    ///
    /// Derives the node pools once; fails when the configuration has no usable node.
    pub fn new(
        topic: impl Into<String>,
        config: TopicConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        let topic = topic.into();
        let pool = NodePool::from_config(&topic, &config)?;
        let classifier = Arc::new(OperationClassifier::new());
        let hooks = SlaHooks::new(topic.clone(), !config.no_statistic);

        info!(
            "Dispatcher for '{}' ready: {} masters, {} slaves",
            topic,
            pool.masters().len(),
            pool.slaves().len()
        );

        Ok(Dispatcher {
            connections: ConnectionManager::new(connector, ConnectionOptions::from_topic(&config)),
            pipelines: PipelineManager::new(classifier.clone(), config.is_sys),
            stats: hooks.stats(),
            hooks: Arc::new(hooks),
            trace: None,
            force_first: AtomicBool::new(false),
            classifier,
            pool,
            config,
            topic,
        })
    }

    /// Replace the default SLA hooks
    pub fn with_hooks(mut self, hooks: Arc<dyn RequestHooks>) -> Self {
        self.hooks = hooks;
        self.stats = None;
        self
    }

    /// Sink for trace lines; only used when the topic has `debug` set
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn config(&self) -> &TopicConfig {
        &self.config
    }

    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Request counters, when the default hooks collect them
    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.stats.as_ref().map(|s| s.snapshot())
    }

    /// Send the next routed call to the first node of its pool
    ///
    /// The override is consumed by that call; the one after it is hashed again.
    /// Callers sharing this dispatcher across tasks should prefer
    /// [`dispatch_with`](Self::dispatch_with) and [`Routing::FirstNode`].
    pub fn force_next_call_to_first_node(&self) {
        self.force_first.store(true, Ordering::SeqCst);
    }

    fn effective_routing(&self, requested: Routing) -> Routing {
        if requested == Routing::FirstNode || self.force_first.swap(false, Ordering::SeqCst) {
            Routing::FirstNode
        } else {
            Routing::Hashed
        }
    }

    /// Dispatch `op args...` with hashed routing
    pub async fn dispatch(&self, op: &str, args: &[Bytes]) -> DispatchResult {
        self.dispatch_with(op, args, Routing::Hashed).await
    }

    /// Dispatch `op args...` with an explicit routing intent
    pub async fn dispatch_with(&self, op: &str, args: &[Bytes], routing: Routing) -> DispatchResult {
        let started = Instant::now();
        self.hooks.before_request(op, args);

        let outcome = self.execute(op, args, routing).await;

        let status = match &outcome {
            Ok(reply) => format!("SUCCESS,{}", reply.encoded_len()),
            Err(e) => e.to_string(),
        };
        self.hooks.after_request(&RequestReport {
            operation: op,
            status: &status,
            success: outcome.is_ok(),
            elapsed: started.elapsed(),
        });

        outcome
    }

    /// Classify and route without touching the network
    ///
    /// Returns the node the call would be sent to and the role it is served as.
    /// Consumes the force-first override like a real call.
    pub fn resolve(
        &self,
        op: &str,
        args: &[Bytes],
        routing: Routing,
    ) -> Result<(NodeAddr, Role), DispatchError> {
        let category = self.classifier.classify_invocation(op, args);
        let role = admit(op, category, self.config.is_sys)?;

        let key: &[u8] = args.first().map(|k| &k[..]).unwrap_or_default();
        let routing = self.effective_routing(routing);
        let addr = HashRouter::route(key, self.pool.nodes(role), routing)
            .cloned()
            .ok_or_else(|| DispatchError::NodeConfigMissing {
                op: op.to_string(),
                role,
            })?;

        debug!("{} ({}) -> {} {} [{:?}]", op, category, role, addr, routing);
        Ok((addr, role))
    }

    async fn execute(&self, op: &str, args: &[Bytes], routing: Routing) -> DispatchResult {
        let (addr, role) = self.resolve(op, args, routing)?;
        let auth = self.pool.credentials(&addr, role);

        let mut lease = self
            .connections
            .acquire(&addr, auth, self.config.db)
            .await
            .map_err(|e| {
                warn!("No connection to {} for {}: {}", addr, op, e);
                DispatchError::ConnectionFailed {
                    addr: addr.clone(),
                    reason: e.to_string(),
                }
            })?;

        if self.config.debug {
            self.record_trace(TraceLine::client_send(addr.as_str(), op, args));
        }

        match lease.invoke(op, args).await {
            Ok(reply) => {
                if self.config.debug {
                    self.record_trace(TraceLine::client_receive("SUCCESS", reply.encoded_len()));
                }
                Ok(reply)
            }
            Err(e) => {
                lease.evict();
                Err(DispatchError::InvocationFault {
                    addr,
                    message: e.to_string(),
                })
            }
        }
    }

    fn record_trace(&self, line: TraceLine) {
        if let Some(sink) = &self.trace {
            sink.record(&line);
        }
    }

    /// Open one pipeline session per master
    pub async fn open_all_pipelines(&self) -> HashMap<NodeAddr, PipelineSession> {
        self.pipelines
            .open_all(&self.connections, &self.pool, self.config.db)
            .await
    }

    /// Session of the master `key` routes to, if pipelines are open
    ///
    /// The force-first override is only consumed when a session is looked up.
    pub async fn pipeline_for(&self, key: &[u8]) -> Option<PipelineSession> {
        self.pipelines
            .session_for(key, self.pool.masters(), || self.effective_routing(Routing::Hashed))
            .await
    }

    /// Execute and close every open pipeline session
    pub async fn execute_all_pipelines(&self) -> PipelineResults {
        self.pipelines
            .exec_all(&self.connections, &self.pool, self.config.db)
            .await
    }

    /// Number of pipeline sessions currently open
    pub async fn open_pipelines(&self) -> usize {
        self.pipelines.open_count().await
    }
}
