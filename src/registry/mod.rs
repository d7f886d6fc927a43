//! Dispatcher registry
//!
//! Hands out one long-lived [`Dispatcher`] per topic name. The first lookup of
//! a name loads its configuration and builds the dispatcher; later lookups
//! return the same instance. Pass the registry to whoever needs a dispatcher;
//! there is no process-wide static.

use crate::client::Connector;
use crate::config::{ConfigError, TopicSource};
use crate::dispatch::Dispatcher;
use crate::trace::TraceSink;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct Registry {
    source: Arc<dyn TopicSource>,
    connector: Arc<dyn Connector>,
    trace: Option<Arc<dyn TraceSink>>,
    instances: Mutex<HashMap<String, Arc<Dispatcher>>>,
}

impl Registry {
    pub fn new(source: Arc<dyn TopicSource>, connector: Arc<dyn Connector>) -> Self {
        Registry {
            source,
            connector,
            trace: None,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Trace sink handed to every dispatcher built from now on
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    /// Dispatcher for `topic`, built on first use
    pub fn get(&self, topic: &str) -> Result<Arc<Dispatcher>, ConfigError> {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(dispatcher) = instances.get(topic) {
            return Ok(dispatcher.clone());
        }

        let config = self
            .source
            .load_topic(topic)
            .ok_or_else(|| ConfigError::TopicNotFound(topic.to_string()))?;

        let mut dispatcher = Dispatcher::new(topic, config, self.connector.clone())?;
        if let Some(sink) = &self.trace {
            dispatcher = dispatcher.with_trace_sink(sink.clone());
        }

        let dispatcher = Arc::new(dispatcher);
        instances.insert(topic.to_string(), dispatcher.clone());
        info!("Registered dispatcher for topic '{}'", topic);
        Ok(dispatcher)
    }

    /// Forget every dispatcher; the next `get` builds fresh ones
    pub fn reset(&self) {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of dispatchers built so far
    pub fn len(&self) -> usize {
        self.instances.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
