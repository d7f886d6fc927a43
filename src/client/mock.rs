//! Simulated nodes for unit tests

use super::{ClientError, Connector, QueuedCommand, StoreClient};
use crate::cluster::NodeAddr;
use crate::protocol::RespValue;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    dead: HashSet<String>,
    hanging: HashSet<String>,
    failing_ping: HashSet<String>,
    fault_next: HashSet<String>,
    stall_next: HashSet<String>,
    rejected_auth: HashSet<String>,
    connects: HashMap<String, usize>,
    calls: Vec<(String, String, Vec<Bytes>)>,
    pipelines: Vec<(String, usize)>,
    data: HashMap<String, HashMap<Bytes, Bytes>>,
}

/// A cluster of in-memory nodes; clones share state
#[derive(Clone, Default)]
pub(crate) struct MockCluster {
    state: Arc<Mutex<MockState>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Refuse every connect to `addr`
    pub fn kill(&self, addr: &str) {
        self.with(|s| s.dead.insert(addr.to_string()));
    }

    pub fn revive(&self, addr: &str) {
        self.with(|s| s.dead.remove(addr));
    }

    /// Never complete a connect to `addr`
    pub fn hang(&self, addr: &str) {
        self.with(|s| s.hanging.insert(addr.to_string()));
    }

    /// Answer PING with an error from now on
    pub fn fail_ping(&self, addr: &str) {
        self.with(|s| s.failing_ping.insert(addr.to_string()));
    }

    /// Drop the connection on the next command sent to `addr`
    pub fn fault_next(&self, addr: &str) {
        self.with(|s| s.fault_next.insert(addr.to_string()));
    }

    /// Never answer the next command sent to `addr`
    pub fn stall_next(&self, addr: &str) {
        self.with(|s| s.stall_next.insert(addr.to_string()));
    }

    pub fn reject_auth(&self, addr: &str) {
        self.with(|s| s.rejected_auth.insert(addr.to_string()));
    }

    /// Number of connect attempts made to `addr`
    pub fn connects(&self, addr: &str) -> usize {
        self.with(|s| s.connects.get(addr).copied().unwrap_or(0))
    }

    /// Operation names received by `addr`, in order
    pub fn ops(&self, addr: &str) -> Vec<String> {
        self.with(|s| {
            s.calls
                .iter()
                .filter(|(a, _, _)| a == addr)
                .map(|(_, op, _)| op.clone())
                .collect()
        })
    }

    /// Arguments of every call to `op` received by `addr`
    pub fn args_of(&self, addr: &str, op: &str) -> Vec<Vec<Bytes>> {
        self.with(|s| {
            s.calls
                .iter()
                .filter(|(a, o, _)| a == addr && o == op)
                .map(|(_, _, args)| args.clone())
                .collect()
        })
    }

    /// Pipeline batches received: (address, number of commands)
    pub fn pipelines(&self) -> Vec<(String, usize)> {
        self.with(|s| s.pipelines.clone())
    }

    pub fn value(&self, addr: &str, key: &str) -> Option<Bytes> {
        self.with(|s| {
            s.data
                .get(addr)
                .and_then(|kv| kv.get(key.as_bytes()).cloned())
        })
    }
}

#[async_trait]
impl Connector for MockCluster {
    async fn connect(&self, addr: &NodeAddr) -> Result<Box<dyn StoreClient>, ClientError> {
        let (dead, hanging) = self.with(|s| {
            *s.connects.entry(addr.to_string()).or_insert(0) += 1;
            (s.dead.contains(addr.as_str()), s.hanging.contains(addr.as_str()))
        });
        if hanging {
            std::future::pending::<()>().await;
        }
        if dead {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(Box::new(MockClient {
            addr: addr.to_string(),
            cluster: self.clone(),
        }))
    }
}

struct MockClient {
    addr: String,
    cluster: MockCluster,
}

#[async_trait]
impl StoreClient for MockClient {
    async fn invoke(&mut self, op: &str, args: &[Bytes]) -> Result<RespValue, ClientError> {
        let addr = self.addr.clone();
        if self.cluster.with(|s| s.stall_next.remove(&addr)) {
            std::future::pending::<()>().await;
        }
        self.cluster.with(|s| {
            let op = op.to_uppercase();
            s.calls.push((addr.clone(), op.clone(), args.to_vec()));
            if s.fault_next.remove(&addr) {
                return Err(ClientError::Disconnected);
            }

            let kv = s.data.entry(addr.clone()).or_default();
            let reply = match op.as_str() {
                "PING" if s.failing_ping.contains(&addr) => RespValue::error("ERR node is loading"),
                "PING" => RespValue::simple_string("PONG"),
                "AUTH" if s.rejected_auth.contains(&addr) => RespValue::error("ERR invalid password"),
                "SET" if args.len() >= 2 => {
                    kv.insert(args[0].clone(), args[1].clone());
                    RespValue::simple_string("OK")
                }
                "GET" if !args.is_empty() => kv
                    .get(&args[0])
                    .cloned()
                    .map(RespValue::BulkString)
                    .unwrap_or(RespValue::Null),
                "DEL" => RespValue::Integer(
                    args.iter().filter(|k| kv.remove(*k).is_some()).count() as i64,
                ),
                "DBSIZE" => RespValue::Integer(kv.len() as i64),
                _ => RespValue::simple_string("OK"),
            };
            Ok(reply)
        })
    }

    async fn pipeline(&mut self, commands: &[QueuedCommand]) -> Result<Vec<RespValue>, ClientError> {
        let addr = self.addr.clone();
        self.cluster.with(|s| s.pipelines.push((addr, commands.len())));
        let mut replies = Vec::with_capacity(commands.len());
        for cmd in commands {
            replies.push(self.invoke(&cmd.op, &cmd.args).await?);
        }
        Ok(replies)
    }
}
