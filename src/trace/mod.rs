//! Request/response trace lines
//!
//! When a topic runs with `debug` enabled, every forwarded request produces a
//! `CS` (client send) line and every successful reply a `CR` (client receive)
//! line. Sinks are best effort: a sink that cannot write drops the line.

mod writer;

pub use writer::FileTraceSink;

use crate::protocol::{RespEncoder, RespValue};
use base64::Engine;
use bytes::Bytes;
use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// One trace record
#[derive(Debug, Clone, PartialEq)]
pub enum TraceLine {
    /// Request about to be sent to `node`
    ClientSend {
        node: String,
        operation: String,
        /// Base64 of the RESP-encoded argument array
        query: String,
        timestamp_ms: u128,
    },
    /// Reply received
    ClientReceive {
        status: String,
        size: usize,
        timestamp_ms: u128,
    },
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

impl TraceLine {
    pub fn client_send(node: &str, operation: &str, args: &[Bytes]) -> Self {
        let frame = RespValue::Array(args.iter().cloned().map(RespValue::BulkString).collect());
        TraceLine::ClientSend {
            node: node.to_string(),
            operation: operation.to_string(),
            query: base64::engine::general_purpose::STANDARD.encode(RespEncoder::encode(&frame)),
            timestamp_ms: now_millis(),
        }
    }

    pub fn client_receive(status: &str, size: usize) -> Self {
        TraceLine::ClientReceive {
            status: status.to_string(),
            size,
            timestamp_ms: now_millis(),
        }
    }
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceLine::ClientSend { node, operation, query, timestamp_ms } => write!(
                f,
                "TRACE: CS REDIS.{} {} {} QUERY: {}",
                operation, node, timestamp_ms, query
            ),
            TraceLine::ClientReceive { status, size, timestamp_ms } => write!(
                f,
                "TRACE: CR {} RESPONSE_TYPE: {} DATA_SIZE {}",
                timestamp_ms, status, size
            ),
        }
    }
}

/// Destination for trace lines; must never block the caller for long
pub trait TraceSink: Send + Sync {
    fn record(&self, line: &TraceLine);
}

/// Emits trace lines through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn record(&self, line: &TraceLine) {
        info!(target: "ferrumroute::trace", "{}", line);
    }
}

/// Keeps trace lines in memory
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    lines: Mutex<Vec<TraceLine>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<TraceLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, line: &TraceLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_send_line() {
        let line = TraceLine::client_send("10.0.0.1:6379", "SET", &[Bytes::from("k"), Bytes::from("v")]);
        let TraceLine::ClientSend { query, .. } = &line else {
            panic!("expected a CS line");
        };
        let decoded = base64::engine::general_purpose::STANDARD.decode(query).unwrap();
        assert_eq!(decoded, b"*2\r\n$1\r\nk\r\n$1\r\nv\r\n");

        let text = line.to_string();
        assert!(text.starts_with("TRACE: CS REDIS.SET 10.0.0.1:6379 "));
        assert!(text.contains(" QUERY: "));
    }

    #[test]
    fn test_client_receive_line() {
        let line = TraceLine::ClientReceive {
            status: "SUCCESS".into(),
            size: 5,
            timestamp_ms: 1700000000000,
        };
        assert_eq!(
            line.to_string(),
            "TRACE: CR 1700000000000 RESPONSE_TYPE: SUCCESS DATA_SIZE 5"
        );
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryTraceSink::new();
        sink.record(&TraceLine::client_receive("SUCCESS", 1));
        assert_eq!(sink.lines().len(), 1);
    }
}
