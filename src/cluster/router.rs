//! Key routing logic
//!
//! Routes keys to nodes of a pool using CRC32 modulo the pool length.
//! No rebalancing happens: reordering or resizing a pool moves existing keys.

use super::NodeAddr;

/// How a single call picks its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Routing {
    /// CRC32 of the key modulo the pool length
    #[default]
    Hashed,
    /// Always the first node of the pool
    FirstNode,
}

/// Stateless key → node mapping
pub struct HashRouter;

impl HashRouter {
    /// Route a key to one node of `nodes`
    ///
    /// Returns `None` only when the pool is empty.
    pub fn route<'a>(key: &[u8], nodes: &'a [NodeAddr], routing: Routing) -> Option<&'a NodeAddr> {
        match routing {
            Routing::FirstNode => nodes.first(),
            Routing::Hashed => nodes.get(Self::slot(key, nodes.len())?),
        }
    }

    /// Index of the node serving `key` in a pool of `len` nodes, `None` for an empty pool
    pub fn slot(key: &[u8], len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        // CRC32 is unsigned here, so it is already its own absolute value
        Some((crc32fast::hash(key) as usize) % len)
    }
}
