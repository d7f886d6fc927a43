//! Operation classifier
//!
//! Static allow/deny lists deciding which pool an operation is routed to,
//! or whether it may be sent at all.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// Operations that could damage a node; never forwarded
const DISABLED: &[&str] = &[
    "FLUSHDB", "FLUSHALL", "SHUTDOWN", "BGREWRITEAOF", "SLAVEOF", "SAVE", "BGSAVE",
    "CLIENT KILL", "CONFIG RESETSTAT", "CONFIG REWRITE", "CONFIG SET", "DEBUG OBJECT",
    "DEBUG SEGFAULT", "MONITOR", "PSYNC", "SYNC", "",
];

/// Lookup-only operations, served by slaves
const READ: &[&str] = &[
    "HGET", "HEXISTS", "HGETALL", "HKEYS", "HMGET", "HSCAN", "HVALS", "ZCOUNT", "ZRANGE",
    "ZRANGEBYSCORE", "ZRANK", "ZREVRANGE", "ZREVRANGEBYSCORE", "ZREVRANK", "ZSCORE", "ZSCAN",
    "SINTER", "LRANGE", "TTL", "TYPE", "GET", "SCARD", "ZCARD", "EXISTS", "LINDEX", "LLEN",
    "SORT",
];

/// Mutating operations, served by masters
const WRITE: &[&str] = &[
    "HSET", "HINCRBY", "HINCRBYFLOAT", "HMSET", "HDEL", "HLEN", "HSETNX", "ZADD", "ZINCRBY",
    "ZREM", "ZREMRANGEBYRANK", "ZREMRANGEBYSCORE", "ZUNIONSTORE", "ZINTERSTORE", "SET", "SREM",
    "EXPIRE", "EXPIREAT", "MULTI", "EXEC", "LPUSH", "RPUSH", "LPUSHX", "RPUSHX", "LPOP", "BLPOP",
    "RPOP", "BRPOP", "BRPOPLPUSH", "LINSERT", "LREM", "LSET", "LTRIM", "RPOPLPUSH",
];

/// Administrative operations, served by masters when the topic allows it
const SYSTEM: &[&str] = &[
    "DBSIZE", "LASTSAVE", "SELECT", "INFO", "CONFIG", "CLIENT", "PING", "AUTH", "TIME", "KEYS",
    "DEL", "SLOWLOG",
];

/// Category of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCategory {
    Read,
    Write,
    System,
    Disabled,
    Unknown,
}

impl fmt::Display for OpCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpCategory::Read => "read",
            OpCategory::Write => "write",
            OpCategory::System => "system",
            OpCategory::Disabled => "disabled",
            OpCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Maps operation names to categories
pub struct OperationClassifier {
    categories: HashMap<String, OpCategory>,
}

impl OperationClassifier {
    /// Build the classifier from the fixed lists
    pub fn new() -> Self {
        let mut classifier = OperationClassifier {
            categories: HashMap::new(),
        };

        // First registration wins: disabled, then read, write, system
        classifier.register(DISABLED, OpCategory::Disabled);
        classifier.register(READ, OpCategory::Read);
        classifier.register(WRITE, OpCategory::Write);
        classifier.register(SYSTEM, OpCategory::System);

        classifier
    }

    fn register(&mut self, names: &[&str], category: OpCategory) {
        for name in names {
            self.categories.entry(name.to_string()).or_insert(category);
        }
    }

    /// Category of an operation name (case-insensitive)
    pub fn classify(&self, name: &str) -> OpCategory {
        self.categories
            .get(&name.trim().to_uppercase())
            .copied()
            .unwrap_or(OpCategory::Unknown)
    }

    /// Category of a full invocation
    ///
    /// Same as [`classify`](Self::classify), except that `NAME SUBCOMMAND`
    /// (first argument as subcommand) is checked against the disabled list, so
    /// `CONFIG SET ...` is refused while `CONFIG GET ...` stays a system operation.
    pub fn classify_invocation(&self, name: &str, args: &[Bytes]) -> OpCategory {
        if let Some(sub) = args.first().and_then(|a| std::str::from_utf8(a).ok()) {
            let compound = format!("{} {}", name.trim(), sub.trim()).to_uppercase();
            if self.categories.get(&compound) == Some(&OpCategory::Disabled) {
                return OpCategory::Disabled;
            }
        }
        self.classify(name)
    }

    /// Names registered under `category`
    pub fn names(&self, category: OpCategory) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .categories
            .iter()
            .filter(|(_, c)| **c == category)
            .map(|(n, _)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for OperationClassifier {
    fn default() -> Self {
        Self::new()
    }
}
