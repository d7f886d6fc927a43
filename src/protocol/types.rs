//! RESP2 value types
//!
//! Values exchanged with the store nodes, both as outgoing command frames
//! and as replies.

use bytes::Bytes;
use std::fmt;

/// RESP2 value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple strings: +OK\r\n
    SimpleString(String),

    /// Errors: -Error message\r\n
    Error(String),

    /// Integers: :1000\r\n
    Integer(i64),

    /// Bulk strings: $6\r\nfoobar\r\n
    BulkString(Bytes),

    /// Null bulk string or null array: $-1\r\n
    Null,

    /// Arrays: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Create a simple string
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Create an error
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Create a bulk string from bytes
    pub fn bulk_string(b: impl Into<Bytes>) -> Self {
        RespValue::BulkString(b.into())
    }

    /// Build the frame a client sends for `op args...`: an array of bulk strings.
    pub fn command(op: &str, args: &[Bytes]) -> Self {
        let mut parts = Vec::with_capacity(args.len() + 1);
        parts.push(RespValue::BulkString(Bytes::copy_from_slice(op.as_bytes())));
        parts.extend(args.iter().cloned().map(RespValue::BulkString));
        RespValue::Array(parts)
    }

    /// True for `+<expected>` replies.
    pub fn is_status(&self, expected: &str) -> bool {
        matches!(self, RespValue::SimpleString(s) if s.eq_ignore_ascii_case(expected))
    }

    /// Try to extract array elements
    pub fn as_array(&self) -> Option<&Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to extract bulk string bytes
    pub fn as_bulk_string(&self) -> Option<&Bytes> {
        match self {
            RespValue::BulkString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Number of bytes this value occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        fn digits(n: usize) -> usize {
            n.to_string().len()
        }
        match self {
            RespValue::SimpleString(s) | RespValue::Error(s) => 1 + s.len() + 2,
            RespValue::Integer(i) => 1 + i.to_string().len() + 2,
            RespValue::BulkString(b) => 1 + digits(b.len()) + 2 + b.len() + 2,
            RespValue::Null => 5,
            RespValue::Array(arr) => {
                1 + digits(arr.len()) + 2 + arr.iter().map(RespValue::encoded_len).sum::<usize>()
            }
        }
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(e) => write!(f, "(error) {}", e),
            RespValue::Integer(i) => write!(f, "(integer) {}", i),
            RespValue::BulkString(b) => write!(f, "\"{}\"", String::from_utf8_lossy(b)),
            RespValue::Null => write!(f, "(nil)"),
            RespValue::Array(arr) => {
                if arr.is_empty() {
                    return write!(f, "(empty array)");
                }
                for (i, elem) in arr.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, elem)?;
                }
                Ok(())
            }
        }
    }
}

/// RESP parsing errors
#[derive(Debug, Clone, PartialEq)]
pub enum RespError {
    /// Invalid protocol format
    InvalidProtocol(String),

    /// Invalid UTF-8 in string
    InvalidUtf8,

    /// Integer overflow
    IntegerOverflow,
}

impl fmt::Display for RespError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespError::InvalidProtocol(msg) => write!(f, "Invalid protocol: {}", msg),
            RespError::InvalidUtf8 => write!(f, "Invalid UTF-8"),
            RespError::IntegerOverflow => write!(f, "Integer overflow"),
        }
    }
}

impl std::error::Error for RespError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RespEncoder;

    #[test]
    fn test_command_frame() {
        let frame = RespValue::command("SET", &[Bytes::from("k"), Bytes::from("v")]);
        let parts = frame.as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], RespValue::bulk_string("SET"));
        assert_eq!(parts[2], RespValue::bulk_string("v"));
    }

    #[test]
    fn test_encoded_len_matches_encoder() {
        let values = vec![
            RespValue::simple_string("OK"),
            RespValue::Integer(-42),
            RespValue::Null,
            RespValue::bulk_string("hello world"),
            RespValue::Array(vec![
                RespValue::bulk_string("a"),
                RespValue::Array(vec![RespValue::Integer(1), RespValue::Null]),
            ]),
        ];
        for value in values {
            assert_eq!(value.encoded_len(), RespEncoder::encode(&value).len(), "{:?}", value);
        }
    }

    #[test]
    fn test_is_status() {
        assert!(RespValue::simple_string("PONG").is_status("pong"));
        assert!(!RespValue::bulk_string("PONG").is_status("PONG"));
    }
}
