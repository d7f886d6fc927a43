//! RESP2 parser and encoder
//!
//! The parser works on a borrowed slice and reports how many bytes a complete
//! value consumed, so a client can keep partial replies in its read buffer.

use super::types::{RespError, RespValue};
use bytes::{BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Largest bulk string accepted from a node (512 MiB, the Redis default)
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Largest array accepted from a node
const MAX_ARRAY_LEN: i64 = 1 << 24;

/// Deepest array nesting accepted from a node
const MAX_DEPTH: usize = 64;

/// Elements reserved up front; larger arrays grow as elements arrive
const PREALLOC_LIMIT: usize = 1024;

/// RESP2 Parser
pub struct RespParser;

impl RespParser {
    /// Parse one RESP value from the front of `buf`
    ///
    /// Returns Ok(Some((value, consumed))) if a complete value was parsed,
    /// Ok(None) if more data is needed,
    /// Err(e) if parsing failed
    pub fn parse(buf: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
        let mut pos = 0;
        Ok(Self::parse_at(buf, &mut pos, 0)?.map(|value| (value, pos)))
    }

    fn parse_at(buf: &[u8], pos: &mut usize, depth: usize) -> Result<Option<RespValue>, RespError> {
        if depth > MAX_DEPTH {
            return Err(RespError::InvalidProtocol(format!(
                "Arrays nested deeper than {}",
                MAX_DEPTH
            )));
        }

        let Some((prefix, line, next)) = Self::line_at(buf, *pos) else {
            return Ok(None);
        };

        match prefix {
            b'+' => {
                *pos = next;
                Ok(Some(RespValue::SimpleString(Self::utf8(line)?)))
            }
            b'-' => {
                *pos = next;
                Ok(Some(RespValue::Error(Self::utf8(line)?)))
            }
            b':' => {
                *pos = next;
                Ok(Some(RespValue::Integer(Self::number(line)?)))
            }
            b'$' => {
                let len = Self::number(line)?;
                if len == -1 {
                    *pos = next;
                    return Ok(Some(RespValue::Null));
                }
                if !(0..=MAX_BULK_LEN).contains(&len) {
                    return Err(RespError::InvalidProtocol(format!(
                        "Invalid bulk string length: {}",
                        len
                    )));
                }

                let end = next + len as usize;
                if buf.len() < end + 2 {
                    return Ok(None);
                }
                if &buf[end..end + 2] != CRLF {
                    return Err(RespError::InvalidProtocol(
                        "Missing CRLF after bulk string data".to_string(),
                    ));
                }

                *pos = end + 2;
                Ok(Some(RespValue::BulkString(Bytes::copy_from_slice(&buf[next..end]))))
            }
            b'*' => {
                let count = Self::number(line)?;
                if count == -1 {
                    *pos = next;
                    return Ok(Some(RespValue::Null));
                }
                if !(0..=MAX_ARRAY_LEN).contains(&count) {
                    return Err(RespError::InvalidProtocol(format!(
                        "Invalid array count: {}",
                        count
                    )));
                }

                // Only commit the cursor once every element is available
                let mut cursor = next;
                let mut elements = Vec::with_capacity((count as usize).min(PREALLOC_LIMIT));
                for _ in 0..count {
                    match Self::parse_at(buf, &mut cursor, depth + 1)? {
                        Some(value) => elements.push(value),
                        None => return Ok(None),
                    }
                }

                *pos = cursor;
                Ok(Some(RespValue::Array(elements)))
            }
            other => Err(RespError::InvalidProtocol(format!(
                "Unknown type prefix: {}",
                other as char
            ))),
        }
    }

    /// Locate the line starting at `start`: (type byte, body without CRLF, offset after CRLF)
    fn line_at(buf: &[u8], start: usize) -> Option<(u8, &[u8], usize)> {
        let rest = buf.get(start..)?;
        let end = rest.windows(2).position(|w| w == CRLF)?;
        if end == 0 {
            return Some((b'\r', &rest[..0], start + 2));
        }
        Some((rest[0], &rest[1..end], start + end + 2))
    }

    fn utf8(line: &[u8]) -> Result<String, RespError> {
        String::from_utf8(line.to_vec()).map_err(|_| RespError::InvalidUtf8)
    }

    fn number(line: &[u8]) -> Result<i64, RespError> {
        std::str::from_utf8(line)
            .map_err(|_| RespError::InvalidUtf8)?
            .parse::<i64>()
            .map_err(|_| RespError::IntegerOverflow)
    }
}

/// RESP2 Encoder
pub struct RespEncoder;

impl RespEncoder {
    /// Encode a RESP value to bytes
    pub fn encode(value: &RespValue) -> Bytes {
        let mut buf = BytesMut::with_capacity(value.encoded_len());
        Self::encode_to(&mut buf, value);
        buf.freeze()
    }

    /// Encode a RESP value into an existing buffer
    pub fn encode_to(buf: &mut BytesMut, value: &RespValue) {
        match value {
            RespValue::SimpleString(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::Error(e) => {
                buf.put_u8(b'-');
                buf.put_slice(e.as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::Integer(i) => {
                buf.put_u8(b':');
                buf.put_slice(i.to_string().as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::BulkString(bytes) => {
                buf.put_u8(b'$');
                buf.put_slice(bytes.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(bytes);
                buf.put_slice(CRLF);
            }
            RespValue::Null => {
                buf.put_slice(b"$-1\r\n");
            }
            RespValue::Array(arr) => {
                buf.put_u8(b'*');
                buf.put_slice(arr.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                for elem in arr {
                    Self::encode_to(buf, elem);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_string() {
        let result = RespParser::parse(b"+PONG\r\n").unwrap();
        assert_eq!(result, Some((RespValue::simple_string("PONG"), 7)));
    }

    #[test]
    fn test_parse_error() {
        let result = RespParser::parse(b"-ERR wrong type\r\n").unwrap();
        assert_eq!(result.unwrap().0, RespValue::error("ERR wrong type"));
    }

    #[test]
    fn test_parse_integer() {
        let result = RespParser::parse(b":1000\r\n").unwrap();
        assert_eq!(result.unwrap().0, RespValue::Integer(1000));
    }

    #[test]
    fn test_parse_bulk_string_and_null() {
        let result = RespParser::parse(b"$6\r\nfoobar\r\n").unwrap();
        assert_eq!(result, Some((RespValue::bulk_string("foobar"), 12)));

        let result = RespParser::parse(b"$-1\r\n").unwrap();
        assert_eq!(result, Some((RespValue::Null, 5)));
    }

    #[test]
    fn test_parse_empty_bulk_string() {
        let result = RespParser::parse(b"$0\r\n\r\n").unwrap();
        assert_eq!(result, Some((RespValue::bulk_string(""), 6)));
    }

    #[test]
    fn test_parse_nested_array() {
        let raw = b"*2\r\n$3\r\nfoo\r\n*2\r\n:1\r\n$-1\r\n";
        let (value, consumed) = RespParser::parse(raw).unwrap().unwrap();
        assert_eq!(consumed, raw.len());
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::bulk_string("foo"),
                RespValue::Array(vec![RespValue::Integer(1), RespValue::Null]),
            ])
        );
    }

    #[test]
    fn test_parse_incomplete() {
        assert_eq!(RespParser::parse(b"").unwrap(), None);
        assert_eq!(RespParser::parse(b"+OK").unwrap(), None);
        assert_eq!(RespParser::parse(b"$6\r\nfoo").unwrap(), None);
        assert_eq!(RespParser::parse(b"*2\r\n$3\r\nfoo\r\n").unwrap(), None);
    }

    #[test]
    fn test_parse_leaves_trailing_bytes() {
        let (value, consumed) = RespParser::parse(b"+OK\r\n:5\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::simple_string("OK"));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_rejects_unknown_prefix() {
        assert!(matches!(
            RespParser::parse(b"?huh\r\n"),
            Err(RespError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn test_parse_rejects_oversized_lengths() {
        assert!(matches!(
            RespParser::parse(b"*4611686018427387903\r\n"),
            Err(RespError::InvalidProtocol(_))
        ));
        assert!(matches!(
            RespParser::parse(b"$4611686018427387903\r\n"),
            Err(RespError::InvalidProtocol(_))
        ));
        // a large but legal count waits for its elements
        assert_eq!(RespParser::parse(b"*1000000\r\n:1\r\n").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let deep = b"*1\r\n".repeat(100_000);
        assert!(matches!(
            RespParser::parse(&deep),
            Err(RespError::InvalidProtocol(_))
        ));

        let mut shallow = b"*1\r\n".repeat(8);
        shallow.extend_from_slice(b":7\r\n");
        let (value, consumed) = RespParser::parse(&shallow).unwrap().unwrap();
        assert_eq!(consumed, shallow.len());
        assert!(matches!(value, RespValue::Array(_)));
    }

    #[test]
    fn test_encode_command() {
        let frame = RespValue::command("GET", &[Bytes::from("user:1")]);
        let encoded = RespEncoder::encode(&frame);
        assert_eq!(encoded, Bytes::from("*2\r\n$3\r\nGET\r\n$6\r\nuser:1\r\n"));
    }
}
