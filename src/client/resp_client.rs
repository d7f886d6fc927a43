//! RESP client over any async byte stream
//!
//! Commands go out as RESP arrays of bulk strings and exactly one reply is
//! read back per command.

use super::{ClientError, Connector, QueuedCommand, StoreClient};
use crate::cluster::NodeAddr;
use crate::protocol::{RespEncoder, RespParser, RespValue};
use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Client session on top of a byte stream
pub struct RespClient<S> {
    /// Underlying stream (TCP in production)
    stream: S,

    /// Read buffer
    read_buf: BytesMut,

    /// Write buffer
    write_buf: BytesMut,
}

impl<S> RespClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        RespClient {
            stream,
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(4096),
        }
    }

    /// Write everything buffered so far and flush
    async fn flush_commands(&mut self) -> Result<(), ClientError> {
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        self.write_buf.clear();
        Ok(())
    }

    /// Read one complete reply
    async fn read_reply(&mut self) -> Result<RespValue, ClientError> {
        loop {
            if !self.read_buf.is_empty() {
                if let Some((value, consumed)) = RespParser::parse(&self.read_buf)? {
                    self.read_buf.advance(consumed);
                    return Ok(value);
                }
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(ClientError::Disconnected);
            }
        }
    }
}

#[async_trait]
impl<S> StoreClient for RespClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn invoke(&mut self, op: &str, args: &[Bytes]) -> Result<RespValue, ClientError> {
        self.write_buf.clear();
        RespEncoder::encode_to(&mut self.write_buf, &RespValue::command(op, args));
        self.flush_commands().await?;
        self.read_reply().await
    }

    async fn pipeline(&mut self, commands: &[QueuedCommand]) -> Result<Vec<RespValue>, ClientError> {
        self.write_buf.clear();
        for cmd in commands {
            RespEncoder::encode_to(&mut self.write_buf, &cmd.to_frame());
        }
        debug!("Pipelining {} commands ({} bytes)", commands.len(), self.write_buf.len());
        self.flush_commands().await?;

        let mut replies = Vec::with_capacity(commands.len());
        for _ in 0..commands.len() {
            replies.push(self.read_reply().await?);
        }
        Ok(replies)
    }
}

/// Opens plain TCP sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: &NodeAddr) -> Result<Box<dyn StoreClient>, ClientError> {
        let (host, port) = addr.host_port();
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}", addr);
        Ok(Box::new(RespClient::new(stream)))
    }
}
