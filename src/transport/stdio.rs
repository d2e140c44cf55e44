//! Standard input/output transports.
//!
//! Messages on stdin are separated by blank lines; each one becomes a
//! receive-only connection. Outbound messages are written to stdout with a
//! trailing blank line.

use crate::core::{Error, PeerMetadata, Result};
use crate::transport::connection::{Connection, ConnectionState, ConnectionType};
use crate::transport::{ConnectionSender, InboundTransport, OutboundTransport};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

/// Inbound transport reading blank-line-delimited messages from stdin.
#[derive(Default)]
pub struct StdinTransport;

impl StdinTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InboundTransport for StdinTransport {
    async fn accept(&self, queue: ConnectionSender) -> Result<()> {
        info!("Reading messages from stdin");
        accept_lines(BufReader::new(tokio::io::stdin()), queue).await
    }
}

/// Read blocks from `reader`, pushing one connection per block, until EOF
/// or until the queue is dropped.
pub async fn accept_lines<R>(mut reader: R, queue: ConnectionSender) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut block = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        let at_eof = read == 0;
        let blank = line.trim().is_empty();

        if !blank {
            block.push_str(&line);
        }
        if (blank || at_eof) && !block.trim().is_empty() {
            let bytes = std::mem::take(&mut block).trim_end().as_bytes().to_vec();
            debug!(bytes = bytes.len(), "Read message from stdin");
            if queue.send(Arc::new(LineConnection::new(bytes))).is_err() {
                return Ok(());
            }
        }
        if at_eof {
            debug!("stdin closed");
            return Ok(());
        }
    }
}

/// A single message read from a line-oriented source.
pub struct LineConnection {
    state: ConnectionState,
    chunk: Mutex<Option<Vec<u8>>>,
}

impl LineConnection {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            state: ConnectionState::new(ConnectionType::Recv),
            chunk: Mutex::new(Some(bytes)),
        }
    }
}

#[async_trait]
impl Connection for LineConnection {
    fn state(&self) -> &ConnectionState {
        &self.state
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.chunk.lock().unwrap().take()
    }

    async fn send(&self, _bytes: Vec<u8>) -> Result<()> {
        Err(Error::Transport("stdin connections are receive-only".to_string()))
    }

    fn can_recv(&self) -> bool {
        self.chunk.lock().unwrap().is_some()
    }

    fn can_send(&self) -> bool {
        false
    }
}

type SharedWriter = Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Outbound transport writing to stdout.
pub struct StdoutTransport {
    writer: SharedWriter,
}

impl StdoutTransport {
    pub fn new() -> Self {
        Self::with_writer(tokio::io::stdout())
    }

    /// Write to an arbitrary sink instead of stdout.
    pub fn with_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            writer: Arc::new(tokio::sync::Mutex::new(Box::new(writer))),
        }
    }
}

impl Default for StdoutTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboundTransport for StdoutTransport {
    async fn open(&self, _metadata: &PeerMetadata) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(StdoutConnection {
            state: ConnectionState::new(ConnectionType::Send),
            writer: self.writer.clone(),
        }))
    }
}

/// Send-only connection over the shared writer.
pub struct StdoutConnection {
    state: ConnectionState,
    writer: SharedWriter,
}

#[async_trait]
impl Connection for StdoutConnection {
    fn state(&self) -> &ConnectionState {
        &self.state
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        None
    }

    async fn send(&self, bytes: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.write_all(b"\n\n").await?;
        writer.flush().await?;
        Ok(())
    }

    fn can_recv(&self) -> bool {
        false
    }

    fn can_send(&self) -> bool {
        !self.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_blocks_become_connections() {
        let input: &[u8] = b"{\"a\": 1}\n\n\n{\"b\":\n 2}\n\n{\"c\": 3}";
        let (tx, mut rx) = mpsc::unbounded_channel();
        accept_lines(input, tx).await.unwrap();

        let mut chunks = Vec::new();
        while let Some(conn) = rx.recv().await {
            assert!(conn.can_recv());
            assert!(!conn.can_send());
            chunks.push(String::from_utf8(conn.recv().await.unwrap()).unwrap());
            assert!(!conn.can_recv());
            assert!(conn.recv().await.is_none());
        }
        assert_eq!(chunks, ["{\"a\": 1}", "{\"b\":\n 2}", "{\"c\": 3}"]);
    }

    #[tokio::test]
    async fn test_line_connection_rejects_send() {
        let conn = LineConnection::new(b"x".to_vec());
        assert!(conn.send(b"y".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn test_stdout_writes_blank_line_separated() {
        let (client, mut server) = tokio::io::duplex(256);
        let transport = StdoutTransport::with_writer(client);

        let conn = transport.open(&PeerMetadata::new()).await.unwrap();
        assert!(conn.can_send());
        assert!(!conn.can_recv());
        conn.send(b"one".to_vec()).await.unwrap();
        conn.send(b"two".to_vec()).await.unwrap();
        conn.close();
        assert!(matches!(
            conn.send(b"three".to_vec()).await,
            Err(Error::ConnectionClosed)
        ));
        drop(conn);
        drop(transport);

        let mut written = String::new();
        server.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "one\n\ntwo\n\n");
    }
}
