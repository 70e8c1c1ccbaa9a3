//! Non-destructive peeking over a byte stream
//!
//! Unlike `TcpStream::peek`, which returns whatever the kernel happens to
//! have buffered, [`PeekableConnection::peek`] waits until exactly the
//! requested number of bytes is available. The bytes are kept in an
//! in-process buffer and handed out again by the first reads.

use bytes::BytesMut;
use log::trace;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::{MuxError, Result};

/// A connection whose leading bytes can be inspected without consuming them
pub struct PeekableConnection<S = TcpStream> {
    stream: S,
    buffer: BytesMut,
    peek_timeout: Option<Duration>,
}

impl<S> PeekableConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a raw stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            peek_timeout: None,
        }
    }

    /// Set the deadline applied to each [`peek`](Self::peek) call
    ///
    /// `None` waits indefinitely.
    pub fn with_peek_timeout(mut self, peek_timeout: Option<Duration>) -> Self {
        self.peek_timeout = peek_timeout;
        self
    }

    /// Return the first `n` bytes without advancing the read position
    ///
    /// Reads from the stream until `n` bytes are buffered. Fails with
    /// [`MuxError::Peek`] if the stream ends first, if the read fails, or if
    /// the peek deadline expires. Bytes read while peeking stay buffered and
    /// are returned by subsequent reads.
    pub async fn peek(&mut self, n: usize) -> Result<&[u8]> {
        if self.buffer.len() < n {
            let fill = fill_buffer(&mut self.stream, &mut self.buffer, n);
            let filled = match self.peek_timeout {
                Some(limit) => match timeout(limit, fill).await {
                    Ok(result) => result,
                    Err(_) => Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no {} byte prefix within {:?}", n, limit),
                    )),
                },
                None => fill.await,
            };
            filled.map_err(MuxError::Peek)?;
        }

        trace!("Peeked {} bytes: {:02X?}", n, &self.buffer[..n]);
        Ok(&self.buffer[..n])
    }

    /// Bytes read from the stream but not yet consumed
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Get a reference to the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwrap into the raw stream and the bytes not yet consumed
    ///
    /// The returned bytes must be delivered before anything read from the
    /// stream to keep the original byte order.
    pub fn into_parts(self) -> (S, bytes::Bytes) {
        (self.stream, self.buffer.freeze())
    }

    /// Shut down the write side and release the stream
    pub async fn close(mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

impl PeekableConnection<TcpStream> {
    /// Remote address of the connection
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Local address of the connection
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }
}

async fn fill_buffer<S>(stream: &mut S, buffer: &mut BytesMut, n: usize) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    buffer.reserve(n - buffer.len());
    while buffer.len() < n {
        if stream.read_buf(buffer).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream closed after {} of {} bytes", buffer.len(), n),
            ));
        }
    }
    Ok(())
}

impl<S: AsyncRead + Unpin> AsyncRead for PeekableConnection<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        // Replay buffered bytes before touching the stream
        if !this.buffer.is_empty() {
            let len = this.buffer.len().min(buf.remaining());
            buf.put_slice(&this.buffer.split_to(len));
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.stream).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PeekableConnection<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

impl<S> fmt::Debug for PeekableConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeekableConnection")
            .field("buffered", &self.buffer.len())
            .field("peek_timeout", &self.peek_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let (mut client, server) = duplex(64);
        client.write_all(&[0, 0, 0, 9, 8, 7]).await.unwrap();

        let mut conn = PeekableConnection::new(server);
        assert_eq!(conn.peek(3).await.unwrap(), &[0, 0, 0]);
        // Peeking again is served from the buffer
        assert_eq!(conn.peek(3).await.unwrap(), &[0, 0, 0]);

        let mut read = [0u8; 6];
        conn.read_exact(&mut read).await.unwrap();
        assert_eq!(read, [0, 0, 0, 9, 8, 7]);
    }

    #[tokio::test]
    async fn test_peek_waits_for_split_writes() {
        let (mut client, server) = duplex(64);
        let writer = tokio::spawn(async move {
            client.write_all(b"G").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            client.write_all(b"ET /").await.unwrap();
            client
        });

        let mut conn = PeekableConnection::new(server);
        assert_eq!(conn.peek(3).await.unwrap(), b"GET");
        let _client = writer.await.unwrap();

        let mut read = [0u8; 5];
        conn.read_exact(&mut read).await.unwrap();
        assert_eq!(&read, b"GET /");
    }

    #[tokio::test]
    async fn test_peek_eof_before_prefix() {
        let (mut client, server) = duplex(64);
        client.write_all(&[1, 2]).await.unwrap();
        drop(client);

        let mut conn = PeekableConnection::new(server);
        match conn.peek(3).await {
            Err(MuxError::Peek(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("Expected peek error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_peek_timeout() {
        let (_client, server) = duplex(64);

        let mut conn = PeekableConnection::new(server)
            .with_peek_timeout(Some(Duration::from_millis(20)));
        match conn.peek(3).await {
            Err(MuxError::Peek(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("Expected peek timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_small_reads_drain_buffer_in_order() {
        let (mut client, server) = duplex(64);
        client.write_all(b"abcdef").await.unwrap();
        drop(client);

        let mut conn = PeekableConnection::new(server);
        conn.peek(4).await.unwrap();

        let mut first = [0u8; 2];
        conn.read_exact(&mut first).await.unwrap();
        assert_eq!(&first, b"ab");

        let mut rest = Vec::new();
        conn.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"cdef");
    }

    #[tokio::test]
    async fn test_write_and_into_parts() {
        let (mut client, server) = duplex(64);
        client.write_all(b"xyz").await.unwrap();

        let mut conn = PeekableConnection::new(server);
        conn.peek(2).await.unwrap();
        conn.write_all(b"pong").await.unwrap();

        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"pong");

        let (_stream, pending) = conn.into_parts();
        assert!(pending.starts_with(b"xy"));
    }
}
