//! Relay consumers
//!
//! Protocol servers that simply forward adopted connections to an upstream
//! service. The binary runs one per enabled protocol; protocols without an
//! upstream get a consumer that closes what it accepts.

use log::{debug, error, info, trace, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::copy_bidirectional;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::common::{MuxError, Result};
use crate::protocol::{Connection, ProtocolListener};

/// Forward every connection adopted by `listener` to `upstream`
///
/// Returns `Ok(())` once the listener is closed.
pub async fn serve_route(
    listener: ProtocolListener,
    upstream: SocketAddr,
    connect_timeout: Duration,
) -> Result<()> {
    info!("Relaying {} connections to {}", listener.name(), upstream);

    loop {
        let conn = match listener.accept().await {
            Ok(conn) => conn,
            Err(MuxError::Closed(_)) => {
                debug!("Relay for {} stopped", listener.name());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let protocol = listener.name().to_string();
        tokio::spawn(async move {
            if let Err(e) = relay_connection(conn, upstream, connect_timeout).await {
                error!("Relay of {} connection to {} failed: {}", protocol, upstream, e);
            }
        });
    }
}

/// Close every connection adopted by `listener`
///
/// Used for enabled protocols that have no upstream configured.
pub async fn serve_unrouted(listener: ProtocolListener) -> Result<()> {
    loop {
        let conn = match listener.accept().await {
            Ok(conn) => conn,
            Err(MuxError::Closed(_)) => return Ok(()),
            Err(e) => return Err(e),
        };

        match conn.peer_addr() {
            Ok(peer) => warn!("No upstream for {}, closing connection from {}", listener.name(), peer),
            Err(_) => warn!("No upstream for {}, closing connection", listener.name()),
        }
        if let Err(e) = conn.close().await {
            trace!("Error closing unrouted {} connection: {}", listener.name(), e);
        }
    }
}

/// Forward one connection, replaying its peeked prefix first
///
/// # Returns
///
/// Returns `Ok(())` when either side closes, otherwise the connect or
/// transfer error.
pub async fn relay_connection(
    mut conn: Connection,
    upstream: SocketAddr,
    connect_timeout: Duration,
) -> Result<()> {
    let mut target = timeout(connect_timeout, TcpStream::connect(upstream))
        .await
        .map_err(|_| MuxError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "Connection timed out")))?
        .map_err(MuxError::Io)?;

    let (sent, received) = copy_bidirectional(&mut conn, &mut target).await?;
    debug!("Relay to {} finished: {} bytes sent, {} bytes received", upstream, sent, received);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::PeekableConnection;
    use crate::protocol::{PredicateProtocol, ProtocolHandler};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn connection_pair() -> (TcpStream, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server, _) = listener.accept().await.unwrap();
        (client.await.unwrap(), PeekableConnection::new(server))
    }

    #[tokio::test]
    async fn test_relay_replays_prefix() {
        // Upstream echo server
        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = upstream.accept().await.unwrap();
            let (mut reader, mut writer) = stream.split();
            tokio::io::copy(&mut reader, &mut writer).await.unwrap();
        });

        let (mut client, mut conn) = connection_pair().await;
        client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        assert_eq!(conn.peek(3).await.unwrap(), b"GET");

        let relay = tokio::spawn(relay_connection(conn, upstream_addr, Duration::from_secs(1)));

        let mut echoed = vec![0u8; 18];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"GET / HTTP/1.0\r\n\r\n");

        client.shutdown().await.unwrap();
        drop(client);
        relay.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_serve_route_stops_on_close() {
        let handler: Arc<dyn ProtocolHandler> =
            Arc::new(PredicateProtocol::new("any", 4, |_: &[u8]| true));
        let listener = ProtocolListener::new(handler.clone());

        let relay = tokio::spawn(serve_route(
            listener,
            "127.0.0.1:9".parse().unwrap(),
            Duration::from_millis(100),
        ));

        handler.close().await;
        let result = timeout(Duration::from_secs(1), relay).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_serve_unrouted_closes_connections() {
        let handler: Arc<dyn ProtocolHandler> =
            Arc::new(PredicateProtocol::new("any", 4, |_: &[u8]| true));
        let consumer = tokio::spawn(serve_unrouted(ProtocolListener::new(handler.clone())));

        let (mut client, conn) = connection_pair().await;
        handler.push_conn(conn).await.unwrap();

        let mut buf = [0u8; 1];
        let n = timeout(Duration::from_secs(1), client.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);

        handler.close().await;
        assert!(consumer.await.unwrap().is_ok());
    }
}
