//! Transport kinds and socket setup
//!
//! The shared socket is built with `socket2` so the address family, reuse
//! and backlog settings can be applied before it is handed to tokio.

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::net::TcpListener;

use crate::common::{MuxError, Result};

/// Stream-oriented transport used for the shared listening socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// TCP over IPv4 or IPv6; IPv6 sockets also accept IPv4 clients
    #[default]
    Tcp,
    /// TCP over IPv4 only
    Tcp4,
    /// TCP over IPv6 only
    Tcp6,
}

impl Network {
    /// Check that `addr` belongs to this transport's address family
    pub fn check_addr(self, addr: SocketAddr) -> Result<()> {
        match (self, addr) {
            (Network::Tcp4, SocketAddr::V6(_)) | (Network::Tcp6, SocketAddr::V4(_)) => {
                Err(MuxError::Config(format!("Address {} cannot be used with {}", addr, self)))
            }
            _ => Ok(()),
        }
    }

    /// Bind a listening socket for `addr`
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(self, addr: SocketAddr, backlog: u32) -> Result<TcpListener> {
        self.check_addr(addr)?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        if addr.is_ipv6() {
            socket.set_only_v6(self == Network::Tcp6)?;
        }
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;

        let listener = TcpListener::from_std(socket.into())?;
        Ok(listener)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Tcp4 => write!(f, "tcp4"),
            Network::Tcp6 => write!(f, "tcp6"),
        }
    }
}

impl FromStr for Network {
    type Err = MuxError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            _ => Err(MuxError::Config(format!(
                "Invalid network: {}. Valid values are: tcp, tcp4, tcp6",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    #[test]
    fn test_network_from_str() {
        assert_eq!("tcp".parse::<Network>().unwrap(), Network::Tcp);
        assert_eq!("TCP4".parse::<Network>().unwrap(), Network::Tcp4);
        assert_eq!("tcp6".parse::<Network>().unwrap(), Network::Tcp6);
        assert!("udp".parse::<Network>().is_err());
        assert_eq!(Network::Tcp6.to_string(), "tcp6");
    }

    #[test]
    fn test_check_addr() {
        let v4: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let v6: SocketAddr = "[::1]:0".parse().unwrap();

        assert!(Network::Tcp.check_addr(v4).is_ok());
        assert!(Network::Tcp.check_addr(v6).is_ok());
        assert!(Network::Tcp4.check_addr(v4).is_ok());
        assert!(Network::Tcp4.check_addr(v6).is_err());
        assert!(Network::Tcp6.check_addr(v4).is_err());
    }

    #[tokio::test]
    async fn test_bind_and_connect() {
        let listener = Network::Tcp4.bind("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let client = TcpStream::connect(addr).await;
        assert!(client.is_ok());
        assert!(listener.accept().await.is_ok());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Network::Tcp4).unwrap(), "\"tcp4\"");
        let network: Network = serde_json::from_str("\"tcp6\"").unwrap();
        assert_eq!(network, Network::Tcp6);
    }
}
