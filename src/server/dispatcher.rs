//! Dispatcher
//!
//! Owns the shared listening socket. The accept loop runs sequentially and
//! spawns one classification task per connection, so a slow client never
//! delays the next accept. A classification task peeks the sniff prefix,
//! walks the registry in registration order and pushes the connection to
//! the first protocol whose taste matches.

use log::{debug, error, info, trace};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use super::events::{DispatchEvent, EventSink, LogSink};
use super::network::Network;
use crate::common::{parse_socket_addr, MuxError, Result};
use crate::config::MuxConfig;
use crate::conn::PeekableConnection;
use crate::protocol::{
    Connection, ProtocolHandler, ProtocolListener, ProtocolRegistry, Rejected, SNIFF_LEN,
};

/// Protocol multiplexer over one listening socket
///
/// # Example
///
/// ```no_run
/// use mix_listener::{Dispatcher, Network, Result};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let dispatcher = Dispatcher::new(Network::Tcp, "0.0.0.0:8080");
///     dispatcher.register_builtin(["http", "socks5"]);
///
///     let http = dispatcher.get_listener("http")?;
///     tokio::spawn(async move {
///         while let Ok(conn) = http.accept().await {
///             // hand `conn` to an HTTP server
///             drop(conn);
///         }
///     });
///
///     dispatcher.run().await
/// }
/// ```
pub struct Dispatcher {
    network: Network,
    addr: String,
    registry: Arc<RwLock<ProtocolRegistry>>,
    sink: Arc<dyn EventSink>,
    peek_timeout: Option<Duration>,
    backlog: u32,
    admission: Option<Arc<Semaphore>>,
    local_addr: OnceCell<SocketAddr>,
}

impl Dispatcher {
    /// Create a dispatcher that will listen on `addr`
    ///
    /// Nothing is bound until [`bind`](Self::bind) or [`run`](Self::run).
    pub fn new(network: Network, addr: impl Into<String>) -> Self {
        Self {
            network,
            addr: addr.into(),
            registry: Arc::new(RwLock::new(ProtocolRegistry::new())),
            sink: Arc::new(LogSink),
            peek_timeout: None,
            backlog: 1024,
            admission: None,
            local_addr: OnceCell::new(),
        }
    }

    /// Create a dispatcher from configuration and register its protocols
    ///
    /// Protocols that fail to register are logged and skipped.
    pub fn from_config(config: &MuxConfig) -> Self {
        let dispatcher = Self::new(config.network, config.listen.clone())
            .with_queue_capacity(config.queue_capacity)
            .with_peek_timeout(config.peek_timeout())
            .with_backlog(config.backlog)
            .with_max_pending(config.max_pending);

        dispatcher.register_builtin(&config.protocols);
        dispatcher
    }

    /// Report dispatch events to `sink` instead of the log
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Deadline for a new connection to deliver its sniff prefix
    pub fn with_peek_timeout(mut self, peek_timeout: Option<Duration>) -> Self {
        self.peek_timeout = peek_timeout;
        self
    }

    /// Listen backlog of the shared socket
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Queue capacity of built-in protocols registered afterwards
    pub fn with_queue_capacity(self, capacity: usize) -> Self {
        self.write_registry().set_queue_capacity(capacity);
        self
    }

    /// Limit the number of connections classified at the same time
    ///
    /// When the limit is reached the accept loop waits for a running
    /// classification to finish. `None` (the default) is unbounded.
    pub fn with_max_pending(mut self, max_pending: Option<usize>) -> Self {
        self.admission = max_pending.map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        self
    }

    /// Register a protocol handler
    ///
    /// Handlers registered while the dispatcher is running take part in the
    /// next classification.
    pub fn register(&self, handler: Arc<dyn ProtocolHandler>) -> Result<()> {
        // Under the write lock so a concurrent `bind` cannot miss this handler
        let mut registry = self.write_registry();
        if let Some(addr) = self.local_addr() {
            handler.bind_address(addr);
        }
        registry.register(handler)
    }

    /// Register built-in protocols by name
    ///
    /// See [`ProtocolRegistry::register_builtin`].
    pub fn register_builtin<I, S>(&self, names: I) -> Vec<(String, MuxError)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = self.write_registry();
        let failures = registry.register_builtin(names);

        if let Some(addr) = self.local_addr() {
            registry.iter().for_each(|handler| handler.bind_address(addr));
        }
        failures
    }

    /// Listener-shaped handle of the protocol `name`
    pub fn get_listener(&self, name: &str) -> Result<ProtocolListener> {
        self.read_registry().lookup(name).map(ProtocolListener::new)
    }

    /// Names of the registered protocols in dispatch order
    pub fn protocols(&self) -> Vec<String> {
        self.read_registry().names().into_iter().map(str::to_string).collect()
    }

    /// Address of the shared socket, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Bind the shared socket
    ///
    /// Publishes the bound address to every registered handler.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = parse_socket_addr(&self.addr)?;
        let listener = self.network.bind(addr, self.backlog)?;
        let local = listener.local_addr()?;

        if self.local_addr.set(local).is_err() {
            debug!("Dispatcher bound again on {}", local);
        }
        self.read_registry().iter().for_each(|handler| handler.bind_address(local));

        info!("Listening on {} ({}) for {}", local, self.network, self.protocols().join(", "));
        Ok(listener)
    }

    /// Bind and run the accept loop
    ///
    /// Only returns on error: a bind failure, or a fatal accept error on the
    /// shared socket.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Bind and run the accept loop until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind().await?;

        tokio::select! {
            result = self.serve(listener) => result,
            _ = shutdown => {
                info!("Dispatcher shutting down");
                Ok(())
            }
        }
    }

    /// Run the accept loop on an already bound socket
    ///
    /// An accept error is fatal: the loop stops and the error is returned
    /// without retrying. Classification tasks still running when this
    /// future is dropped are aborted and their connections closed.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut tasks = JoinSet::new();

        loop {
            // Reap finished classification tasks
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("Classification task failed: {}", e);
                }
            }

            let permit = match &self.admission {
                Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
                None => None,
            };

            match listener.accept().await {
                Ok((stream, peer)) => self.dispatch(&mut tasks, stream, peer, permit),
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    return Err(MuxError::Accept(e));
                }
            }
        }
    }

    /// Close every registered handler
    pub async fn close_all(&self) {
        let handlers: Vec<_> = self.read_registry().iter().cloned().collect();
        for handler in handlers {
            handler.close().await;
        }
    }

    fn dispatch(
        &self,
        tasks: &mut JoinSet<()>,
        stream: TcpStream,
        peer: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        self.sink.report(DispatchEvent::Accepted { peer });

        let conn = PeekableConnection::new(stream).with_peek_timeout(self.peek_timeout);
        let registry = Arc::clone(&self.registry);
        let sink = Arc::clone(&self.sink);

        tasks.spawn(async move {
            classify(conn, peer, &registry, sink.as_ref()).await;
            drop(permit);
        });
    }

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, ProtocolRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> std::sync::RwLockWriteGuard<'_, ProtocolRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("network", &self.network)
            .field("addr", &self.addr)
            .field("local_addr", &self.local_addr())
            .field("protocols", &self.protocols())
            .field("peek_timeout", &self.peek_timeout)
            .finish()
    }
}

/// Classify one connection and route it
///
/// Every outcome is reported to `sink`; nothing is returned because no
/// per-connection error concerns the accept loop.
async fn classify(
    mut conn: Connection,
    peer: SocketAddr,
    registry: &RwLock<ProtocolRegistry>,
    sink: &dyn EventSink,
) {
    let peeked = conn.peek(SNIFF_LEN).await.map(<[u8]>::to_vec);
    let prefix = match peeked {
        Ok(prefix) => prefix,
        Err(error) => {
            close_rejected(conn, peer).await;
            sink.report(DispatchEvent::PeekFailed { peer, error });
            return;
        }
    };

    // Taste under the read lock, push after releasing it
    let handler = registry
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .classify(&prefix)
        .cloned();

    let Some(handler) = handler else {
        close_rejected(conn, peer).await;
        sink.report(DispatchEvent::NoMatch { peer, error: MuxError::NoMatch { prefix } });
        return;
    };

    let protocol = handler.name().to_string();
    match handler.push_conn(conn).await {
        Ok(()) => sink.report(DispatchEvent::Routed { peer, protocol }),
        Err(Rejected { conn, error }) => {
            close_rejected(conn, peer).await;
            sink.report(DispatchEvent::HandoffFailed { peer, protocol, error });
        }
    }
}

async fn close_rejected(conn: Connection, peer: SocketAddr) {
    if let Err(e) = conn.close().await {
        trace!("Error closing rejected connection from {}: {}", peer, e);
    }
}
