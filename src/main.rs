//! Mix Listener Command Line Tool
//!
//! Runs a dispatcher with the configured built-in protocols and relays each
//! protocol's connections to its upstream.

use clap::Parser;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use mix_listener::common::{init_logger, parse_socket_addr, set_log_level, Result, DEFAULT_LOG_LEVEL};
use mix_listener::config::{
    parse_protocol_list, parse_route, ConfigBuilder, ConfigOverrides, DEFAULT_CONFIG_FILE, ENV_PREFIX,
};
use mix_listener::relay::{serve_route, serve_unrouted};
use mix_listener::{Dispatcher, Network, APP_NAME, VERSION};

/// Mix Listener: several wire protocols on one listening socket
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Listen address
    #[clap(short, long)]
    listen: Option<String>,

    /// Transport (tcp, tcp4, tcp6)
    #[clap(long)]
    network: Option<Network>,

    /// Comma separated built-in protocols, in dispatch priority order
    #[clap(short, long)]
    protocols: Option<String>,

    /// Upstream for a protocol, as protocol=host:port (repeatable)
    #[clap(short, long = "route")]
    routes: Vec<String>,

    /// Connections each protocol buffers before classification waits
    #[clap(long)]
    queue_capacity: Option<usize>,

    /// Deadline for the sniff prefix in milliseconds (0 waits forever)
    #[clap(long)]
    peek_timeout_ms: Option<u64>,

    /// Maximum number of connections classified concurrently
    #[clap(long)]
    max_pending: Option<usize>,

    /// Listen backlog
    #[clap(long)]
    backlog: Option<u32>,

    /// Upstream connection timeout in seconds
    #[clap(long)]
    connect_timeout: Option<u64>,

    /// Log level
    #[clap(long)]
    log_level: Option<String>,

    /// Load configuration from a JSON file
    #[clap(long, env = "MIX_LISTENER_CONFIG_FILE")]
    config_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Result<ConfigOverrides> {
        let routes = if self.routes.is_empty() {
            None
        } else {
            Some(self.routes.iter().map(|spec| parse_route(spec)).collect::<Result<BTreeMap<_, _>>>()?)
        };

        Ok(ConfigOverrides {
            listen: self.listen.clone(),
            network: self.network,
            protocols: self.protocols.as_deref().map(parse_protocol_list),
            routes,
            queue_capacity: self.queue_capacity,
            peek_timeout_ms: self.peek_timeout_ms,
            max_pending: self.max_pending,
            backlog: self.backlog,
            connect_timeout: self.connect_timeout,
            log_level: self.log_level.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Log configuration loading itself; the configured level applies afterwards
    init_logger(args.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL.as_str()));

    // Load configuration: defaults < file < environment < command line
    let builder = ConfigBuilder::new().with_defaults();
    let builder = match &args.config_file {
        Some(path) => builder.with_file(path),
        None => builder.with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let config = builder
        .with_env(ENV_PREFIX)
        .with_cli(args.overrides()?)
        .build()?;

    set_log_level(&config.log_level);
    info!("Starting {} v{}", APP_NAME, VERSION);

    let dispatcher = Arc::new(Dispatcher::from_config(&config));

    // One consumer per protocol
    for protocol in dispatcher.protocols() {
        let listener = dispatcher.get_listener(&protocol)?;
        match config.routes.get(&protocol) {
            Some(upstream) => {
                let upstream = parse_socket_addr(upstream)?;
                let connect_timeout = config.connect_timeout();
                tokio::spawn(async move {
                    if let Err(e) = serve_route(listener, upstream, connect_timeout).await {
                        error!("Relay for {} stopped: {}", protocol, e);
                    }
                });
            }
            None => {
                warn!("No upstream configured for {}, its connections will be closed", protocol);
                tokio::spawn(async move {
                    if let Err(e) = serve_unrouted(listener).await {
                        error!("Consumer for {} stopped: {}", protocol, e);
                    }
                });
            }
        }
    }

    info!("Dispatcher ready, press Ctrl+C to stop");

    let result = dispatcher
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    dispatcher.close_all().await;

    if let Err(e) = &result {
        error!("Dispatcher stopped: {}", e);
    }
    result
}
