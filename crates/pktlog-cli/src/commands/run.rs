//! Run command - main relay execution

use anyhow::{Context, Result};
use clap::Args;
use pktlog_core::observe::TracingSink;
use pktlog_core::reload::{ConfigReloadWatcher, FileWatcher};
use pktlog_core::{relay, Config, Connection, ObservationSettings, PacketLogger};
use pktlog_transport::{PacketListener, TcpConnection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::DEFAULT_CONFIG_FILE;

/// Sent to a client whose remote endpoint cannot be reached
const REMOTE_UNREACHABLE: &str = "unable to reach remote server";

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file (created with defaults when missing)
    #[arg(short = 'c', long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}

/// Execute the run command
pub fn execute(args: RunArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(serve(args))
}

async fn serve(args: RunArgs) -> Result<()> {
    info!("Starting pktlog...");

    let config = Config::load_or_create(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    let settings = config.observation();
    info!(
        local = %config.connection.local_address,
        remote = %config.connection.remote_address,
        entries = ?settings.filter_entries,
        receive = %settings.receive_cadence,
        send = %settings.send_cadence,
        auto_reload = settings.auto_reload,
        "Loaded configuration"
    );

    let logger = Arc::new(PacketLogger::new(&settings, Arc::new(TracingSink)));

    // Dropping the watcher stops file notifications
    let _watcher = if settings.auto_reload {
        start_reload(&args.config, &logger, settings)
    } else {
        None
    };

    let listener = PacketListener::bind(config.connection.local_address.as_str())
        .await
        .with_context(|| format!("Failed to listen on {}", config.connection.local_address))?;
    let remote: Arc<str> = Arc::from(config.connection.remote_address.as_str());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(client) => {
                    tokio::spawn(handle_client(client, remote.clone(), logger.clone()));
                }
                Err(e) => warn!(error = %e, "Failed to accept client"),
            },
            _ = &mut shutdown => {
                info!("Received interrupt signal, shutting down...");
                break;
            }
        }
    }

    info!("pktlog stopped");
    Ok(())
}

/// Start watching the config file; reload keeps running until disabled
fn start_reload(
    path: &Path,
    logger: &PacketLogger,
    current: ObservationSettings,
) -> Option<FileWatcher> {
    let (watcher, triggers) = match FileWatcher::start(path) {
        Ok(started) => started,
        Err(e) => {
            warn!(error = %e, "Config auto reload unavailable");
            return None;
        }
    };

    let reload = ConfigReloadWatcher::new(path, logger.reload_targets(), current);
    tokio::spawn(reload.run(triggers));
    Some(watcher)
}

async fn handle_client(client: TcpConnection, remote: Arc<str>, logger: Arc<PacketLogger>) {
    let peer = client.peer_addr();

    let server = match TcpConnection::connect(&*remote).await {
        Ok(server) => server,
        Err(e) => {
            warn!(client = %peer, remote = %remote, error = %e, "Failed to reach remote");
            if let Err(e) = client.disconnect(REMOTE_UNREACHABLE).await {
                debug!(client = %peer, error = %e, "Client already gone");
            }
            return;
        }
    };

    info!(client = %peer, remote = %server.peer_addr(), "Relaying client");

    let session = logger.session();
    relay::relay(Arc::new(client), Arc::new(server), &session).await;
    session.finish().await;

    info!(client = %peer, "Client session closed");
}
