//! webconf server.
//!
//! Serves `<root>/wwwroot` behind the request gate while the site config under
//! `<root>/appdata/.cfg/.all` is polled and hot-reloaded.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use webconf::config::jsonc::load_commented_json;
use webconf::config::{ConfigStore, ConfigWatcher, EngineSettings};
use webconf::http::HttpServer;
use webconf::lifecycle::signals::shutdown_on_signal;
use webconf::observability::logging::{init_logging, LogFormat, DEFAULT_FILTER};
use webconf::observability::metrics::init_metrics;

#[derive(Parser)]
#[command(name = "webconf", version)]
#[command(about = "Static site server with a hot-reloading config file", long_about = None)]
struct Args {
    /// Web root; `appdata/` and `wwwroot/` live beneath it.
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Engine settings file (JSON, `#` and `/* */` comments allowed).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Seconds between config file polls.
    #[arg(long)]
    refresh_secs: Option<u64>,

    /// Reject requests whose Host header is not a configured hostname.
    #[arg(long)]
    validate_host: bool,

    /// Expose Prometheus metrics on this address.
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

impl Args {
    fn engine_settings(&self) -> Result<EngineSettings, Box<dyn std::error::Error>> {
        let mut settings = match &self.settings {
            Some(path) => {
                let (_, bytes) = load_commented_json(path)?;
                serde_json::from_slice(&bytes)?
            }
            None => EngineSettings::default(),
        };
        if let Some(secs) = self.refresh_secs {
            settings.refresh_interval_secs = secs;
        }
        if self.validate_host {
            settings.validate_remote_host = true;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(DEFAULT_FILTER, args.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webconf starting");

    let settings = args.engine_settings()?;
    tracing::info!(
        refresh_interval_secs = settings.refresh_interval().as_secs(),
        validate_remote_host = settings.validate_remote_host,
        watch_file_events = settings.watch_file_events,
        "Engine settings resolved"
    );

    if let Some(addr) = args.metrics_addr {
        init_metrics(addr);
    }

    let store = ConfigStore::initialize(&args.root, settings)?;
    let shutdown = store.shutdown().clone();

    let watcher = ConfigWatcher::new(store.clone());
    let watcher_shutdown = shutdown.listen();
    let watcher_task = tokio::spawn(async move {
        if let Err(e) = watcher.run(watcher_shutdown).await {
            tracing::error!(error = %e, "Config watcher stopped");
        }
    });

    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let listener = TcpListener::bind(args.bind).await?;
    HttpServer::new(store).run(listener, shutdown).await?;

    let _ = watcher_task.await;
    tracing::info!("Shutdown complete");
    Ok(())
}
