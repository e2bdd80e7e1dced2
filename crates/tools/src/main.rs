use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sync::config::SyncConfig;
use sync::fetch::{AuthToken, DataSource, HttpDataSource, StaticCredentials, StaticDataSource};
use sync::machine::DataState;
use sync::renderer::Navigator;
use sync::service::MapSync;
use sync::viewport::InMemoryViewportStore;
use tools::{parse_bbox, read_records, HeadlessRenderer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cluster map pins and members from the API or local files")]
struct Args {
    /// JSON config file; `MAPSYNC_*` variables apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long, env = "MAPSYNC_TOKEN")]
    token: Option<String>,
    #[arg(long)]
    txn: Option<String>,
    #[arg(long)]
    hw: Option<String>,
    /// Read events from a JSON array instead of the API.
    #[arg(long)]
    events: Option<PathBuf>,
    /// Read members from a JSON array instead of the API.
    #[arg(long)]
    members: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Markers a map showing the box at this zoom would draw.
    Clusters {
        /// minLng,minLat,maxLng,maxLat
        #[arg(long, allow_hyphen_values = true)]
        bbox: String,
        #[arg(long)]
        zoom: f64,
    },
    /// The list panel for the box at this zoom.
    Visible {
        #[arg(long, allow_hyphen_values = true)]
        bbox: String,
        #[arg(long)]
        zoom: f64,
    },
}

struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&mut self, path: &str) {
        info!(path, "navigate");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SyncConfig::from_json_str(&tokio::fs::read_to_string(path).await?)?,
        None => SyncConfig::from_env()?,
    };
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }

    let source: Arc<dyn DataSource> = if args.events.is_some() || args.members.is_some() {
        let events = match &args.events {
            Some(path) => read_records(path).await?,
            None => Vec::new(),
        };
        let members = match &args.members {
            Some(path) => read_records(path).await?,
            None => Vec::new(),
        };
        Arc::new(StaticDataSource::new(events, members))
    } else {
        let token = args.token.clone().map(|token| AuthToken {
            token,
            txn: args.txn.clone(),
            hw: args.hw.clone(),
        });
        Arc::new(HttpDataSource::new(
            config.api_url.clone(),
            Arc::new(StaticCredentials(token)),
        ))
    };

    let (bbox, zoom) = match &args.command {
        Command::Clusters { bbox, zoom } | Command::Visible { bbox, zoom } => {
            (parse_bbox(bbox)?, *zoom)
        }
    };
    let renderer = HeadlessRenderer::new(bbox, zoom);

    let mut sync = MapSync::new(
        config,
        source,
        Box::new(InMemoryViewportStore::default()),
        Box::new(LogNavigator),
    );
    sync.mount(Box::new(renderer.clone()));
    sync.run_pending_fetch().await;

    if sync.data() == DataState::Error {
        let message = sync
            .notices()
            .last()
            .map(|n| n.message.clone())
            .unwrap_or_else(|| "fetch failed".to_string());
        return Err(message.into());
    }
    info!(
        pins = sync.dataset().pins.len(),
        members = sync.dataset().members.len(),
        dropped = sync.dataset().report.len(),
        "loaded"
    );

    let out = match args.command {
        Command::Clusters { .. } => serde_json::to_string_pretty(&renderer.markers())?,
        Command::Visible { .. } => serde_json::to_string_pretty(&sync.list_view())?,
    };
    let snapshot = sync.metrics().snapshot();
    for (name, value) in &snapshot.counters {
        info!(metric = *name, value = *value, "counter");
    }
    for (name, value) in &snapshot.gauges {
        info!(metric = *name, value = *value, "gauge");
    }
    println!("{out}");
    Ok(())
}
