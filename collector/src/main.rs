use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use trace2pass_collector::api::{router, AppState};
use trace2pass_collector::config::CollectorConfig;
use trace2pass_collector::metrics::Metrics;
use trace2pass_collector::store::CollectorStore;

#[derive(Parser, Debug)]
#[command(name = "trace2pass-collector")]
struct Cli {
    #[arg(long)]
    bind: Option<String>,
    #[arg(long)]
    db_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let mut config = CollectorConfig::load();
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }

    let store = CollectorStore::new(&config.db_path).await?;
    let state = Arc::new(AppState {
        store,
        metrics: Metrics::new(),
        default_queue_limit: config.default_queue_limit,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "trace2pass-collector listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
