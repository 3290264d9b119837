use std::io::IsTerminal;
use std::sync::Arc;

use balance_ledger::domain::Store;
use balance_ledger::{Config, Ledger, MemoryStore, RedisStore, api};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main] // using Tokio runtime for async
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    match &config.redis_url {
        Some(url) => {
            info!(%url, "using redis store");
            serve(RedisStore::open(url)?, &config).await
        }
        None => {
            info!("using in-process store");
            serve(MemoryStore::with_round_trip(config.store_latency), &config).await
        }
    }
}

async fn serve<S: Store>(store: S, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // Set up the components
    let ledger = Arc::new(Ledger::new(store, config.ledger));
    let app = api::router(ledger, config.strategy);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %listener.local_addr()?,
        strategy = %config.strategy,
        "ledger listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
