use std::sync::{Arc, Mutex};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use token_matrix::{api, config, db, refresh};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Token Matrix starting...");

    let cfg = config::load()?;
    info!("  Subgraph: {}", cfg.subgraph_url);
    info!("  Token: {} ({:#x}) on chain {}", cfg.symbol, cfg.token, cfg.chain_id);
    info!("  DB Path: {}", cfg.db_path);
    info!("  Port: {}", cfg.port);
    info!("  Refresh every {}s", cfg.refresh_interval_secs);

    let conn = db::connect(&cfg.db_path)?;
    db::run_migrations(&conn)?;
    // the refresher writes and the API reads through this one connection
    let shared_conn = Arc::new(Mutex::new(conn));

    let api_handle = tokio::spawn({
        let cfg = cfg.clone();
        let conn = Arc::clone(&shared_conn);
        async move { api::serve(cfg, conn).await }
    });

    let refresh_handle = tokio::spawn({
        let cfg = cfg.clone();
        let conn = Arc::clone(&shared_conn);
        async move { refresh::run(cfg, conn).await }
    });

    // whichever task ends first, or Ctrl-C, stops the process
    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        res = refresh_handle => match res {
            Ok(Ok(_)) => info!("Refresher exited cleanly"),
            Ok(Err(e)) => error!("Refresher error: {:?}", e),
            Err(e) => error!("Refresher task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Token Matrix stopped.");
    Ok(())
}
