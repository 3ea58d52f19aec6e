use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use eyre::{eyre, Result};
use rusqlite::Connection;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db;
use crate::generation::{Generation, GenerationGate, StaleRefresh, Tagged};
use crate::models::FlowRecord;
use crate::parser;
use crate::subgraph::{StreamFilter, StreamOrder, SubgraphClient};

pub type PassResult = Tagged<Result<Vec<FlowRecord>>>;

#[derive(Debug)]
pub enum PassOutcome {
    Applied { generation: Generation, records: usize },
    Stale(StaleRefresh),
    Failed(Generation),
}

/// Poll the subgraph every `refresh_interval_secs` and keep the newest snapshot in SQLite.
///
/// At most one pass is in flight. Ticks that fire while a pass is still running are
/// skipped, so a slow indexer delays snapshots instead of starving them.
pub async fn run(cfg: Config, conn: Arc<Mutex<Connection>>) -> Result<()> {
    let client = SubgraphClient::new(&cfg.subgraph_url)?;
    let (tx, mut rx) = mpsc::channel::<PassResult>(16);
    let mut gate = GenerationGate::new();
    let mut in_flight: Option<Generation> = None;
    let mut failures: u32 = 0;

    let mut ticker = interval(Duration::from_secs(cfg.refresh_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Refresher started for token {:#x} every {}s",
        cfg.token, cfg.refresh_interval_secs
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(running) = in_flight {
                    debug!("Refresh {} still running, skipping tick", running);
                } else {
                    let generation = gate.begin();
                    in_flight = Some(generation);
                    debug!("Starting refresh {}", generation);
                    tokio::spawn(fetch_pass(
                        client.clone(),
                        cfg.token,
                        cfg.fetch_page_size,
                        generation,
                        tx.clone(),
                    ));
                }
            }
            Some(done) = rx.recv() => {
                if in_flight == Some(done.generation) {
                    in_flight = None;
                }
                match apply_pass(&mut gate, &conn, &cfg.token, done) {
                    Ok(PassOutcome::Applied { generation, records }) => {
                        failures = 0;
                        info!("Applied refresh {} → {} flow records", generation, records);
                    }
                    Ok(PassOutcome::Stale(stale)) => debug!("Discarded {}", stale),
                    Ok(PassOutcome::Failed(generation)) => {
                        failures += 1;
                        warn!("Refresh {} failed ({} in a row)", generation, failures);
                    }
                    Err(e) => {
                        failures += 1;
                        error!("Storing refresh failed ({} in a row): {:?}", failures, e);
                    }
                }
            }
        }
    }
}

async fn fetch_pass(
    client: SubgraphClient,
    token: Address,
    page_size: usize,
    generation: Generation,
    tx: mpsc::Sender<PassResult>,
) {
    let result = fetch_snapshot(&client, token, page_size).await;
    if tx.send(Tagged { generation, result }).await.is_err() {
        debug!("Refresh {} finished after the refresher stopped", generation);
    }
}

/// Fetch every stream of `token` and decode it. Undecodable rows are logged and skipped.
pub async fn fetch_snapshot(client: &SubgraphClient, token: Address, page_size: usize) -> Result<Vec<FlowRecord>> {
    let rows = client
        .fetch_all_streams(token, page_size, StreamOrder::FlowRate, StreamFilter::default())
        .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        match parser::decode_stream(token, row) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping stream {} → {}: {}", row.sender.id, row.receiver.id, e),
        }
    }
    Ok(records)
}

/// Write a finished pass to the store unless a newer pass has been started.
///
/// The generation only counts as applied once its rows are committed.
pub fn apply_pass(
    gate: &mut GenerationGate,
    conn: &Mutex<Connection>,
    token: &Address,
    done: PassResult,
) -> Result<PassOutcome> {
    if let Err(stale) = gate.check(done.generation) {
        return Ok(PassOutcome::Stale(stale));
    }

    let records = match done.result {
        Ok(records) => records,
        Err(e) => {
            error!("Refresh {} fetch failed: {:?}", done.generation, e);
            return Ok(PassOutcome::Failed(done.generation));
        }
    };

    {
        let mut db = conn.lock().map_err(|_| eyre!("database mutex poisoned"))?;
        db::replace_flow_records(&mut db, token, done.generation, &records)?;
    }
    gate.accept(done.generation)?;

    Ok(PassOutcome::Applied {
        generation: done.generation,
        records: records.len(),
    })
}
