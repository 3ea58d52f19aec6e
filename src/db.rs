use alloy::primitives::Address;
use eyre::{Result, WrapErr};
use rusqlite::{params, Connection, OptionalExtension};

use crate::amount::parse_amount;
use crate::generation::Generation;
use crate::models::FlowRecord;

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS flow_records (
  id                     INTEGER PRIMARY KEY AUTOINCREMENT,
  token_address          TEXT NOT NULL,
  sender                 TEXT NOT NULL,
  receiver               TEXT NOT NULL,
  flow_rate              TEXT NOT NULL, -- I256 stored as decimal string
  streamed_until_updated TEXT NOT NULL, -- I256 stored as decimal string
  updated_at             INTEGER NOT NULL,
  generation             INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS flow_records_token ON flow_records (token_address, id);

CREATE TABLE IF NOT EXISTS refreshes (
  token_address TEXT NOT NULL,
  generation    INTEGER NOT NULL,
  record_count  INTEGER NOT NULL,
  applied_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
  PRIMARY KEY (token_address, generation)
);
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshInfo {
    pub generation: u64,
    pub record_count: usize,
    pub applied_at: String,
}

fn token_key(token: &Address) -> String {
    format!("{:#x}", token)
}

/// Open the snapshot database in WAL mode so API reads don't block refresh writes.
pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

/// Swap the stored snapshot for `token` with `records` in one transaction.
pub fn replace_flow_records(
    conn: &mut Connection,
    token: &Address,
    generation: Generation,
    records: &[FlowRecord],
) -> Result<()> {
    let key = token_key(token);
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM flow_records WHERE token_address = ?1", params![key])?;
    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO flow_records (
                token_address, sender, receiver,
                flow_rate, streamed_until_updated, updated_at, generation
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )?;
        for r in records {
            stmt.execute(params![
                key,
                format!("{:#x}", r.sender),
                format!("{:#x}", r.receiver),
                r.flow_rate.to_string(),
                r.streamed_until_updated.to_string(),
                r.updated_at,
                generation.0 as i64,
            ])?;
        }
    }
    // only the refresh that produced the current rows is kept
    tx.execute("DELETE FROM refreshes WHERE token_address = ?1", params![key])?;
    tx.execute(
        "INSERT INTO refreshes (token_address, generation, record_count) VALUES (?1, ?2, ?3)",
        params![key, generation.0 as i64, records.len() as i64],
    )?;

    tx.commit()?;
    Ok(())
}

/// Stored records for `token`, in the order they were fetched.
pub fn load_flow_records(conn: &Connection, token: &Address) -> Result<Vec<FlowRecord>> {
    let mut stmt = conn.prepare(
        "SELECT sender, receiver, flow_rate, streamed_until_updated, updated_at
         FROM flow_records
         WHERE token_address = ?1
         ORDER BY id",
    )?;

    let rows = stmt.query_map(params![token_key(token)], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, i64>(4)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (sender, receiver, flow_rate, streamed, updated_at) = row?;
        records.push(FlowRecord {
            token: *token,
            sender: sender.parse().wrap_err("stored sender is not an address")?,
            receiver: receiver.parse().wrap_err("stored receiver is not an address")?,
            flow_rate: parse_amount(&flow_rate)?,
            streamed_until_updated: parse_amount(&streamed)?,
            updated_at,
        });
    }
    Ok(records)
}

pub fn last_refresh(conn: &Connection, token: &Address) -> Result<Option<RefreshInfo>> {
    let info = conn
        .query_row(
            "SELECT generation, record_count, applied_at
             FROM refreshes
             WHERE token_address = ?1
             ORDER BY rowid DESC
             LIMIT 1",
            params![token_key(token)],
            |r| {
                Ok(RefreshInfo {
                    generation: r.get::<_, i64>(0)? as u64,
                    record_count: r.get::<_, i64>(1)? as usize,
                    applied_at: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(info)
}
