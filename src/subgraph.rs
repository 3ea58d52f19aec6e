// src/subgraph.rs
use alloy::primitives::{Address, I256};
use eyre::{eyre, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The hosted indexers refuse `skip` beyond this.
pub const MAX_SKIP: usize = 5000;

const STREAMS_QUERY: &str = r#"
query Streams($first: Int!, $skip: Int!, $orderBy: Stream_orderBy!, $where: Stream_filter!) {
  streams(first: $first, skip: $skip, orderBy: $orderBy, orderDirection: desc, where: $where) {
    sender { id }
    receiver { id }
    currentFlowRate
    streamedUntilUpdatedAt
    updatedAtTimestamp
  }
}
"#;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub id: String,
}

/// A stream row exactly as the subgraph returns it. Numbers are strings.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawStream {
    pub sender: AccountRef,
    pub receiver: AccountRef,
    pub current_flow_rate: String,
    pub streamed_until_updated_at: String,
    pub updated_at_timestamp: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct StreamsData {
    streams: Vec<RawStream>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamOrder {
    #[default]
    FlowRate,
    Streamed,
}

impl StreamOrder {
    fn field(self) -> &'static str {
        match self {
            StreamOrder::FlowRate => "currentFlowRate",
            StreamOrder::Streamed => "streamedUntilUpdatedAt",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFilter {
    pub min_flow_rate: Option<I256>,
    pub min_streamed: Option<I256>,
}

#[derive(Debug, Clone)]
pub struct StreamQuery {
    pub token: Address,
    pub first: usize,
    pub skip: usize,
    pub order: StreamOrder,
    pub filter: StreamFilter,
}

impl StreamQuery {
    pub fn variables(&self) -> Value {
        let mut filter = json!({ "token": format!("{:#x}", self.token) });
        if let Some(min) = self.filter.min_flow_rate {
            filter["currentFlowRate_gt"] = json!(min.to_string());
        }
        if let Some(min) = self.filter.min_streamed {
            filter["streamedUntilUpdatedAt_gt"] = json!(min.to_string());
        }

        json!({
            "first": self.first,
            "skip": self.skip,
            "orderBy": self.order.field(),
            "where": filter,
        })
    }
}

pub fn parse_streams_response(text: &str) -> Result<Vec<RawStream>> {
    let parsed: GraphQlResponse<StreamsData> = serde_json::from_str(text)?;
    if !parsed.errors.is_empty() {
        let messages: Vec<&str> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(eyre!("subgraph error: {}", messages.join("; ")));
    }
    parsed
        .data
        .map(|d| d.streams)
        .ok_or_else(|| eyre!("subgraph response carried no data"))
}

#[derive(Debug, Clone)]
pub struct SubgraphClient {
    http: Client,
    url: String,
}

impl SubgraphClient {
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    /// One page of streams, retried on transport failures.
    pub async fn fetch_streams(&self, query: &StreamQuery) -> Result<Vec<RawStream>> {
        let payload = json!({
            "query": STREAMS_QUERY,
            "variables": query.variables(),
        });

        for attempt in 1..=3 {
            debug!(
                "Sending streams query → {} (first {}, skip {})",
                self.url, query.first, query.skip
            );

            match self.http.post(&self.url).json(&payload).send().await {
                Ok(resp) => {
                    if resp.status() != StatusCode::OK {
                        return Err(eyre!("subgraph error: HTTP {}", resp.status()));
                    }
                    let text = resp.text().await?;
                    return parse_streams_response(&text);
                }
                Err(e) if attempt < 3 => {
                    warn!("Subgraph request failed (attempt {}): {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                Err(e) => return Err(eyre!("subgraph request failed after 3 attempts: {}", e)),
            }
        }

        Err(eyre!("Unreachable: retries exhausted"))
    }

    /// Walk every page for `token`, over-fetching by one row to detect the end.
    pub async fn fetch_all_streams(
        &self,
        token: Address,
        page_size: usize,
        order: StreamOrder,
        filter: StreamFilter,
    ) -> Result<Vec<RawStream>> {
        let mut all = Vec::new();
        let mut skip = 0;

        loop {
            let query = StreamQuery {
                token,
                first: page_size + 1,
                skip,
                order,
                filter: filter.clone(),
            };
            let mut rows = self.fetch_streams(&query).await?;
            let step = settle_page(&mut rows, page_size, skip);
            all.extend(rows);

            match step {
                PageStep::Next { skip: next } => skip = next,
                PageStep::Done => break,
                PageStep::SkipLimit { skip: next } => {
                    warn!("Stopping pagination at skip {} for token {:#x}", next, token);
                    break;
                }
            }
        }

        info!("Fetched {} streams for token {:#x}", all.len(), token);
        Ok(all)
    }
}

/// What the paging walk does after a page of `page_size + 1` requested rows arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    Next { skip: usize },
    Done,
    /// More rows exist but the indexer won't serve them.
    SkipLimit { skip: usize },
}

/// Drop the sentinel row from `rows` and decide where the next page starts.
pub fn settle_page<T>(rows: &mut Vec<T>, page_size: usize, skip: usize) -> PageStep {
    let has_next_page = rows.len() > page_size;
    rows.truncate(page_size);

    if !has_next_page {
        return PageStep::Done;
    }
    let next = skip + page_size;
    if next > MAX_SKIP {
        PageStep::SkipLimit { skip: next }
    } else {
        PageStep::Next { skip: next }
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! A local stand-in for the subgraph HTTP endpoint.
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{extract::State, routing::post, Json, Router};
    use serde_json::{json, Value};

    #[derive(Clone)]
    struct Stub {
        rows: Arc<Vec<Value>>,
        delay: Duration,
        requests: Arc<Mutex<Vec<(usize, usize)>>>,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    pub struct StubHandle {
        pub url: String,
        requests: Arc<Mutex<Vec<(usize, usize)>>>,
        peak: Arc<AtomicUsize>,
    }

    impl StubHandle {
        /// `(first, skip)` of every query received so far.
        pub fn requests(&self) -> Vec<(usize, usize)> {
            self.requests.lock().unwrap().clone()
        }

        /// Most queries that were being answered at the same time.
        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    pub fn stream_row(sender: u8, flow_rate: u64) -> Value {
        json!({
            "sender": { "id": format!("0x{}", format!("{:02x}", sender).repeat(20)) },
            "receiver": { "id": format!("0x{}", "99".repeat(20)) },
            "currentFlowRate": flow_rate.to_string(),
            "streamedUntilUpdatedAt": "0",
            "updatedAtTimestamp": "1700000000",
        })
    }

    async fn answer(State(stub): State<Stub>, Json(body): Json<Value>) -> Json<Value> {
        let first = body["variables"]["first"].as_u64().unwrap_or(0) as usize;
        let skip = body["variables"]["skip"].as_u64().unwrap_or(0) as usize;
        stub.requests.lock().unwrap().push((first, skip));

        let now = stub.active.fetch_add(1, Ordering::SeqCst) + 1;
        stub.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(stub.delay).await;
        stub.active.fetch_sub(1, Ordering::SeqCst);

        let page: Vec<Value> = stub.rows.iter().skip(skip).take(first).cloned().collect();
        Json(json!({ "data": { "streams": page } }))
    }

    /// Serve `rows` with `first`/`skip` paging, answering each query after `delay`.
    pub async fn spawn(rows: Vec<Value>, delay: Duration) -> StubHandle {
        let stub = Stub {
            rows: Arc::new(rows),
            delay,
            requests: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        };
        let handle = StubHandle {
            url: String::new(),
            requests: Arc::clone(&stub.requests),
            peak: Arc::clone(&stub.peak),
        };

        let app = Router::new().route("/", post(answer)).with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        StubHandle {
            url: format!("http://{}/", addr),
            ..handle
        }
    }
}
