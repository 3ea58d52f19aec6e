use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use alloy::primitives::Address;
use chrono::Utc;
use eyre::eyre;
use rusqlite::Connection;
use serde::Deserialize;
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::amount::{format_units, parse_amount};
use crate::config::{Config, TokenContext};
use crate::db::{self, RefreshInfo};
use crate::error::ApiError;
use crate::leaderboard::{self, Metric, PageRequest};
use crate::models::{AccountView, FlowRecord, LeaderboardView, ProjectionView, SummaryView};
use crate::projector::project;

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub conn: Arc<Mutex<Connection>>,
    pub ctx: Arc<TokenContext>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LeaderboardQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>, // defaults to 10
    pub viewer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub amount: String,
    pub timestamp: i64,
    pub flow_rate: String,
    pub at_ms: Option<i64>, // defaults to now
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Token Matrix API running" }))
        .route("/leaderboard/flow", get(flow_leaderboard))
        .route("/leaderboard/volume", get(volume_leaderboard))
        .route("/accounts/:address", get(account))
        .route("/stats", get(stats))
        .route("/project", get(project_balance))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(cfg: Config, conn: Arc<Mutex<Connection>>) -> eyre::Result<()> {
    let state = AppState {
        conn,
        ctx: Arc::new(cfg.token_context()),
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state).into_make_service()).await?;

    Ok(())
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| ApiError::Address(raw.to_string()))
}

fn page_request(q: &LeaderboardQuery) -> Result<PageRequest, ApiError> {
    let page_size = q.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ApiError::BadRequest(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    let viewer = q.viewer.as_deref().map(parse_address).transpose()?;

    Ok(PageRequest {
        page: q.page.unwrap_or(0),
        page_size,
        viewer,
    })
}

// ---------- DB wrappers (spawn_blocking) ----------

async fn load_snapshot(state: &AppState) -> Result<(Vec<FlowRecord>, Option<RefreshInfo>), ApiError> {
    let conn = Arc::clone(&state.conn);
    let token = state.ctx.token;

    let loaded = task::spawn_blocking(move || -> eyre::Result<_> {
        let db = conn.lock().map_err(|_| eyre!("database mutex poisoned"))?;
        Ok((
            db::load_flow_records(&db, &token)?,
            db::last_refresh(&db, &token)?,
        ))
    })
    .await
    .map_err(|e| ApiError::Storage(e.to_string()))??;

    Ok(loaded)
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ---------- handlers ----------

pub async fn flow_leaderboard(
    State(state): State<AppState>,
    Query(q): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardView>, ApiError> {
    let request = page_request(&q)?;
    let (records, _) = load_snapshot(&state).await?;
    Ok(Json(leaderboard::leaderboard(
        &state.ctx,
        &records,
        Metric::FlowRate,
        &request,
        now_ms(),
    )))
}

pub async fn volume_leaderboard(
    State(state): State<AppState>,
    Query(q): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardView>, ApiError> {
    let request = page_request(&q)?;
    let (records, _) = load_snapshot(&state).await?;
    Ok(Json(leaderboard::leaderboard(
        &state.ctx,
        &records,
        Metric::Volume,
        &request,
        now_ms(),
    )))
}

pub async fn account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountView>, ApiError> {
    let account = parse_address(&address)?;
    let (records, _) = load_snapshot(&state).await?;
    Ok(Json(leaderboard::account_view(&state.ctx, &records, account, now_ms())))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<SummaryView>, ApiError> {
    let (records, refresh) = load_snapshot(&state).await?;
    Ok(Json(leaderboard::summary_view(
        &state.ctx,
        &records,
        refresh.as_ref(),
        now_ms(),
    )))
}

pub async fn project_balance(
    State(state): State<AppState>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<ProjectionView>, ApiError> {
    let initial = parse_amount(&q.amount)?;
    let flow_rate = parse_amount(&q.flow_rate)?;
    let at_ms = q.at_ms.unwrap_or_else(now_ms);

    let current = project(initial, q.timestamp, flow_rate, at_ms);
    Ok(Json(ProjectionView {
        amount: current.to_string(),
        display: format_units(current, state.ctx.decimals, state.ctx.display_decimals),
        at_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::from_u64;
    use crate::generation::Generation;

    const T0: i64 = 1_700_000_000;

    fn state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        db::run_migrations(&conn).unwrap();
        AppState {
            conn: Arc::new(Mutex::new(conn)),
            ctx: Arc::new(TokenContext {
                token: Address::repeat_byte(0xee),
                chain_id: 8453,
                symbol: "MTX".to_string(),
                decimals: 18,
                display_decimals: 4,
            }),
        }
    }

    fn seed(state: &AppState, rates: &[u64]) {
        let token = state.ctx.token;
        let records: Vec<FlowRecord> = rates
            .iter()
            .enumerate()
            .map(|(i, rate)| FlowRecord {
                token,
                sender: Address::repeat_byte(i as u8 + 1),
                receiver: Address::repeat_byte(0x99),
                flow_rate: from_u64(*rate),
                streamed_until_updated: from_u64(0),
                updated_at: T0,
            })
            .collect();
        let mut db = state.conn.lock().unwrap();
        db::replace_flow_records(&mut db, &token, Generation(1), &records).unwrap();
    }

    #[tokio::test]
    async fn flow_leaderboard_reads_the_stored_snapshot() {
        let state = state();
        seed(&state, &[5, 0, 9]);

        let Json(view) = flow_leaderboard(State(state), Query(LeaderboardQuery::default()))
            .await
            .unwrap();
        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[0].metric, "9");
        assert_eq!(view.page_size, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn empty_store_gives_empty_page() {
        let Json(view) = volume_leaderboard(State(state()), Query(LeaderboardQuery::default()))
            .await
            .unwrap();
        assert!(view.entries.is_empty());
        assert!(!view.has_next_page);
    }

    #[tokio::test]
    async fn rejects_oversized_pages_and_bad_viewers() {
        let q = LeaderboardQuery { page_size: Some(MAX_PAGE_SIZE + 1), ..Default::default() };
        assert!(matches!(
            flow_leaderboard(State(state()), Query(q)).await,
            Err(ApiError::BadRequest(_))
        ));

        let q = LeaderboardQuery { viewer: Some("vitalik".into()), ..Default::default() };
        assert!(matches!(
            flow_leaderboard(State(state()), Query(q)).await,
            Err(ApiError::Address(_))
        ));
    }

    #[tokio::test]
    async fn stats_include_refresh_generation() {
        let state = state();
        seed(&state, &[1, 2]);
        let Json(view) = stats(State(state)).await.unwrap();
        assert_eq!(view.active_streams, 2);
        assert_eq!(view.last_generation, Some(1));
    }

    #[tokio::test]
    async fn projects_a_balance_at_a_given_instant() {
        let q = ProjectQuery {
            amount: "1000000000000000000".into(),
            timestamp: T0,
            flow_rate: "11574074074074".into(),
            at_ms: Some((T0 + 86_400) * 1_000),
        };
        let Json(view) = project_balance(State(state()), Query(q)).await.unwrap();
        assert_eq!(view.amount, "1999999999999993600");
        assert_eq!(view.display, "2.0000");
    }

    #[tokio::test]
    async fn malformed_projection_input_is_rejected() {
        let q = ProjectQuery {
            amount: "1e18".into(),
            timestamp: T0,
            flow_rate: "1".into(),
            at_ms: None,
        };
        assert!(matches!(
            project_balance(State(state()), Query(q)).await,
            Err(ApiError::Amount(_))
        ));
    }
}
