use alloy::primitives::Address;
use chrono::Utc;
use token_matrix::{
    amount::DEFAULT_DECIMALS,
    config::{TokenContext, DEFAULT_SUBGRAPH_URL},
    leaderboard::{self, Metric, PageRequest},
    refresh::fetch_snapshot,
    subgraph::SubgraphClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let token: Address = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: probe_subgraph <token-address> [subgraph-url]"))?
        .parse()?;
    let url = args.next().unwrap_or_else(|| DEFAULT_SUBGRAPH_URL.to_string());

    println!("Fetching streams for {:#x} from {}", token, url);

    let client = SubgraphClient::new(&url).map_err(|e| anyhow::anyhow!("{e:#}"))?;
    let records = fetch_snapshot(&client, token, 100)
        .await
        .map_err(|e| anyhow::anyhow!("{e:#}"))?;
    println!("Decoded {} flow records", records.len());

    let ctx = TokenContext {
        token,
        chain_id: 0,
        symbol: "TOKEN".to_string(),
        decimals: DEFAULT_DECIMALS,
        display_decimals: 4,
    };
    let request = PageRequest { page: 0, page_size: 10, viewer: None };
    let now_ms = Utc::now().timestamp_millis();

    for metric in [Metric::FlowRate, Metric::Volume] {
        let view = leaderboard::leaderboard(&ctx, &records, metric, &request, now_ms);
        println!("\n{:?} leaderboard (more: {})", metric, view.has_next_page);
        for row in view.entries {
            println!(
                "#{:<3} {} | {} | {}/mo | streamed {}",
                row.rank, row.account, row.metric_display, row.flow_rate_per_month, row.total_streamed
            );
        }
    }

    Ok(())
}
