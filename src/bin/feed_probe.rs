use std::env;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;

use livebet_rs::config::Config;
use livebet_rs::feeds::parse_snapshot;

const SAMPLES: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let path = env::var("LIVEBET_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = Config::load(&path).with_context(|| format!("failed to load config from {}", path))?;

    println!("Connecting to {}...", cfg.feed.url);
    let (ws, _) = connect_async(cfg.feed.url.as_str()).await?;
    let (mut write, mut read) = ws.split();

    let subscribe = serde_json::json!({ "type": "subscribe", "gameId": cfg.session.game_id });
    write.send(tungstenite::Message::Text(subscribe.to_string())).await?;

    println!("Subscribed to {}. Measuring parse time for {} snapshots...\n", cfg.session.game_id, SAMPLES);

    let mut times: Vec<u128> = Vec::with_capacity(SAMPLES);
    let mut rounds: Vec<String> = Vec::new();

    while let Some(msg) = read.next().await {
        let tungstenite::Message::Text(text) = msg? else {
            continue;
        };

        let start = Instant::now();
        let Ok(snapshot) = parse_snapshot(text) else {
            continue;
        };
        let elapsed = start.elapsed().as_nanos();
        times.push(elapsed);

        if rounds.last() != Some(&snapshot.round_id) {
            rounds.push(snapshot.round_id.clone());
        }

        let count = times.len();
        if count <= 5 || count % 20 == 0 {
            println!(
                "#{}: round {} {:?} {} markets, {}ns ({}μs)",
                count,
                snapshot.round_id,
                snapshot.phase,
                snapshot.markets.len(),
                elapsed,
                elapsed / 1000
            );
        }

        if count >= SAMPLES {
            break;
        }
    }

    if times.is_empty() {
        bail!("feed closed before any snapshot arrived");
    }

    // Stats
    times.sort();
    let sum: u128 = times.iter().sum();
    let avg = sum / times.len() as u128;
    let min = times[0];
    let max = times[times.len() - 1];
    let median = times[times.len() / 2];
    let p99 = times[(times.len() * 99 / 100).min(times.len() - 1)];

    println!("\n=== SNAPSHOT PARSE LATENCY ({} snapshots, {} rounds) ===", times.len(), rounds.len());
    println!("Min:    {}ns ({}μs)", min, min / 1000);
    println!("Max:    {}ns ({}μs)", max, max / 1000);
    println!("Avg:    {}ns ({}μs)", avg, avg / 1000);
    println!("Median: {}ns ({}μs)", median, median / 1000);
    println!("P99:    {}ns ({}μs)", p99, p99 / 1000);

    Ok(())
}
