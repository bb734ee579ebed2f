use std::env;
use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use livebet_rs::api::{BetPlacer, HttpPlacer};
use livebet_rs::commands::Command;
use livebet_rs::config::Config;
use livebet_rs::events::Event;
use livebet_rs::feeds::MarketFeed;
use livebet_rs::session::{Session, SubmissionReport};
use livebet_rs::state::Snapshot;

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout is the bet slip display; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Forward stdin lines as commands. EOF shuts the session down.
///
/// Runs on a plain thread: a blocked stdin read must not hold up runtime shutdown.
fn spawn_stdin(tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(cmd) => {
                    if tx.blocking_send(Event::Command(cmd)).is_err() {
                        return;
                    }
                }
                Err(e) => println!("! {}", e),
            }
        }
        let _ = tx.blocking_send(Event::Shutdown);
    });
}

fn spawn_ctrl_c(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(Event::Shutdown).await;
        }
    });
}

fn print_state(session: &Session) {
    match serde_json::to_string_pretty(&session.state()) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!(error = %e, "could not render state"),
    }
}

fn print_report(report: &SubmissionReport) {
    println!(
        "round {}: {} placed, {} failed",
        report.round_id,
        report.placed_count(),
        report.failed_count()
    );
    for reason in report.failure_reasons() {
        println!("  ✗ {}", reason);
    }
}

/// Apply one user command. Returns false to stop.
fn handle_command(
    session: &mut Session,
    cmd: Command,
    placer: &Arc<dyn BetPlacer>,
    tx: &mpsc::Sender<Event>,
) -> bool {
    match cmd {
        Command::Add { market_id, stake } => match session.request_add(&market_id, stake) {
            Ok(sel) => println!("+ {} {} @ {} (stake {})", sel.market_id, sel.label, sel.price, sel.stake),
            Err(e) => println!("! {}", e),
        },
        Command::Remove { market_id } => {
            if session.remove_selection(&market_id).is_none() {
                println!("! {} is not on the slip", market_id);
            }
        }
        Command::Scale { factor } => {
            if let Err(e) = session.scale_stakes(factor) {
                println!("! {}", e);
            }
        }
        Command::Clear => session.clear_slip(),
        Command::Repeat => {
            for (market_id, result) in session.repeat_last() {
                if let Err(e) = result {
                    println!("! {}: {}", market_id, e);
                }
            }
        }
        Command::Submit => match session.begin_submit() {
            Ok(Some(batch)) => {
                // Placement runs off the loop so snapshots keep applying.
                let placer = Arc::clone(placer);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let report = batch.run(placer.as_ref()).await;
                    let _ = tx.send(Event::SubmitFinished(report)).await;
                });
            }
            Ok(None) => println!("! slip is empty"),
            Err(e) => println!("! {}", e),
        },
        Command::State => print_state(session),
        Command::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let path = env::var("LIVEBET_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = Config::load(&path).with_context(|| format!("failed to load config from {}", path))?;
    init_tracing(&cfg.general.log_level);
    info!(config = ?cfg, "loaded config");

    let placer: Arc<dyn BetPlacer> = Arc::new(HttpPlacer::new(
        &cfg.placement.base_url,
        &cfg.session.game_id,
        cfg.placement.timeout(),
    )?);
    let mut session = Session::new(cfg.session.game_id.clone(), cfg.session.failure_policy);

    // Create the channels: events in order, snapshots latest-wins
    let (tx, mut rx) = mpsc::channel::<Event>(100);
    let (snapshot_tx, mut snapshot_rx) = watch::channel::<Option<Snapshot>>(None);

    MarketFeed::new(&cfg.feed.url, &cfg.session.game_id, cfg.feed.reconnect_delay()).spawn(snapshot_tx, tx.clone());
    spawn_stdin(tx.clone());
    spawn_ctrl_c(tx.clone());

    info!(game_id = %session.game_id(), "session loop started");
    loop {
        tokio::select! {
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    warn!("market feed task ended");
                    break;
                }
                let latest = snapshot_rx.borrow_and_update().clone();
                if let Some(snapshot) = latest {
                    let replaced = session.on_snapshot(snapshot);
                    if replaced.round_changed {
                        print_state(&session);
                    }
                }
            }
            event = rx.recv() => {
                match event {
                    Some(Event::FeedConnected) => session.set_feed_connected(true),
                    Some(Event::FeedDisconnected { reason }) => {
                        session.set_feed_connected(false);
                        println!("! market feed offline ({})", reason);
                    }
                    Some(Event::Command(cmd)) => {
                        if !handle_command(&mut session, cmd, &placer, &tx) {
                            break;
                        }
                    }
                    Some(Event::SubmitFinished(report)) => {
                        session.finish_submit(&report);
                        print_report(&report);
                    }
                    Some(Event::Shutdown) | None => break,
                }
            }
        }
    }

    info!("shutting down");
    Ok(())
}
