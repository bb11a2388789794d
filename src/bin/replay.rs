//! Location Event Replay Tool
//!
//! Feeds newline-delimited JSON location events to a running tracker, one
//! POST per line, in file order.
//!
//! Usage:
//!   cargo run --bin geofence-replay -- events.ndjson
//!   cat events.ndjson | cargo run --bin geofence-replay -- --url http://10.0.0.5:8080

use anyhow::Context;
use clap::Parser;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "geofence-replay", about = "Replay NDJSON location events against a tracker")]
struct Args {
    /// NDJSON file with one location event per line (stdin when omitted)
    input: Option<String>,

    /// Base URL of the tracker
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Delay between events in milliseconds
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Print every server response
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default)]
struct ReplayStats {
    accepted: u64,
    rejected: u64,
    failed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let reader: Box<dyn AsyncBufRead + Unpin> = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {path}"))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let endpoint = format!("{}/api/v1/location-events", args.url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to build HTTP client")?;

    let started = Instant::now();
    let stats = replay(reader, &client, &endpoint, &args).await?;

    println!(
        "Replayed {} events in {:.2?}: {} accepted, {} rejected, {} failed",
        stats.accepted + stats.rejected + stats.failed,
        started.elapsed(),
        stats.accepted,
        stats.rejected,
        stats.failed
    );

    if stats.failed > 0 {
        anyhow::bail!("{} events failed", stats.failed);
    }
    Ok(())
}

async fn replay(
    reader: Box<dyn AsyncBufRead + Unpin>,
    client: &reqwest::Client,
    endpoint: &str,
    args: &Args,
) -> anyhow::Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let result = client
            .post(endpoint)
            .header("content-type", "application/json")
            .body(line.to_string())
            .send()
            .await;

        match result {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                if status.is_success() {
                    stats.accepted += 1;
                    if args.verbose {
                        println!("[{line_no}] {status} {body}");
                    }
                } else if status.is_client_error() {
                    stats.rejected += 1;
                    eprintln!("[{line_no}] rejected {status}: {body}");
                } else {
                    stats.failed += 1;
                    eprintln!("[{line_no}] failed {status}: {body}");
                }
            }
            Err(e) => {
                stats.failed += 1;
                eprintln!("[{line_no}] request error: {e}");
            }
        }

        if args.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
        }
    }

    Ok(stats)
}
