use cross_asset_engine::{AssetData, CrossAssetCorrelationSystem, EngineConfig};
use serde::Serialize;
use std::error::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Replay settings read from the environment.
#[derive(Debug, Clone)]
struct ReplayConfig {
    /// NDJSON file of `AssetData` records; stdin when unset.
    input: Option<String>,
    /// Symbol to print a pair analysis for after the replay.
    pair: Option<String>,
    /// Print a comprehensive analysis every N records (0 = only at the end).
    snapshot_every: u64,
}

impl ReplayConfig {
    fn from_env() -> Self {
        Self {
            input: std::env::var("REPLAY_INPUT").ok().filter(|s| !s.is_empty()),
            pair: std::env::var("REPLAY_PAIR").ok().filter(|s| !s.is_empty()),
            snapshot_every: std::env::var("REPLAY_SNAPSHOT_EVERY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    init_logging();

    let replay = ReplayConfig::from_env();
    let config = EngineConfig::from_env()?;
    info!(?replay, "starting cross-asset replay");

    let system = CrossAssetCorrelationSystem::new(config)?;

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &replay.input {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(reader).lines();

    let mut line_number = 0_u64;
    let mut accepted = 0_u64;
    let mut skipped = 0_u64;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let data = match serde_json::from_str::<AssetData>(line) {
            Ok(data) => data,
            Err(error) => {
                warn!(line_number, %error, "skipping malformed replay record");
                skipped += 1;
                continue;
            }
        };

        if let Err(error) = system.ingest(data) {
            debug!(line_number, %error, "replay record rejected");
            skipped += 1;
            continue;
        }
        accepted += 1;

        if replay.snapshot_every > 0 && accepted % replay.snapshot_every == 0 {
            emit(&system.analyze()).await?;
        }
    }

    info!(accepted, skipped, "replay finished");
    emit(&system.analyze()).await?;

    if let Some(symbol) = &replay.pair {
        emit(&system.analyze_pair(symbol)).await?;
    }

    Ok(())
}

/// Write one JSON document per line to stdout.
async fn emit<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    let mut json = serde_json::to_vec(value)?;
    json.push(b'\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&json).await?;
    stdout.flush().await?;
    Ok(())
}

/// `RUST_LOG` filter (default `info`), written to stderr so stdout stays pure JSON.
/// `REPLAY_LOG_JSON=true` switches to structured JSON log lines.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("REPLAY_LOG_JSON")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
