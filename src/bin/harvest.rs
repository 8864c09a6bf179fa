//! janet-harvest-server binary
//!
//! Runs the harvest service with an in-memory world and speaks JSON lines:
//! one [`InboundCommand`] per stdin line, one `<subject> <event-json>` line
//! per outbound frame on stdout.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                               | Default        | Description                       |
//! |-----------------------------------|----------------|-----------------------------------|
//! | `HARVEST_SESSION`                 | `default`      | Session stamped on events         |
//! | `HARVEST_PARTICIPANT_ID`          | `harvest-service` | Participant ID                 |
//! | `HARVEST_CONFIG`                  | *(none)*       | TOML file with `HarvestConfig`    |
//! | `HARVEST_TICK_RATE_HZ`            | `20`           | Scheduler tick rate               |
//! | `HARVEST_LIVENESS_TIMEOUT_TICKS`  | `4`            | Max gap between swing signals     |
//! | `HARVEST_RNG_SEED`                | *(entropy)*    | Seed for yield rolls              |

use anyhow::{Context, Result};
use clap::Parser;
use janet_harvest::{
    bus::{ChannelSink, HarvestBusAgent, HarvestBusConfig, Publisher},
    config::load_config,
    durations::DurationTable,
    gate::LevelGate,
    protocol::InboundCommand,
    service::{Collaborators, HarvestService},
    stats::StatTable,
    world::GridWorld,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "janet-harvest-server", about = "Janet Harvest Service", version)]
struct Args {
    /// Session stamped on outbound events
    #[arg(long, env = "HARVEST_SESSION", default_value = "default")]
    session: String,

    /// Participant ID
    #[arg(long, env = "HARVEST_PARTICIPANT_ID", default_value = "harvest-service")]
    participant_id: String,

    /// TOML config file
    #[arg(long, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Tick rate (Hz), overrides the config file
    #[arg(long)]
    tick_rate_hz: Option<f32>,

    /// Liveness timeout in ticks, overrides the config file
    #[arg(long)]
    liveness_timeout_ticks: Option<u64>,

    /// Seed for yield rolls, overrides the config file
    #[arg(long)]
    seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries frames.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("janet_harvest=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;
    if let Some(hz) = args.tick_rate_hz {
        config.tick_rate_hz = hz;
    }
    if let Some(timeout) = args.liveness_timeout_ticks {
        config.liveness_timeout_ticks = timeout;
    }
    if let Some(seed) = args.seed {
        config.rng_seed = Some(seed);
    }

    tracing::info!(
        "Starting janet-harvest-server (session='{}', tick_rate={}Hz, liveness_timeout={} ticks)",
        args.session,
        config.tick_rate_hz,
        config.liveness_timeout_ticks,
    );

    // Outbound frames
    let (frame_tx, mut frame_rx) = broadcast::channel(1024);
    let publisher = Publisher::new(args.session.clone(), frame_tx);

    // Collaborators
    let world = Arc::new(GridWorld::new());
    let stats = Arc::new(StatTable::new());
    let collab = Collaborators {
        world: world.clone(),
        stats: stats.clone(),
        gate: Arc::new(LevelGate::new()),
        sink: Arc::new(ChannelSink::new(publisher.clone())),
    };

    let durations = DurationTable::from_config(&config);
    let bus_config = HarvestBusConfig {
        session: args.session,
        participant_id: args.participant_id,
        tick_rate_hz: config.tick_rate_hz,
    };
    let service = HarvestService::new(config, durations, collab)
        .context("Failed to build harvest service")?;

    // stdout writer
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            match frame_rx.recv().await {
                Ok(frame) => {
                    let mut line = Vec::with_capacity(frame.payload.len() + 64);
                    line.extend_from_slice(frame.subject.as_bytes());
                    line.push(b' ');
                    line.extend_from_slice(&frame.payload);
                    line.push(b'\n');
                    if let Err(e) = stdout.write_all(&line).await {
                        tracing::error!("stdout closed: {}", e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("stdout writer lagged, dropped {} frames", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // stdin reader
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<InboundCommand>(&line) {
                    Ok(cmd) => {
                        if cmd_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Invalid command '{}': {}", line, e),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });

    // Run until stdin closes or shutdown
    HarvestBusAgent::new(
        bus_config,
        Arc::new(Mutex::new(service)),
        world,
        stats,
        publisher,
    )
    .run(cmd_rx)
    .await
}
