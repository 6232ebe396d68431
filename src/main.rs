use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use heartbeat_log::{Config, HeartbeatController, HeartbeatLogger, HeartbeatsPayload};

#[derive(Parser)]
#[command(name = "heartbeat-log")]
#[command(about = "Per-agent, UTC-day-bucketed heartbeat log", long_about = None)]
struct Cli {
    /// App whose heartbeats are read and written
    #[arg(long, global = true)]
    app_id: Option<String>,
    /// Directory holding the heartbeat bundle files
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,
    /// Per-agent cap on stored days (0 = unbounded)
    #[arg(long, global = true)]
    max_stored_days: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a heartbeat for each agent (at most one per agent per UTC day)
    Log {
        #[arg(required = true)]
        agents: Vec<String>,
    },
    /// Flush stored heartbeats and print the header value
    Flush {
        /// Only flush heartbeats dated today (UTC)
        #[arg(long)]
        today: bool,
    },
    /// Flush today's heartbeats and print the V1 heartbeat code
    Code,
    /// Decode a header value and print it as JSON
    Decode { header: String },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(app_id) = cli.app_id {
        config.app_id = app_id;
    }
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(max) = cli.max_stored_days {
        config.max_stored_days = max;
    }

    let controller = Arc::new(HeartbeatController::from_config(&config));

    match cli.command {
        Some(Commands::Version) | None => {
            println!("heartbeat-log {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Log { agents }) => {
            let logger = HeartbeatLogger::new(Arc::clone(&controller));
            for agent in &agents {
                logger.log(agent);
            }
            logger.shutdown().await;
        }
        Some(Commands::Flush { today }) => {
            let payload = if today {
                controller.flush_today()
            } else {
                controller.flush()
            }
            .with_context(|| {
                format!(
                    "Failed to flush heartbeats from {}",
                    config.storage_path().display()
                )
            })?;
            println!("{}", payload.header_value());
        }
        Some(Commands::Code) => {
            let code = controller
                .heartbeat_code()
                .context("Failed to read heartbeat code")?;
            println!("{}", code.as_u8());
        }
        Some(Commands::Decode { header }) => {
            let payload = HeartbeatsPayload::from_header_value(&header)
                .context("Failed to decode header value")?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}
