//! test-switchd entry point.
//!
//! Loads the runtime configuration, then serves driver commands as JSON
//! lines on stdin/stdout until EOF or Ctrl-C. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use l1_mapping_store::MappingStore;
use l1_test_switchd::{daemon, DriverCommands, MappingEngine, RuntimeConfig, DEFAULT_CONFIG_FILE};

/// Simulated L1 matrix switch driver
#[derive(Parser, Debug)]
#[command(name = "test-switchd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Runtime configuration file (YAML)
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory for per-device mapping files (overrides STATE_DIR)
    #[arg(short = 's', long)]
    state_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

/// Initialize tracing/logging.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = RuntimeConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(dir) = args.state_dir {
        config.state_dir = dir;
    }

    std::fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("creating state dir {}", config.state_dir.display()))?;

    info!(
        "Delay {:?}s, override mapping {}, state in {}",
        config.delay_range(),
        config.override_mapping,
        config.state_dir.display()
    );

    let engine = MappingEngine::new(config.engine(), MappingStore::new());
    let driver = DriverCommands::new(engine, &config.state_dir);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let served = daemon::serve_until(stdin, stdout, driver, tokio::signal::ctrl_c())
        .await
        .context("command loop")?;
    if served.is_none() {
        info!("Interrupted, shutting down");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting test-switchd ---");

    match run(args).await {
        Ok(()) => {
            info!("test-switchd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("test-switchd error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
