//! Rebalancer - Main Entry Point
//!
//! Runs the configured allocation strategies against the paper exchange
//! until interrupted.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rebalancer::common::channels::create_report_channel;
use rebalancer::config::load_config;
use rebalancer::{
    AllocationStrategy, AppConfig, ChannelReporter, Exchange, PaperExchange, Reporter, Scheduler,
    SharedStrategy, TracingReporter,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "REBALANCER_CONFIG")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Run a single cycle of every strategy, then exit
    #[arg(long)]
    once: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(Some(&args.config))
        .with_context(|| format!("loading configuration from {}", args.config))?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    init_tracing(&level, args.log_json)?;

    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    config.validate()?;
    info!("Starting rebalancer");
    info!("Configuration file: {}", args.config);

    let AppConfig {
        settings,
        engine,
        strategies,
        paper,
    } = config;
    if strategies.is_empty() {
        warn!("No strategies configured; nothing to do");
    }

    let exchange: Arc<dyn Exchange> = Arc::new(PaperExchange::from_config(&paper).await);

    let (report_tx, mut report_rx) = create_report_channel();
    let forwarder = tokio::spawn(async move {
        while let Some(line) = report_rx.recv().await {
            TracingReporter.report(&line);
        }
    });
    let reporter: Arc<dyn Reporter> = Arc::new(ChannelReporter::new(report_tx));

    let strategies: Vec<SharedStrategy> = strategies
        .into_iter()
        .map(|strategy| {
            info!(name = %strategy.name, pair = %strategy.pair, "Registering strategy");
            Arc::new(AllocationStrategy::from_config(
                strategy,
                Arc::clone(&exchange),
                Arc::clone(&reporter),
                &engine,
            )) as SharedStrategy
        })
        .collect();
    drop(reporter);

    let scheduler = Scheduler::new(strategies, &settings);

    if args.once {
        for (name, outcome) in scheduler.run_once().await {
            match outcome {
                Ok(outcome) => info!(strategy = %name, ?outcome, "Cycle complete"),
                Err(e) => error!(strategy = %name, error = %e, "Cycle failed"),
            }
        }
        drop(scheduler);
    } else {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut run = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

        tokio::select! {
            joined = &mut run => joined?,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Received shutdown signal, cleaning up...");
                shutdown_tx.send(true).ok();
                run.await?;
            }
        }
    }

    // Every sender is gone once the strategies are dropped
    forwarder.await?;
    info!("Shutdown complete");
    Ok(())
}
