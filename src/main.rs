//! LMSR Market Simulator — Entry Point
//!
//! Initializes configuration and logging, wires the history logger and
//! the simulation driver, and runs the configured number of markets.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing with the configured level (RUST_LOG overrides)
//! 3. Create the JSONL history logger for this run
//! 4. Build the simulation (agents + seeded RNG) and run it
//! 5. Log the final metrics

use anyhow::{Context, Result};
use tracing::info;

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::persistence::JsonlHistory;
use usecases::simulation::{Simulation, SimulationConfig};

fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured logging ────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.sim.log_level)
                }),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        maker = %config.maker.kind,
        markets = config.sim.num_markets,
        agents = config.agents.count,
        seed = config.sim.seed,
        "Starting LMSR market simulator"
    );

    // ── 3. Create history logger for this run ───────────────
    let mut history = JsonlHistory::new(&config.persistence.out_dir, config.maker.kind)
        .context("Failed to create history logger")?;

    // ── 4. Build and run the simulation ─────────────────────
    let mut simulation = Simulation::new(SimulationConfig::from_app(&config));
    let metrics = simulation
        .run(&mut history)
        .context("Simulation run failed")?;

    // ── 5. Final report ─────────────────────────────────────
    info!(
        markets = metrics.markets_run,
        rounds = metrics.rounds_run,
        trades = metrics.trades_committed,
        volume = metrics.volume,
        sizing_noops = metrics.sizing_noops,
        sizing_failures = metrics.sizing_failures,
        total_payout = metrics.total_payout,
        total_agent_pnl = metrics.total_agent_pnl,
        "Run complete"
    );

    Ok(())
}
