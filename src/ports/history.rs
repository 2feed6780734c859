//! History Port - Simulation History Recording Interface
//!
//! The simulation driver reports per-round market snapshots and per-market
//! settlement summaries through this port. The production adapter appends
//! JSONL files; tests plug in [`NullSink`] to run without touching disk.

use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentSnapshot;
use crate::domain::maker::MakerKind;

/// Snapshot of the market at the end of one trading round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Zero-based market index within the run.
    pub market: u32,
    /// Zero-based round index within the market.
    pub round: u32,
    /// Instantaneous price per outcome (sums to 1).
    pub prices: Vec<f64>,
    /// Raw pricing-engine state per outcome.
    pub states: Vec<f64>,
    /// Trades committed during this round.
    pub trades: u32,
}

/// Summary written once per market at settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Zero-based market index within the run.
    pub market: u32,
    /// Which maker variant priced this market.
    pub maker: MakerKind,
    /// The realised outcome index.
    pub outcome: usize,
    /// Total payout distributed to winning holdings.
    pub total_payout: f64,
    /// Per-agent budget/PnL/reputation after the close.
    pub agents: Vec<AgentSnapshot>,
}

/// Where the simulation driver records its history.
pub trait HistorySink {
    /// Record the market state after a completed round.
    fn record_round(&mut self, record: &RoundRecord) -> anyhow::Result<()>;

    /// Record a market settlement summary.
    fn record_settlement(&mut self, record: &SettlementRecord) -> anyhow::Result<()>;
}

/// Sink that discards everything; used by tests and benchmarks.
#[derive(Debug, Default)]
pub struct NullSink;

impl HistorySink for NullSink {
    fn record_round(&mut self, _record: &RoundRecord) -> anyhow::Result<()> {
        Ok(())
    }

    fn record_settlement(&mut self, _record: &SettlementRecord) -> anyhow::Result<()> {
        Ok(())
    }
}
