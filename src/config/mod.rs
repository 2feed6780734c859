//! Configuration Module - TOML-based Simulation Configuration
//!
//! Loads and validates configuration from `config.toml`. All market and
//! agent parameters are externalized here - nothing is hardcoded in the
//! domain layer.

pub mod loader;

use serde::Deserialize;

use crate::domain::maker::MakerKind;

/// Top-level simulator configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the run begins.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Run shape: markets, rounds, seed, logging.
  pub sim: SimSection,
  /// Market-maker variant and tuning parameters.
  pub maker: MakerSection,
  /// Agent population parameters.
  pub agents: AgentsSection,
  /// History output configuration.
  pub persistence: PersistenceSection,
}

/// Run-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SimSection {
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Seed for the run's random generator.
  #[serde(default = "default_seed")]
  pub seed: u64,
  /// Number of consecutive markets to simulate.
  pub num_markets: u32,
  /// Trading rounds per market.
  pub rounds_per_market: u32,
  /// Minimum belief/price gap before an agent trades.
  #[serde(default = "default_min_edge")]
  pub min_edge: f64,
}

/// Market-maker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MakerSection {
  /// Variant: `plain_scoring_rule`, `reputation_weighted`, `fee_augmented`.
  pub kind: MakerKind,
  /// Number of outcomes per market.
  #[serde(default = "default_num_outcomes")]
  pub num_outcomes: usize,
  /// Liquidity parameter β. Higher = slower price movement.
  #[serde(default = "default_beta")]
  pub beta: f64,
  /// Quantity weight `c` for the reputation-weighted variant.
  #[serde(default = "default_contract_weight")]
  pub contract_weight: f64,
  /// Base fee rate for the fee-augmented variant.
  #[serde(default = "default_base_fee_rate")]
  pub base_fee_rate: f64,
}

/// Agent population configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsSection {
  /// Number of trading agents.
  pub count: u32,
  /// Lower bound of the uniform per-agent budget draw.
  pub budget_min: f64,
  /// Upper bound of the uniform per-agent budget draw.
  pub budget_max: f64,
}

/// History output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceSection {
  /// Directory for JSONL history logs (one subdirectory per run).
  #[serde(default = "default_out_dir")]
  pub out_dir: String,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_seed() -> u64 {
  4_092_002
}

fn default_min_edge() -> f64 {
  0.01
}

fn default_num_outcomes() -> usize {
  2
}

fn default_beta() -> f64 {
  1.0
}

fn default_contract_weight() -> f64 {
  0.5
}

fn default_base_fee_rate() -> f64 {
  0.05
}

fn default_out_dir() -> String {
  "data".to_string()
}
