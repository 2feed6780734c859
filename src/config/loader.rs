//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    maker = %config.maker.kind,
    markets = config.sim.num_markets,
    rounds = config.sim.rounds_per_market,
    agents = config.agents.count,
    beta = config.maker.beta,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Positive numeric values where required
/// - Valid probability and weight ranges
/// - A runnable market/round/agent shape
fn validate_config(config: &AppConfig) -> Result<()> {
  // Run shape validation
  anyhow::ensure!(
    config.sim.num_markets >= 1,
    "num_markets must be at least 1, got {}",
    config.sim.num_markets
  );
  anyhow::ensure!(
    config.sim.rounds_per_market >= 1,
    "rounds_per_market must be at least 1, got {}",
    config.sim.rounds_per_market
  );
  anyhow::ensure!(
    config.sim.min_edge >= 0.0 && config.sim.min_edge < 1.0,
    "min_edge must be in [0, 1), got {}",
    config.sim.min_edge
  );

  // Maker validation
  anyhow::ensure!(
    config.maker.num_outcomes == 2,
    "the trading policy requires exactly 2 outcomes, got {}",
    config.maker.num_outcomes
  );
  anyhow::ensure!(
    config.maker.beta > 0.0,
    "maker beta must be positive, got {}",
    config.maker.beta
  );
  anyhow::ensure!(
    config.maker.contract_weight > 0.0 && config.maker.contract_weight < 1.0,
    "contract_weight must be in (0, 1), got {}",
    config.maker.contract_weight
  );
  anyhow::ensure!(
    config.maker.base_fee_rate >= 0.0 && config.maker.base_fee_rate < 1.0,
    "base_fee_rate must be in [0, 1), got {}",
    config.maker.base_fee_rate
  );

  // Agent validation
  anyhow::ensure!(
    config.agents.count >= 1,
    "at least one agent must be configured"
  );
  anyhow::ensure!(
    config.agents.budget_min > 0.0,
    "budget_min must be positive, got {}",
    config.agents.budget_min
  );
  anyhow::ensure!(
    config.agents.budget_min <= config.agents.budget_max,
    "budget range is inverted: [{}, {}]",
    config.agents.budget_min,
    config.agents.budget_max
  );

  // Persistence validation
  anyhow::ensure!(
    !config.persistence.out_dir.is_empty(),
    "persistence out_dir must not be empty"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_defaults_fill_optional_fields() {
    let config: AppConfig = toml::from_str(
      r#"
        [sim]
        num_markets = 5
        rounds_per_market = 10

        [maker]
        kind = "fee_augmented"

        [agents]
        count = 20
        budget_min = 1.0
        budget_max = 50.0

        [persistence]
      "#,
    )
    .unwrap();

    assert!(validate_config(&config).is_ok());
    assert_eq!(config.sim.seed, 4_092_002);
    assert_eq!(config.maker.num_outcomes, 2);
    assert_eq!(config.persistence.out_dir, "data");
  }

  #[test]
  fn test_rejects_inverted_budget_range() {
    let config: AppConfig = toml::from_str(
      r#"
        [sim]
        num_markets = 5
        rounds_per_market = 10

        [maker]
        kind = "plain_scoring_rule"

        [agents]
        count = 20
        budget_min = 50.0
        budget_max = 1.0

        [persistence]
      "#,
    )
    .unwrap();

    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_rejects_non_binary_markets() {
    let config: AppConfig = toml::from_str(
      r#"
        [sim]
        num_markets = 1
        rounds_per_market = 1

        [maker]
        kind = "plain_scoring_rule"
        num_outcomes = 3

        [agents]
        count = 1
        budget_min = 1.0
        budget_max = 1.0

        [persistence]
      "#,
    )
    .unwrap();

    assert!(validate_config(&config).is_err());
  }
}
