//! Simulation Use Case - The Round Loop
//!
//! Drives repeated prediction markets over a shared agent population.
//! Each market draws a realised outcome and fresh agent beliefs, then runs
//! a fixed number of trading rounds in which every agent pushes each
//! outcome's price toward its own belief — buying when the market
//! underprices an outcome, selling when it overprices one the agent holds.
//! At close, settlement redeems winning contracts and rolls reputations
//! forward; the next market starts with a fresh maker.
//!
//! All randomness (outcome draws, budgets, belief noise) comes from one
//! seeded generator owned by the simulation, so runs are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::domain::agent::Agent;
use crate::domain::maker::{MakerKind, MakerParams, MarketMaker};
use crate::domain::sizing::SizedTrade;
use crate::ports::history::{HistorySink, RoundRecord};
use crate::usecases::settlement::settle_market;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Which maker variant prices the markets.
    pub maker: MakerKind,
    /// Maker tuning constants (β, contract weight, base fee rate).
    pub params: MakerParams,
    /// Number of consecutive markets to run.
    pub num_markets: u32,
    /// Trading rounds per market.
    pub rounds_per_market: u32,
    /// Number of outcomes per market (the trading policy is binary).
    pub num_outcomes: usize,
    /// Number of trading agents.
    pub num_agents: u32,
    /// Per-agent budget is drawn uniformly from this range.
    pub budget_min: f64,
    /// Upper bound of the budget draw.
    pub budget_max: f64,
    /// Minimum belief/price gap before an agent trades.
    pub min_edge: f64,
    /// Seed for the run's random generator.
    pub seed: u64,
}

impl SimulationConfig {
    /// Assemble the driver configuration from a validated [`AppConfig`].
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            maker: config.maker.kind,
            params: MakerParams {
                beta: config.maker.beta,
                contract_weight: config.maker.contract_weight,
                base_fee_rate: config.maker.base_fee_rate,
            },
            num_markets: config.sim.num_markets,
            rounds_per_market: config.sim.rounds_per_market,
            num_outcomes: config.maker.num_outcomes,
            num_agents: config.agents.count,
            budget_min: config.agents.budget_min,
            budget_max: config.agents.budget_max,
            min_edge: config.sim.min_edge,
            seed: config.sim.seed,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            maker: MakerKind::PlainScoringRule,
            params: MakerParams::default(),
            num_markets: 10,
            rounds_per_market: 20,
            num_outcomes: 2,
            num_agents: 100,
            budget_min: 1.0,
            budget_max: 100.0,
            min_edge: 0.01,
            seed: 4_092_002,
        }
    }
}

/// Aggregated statistics from a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationMetrics {
    /// Markets settled.
    pub markets_run: u32,
    /// Rounds traded across all markets.
    pub rounds_run: u32,
    /// Sizing calls that committed a positive quantity.
    pub trades_committed: u64,
    /// Sizing calls resolved as defined no-ops.
    pub sizing_noops: u64,
    /// Sizing calls that failed with a sizing error.
    pub sizing_failures: u64,
    /// Total contract volume committed (buys plus sells).
    pub volume: f64,
    /// Total settlement payouts across all markets.
    pub total_payout: f64,
    /// Sum of agent PnL after the final market.
    pub total_agent_pnl: f64,
}

/// The simulation driver: one maker per market, a persistent agent
/// population, and a single seeded RNG.
pub struct Simulation {
    config: SimulationConfig,
    agents: Vec<Agent>,
    rng: StdRng,
    metrics: SimulationMetrics,
}

impl Simulation {
    /// Builds the agent population from the config and seeds the RNG.
    ///
    /// # Panics
    /// Panics if the config asks for a non-binary market (the pricing
    /// engine generalises to N outcomes, but the belief-driven trading
    /// policy is defined for two) or a degenerate budget range.
    pub fn new(config: SimulationConfig) -> Self {
        assert!(
            config.num_outcomes == 2,
            "the trading policy requires binary markets"
        );
        assert!(
            config.budget_min > 0.0 && config.budget_min <= config.budget_max,
            "budget range must be positive and ordered"
        );

        let mut rng = StdRng::seed_from_u64(config.seed);
        let agents = (0..config.num_agents)
            .map(|id| {
                let budget = rng.gen_range(config.budget_min..=config.budget_max);
                Agent::new(id, config.num_outcomes, budget)
            })
            .collect();

        Self {
            config,
            agents,
            rng,
            metrics: SimulationMetrics::default(),
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    /// Runs every configured market to completion and returns the final
    /// metrics. History records flow into `sink` as the run progresses.
    pub fn run(&mut self, sink: &mut dyn HistorySink) -> anyhow::Result<SimulationMetrics> {
        info!(
            maker = %self.config.maker,
            markets = self.config.num_markets,
            rounds = self.config.rounds_per_market,
            agents = self.agents.len(),
            seed = self.config.seed,
            "simulation starting"
        );

        for market in 0..self.config.num_markets {
            self.run_market(market, sink)?;
        }

        self.metrics.total_agent_pnl = self.agents.iter().map(Agent::pnl).sum();
        info!(
            markets = self.metrics.markets_run,
            trades = self.metrics.trades_committed,
            volume = self.metrics.volume,
            sizing_failures = self.metrics.sizing_failures,
            total_pnl = self.metrics.total_agent_pnl,
            "simulation finished"
        );

        Ok(self.metrics.clone())
    }

    /// Runs one market: outcome draw, belief draws, trading rounds,
    /// settlement.
    fn run_market(&mut self, market: u32, sink: &mut dyn HistorySink) -> anyhow::Result<()> {
        let outcome = self.rng.gen_range(0..self.config.num_outcomes);
        let mut maker =
            MarketMaker::create(self.config.maker, self.config.num_outcomes, self.config.params);

        for agent in &mut self.agents {
            agent.draw_belief(outcome, &mut self.rng);
        }
        debug!(market, outcome, "market opened");

        for round in 0..self.config.rounds_per_market {
            let trades = self.run_round(&mut maker);
            self.metrics.rounds_run += 1;

            sink.record_round(&RoundRecord {
                market,
                round,
                prices: maker.prices(),
                states: (0..maker.num_outcomes()).map(|o| maker.state(o)).collect(),
                trades,
            })?;
        }

        let record = settle_market(&mut self.agents, self.config.maker, market, outcome);
        self.metrics.total_payout += record.total_payout;
        self.metrics.markets_run += 1;
        sink.record_settlement(&record)?;

        Ok(())
    }

    /// One trading round: every agent sizes toward its belief on every
    /// outcome. Sizing errors are terminal for the trade, not the run.
    fn run_round(&mut self, maker: &mut MarketMaker) -> u32 {
        let mut trades = 0;

        for agent in &mut self.agents {
            for outcome in 0..maker.num_outcomes() {
                let believed = agent.believed_price(outcome);
                let price = maker.price(outcome);

                let sized = if believed > price + self.config.min_edge {
                    maker.buy_till_price(agent, outcome, believed)
                } else if believed < price - self.config.min_edge && agent.holding(outcome) > 0.0 {
                    maker.sell_till_price(agent, outcome, believed)
                } else {
                    continue;
                };

                match sized {
                    Ok(SizedTrade::NoOp { .. }) => self.metrics.sizing_noops += 1,
                    Ok(trade) => {
                        if trade.committed() > 0.0 {
                            trades += 1;
                            self.metrics.trades_committed += 1;
                            self.metrics.volume += trade.committed();
                        } else {
                            self.metrics.sizing_noops += 1;
                        }
                    }
                    Err(err) => {
                        self.metrics.sizing_failures += 1;
                        warn!(
                            agent = agent.id(),
                            outcome,
                            believed,
                            price,
                            error = %err,
                            "trade sizing failed, skipping agent this round"
                        );
                    }
                }
            }
        }

        trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::history::NullSink;

    fn quick_config(maker: MakerKind) -> SimulationConfig {
        SimulationConfig {
            maker,
            num_markets: 3,
            rounds_per_market: 5,
            num_agents: 10,
            budget_min: 10.0,
            budget_max: 50.0,
            seed: 42,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_simulation_runs_all_markets() {
        let mut sim = Simulation::new(quick_config(MakerKind::PlainScoringRule));
        let metrics = sim.run(&mut NullSink).unwrap();
        assert_eq!(metrics.markets_run, 3);
        assert_eq!(metrics.rounds_run, 15);
        assert!(metrics.trades_committed > 0, "agents should trade");
    }

    #[test]
    fn test_simulation_runs_every_maker_kind() {
        for kind in [
            MakerKind::PlainScoringRule,
            MakerKind::ReputationWeighted,
            MakerKind::FeeAugmented,
        ] {
            let mut sim = Simulation::new(quick_config(kind));
            let metrics = sim.run(&mut NullSink).unwrap();
            assert_eq!(metrics.markets_run, 3, "{kind} run should complete");
        }
    }

    #[test]
    fn test_same_seed_reproduces_run() {
        let mut first = Simulation::new(quick_config(MakerKind::FeeAugmented));
        let mut second = Simulation::new(quick_config(MakerKind::FeeAugmented));
        let m1 = first.run(&mut NullSink).unwrap();
        let m2 = second.run(&mut NullSink).unwrap();

        assert_eq!(m1.trades_committed, m2.trades_committed);
        assert!((m1.volume - m2.volume).abs() < 1e-12);
        assert!((m1.total_agent_pnl - m2.total_agent_pnl).abs() < 1e-12);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut first = Simulation::new(quick_config(MakerKind::PlainScoringRule));
        let mut second = Simulation::new(SimulationConfig {
            seed: 43,
            ..quick_config(MakerKind::PlainScoringRule)
        });
        let m1 = first.run(&mut NullSink).unwrap();
        let m2 = second.run(&mut NullSink).unwrap();

        // Practically certain to differ somewhere.
        assert!(
            m1.trades_committed != m2.trades_committed
                || (m1.volume - m2.volume).abs() > 1e-9
                || (m1.total_agent_pnl - m2.total_agent_pnl).abs() > 1e-9
        );
    }

    #[test]
    fn test_budgets_never_go_negative() {
        let mut sim = Simulation::new(quick_config(MakerKind::FeeAugmented));
        sim.run(&mut NullSink).unwrap();
        // Budgets reset at close, so check the invariant held via PnL sanity:
        // no agent can lose more than its initial budget per market.
        for agent in sim.agents() {
            let max_loss = agent.initial_budget() * f64::from(sim.config.num_markets);
            assert!(agent.pnl() >= -max_loss - 1e-9);
        }
    }

    #[test]
    fn test_reputations_stay_in_unit_interval() {
        let mut sim = Simulation::new(quick_config(MakerKind::ReputationWeighted));
        sim.run(&mut NullSink).unwrap();
        for agent in sim.agents() {
            let rep = agent.reputation();
            assert!((0.0..=1.0).contains(&rep), "reputation {rep} escaped [0,1]");
        }
    }
}
