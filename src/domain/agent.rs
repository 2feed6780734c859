//! Trading agents with persistent reputation and per-market beliefs.
//!
//! An agent's reputation is derived from a rolling window of prediction
//! correctness across past markets and feeds back into pricing twice:
//! the reputation-weighted maker folds it into its cost function, and
//! the fee-augmented maker discounts fees by it. Budget and holdings are
//! per-market state; reputation and the correctness window are the only
//! fields that survive a market close.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::scoring::sigmoid;

/// Number of recent markets included in the reputation window.
pub const CORRECTNESS_WINDOW: usize = 10;

/// A market participant with budget, holdings, belief, and reputation.
#[derive(Debug, Clone)]
pub struct Agent {
    id: u32,
    budget: f64,
    initial_budget: f64,
    holdings: Vec<f64>,
    reputation: f64,
    belief: f64,
    participations: u32,
    opportunities: u32,
    /// Correctness flags, most recent market first, capped at the window.
    record: VecDeque<bool>,
    pnl: f64,
    traded_this_market: bool,
}

impl Agent {
    /// Creates a fresh agent with no history and zero reputation.
    ///
    /// The belief starts at 0.5 (maximum uncertainty) until the first
    /// [`draw_belief`](Self::draw_belief) for a concrete market.
    pub fn new(id: u32, num_outcomes: usize, budget: f64) -> Self {
        assert!(budget > 0.0, "agent budget must be positive");
        Self {
            id,
            budget,
            initial_budget: budget,
            holdings: vec![0.0; num_outcomes],
            reputation: 0.0,
            belief: 0.5,
            participations: 0,
            opportunities: 0,
            record: VecDeque::with_capacity(CORRECTNESS_WINDOW),
            pnl: 0.0,
            traded_this_market: false,
        }
    }

    /// Creates an agent with a pre-existing track record.
    ///
    /// Seeds the rolling window with `correct` correct predictions out of
    /// `min(participations, CORRECTNESS_WINDOW)` and recomputes reputation
    /// from it. Used to populate markets with established traders.
    pub fn with_history(
        id: u32,
        participations: u32,
        opportunities: u32,
        correct: u32,
        num_outcomes: usize,
        budget: f64,
    ) -> Self {
        let mut agent = Self::new(id, num_outcomes, budget);
        agent.participations = participations;
        agent.opportunities = opportunities.max(participations);
        let window = (participations as usize).min(CORRECTNESS_WINDOW);
        let hits = (correct as usize).min(window);
        for i in 0..window {
            agent.record.push_back(i < hits);
        }
        agent.recompute_reputation();
        agent
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn initial_budget(&self) -> f64 {
        self.initial_budget
    }

    /// Reputation in `[0, 1]`; 0 until the agent has participated once.
    pub fn reputation(&self) -> f64 {
        self.reputation
    }

    /// The agent's current belief that outcome 1 is realised.
    pub fn belief(&self) -> f64 {
        self.belief
    }

    /// Belief-implied probability for a specific outcome of a binary market.
    pub fn believed_price(&self, outcome: usize) -> f64 {
        if outcome == 1 { self.belief } else { 1.0 - self.belief }
    }

    pub fn holding(&self, outcome: usize) -> f64 {
        self.holdings[outcome]
    }

    pub fn holdings(&self) -> &[f64] {
        &self.holdings
    }

    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    pub fn participations(&self) -> u32 {
        self.participations
    }

    pub fn opportunities(&self) -> u32 {
        self.opportunities
    }

    /// Adds money to the agent's budget.
    pub fn credit(&mut self, amt: f64) {
        self.budget += amt;
    }

    /// Removes money from the agent's budget.
    pub fn debit(&mut self, amt: f64) {
        self.budget -= amt;
    }

    /// Adds contracts on `outcome`; marks the agent as a participant.
    pub fn add_holding(&mut self, outcome: usize, amt: f64) {
        self.holdings[outcome] += amt;
        self.traded_this_market = true;
    }

    /// Removes contracts on `outcome`; marks the agent as a participant.
    pub fn sub_holding(&mut self, outcome: usize, amt: f64) {
        self.holdings[outcome] -= amt;
        self.traded_this_market = true;
    }

    /// Draws a fresh belief for a market whose realised outcome is `outcome`.
    ///
    /// The belief is the outcome value perturbed by `(1 - reputation) · U(0,1)`
    /// in a uniformly random direction, reflected off the `[0, 1]` boundary.
    /// High-reputation agents therefore land close to the truth; a
    /// zero-reputation agent's belief is uniform on the unit interval.
    pub fn draw_belief<R: Rng>(&mut self, outcome: usize, rng: &mut R) -> f64 {
        let target = outcome as f64;
        let noise = (1.0 - self.reputation) * rng.gen_range(0.0..1.0);
        self.belief = if rng.gen_bool(0.5) {
            if target - noise > 0.0 { target - noise } else { target + noise }
        } else if target + noise < 1.0 {
            target + noise
        } else {
            target - noise
        };
        self.belief
    }

    /// Whether the agent committed at least one trade this market.
    pub fn participated(&self) -> bool {
        self.traded_this_market
    }

    /// Whether the agent's belief would count as correct for `outcome`.
    pub fn predicted_correctly(&self, outcome: usize) -> bool {
        (self.belief - outcome as f64).abs() < 0.5
    }

    /// Closes out the current market after settlement payouts are credited.
    ///
    /// Books PnL against the initial budget, records prediction correctness
    /// for participants, recomputes reputation, and resets the per-market
    /// fields (budget, holdings, participation flag) for the next market.
    pub fn close_market(&mut self, outcome: usize) {
        self.pnl += self.budget - self.initial_budget;
        self.opportunities += 1;
        if self.traded_this_market {
            self.participations += 1;
            self.record.push_front(self.predicted_correctly(outcome));
            self.record.truncate(CORRECTNESS_WINDOW);
        }
        self.recompute_reputation();
        self.budget = self.initial_budget;
        self.holdings.fill(0.0);
        self.traded_this_market = false;
    }

    /// Reputation = `sigmoid(n) · correct / n` over the last `n` markets,
    /// `n = min(participations, CORRECTNESS_WINDOW)`; 0 with no history.
    fn recompute_reputation(&mut self) {
        let n = self.record.len();
        if self.participations == 0 || n == 0 {
            self.reputation = 0.0;
            return;
        }
        let correct = self.record.iter().filter(|&&hit| hit).count();
        self.reputation = sigmoid(n as f64) * correct as f64 / n as f64;
    }
}

/// Per-agent summary captured in settlement history records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent identifier.
    pub id: u32,
    /// Budget after payouts, before the per-market reset.
    pub budget: f64,
    /// Cumulative PnL across all settled markets.
    pub pnl: f64,
    /// Reputation after this market's correctness update.
    pub reputation: f64,
    /// Belief the agent traded on this market.
    pub belief: f64,
    /// Whether the agent traded this market.
    pub participated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_new_agent_has_zero_reputation() {
        let agent = Agent::new(0, 2, 100.0);
        assert_eq!(agent.reputation(), 0.0);
        assert_eq!(agent.holding(0), 0.0);
        assert_eq!(agent.holding(1), 0.0);
    }

    #[test]
    fn test_reputation_monotone_in_correct_predictions() {
        let better = Agent::with_history(0, 8, 10, 6, 2, 100.0);
        let worse = Agent::with_history(1, 8, 10, 3, 2, 100.0);
        assert!(
            better.reputation() >= worse.reputation(),
            "more correct predictions must not lower reputation: {} < {}",
            better.reputation(),
            worse.reputation()
        );
    }

    #[test]
    fn test_reputation_bounded_by_unit_interval() {
        let agent = Agent::with_history(0, 50, 60, 50, 2, 100.0);
        assert!(agent.reputation() > 0.0);
        assert!(agent.reputation() <= 1.0);
    }

    #[test]
    fn test_belief_stays_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut agent = Agent::new(0, 2, 50.0);
        for outcome in [0, 1, 0, 1, 1, 0, 0, 1] {
            let belief = agent.draw_belief(outcome, &mut rng);
            assert!((0.0..=1.0).contains(&belief), "belief {belief} escaped [0,1]");
        }
    }

    #[test]
    fn test_high_reputation_belief_tracks_outcome() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut agent = Agent::with_history(0, 20, 20, 20, 2, 50.0);
        let rep = agent.reputation();
        for _ in 0..50 {
            let belief = agent.draw_belief(1, &mut rng);
            // Noise is capped at (1 - rep), so the belief cannot stray further.
            assert!(belief >= 1.0 - (1.0 - rep) - 1e-12);
        }
    }

    #[test]
    fn test_close_market_records_participation_and_resets() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut agent = Agent::new(0, 2, 100.0);
        agent.draw_belief(1, &mut rng);
        agent.add_holding(1, 5.0);
        agent.debit(10.0);
        agent.credit(5.0); // settlement payout
        agent.close_market(1);

        assert_eq!(agent.participations(), 1);
        assert_eq!(agent.opportunities(), 1);
        assert!((agent.pnl() - (-5.0)).abs() < 1e-12);
        assert_eq!(agent.budget(), 100.0);
        assert_eq!(agent.holding(1), 0.0);
        assert!(!agent.participated());
    }

    #[test]
    fn test_spectator_gains_opportunity_but_no_participation() {
        let mut agent = Agent::new(0, 2, 100.0);
        agent.close_market(0);
        assert_eq!(agent.participations(), 0);
        assert_eq!(agent.opportunities(), 1);
        assert_eq!(agent.reputation(), 0.0);
    }

    #[test]
    fn test_correctness_window_drops_oldest() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut agent = Agent::new(0, 2, 100.0);
        // Trade through more markets than the window holds.
        for market in 0..(CORRECTNESS_WINDOW as u32 + 5) {
            let outcome = (market % 2) as usize;
            agent.draw_belief(outcome, &mut rng);
            agent.add_holding(outcome, 1.0);
            agent.close_market(outcome);
        }
        assert_eq!(agent.record.len(), CORRECTNESS_WINDOW);
    }
}
