//! Target-price trade sizing: inverting the cost function.
//!
//! Given a target price for one outcome, these operations compute the
//! quantity an agent must trade to move the market there. The fallback
//! chain is explicit and ordered (no exceptions as control flow):
//!
//! 1. Closed-form inversion of the pricing function — a softmax inversion
//!    for the scalar variants, a quadratic root for the reputation-weighted
//!    blend.
//! 2. On budget failure, a closed-form budget-exhausting buy (scalar
//!    variants only; the blended cost has no such closed form).
//! 3. A bounded binary search over candidate quantities, probing the
//!    hypothetical (non-committing) cost and price until the price lands
//!    within [`PRICE_TOLERANCE`] of the target or the bracket collapses.
//!
//! Every stage validates its domain (target strictly inside `(0, 1)`,
//! finite quantities, non-negative discriminants) before anything commits,
//! and a failed stage leaves the market state untouched.

use thiserror::Error;
use tracing::debug;

use super::agent::Agent;
use super::maker::{MakerKind, MarketMaker};
use super::scoring::{log_sum_exp, logit};

/// Sizing commits a quantity once the post-trade price is within this
/// distance of the target.
pub const PRICE_TOLERANCE: f64 = 0.01;

/// Iteration bound for bracketing and bisection in the fallback search.
const SEARCH_ITERATIONS: usize = 64;

/// How a sizing request was resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizedTrade {
    /// The closed-form quantity was committed at the requested target.
    Exact { quantity: f64 },
    /// Budget or holdings capped the trade below the ideal quantity.
    Constrained { quantity: f64 },
    /// The inversion produced a non-positive quantity: reaching the target
    /// would require trading in the other direction. Nothing committed;
    /// carries the (non-positive) computed value as a signal.
    NoOp { quantity: f64 },
}

impl SizedTrade {
    /// The quantity actually committed to the market (0 for a no-op).
    pub fn committed(&self) -> f64 {
        match self {
            Self::Exact { quantity } | Self::Constrained { quantity } => *quantity,
            Self::NoOp { .. } => 0.0,
        }
    }

    /// The quantity the sizing computation produced, committed or not.
    pub fn quantity(&self) -> f64 {
        match self {
            Self::Exact { quantity }
            | Self::Constrained { quantity }
            | Self::NoOp { quantity } => *quantity,
        }
    }
}

/// Failures surfaced by the sizing fallback chain.
///
/// All of these leave the market state unchanged; the caller decides
/// whether to skip the trade or abort the run.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SizingError {
    /// Target prices of 0 and 1 are unreachable with finite liquidity and
    /// anything outside `[0, 1]` is not a probability.
    #[error("target price {target} for outcome {outcome} is outside (0, 1)")]
    TargetOutOfRange { outcome: usize, target: f64 },
    /// The inversion formula produced NaN or an infinity.
    #[error("sizing for outcome {outcome} produced a non-finite quantity")]
    NonFiniteQuantity { outcome: usize },
    /// Neither the closed forms nor the bounded search found a committable
    /// quantity: a pricing defect or an extreme market state.
    #[error("no committable quantity reaches price {target} on outcome {outcome}")]
    Unsolvable { outcome: usize, target: f64 },
}

impl MarketMaker {
    /// Buys contracts on `outcome` until its price reaches `target`, or as
    /// close as the agent's budget allows.
    ///
    /// Returns the tagged sizing outcome; on [`SizedTrade::NoOp`] (target at
    /// or below the current price) nothing is committed. Errors likewise
    /// guarantee an untouched market state.
    pub fn buy_till_price(
        &mut self,
        agent: &mut Agent,
        outcome: usize,
        target: f64,
    ) -> Result<SizedTrade, SizingError> {
        validate_target(outcome, target)?;
        let rep = agent.reputation();

        if let Some(qty) = self.target_buy_quantity(outcome, target, rep) {
            if !qty.is_finite() {
                return Err(SizingError::NonFiniteQuantity { outcome });
            }
            if qty <= 0.0 {
                return Ok(SizedTrade::NoOp { quantity: qty });
            }
            if self.buy(agent, qty, outcome) {
                return Ok(SizedTrade::Exact { quantity: qty });
            }
            debug!(
                qty,
                target,
                budget = agent.budget(),
                "closed-form buy unaffordable, trying budget-exhausting form"
            );
            if let Some(capped) = self.budget_exhausting_buy(outcome, rep, agent.budget()) {
                if self.buy(agent, capped, outcome) {
                    return Ok(SizedTrade::Constrained { quantity: capped });
                }
            }
        } else {
            debug!(outcome, target, "closed-form inversion has no root, using search");
        }

        if let Some(qty) = self.search_buy_quantity(outcome, target, rep, agent.budget()) {
            if self.buy(agent, qty, outcome) {
                return Ok(SizedTrade::Constrained { quantity: qty });
            }
        }
        Err(SizingError::Unsolvable { outcome, target })
    }

    /// Sells contracts on `outcome` until its price falls to `target`,
    /// clamped to what the agent actually holds.
    ///
    /// A negative computed quantity (the market already prices `outcome`
    /// below `target`) is returned as [`SizedTrade::NoOp`] without touching
    /// state — a defined signal, not an error.
    pub fn sell_till_price(
        &mut self,
        agent: &mut Agent,
        outcome: usize,
        target: f64,
    ) -> Result<SizedTrade, SizingError> {
        validate_target(outcome, target)?;
        let rep = agent.reputation();

        let qty = match self.target_sell_quantity(outcome, target, rep) {
            Some(qty) if !qty.is_finite() => {
                return Err(SizingError::NonFiniteQuantity { outcome });
            }
            Some(qty) => qty,
            None => {
                debug!(outcome, target, "sell inversion has no root, using search");
                match self.search_sell_quantity(outcome, target, rep, agent.holding(outcome)) {
                    Some(qty) => qty,
                    None => return Err(SizingError::Unsolvable { outcome, target }),
                }
            }
        };

        if qty <= 0.0 {
            return Ok(SizedTrade::NoOp { quantity: qty });
        }

        let committed = qty.min(agent.holding(outcome));
        if self.sell(agent, committed, outcome) {
            if committed < qty {
                Ok(SizedTrade::Constrained { quantity: committed })
            } else {
                Ok(SizedTrade::Exact { quantity: committed })
            }
        } else {
            Err(SizingError::Unsolvable { outcome, target })
        }
    }

    /// Closed-form buy quantity that moves `outcome` to `target`.
    ///
    /// Scalar variants invert the softmax directly:
    /// `amt = β·ln((p/(1−p))·Σ_{i≠o} exp(s_i/β)) − s_o`.
    /// The reputation variant solves the blended quadratic; `None` when the
    /// quadratic has no usable root.
    fn target_buy_quantity(&self, outcome: usize, target: f64, rep: f64) -> Option<f64> {
        match self.scalar_entry(outcome) {
            Some(s_o) => {
                let beta = self.params().beta;
                let lse_other = self.log_sum_exp_other(outcome);
                Some(beta * (logit(target) + lse_other) - s_o)
            }
            None => {
                let (q0, _) = self.weighted_entry(outcome)?;
                self.weighted_target_root(outcome, target, rep).map(|u| u - q0)
            }
        }
    }

    /// Closed-form sell quantity; mirror image of the buy inversion.
    fn target_sell_quantity(&self, outcome: usize, target: f64, rep: f64) -> Option<f64> {
        match self.scalar_entry(outcome) {
            Some(s_o) => {
                let beta = self.params().beta;
                let lse_other = self.log_sum_exp_other(outcome);
                Some(s_o - beta * (logit(target) + lse_other))
            }
            None => {
                let (q0, _) = self.weighted_entry(outcome)?;
                self.weighted_target_root(outcome, target, rep).map(|u| q0 - u)
            }
        }
    }

    /// Root of the reputation-weighted inversion.
    ///
    /// With `u` the outcome's quantity after the trade, `c` the contract
    /// weight, `r` the trader's reputation and
    /// `K = β·ln((p/(1−p))·Σ_{i≠o} exp(g_i/β))`, requiring the post-trade
    /// blend to equal `K` gives
    /// `c·u² + ((1−c)·r − K)·u + (1−c)·(rep_sum − r·q₀) = 0`.
    /// The larger root is the economically meaningful one (`u > 0` keeps
    /// the average-reputation term defined). The same root serves buys and
    /// sells; only the direction `u − q₀` vs `q₀ − u` differs.
    fn weighted_target_root(&self, outcome: usize, target: f64, rep: f64) -> Option<f64> {
        let (q0, rep_sum) = self.weighted_entry(outcome)?;
        let beta = self.params().beta;
        let c = self.params().contract_weight;
        let k = beta * (logit(target) + self.log_sum_exp_other(outcome));

        let b = (1.0 - c) * rep - k;
        let d = (1.0 - c) * (rep_sum - rep * q0);
        let discriminant = b * b - 4.0 * c * d;
        if discriminant < 0.0 {
            return None;
        }
        let u = (-b + discriminant.sqrt()) / (2.0 * c);
        (u.is_finite() && u > 0.0).then_some(u)
    }

    /// Quantity whose total cost (including any fee) equals `budget`,
    /// for the scalar variants. `None` for the reputation variant or when
    /// the arithmetic degenerates.
    fn budget_exhausting_buy(&self, outcome: usize, rep: f64, budget: f64) -> Option<f64> {
        let s_o = self.scalar_entry(outcome)?;
        let beta = self.params().beta;

        // The fee scales the affordable cost down: cost·(1 + φ) = budget.
        let fee_mult = match self.kind() {
            MakerKind::FeeAugmented => self.params().base_fee_rate * (1.0 - rep),
            _ => 0.0,
        };
        let spend = budget / (1.0 + fee_mult);

        // Solve C(s + δ·e_o) − C(s) = spend in max-shifted space.
        let scores = self.scaled_scores();
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum_all: f64 = scores.iter().map(|x| (x - max).exp()).sum();
        let sum_other = sum_all - (scores[outcome] - max).exp();
        let arg = (spend / beta).exp() * sum_all - sum_other;
        if arg <= 0.0 {
            return None;
        }
        let delta = beta * (max + arg.ln()) - s_o;
        (delta.is_finite() && delta >= 0.0).then_some(delta)
    }

    /// Largest buy quantity that stays affordable and does not overshoot
    /// the target price, found by bracketing plus bisection over the
    /// hypothetical cost/price functions.
    fn search_buy_quantity(
        &self,
        outcome: usize,
        target: f64,
        rep: f64,
        budget: f64,
    ) -> Option<f64> {
        let feasible = |qty: f64| {
            let cost = self.trade_cost(outcome, qty, rep);
            cost.is_finite()
                && cost + self.fee(cost, rep) <= budget
                && self.price_after(outcome, qty, rep) <= target
        };

        let mut hi = 1.0;
        let mut expansions = 0;
        while feasible(hi) && expansions < SEARCH_ITERATIONS {
            hi *= 2.0;
            expansions += 1;
        }

        let mut lo = 0.0;
        for _ in 0..SEARCH_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if feasible(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
            if (self.price_after(outcome, lo, rep) - target).abs() <= PRICE_TOLERANCE {
                break;
            }
        }
        (lo > 0.0).then_some(lo)
    }

    /// Sell-side counterpart of [`search_buy_quantity`], bounded by the
    /// agent's holdings instead of the budget.
    fn search_sell_quantity(
        &self,
        outcome: usize,
        target: f64,
        rep: f64,
        holdings: f64,
    ) -> Option<f64> {
        if holdings <= 0.0 {
            return None;
        }
        let feasible = |qty: f64| {
            let cost = self.trade_cost(outcome, -qty, rep);
            cost.is_finite() && self.price_after(outcome, -qty, rep) >= target
        };

        let mut lo = 0.0;
        let mut hi = holdings;
        for _ in 0..SEARCH_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if feasible(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
            if (self.price_after(outcome, -lo, rep) - target).abs() <= PRICE_TOLERANCE {
                break;
            }
        }
        (lo > 0.0).then_some(lo)
    }

    /// `ln Σ_{i≠o} exp(g_i/β)` over the current state.
    fn log_sum_exp_other(&self, outcome: usize) -> f64 {
        let scores = self.scaled_scores();
        let others: Vec<f64> = scores
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != outcome)
            .map(|(_, x)| *x)
            .collect();
        log_sum_exp(&others)
    }
}

fn validate_target(outcome: usize, target: f64) -> Result<(), SizingError> {
    if target > 0.0 && target < 1.0 {
        Ok(())
    } else {
        Err(SizingError::TargetOutOfRange { outcome, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::Agent;

    #[test]
    fn test_buy_till_price_hits_target_plain() {
        let mut maker = MarketMaker::plain(2, 1.0);
        let mut agent = Agent::new(0, 2, 1_000.0);
        let result = maker.buy_till_price(&mut agent, 0, 0.75).unwrap();
        assert!(matches!(result, SizedTrade::Exact { .. }));
        assert!(
            (maker.price(0) - 0.75).abs() < 1e-9,
            "price should land on target, got {}",
            maker.price(0)
        );
    }

    #[test]
    fn test_buy_till_price_hits_target_with_skewed_state() {
        let mut maker = MarketMaker::plain(2, 2.5);
        let mut mover = Agent::new(0, 2, 10_000.0);
        assert!(maker.buy(&mut mover, 4.0, 1));

        let mut agent = Agent::new(1, 2, 10_000.0);
        maker.buy_till_price(&mut agent, 0, 0.6).unwrap();
        assert!((maker.price(0) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_buy_till_price_hits_target_fee_variant() {
        // The fee changes what the buyer pays, not where the state lands.
        let mut maker = MarketMaker::fee_augmented(2, 1.0, 0.05);
        let mut agent = Agent::new(0, 2, 1_000.0);
        maker.buy_till_price(&mut agent, 1, 0.8).unwrap();
        assert!((maker.price(1) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_buy_till_price_hits_target_reputation_variant() {
        let mut maker = MarketMaker::reputation_weighted(2, 1.0, 0.5);
        let mut agent = Agent::with_history(0, 6, 8, 4, 2, 1_000.0);
        let result = maker.buy_till_price(&mut agent, 0, 0.7).unwrap();
        assert!(matches!(result, SizedTrade::Exact { .. }));
        assert!(
            (maker.price(0) - 0.7).abs() < 1e-9,
            "quadratic inversion should land on target, got {}",
            maker.price(0)
        );
    }

    #[test]
    fn test_buy_till_price_rejects_degenerate_targets() {
        let mut maker = MarketMaker::plain(2, 1.0);
        let mut agent = Agent::new(0, 2, 100.0);
        for target in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            let err = maker.buy_till_price(&mut agent, 0, target).unwrap_err();
            assert!(matches!(err, SizingError::TargetOutOfRange { .. }));
        }
        assert_eq!(maker.state(0), 0.0, "rejected sizing must not move state");
    }

    #[test]
    fn test_buy_till_price_below_market_is_noop() {
        let mut maker = MarketMaker::plain(2, 1.0);
        let mut agent = Agent::new(0, 2, 100.0);
        let result = maker.buy_till_price(&mut agent, 0, 0.3).unwrap();
        match result {
            SizedTrade::NoOp { quantity } => assert!(quantity < 0.0),
            other => panic!("expected no-op, got {other:?}"),
        }
        assert_eq!(maker.state(0), 0.0);
        assert_eq!(agent.budget(), 100.0);
    }

    #[test]
    fn test_budget_capped_buy_spends_at_most_the_budget() {
        // Budget 5, β = 1, both outcomes at state 0 (prices 0.5/0.5).
        let mut maker = MarketMaker::plain(2, 1.0);
        let mut agent = Agent::new(0, 2, 5.0);
        let result = maker.buy_till_price(&mut agent, 0, 0.99).unwrap();
        assert!(result.committed() > 0.0);
        assert!(
            agent.budget() >= 0.0,
            "committed cost may never exceed the budget, left {}",
            agent.budget()
        );
        assert!(maker.price(0) <= 0.99 + PRICE_TOLERANCE);
    }

    #[test]
    fn test_budget_capped_buy_exhausts_tight_budget() {
        let mut maker = MarketMaker::plain(2, 1.0);
        let mut agent = Agent::new(0, 2, 2.0);
        let result = maker.buy_till_price(&mut agent, 0, 0.99).unwrap();
        assert!(matches!(result, SizedTrade::Constrained { .. }));
        assert!(agent.budget() >= 0.0);
        // The budget-exhausting form should leave almost nothing on the table.
        assert!(
            agent.budget() < 1e-6,
            "constrained buy should spend the whole budget, left {}",
            agent.budget()
        );
        assert!(maker.price(0) < 0.99);
    }

    #[test]
    fn test_budget_capped_buy_fee_variant_covers_fee() {
        let mut maker = MarketMaker::fee_augmented(2, 1.0, 0.05);
        let mut agent = Agent::new(0, 2, 2.0);
        maker.buy_till_price(&mut agent, 0, 0.99).unwrap();
        assert!(
            agent.budget() >= -1e-12,
            "cost plus fee must fit in the budget, left {}",
            agent.budget()
        );
    }

    #[test]
    fn test_reputation_variant_budget_fallback_uses_search() {
        let mut maker = MarketMaker::reputation_weighted(2, 1.0, 0.5);
        let mut agent = Agent::new(0, 2, 0.75);
        let result = maker.buy_till_price(&mut agent, 0, 0.95).unwrap();
        assert!(matches!(result, SizedTrade::Constrained { .. }));
        assert!(agent.budget() >= 0.0);
        assert!(maker.price(0) < 0.95);
        assert!(agent.holding(0) > 0.0);
    }

    #[test]
    fn test_sell_till_price_returns_to_target() {
        let mut maker = MarketMaker::plain(2, 1.0);
        let mut agent = Agent::new(0, 2, 1_000.0);
        maker.buy_till_price(&mut agent, 0, 0.8).unwrap();
        let result = maker.sell_till_price(&mut agent, 0, 0.6).unwrap();
        assert!(matches!(result, SizedTrade::Exact { .. }));
        assert!((maker.price(0) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_sell_till_price_negative_quantity_is_noop() {
        // Price is 0.5; a sale cannot raise it to 0.9.
        let mut maker = MarketMaker::plain(2, 1.0);
        let mut agent = Agent::new(0, 2, 100.0);
        agent.add_holding(0, 5.0);
        let result = maker.sell_till_price(&mut agent, 0, 0.9).unwrap();
        match result {
            SizedTrade::NoOp { quantity } => assert!(quantity < 0.0),
            other => panic!("expected no-op, got {other:?}"),
        }
        assert_eq!(agent.holding(0), 5.0);
        assert_eq!(maker.state(0), 0.0);
    }

    #[test]
    fn test_sell_till_price_clamped_to_holdings() {
        let mut maker = MarketMaker::plain(2, 1.0);
        let mut whale = Agent::new(0, 2, 10_000.0);
        maker.buy_till_price(&mut whale, 0, 0.9).unwrap();

        // A small holder cannot push the price all the way back down.
        let mut minnow = Agent::new(1, 2, 100.0);
        minnow.add_holding(0, 0.5);
        let result = maker.sell_till_price(&mut minnow, 0, 0.5).unwrap();
        match result {
            SizedTrade::Constrained { quantity } => {
                assert!((quantity - 0.5).abs() < 1e-12);
            }
            other => panic!("expected holdings-constrained sale, got {other:?}"),
        }
        assert_eq!(minnow.holding(0), 0.0);
        assert!(maker.price(0) > 0.5);
    }

    #[test]
    fn test_sell_till_price_reputation_variant() {
        let mut maker = MarketMaker::reputation_weighted(2, 1.0, 0.5);
        let mut agent = Agent::with_history(0, 10, 12, 7, 2, 1_000.0);
        maker.buy_till_price(&mut agent, 0, 0.85).unwrap();
        maker.sell_till_price(&mut agent, 0, 0.65).unwrap();
        assert!(
            (maker.price(0) - 0.65).abs() < 1e-9,
            "weighted sell inversion should land on target, got {}",
            maker.price(0)
        );
    }

    #[test]
    fn test_sizing_reports_quantity_actually_committed() {
        let mut maker = MarketMaker::plain(2, 1.0);
        let mut agent = Agent::new(0, 2, 1_000.0);
        let result = maker.buy_till_price(&mut agent, 0, 0.75).unwrap();
        assert!(
            (result.committed() - agent.holding(0)).abs() < 1e-12,
            "reported quantity must match the holdings delta"
        );
    }
}
