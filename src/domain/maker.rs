//! Cost-function market makers (logarithmic scoring rule family).
//!
//! All three variants share the aggregate cost
//! `C(s) = β · ln(Σ_i exp(g_i(s_i)/β))`; the cost of a trade is the finite
//! difference of `C` and the instantaneous price is the softmax of `g/β`.
//! They differ in the per-outcome transform `g`:
//!
//! - `PlainScoringRule`: `g` is the identity over net quantity traded.
//! - `ReputationWeighted`: `g` blends quantity with the average reputation
//!   per contract, so who holds a position moves its price, not just how
//!   much of it is held.
//! - `FeeAugmented`: identity transform plus a reputation-discounted fee on
//!   every trade.
//!
//! Trades are computed hypothetically first and committed only once every
//! check passes, so a failed buy or sell never leaves partial state behind.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::agent::Agent;
use super::scoring::{log_sum_exp, softmax, softmax_at};

/// Which pricing rule a [`MarketMaker`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MakerKind {
    /// Plain logarithmic scoring rule over net quantities.
    PlainScoringRule,
    /// Scoring rule over a quantity/reputation blend.
    ReputationWeighted,
    /// Plain scoring rule plus reputation-discounted trading fees.
    FeeAugmented,
}

impl fmt::Display for MakerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlainScoringRule => write!(f, "plain-scoring-rule"),
            Self::ReputationWeighted => write!(f, "reputation-weighted"),
            Self::FeeAugmented => write!(f, "fee-augmented"),
        }
    }
}

/// Immutable tuning constants shared by all maker variants.
///
/// `contract_weight` only matters for [`MakerKind::ReputationWeighted`]
/// and `base_fee_rate` only for [`MakerKind::FeeAugmented`]; the others
/// ignore them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MakerParams {
    /// Liquidity parameter β: price movement per unit traded.
    pub beta: f64,
    /// Weight `c` of raw quantity vs average reputation in the blend.
    pub contract_weight: f64,
    /// Base fee rate applied before the reputation discount.
    pub base_fee_rate: f64,
}

impl Default for MakerParams {
    fn default() -> Self {
        Self {
            beta: 1.0,
            contract_weight: 0.5,
            base_fee_rate: 0.05,
        }
    }
}

/// Reputation-weighted per-outcome state: contracts sold plus the
/// reputation mass of their buyers.
#[derive(Debug, Clone, Copy)]
struct WeightedOutcome {
    quantity: f64,
    rep_sum: f64,
}

#[derive(Debug, Clone)]
enum MakerState {
    /// Net quantity traded per outcome (plain and fee variants).
    Scalar(Vec<f64>),
    /// `(quantity, reputation mass)` per outcome (reputation variant).
    Weighted(Vec<WeightedOutcome>),
}

/// A cost-function automated market maker for one prediction market.
///
/// Created fresh per market; state never carries over between markets.
/// The maker exclusively owns its state vector — mutation happens only
/// through [`buy`](Self::buy) and [`sell`](Self::sell) (and the sizing
/// operations built on them), which preserves the pricing invariants.
#[derive(Debug, Clone)]
pub struct MarketMaker {
    kind: MakerKind,
    params: MakerParams,
    state: MakerState,
}

impl MarketMaker {
    /// Creates a maker of the given kind with a neutral initial state
    /// (uniform prices across all outcomes).
    ///
    /// # Panics
    /// Panics on fewer than two outcomes, non-positive β, a contract
    /// weight outside `(0, 1)`, or a base fee rate outside `[0, 1)`.
    pub fn create(kind: MakerKind, num_outcomes: usize, params: MakerParams) -> Self {
        assert!(num_outcomes >= 2, "a market needs at least two outcomes");
        assert!(params.beta > 0.0, "liquidity parameter beta must be positive");
        assert!(
            params.contract_weight > 0.0 && params.contract_weight < 1.0,
            "contract_weight must lie strictly inside (0, 1)"
        );
        assert!(
            (0.0..1.0).contains(&params.base_fee_rate),
            "base_fee_rate must lie in [0, 1)"
        );

        let state = match kind {
            MakerKind::PlainScoringRule | MakerKind::FeeAugmented => {
                MakerState::Scalar(vec![0.0; num_outcomes])
            }
            MakerKind::ReputationWeighted => MakerState::Weighted(vec![
                WeightedOutcome {
                    quantity: 1.0,
                    rep_sum: 0.0,
                };
                num_outcomes
            ]),
        };

        Self { kind, params, state }
    }

    /// Plain scoring-rule maker with liquidity β.
    pub fn plain(num_outcomes: usize, beta: f64) -> Self {
        Self::create(
            MakerKind::PlainScoringRule,
            num_outcomes,
            MakerParams { beta, ..MakerParams::default() },
        )
    }

    /// Reputation-weighted maker with liquidity β and blend weight `c`.
    pub fn reputation_weighted(num_outcomes: usize, beta: f64, contract_weight: f64) -> Self {
        Self::create(
            MakerKind::ReputationWeighted,
            num_outcomes,
            MakerParams { beta, contract_weight, ..MakerParams::default() },
        )
    }

    /// Fee-augmented maker with liquidity β and the given base fee rate.
    pub fn fee_augmented(num_outcomes: usize, beta: f64, base_fee_rate: f64) -> Self {
        Self::create(
            MakerKind::FeeAugmented,
            num_outcomes,
            MakerParams { beta, base_fee_rate, ..MakerParams::default() },
        )
    }

    pub fn kind(&self) -> MakerKind {
        self.kind
    }

    pub fn params(&self) -> MakerParams {
        self.params
    }

    pub fn num_outcomes(&self) -> usize {
        match &self.state {
            MakerState::Scalar(q) => q.len(),
            MakerState::Weighted(w) => w.len(),
        }
    }

    /// Raw pricing-engine state `g_o` for external logging.
    ///
    /// The scalar variants report net quantity traded; the reputation
    /// variant reports the blended quantity/reputation value that actually
    /// enters the exponent.
    pub fn state(&self, outcome: usize) -> f64 {
        match &self.state {
            MakerState::Scalar(q) => q[outcome],
            MakerState::Weighted(w) => self.blend(&w[outcome]),
        }
    }

    /// Instantaneous price of `outcome`: the softmax weight of `g_o/β`.
    pub fn price(&self, outcome: usize) -> f64 {
        softmax_at(&self.scaled_scores(), outcome)
    }

    /// Prices for all outcomes; sums to 1 by construction.
    pub fn prices(&self) -> Vec<f64> {
        softmax(&self.scaled_scores())
    }

    /// Cost of trading `amt` contracts (negative for a sale) on `outcome`
    /// by a trader with reputation `rep`, without mutating any state.
    ///
    /// Positive for a net purchase, negative for a net sale. A non-finite
    /// result marks a trade the maker must reject (e.g. selling the
    /// reputation variant's quantity to exactly zero).
    pub fn trade_cost(&self, outcome: usize, amt: f64, rep: f64) -> f64 {
        let before = self.aggregate_cost(&self.scaled_scores());
        let after = self.aggregate_cost(&self.scaled_scores_after(outcome, amt, rep));
        after - before
    }

    /// Price of `outcome` after a hypothetical trade of `amt` on it.
    pub fn price_after(&self, outcome: usize, amt: f64, rep: f64) -> f64 {
        softmax_at(&self.scaled_scores_after(outcome, amt, rep), outcome)
    }

    /// Fee charged on top of `cost` for a trader with reputation `rep`.
    ///
    /// Zero for all variants except [`MakerKind::FeeAugmented`], where
    /// higher reputation earns a proportional discount. `cost` is the
    /// non-negative leg of the trade, so the fee is never negative.
    pub fn fee(&self, cost: f64, rep: f64) -> f64 {
        match self.kind {
            MakerKind::FeeAugmented => cost.max(0.0) * self.params.base_fee_rate * (1.0 - rep),
            _ => 0.0,
        }
    }

    /// Executes a buy of `amt` contracts on `outcome` for `buyer`.
    ///
    /// Fails (returning `false`, with no side effects) when the amount or
    /// resulting cost is non-finite, or when the total debit — cost plus
    /// fee — exceeds the buyer's budget. On success the state is committed,
    /// the buyer pays `cost + fee` and receives the contracts.
    pub fn buy(&mut self, buyer: &mut Agent, amt: f64, outcome: usize) -> bool {
        if amt == 0.0 {
            return true;
        }
        if !amt.is_finite() {
            debug!(agent = buyer.id(), amt, "rejected buy of non-finite amount");
            return false;
        }

        let rep = buyer.reputation();
        let cost = self.trade_cost(outcome, amt, rep);
        if !cost.is_finite() {
            debug!(agent = buyer.id(), amt, outcome, "rejected buy with non-finite cost");
            return false;
        }

        let fee = self.fee(cost, rep);
        if cost + fee > buyer.budget() {
            debug!(
                agent = buyer.id(),
                amt,
                cost,
                fee,
                budget = buyer.budget(),
                "buy failed: insufficient budget"
            );
            return false;
        }

        self.apply(outcome, amt, rep);
        buyer.debit(cost + fee);
        buyer.add_holding(outcome, amt);
        debug!(agent = buyer.id(), amt, outcome, cost, fee, "contracts bought");
        true
    }

    /// Executes a sale of `amt` contracts on `outcome` for `seller`.
    ///
    /// Fails (returning `false`, with no side effects) when `amt` is
    /// negative or non-finite, when the seller holds fewer than `amt`
    /// contracts, or when the symmetric cost is non-finite. On success the
    /// seller receives `|cost| - fee` and the holdings are decremented.
    pub fn sell(&mut self, seller: &mut Agent, amt: f64, outcome: usize) -> bool {
        if amt == 0.0 {
            return true;
        }
        if !amt.is_finite() || amt < 0.0 {
            debug!(agent = seller.id(), amt, "rejected sell of invalid amount");
            return false;
        }
        if seller.holding(outcome) < amt {
            debug!(
                agent = seller.id(),
                amt,
                outcome,
                held = seller.holding(outcome),
                "sell failed: insufficient holdings"
            );
            return false;
        }

        let rep = seller.reputation();
        let cost = self.trade_cost(outcome, -amt, rep);
        if !cost.is_finite() {
            debug!(agent = seller.id(), amt, outcome, "rejected sell with non-finite cost");
            return false;
        }

        let proceeds = -cost;
        let fee = self.fee(proceeds, rep);
        self.apply(outcome, -amt, rep);
        seller.credit(proceeds - fee);
        seller.sub_holding(outcome, amt);
        debug!(agent = seller.id(), amt, outcome, proceeds, fee, "contracts sold");
        true
    }

    /// Blended transform for the reputation variant:
    /// `c·q + (1−c)·(rep_sum/q)`.
    fn blend(&self, outcome: &WeightedOutcome) -> f64 {
        let c = self.params.contract_weight;
        c * outcome.quantity + (1.0 - c) * (outcome.rep_sum / outcome.quantity)
    }

    /// `g_i / β` for every outcome in the current state.
    pub(crate) fn scaled_scores(&self) -> Vec<f64> {
        let beta = self.params.beta;
        match &self.state {
            MakerState::Scalar(q) => q.iter().map(|s| s / beta).collect(),
            MakerState::Weighted(w) => w.iter().map(|o| self.blend(o) / beta).collect(),
        }
    }

    /// `g_i / β` after a hypothetical trade of `amt` on `outcome`.
    fn scaled_scores_after(&self, outcome: usize, amt: f64, rep: f64) -> Vec<f64> {
        let beta = self.params.beta;
        let mut scores = self.scaled_scores();
        scores[outcome] = match &self.state {
            MakerState::Scalar(q) => (q[outcome] + amt) / beta,
            MakerState::Weighted(w) => {
                let moved = WeightedOutcome {
                    quantity: w[outcome].quantity + amt,
                    rep_sum: w[outcome].rep_sum + rep * amt,
                };
                self.blend(&moved) / beta
            }
        };
        scores
    }

    /// `C(s) = β · ln(Σ exp(g_i/β))` over pre-scaled scores.
    fn aggregate_cost(&self, scaled: &[f64]) -> f64 {
        self.params.beta * log_sum_exp(scaled)
    }

    /// Commits a trade of `amt` on `outcome` to the state vector.
    fn apply(&mut self, outcome: usize, amt: f64, rep: f64) {
        match &mut self.state {
            MakerState::Scalar(q) => q[outcome] += amt,
            MakerState::Weighted(w) => {
                w[outcome].quantity += amt;
                w[outcome].rep_sum += rep * amt;
            }
        }
    }

    /// Reputation-variant internals needed by the sizing inversion.
    pub(crate) fn weighted_entry(&self, outcome: usize) -> Option<(f64, f64)> {
        match &self.state {
            MakerState::Weighted(w) => Some((w[outcome].quantity, w[outcome].rep_sum)),
            MakerState::Scalar(_) => None,
        }
    }

    /// Scalar-variant net quantity, `None` for the reputation variant.
    pub(crate) fn scalar_entry(&self, outcome: usize) -> Option<f64> {
        match &self.state {
            MakerState::Scalar(q) => Some(q[outcome]),
            MakerState::Weighted(_) => None,
        }
    }
}
