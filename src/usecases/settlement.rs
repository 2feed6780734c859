//! Settlement Use Case - Market Close
//!
//! When a market closes, every contract on the realised outcome redeems
//! for one unit of currency. Settlement then rolls each agent forward:
//! book PnL against the initial budget, record prediction correctness for
//! participants, recompute reputation, and reset per-market state.
//! Reputation and the correctness window are the only agent state that
//! survives into the next market.

use tracing::info;

use crate::domain::agent::{Agent, AgentSnapshot};
use crate::domain::maker::MakerKind;
use crate::ports::history::SettlementRecord;

/// Redemption value of one contract on the realised outcome.
pub const CONTRACT_PAYOUT: f64 = 1.0;

/// Settles a closed market: pays out winning holdings and rolls every
/// agent's reputation state forward. Returns the settlement summary for
/// history logging.
pub fn settle_market(
    agents: &mut [Agent],
    maker: MakerKind,
    market: u32,
    outcome: usize,
) -> SettlementRecord {
    let mut snapshots = Vec::with_capacity(agents.len());
    let mut total_payout = 0.0;

    for agent in agents.iter_mut() {
        let payout = agent.holding(outcome) * CONTRACT_PAYOUT;
        agent.credit(payout);
        total_payout += payout;

        let participated = agent.participated();
        let belief = agent.belief();
        let budget = agent.budget();
        agent.close_market(outcome);

        snapshots.push(AgentSnapshot {
            id: agent.id(),
            budget,
            pnl: agent.pnl(),
            reputation: agent.reputation(),
            belief,
            participated,
        });
    }

    info!(
        market,
        outcome,
        total_payout,
        participants = snapshots.iter().filter(|s| s.participated).count(),
        "market settled"
    );

    SettlementRecord {
        market,
        maker,
        outcome,
        total_payout,
        agents: snapshots,
    }
}
