//! Pure budgeting arithmetic. Nothing in here touches storage or the network.

pub mod allocation;
pub mod gamification;
pub mod goals;
pub mod surplus;

pub use allocation::{
    check_transaction, debit_expense, distribute_income, normalize_amount, rebalance, round_cents, validate_categories,
    Balances, MAX_AMOUNT,
};
pub use gamification::{rank_for, rank_progress, Badge, Rank, RankProgress};
pub use goals::PayoffPlan;
pub use surplus::{plan_income, split_surplus, IncomePlan, SurplusSplit};
