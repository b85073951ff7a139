//! Balance computation: the read side of the ledger.
//!
//! - Pairwise allocation of single expenses into debt edges
//! - Aggregation of a scope's history into a balance matrix and net positions
//! - Greedy debt simplification into a settlement plan
//! - Balance service with an optional revision-keyed cache

pub mod cache;
pub mod matrix;
pub mod pairwise;
pub mod service;
pub mod simplify;
pub mod types;

#[cfg(test)]
mod props;

pub use cache::BalanceCache;
pub use matrix::{BalanceMatrix, ScopeLedger};
pub use pairwise::allocate_expense;
pub use service::BalanceService;
pub use simplify::simplify;
pub use types::{
    DebtEdge, ExpenseAllocation, NetPosition, PairwiseBalance, ParticipantSummary,
    PlannedTransfer, SettlementPlan, UserBalance,
};
