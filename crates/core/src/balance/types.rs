//! Derived balance types. None of these are stored; they are computed per query.

use serde::{Deserialize, Serialize};
use splitledger_shared::types::{Currency, Money, UserId};

use crate::ledger::types::{Participant, Scope};

/// One directed contribution from a single expense: `debtor` owes `creditor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtEdge {
    /// Who owes.
    pub debtor: Participant,
    /// Who is owed.
    pub creditor: Participant,
    /// Always positive.
    pub amount: Money,
}

/// Result of decomposing one expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseAllocation {
    /// Edges between distinct participants.
    pub edges: Vec<DebtEdge>,
    /// Portion of the total that payers owed themselves. Dropped from the graph.
    pub retained: Money,
}

/// Net debt between two participants, reported from the debtor's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairwiseBalance {
    /// Who owes.
    pub debtor: Participant,
    /// Who is owed.
    pub creditor: Participant,
    /// Always positive.
    pub amount: Money,
}

/// A participant's signed balance within a scope. Positive means owed money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPosition {
    /// Scope the position belongs to.
    pub scope: Scope,
    /// Whose position.
    pub participant: Participant,
    /// Signed amount.
    pub amount: Money,
}

/// Per-participant totals within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    /// Whose totals.
    pub participant: Participant,
    /// Sum of payments made toward expenses.
    pub paid: Money,
    /// Sum of split amounts owed.
    pub owed: Money,
    /// Completed settlements paid out.
    pub sent: Money,
    /// Completed settlements received.
    pub received: Money,
    /// Net position from the balance matrix.
    pub net: Money,
}

impl ParticipantSummary {
    /// Zero totals for `participant`.
    #[must_use]
    pub const fn empty(participant: Participant, currency: Currency) -> Self {
        Self {
            participant,
            paid: Money::zero(currency),
            owed: Money::zero(currency),
            sent: Money::zero(currency),
            received: Money::zero(currency),
            net: Money::zero(currency),
        }
    }
}

/// A user's balance in one scope with its pairwise breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    /// The user.
    pub user: UserId,
    /// Net position.
    pub position: NetPosition,
    /// Totals behind the position.
    pub summary: ParticipantSummary,
    /// Balances where the user is the debtor.
    pub owes: Vec<PairwiseBalance>,
    /// Balances where the user is the creditor.
    pub owed_by: Vec<PairwiseBalance>,
}

/// One transfer of a settlement plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTransfer {
    /// Who pays.
    pub from: Participant,
    /// Who receives.
    pub to: Participant,
    /// Always positive.
    pub amount: Money,
}

/// Ordered transfers that would zero every net position in a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    /// Scope the plan settles.
    pub scope: Scope,
    /// Currency of every transfer.
    pub currency: Currency,
    /// Transfers in the order they were chosen.
    pub transactions: Vec<PlannedTransfer>,
}

impl SettlementPlan {
    /// Returns true if nothing needs to move.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.transactions.is_empty()
    }
}
