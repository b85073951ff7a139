//! Debt simplification by greedy largest-pair matching.
//!
//! Repeatedly settles the largest remaining debtor against the largest remaining
//! creditor, ties going to the smaller participant. Each step zeroes at least one
//! party, so `N` non-zero positions need at most `N - 1` transfers. The result is
//! deterministic but not guaranteed to be the global minimum transfer count.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use splitledger_shared::types::{Currency, Money};
use tracing::{debug, error};

use super::types::{NetPosition, PlannedTransfer, SettlementPlan};
use crate::ledger::error::LedgerError;
use crate::ledger::types::{Participant, Scope};

/// Builds the settlement plan for a set of net positions.
///
/// # Errors
///
/// Returns `InvariantViolation` if the positions do not sum to exactly zero or
/// mix currencies. The plan is never built from inconsistent input.
pub fn simplify(
    scope: Scope,
    currency: Currency,
    positions: &[NetPosition],
) -> Result<SettlementPlan, LedgerError> {
    let mut sum = 0_i128;
    let mut creditors = BinaryHeap::new();
    let mut debtors = BinaryHeap::new();

    for position in positions {
        if position.amount.currency != currency {
            return Err(violation(
                scope,
                &format!("position of {} is in {}", position.participant, position.amount.currency),
            ));
        }
        let minor = position.amount.minor;
        sum += i128::from(minor);
        match minor.cmp(&0) {
            std::cmp::Ordering::Greater => {
                creditors.push(entry(minor.unsigned_abs(), position.participant));
            }
            std::cmp::Ordering::Less => {
                debtors.push(entry(minor.unsigned_abs(), position.participant));
            }
            std::cmp::Ordering::Equal => {}
        }
    }

    if sum != 0 {
        return Err(violation(scope, &format!("net positions sum to {sum} minor units")));
    }

    let mut transactions = Vec::new();
    while !creditors.is_empty() && !debtors.is_empty() {
        let (Some((credit, Reverse(creditor))), Some((debt, Reverse(debtor)))) =
            (creditors.pop(), debtors.pop())
        else {
            break;
        };
        let amount = credit.min(debt);
        let Ok(minor) = i64::try_from(amount) else {
            return Err(violation(scope, "transfer exceeds representable amount"));
        };
        transactions.push(PlannedTransfer {
            from: debtor,
            to: creditor,
            amount: Money::new(minor, currency),
        });

        if credit > amount {
            creditors.push(entry(credit - amount, creditor));
        }
        if debt > amount {
            debtors.push(entry(debt - amount, debtor));
        }
    }

    // A zero sum means both heaps drain together.
    if !creditors.is_empty() || !debtors.is_empty() {
        return Err(violation(scope, "unmatched positions after simplification"));
    }

    debug!(
        %scope,
        participants = positions.len(),
        transfers = transactions.len(),
        "Debts simplified"
    );

    Ok(SettlementPlan {
        scope,
        currency,
        transactions,
    })
}

/// Heap key: largest amount first, smaller participant first on ties.
fn entry(amount: u64, participant: Participant) -> (u64, Reverse<Participant>) {
    (amount, Reverse(participant))
}

fn violation(scope: Scope, detail: &str) -> LedgerError {
    error!(%scope, detail, "Debt simplification invariant violated");
    LedgerError::InvariantViolation(format!("scope {scope}: {detail}"))
}
