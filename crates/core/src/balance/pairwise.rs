//! Pairwise allocation: decomposes one expense into directed debt edges.
//!
//! Each split's owed amount is spread across the payers in proportion to what
//! they paid, using largest-remainder rounding with ties going to the earlier
//! payer. The edges plus the retained self-shares always sum to the total.

use splitledger_shared::types::Money;
use tracing::error;

use super::types::{DebtEdge, ExpenseAllocation};
use crate::currency::AllocationUtil;
use crate::ledger::error::LedgerError;
use crate::ledger::types::Expense;

/// Decomposes a validated expense into debt edges.
///
/// # Errors
///
/// Returns `InvariantViolation` if the expense cannot be allocated or the edges
/// do not conserve the total. Both are logged with the expense context.
pub fn allocate_expense(expense: &Expense) -> Result<ExpenseAllocation, LedgerError> {
    let currency = expense.currency();
    let weights = expense
        .payments
        .iter()
        .map(|p| u64::try_from(p.amount.minor).ok())
        .collect::<Option<Vec<u64>>>()
        .ok_or_else(|| violation(expense, "negative payment amount"))?;

    let mut edges = Vec::new();
    let mut retained = 0_i64;
    let mut allocated = 0_i64;

    for split in &expense.splits {
        if !split.amount_owed.is_positive() {
            continue;
        }
        let shares = AllocationUtil::allocate_by_weights(split.amount_owed, &weights)
            .ok_or_else(|| violation(expense, "payments cannot carry the split"))?;

        for (payment, share) in expense.payments.iter().zip(shares) {
            if share.is_zero() {
                continue;
            }
            allocated = allocated
                .checked_add(share.minor)
                .ok_or_else(|| violation(expense, "allocation overflow"))?;

            if payment.participant == split.participant {
                retained += share.minor;
            } else {
                edges.push(DebtEdge {
                    debtor: split.participant,
                    creditor: payment.participant,
                    amount: share,
                });
            }
        }
    }

    // Conservation is checked on the full allocation, self-shares included.
    if allocated != expense.amount.minor {
        return Err(violation(
            expense,
            &format!(
                "allocated {allocated} minor units, expense total is {}",
                expense.amount.minor
            ),
        ));
    }

    Ok(ExpenseAllocation {
        edges,
        retained: Money::new(retained, currency),
    })
}

fn violation(expense: &Expense, detail: &str) -> LedgerError {
    error!(
        expense_id = %expense.id,
        scope = %expense.scope,
        amount = %expense.amount,
        payments = expense.payments.len(),
        splits = expense.splits.len(),
        detail,
        "Pairwise allocation invariant violated"
    );
    LedgerError::InvariantViolation(format!("expense {}: {detail}", expense.id))
}
