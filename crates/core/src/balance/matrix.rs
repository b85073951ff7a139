//! Balance aggregation for one scope.
//!
//! [`ScopeLedger::build`] folds the expenses and completed settlements of a scope
//! into a matrix `M[a][b]` (what `a` owes `b`) and per-participant totals. Net
//! positions are computed two ways, from matrix rows and columns and from the
//! netted pairwise balances, and the two must agree exactly.

use std::collections::BTreeMap;

use splitledger_shared::types::{Currency, Money};
use tracing::{debug, error};

use super::pairwise::allocate_expense;
use super::types::{NetPosition, PairwiseBalance, ParticipantSummary};
use crate::ledger::error::LedgerError;
use crate::ledger::types::{Expense, Participant, Scope, Settlement};

/// Directed debt totals in minor units. Missing cells are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceMatrix {
    cells: BTreeMap<(Participant, Participant), i64>,
}

impl BalanceMatrix {
    /// What `debtor` owes `creditor` before netting.
    #[must_use]
    pub fn get(&self, debtor: Participant, creditor: Participant) -> i64 {
        self.cells.get(&(debtor, creditor)).copied().unwrap_or(0)
    }

    fn add(&mut self, debtor: Participant, creditor: Participant, minor: i64) -> Option<()> {
        let cell = self.cells.entry((debtor, creditor)).or_insert(0);
        *cell = cell.checked_add(minor)?;
        Some(())
    }

    /// Applies a completed settlement of `minor` units from `payer` to `payee`.
    ///
    /// The payer's debt to the payee is reduced down to zero; any excess
    /// becomes debt from the payee back to the payer.
    fn settle(&mut self, payer: Participant, payee: Participant, minor: i64) -> Option<()> {
        let outstanding = self.get(payer, payee);
        let cleared = outstanding.min(minor).max(0);
        self.add(payer, payee, -cleared)?;
        let excess = minor.checked_sub(cleared)?;
        if excess > 0 {
            self.add(payee, payer, excess)?;
        }
        Some(())
    }

    /// `Σ_v M[v][u] − Σ_v M[u][v]`.
    fn net_of(&self, participant: Participant) -> Option<i64> {
        self.cells
            .iter()
            .try_fold(0_i64, |acc, (&(debtor, creditor), &minor)| {
                if creditor == participant {
                    acc.checked_add(minor)
                } else if debtor == participant {
                    acc.checked_sub(minor)
                } else {
                    Some(acc)
                }
            })
    }
}

/// Everything derived from one scope's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeLedger {
    scope: Scope,
    currency: Currency,
    matrix: BalanceMatrix,
    summaries: BTreeMap<Participant, ParticipantSummary>,
    pairwise: Vec<PairwiseBalance>,
    positions: Vec<NetPosition>,
}

impl ScopeLedger {
    /// Builds the ledger of a scope.
    ///
    /// Deleted expenses and settlements that are not completed are ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` on a currency mismatch, an allocation that
    /// does not conserve its total, overflow, disagreeing net forms, or net
    /// positions that do not sum to zero. Each is logged with the scope.
    pub fn build(
        scope: Scope,
        currency: Currency,
        expenses: &[Expense],
        settlements: &[Settlement],
    ) -> Result<Self, LedgerError> {
        let mut matrix = BalanceMatrix::default();
        let mut totals: BTreeMap<Participant, [i64; 4]> = BTreeMap::new();
        let overflow = || violation(scope, "amount overflow");

        let mut expense_count = 0_usize;
        for expense in expenses.iter().filter(|e| !e.is_deleted()) {
            if expense.currency() != currency {
                let detail = format!(
                    "expense {} is in {}, scope uses {currency}",
                    expense.id,
                    expense.currency()
                );
                return Err(violation(scope, &detail));
            }
            for edge in allocate_expense(expense)?.edges {
                matrix
                    .add(edge.debtor, edge.creditor, edge.amount.minor)
                    .ok_or_else(overflow)?;
            }
            for payment in &expense.payments {
                bump(&mut totals, payment.participant, PAID, payment.amount.minor)
                    .ok_or_else(overflow)?;
            }
            for split in &expense.splits {
                bump(&mut totals, split.participant, OWED, split.amount_owed.minor)
                    .ok_or_else(overflow)?;
            }
            expense_count += 1;
        }

        let mut settlement_count = 0_usize;
        for settlement in settlements
            .iter()
            .filter(|s| s.status.counts_toward_balance())
        {
            if settlement.amount.currency != currency {
                let detail = format!(
                    "settlement {} is in {}, scope uses {currency}",
                    settlement.id, settlement.amount.currency
                );
                return Err(violation(scope, &detail));
            }
            // A settlement that reconciliation folded onto one participant moves nothing.
            if settlement.payer == settlement.payee {
                debug!(%scope, settlement = %settlement.id, "Skipping self-settlement");
                continue;
            }
            let minor = settlement.amount.minor;
            matrix
                .settle(settlement.payer, settlement.payee, minor)
                .ok_or_else(overflow)?;
            bump(&mut totals, settlement.payer, SENT, minor).ok_or_else(overflow)?;
            bump(&mut totals, settlement.payee, RECEIVED, minor).ok_or_else(overflow)?;
            settlement_count += 1;
        }

        let pairwise = netted_pairs(&matrix, totals.keys().copied(), currency);
        let positions = net_positions(scope, currency, &matrix, &pairwise, totals.keys().copied())?;

        let summaries = positions
            .iter()
            .map(|position| {
                let [paid, owed, sent, received] = totals
                    .get(&position.participant)
                    .copied()
                    .unwrap_or_default();
                let summary = ParticipantSummary {
                    participant: position.participant,
                    paid: Money::new(paid, currency),
                    owed: Money::new(owed, currency),
                    sent: Money::new(sent, currency),
                    received: Money::new(received, currency),
                    net: position.amount,
                };
                (position.participant, summary)
            })
            .collect();

        debug!(
            %scope,
            expenses = expense_count,
            settlements = settlement_count,
            participants = positions.len(),
            balances = pairwise.len(),
            "Scope ledger computed"
        );

        Ok(Self {
            scope,
            currency,
            matrix,
            summaries,
            pairwise,
            positions,
        })
    }

    /// The scope this ledger describes.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// The scope currency.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// The underlying matrix.
    #[must_use]
    pub const fn matrix(&self) -> &BalanceMatrix {
        &self.matrix
    }

    /// Netted pairwise balances, ordered by debtor then creditor.
    #[must_use]
    pub fn pairwise_balances(&self) -> &[PairwiseBalance] {
        &self.pairwise
    }

    /// Net positions of every participant seen in the scope, ordered by participant.
    #[must_use]
    pub fn net_positions(&self) -> &[NetPosition] {
        &self.positions
    }

    /// Net position of one participant; zero if they never appear.
    #[must_use]
    pub fn position_of(&self, participant: Participant) -> NetPosition {
        self.positions
            .iter()
            .find(|p| p.participant == participant)
            .copied()
            .unwrap_or(NetPosition {
                scope: self.scope,
                participant,
                amount: Money::zero(self.currency),
            })
    }

    /// Totals of one participant; zero if they never appear.
    #[must_use]
    pub fn summary_of(&self, participant: Participant) -> ParticipantSummary {
        self.summaries
            .get(&participant)
            .copied()
            .unwrap_or_else(|| ParticipantSummary::empty(participant, self.currency))
    }
}

const PAID: usize = 0;
const OWED: usize = 1;
const SENT: usize = 2;
const RECEIVED: usize = 3;

fn bump(
    totals: &mut BTreeMap<Participant, [i64; 4]>,
    participant: Participant,
    slot: usize,
    minor: i64,
) -> Option<()> {
    let entry = totals.entry(participant).or_default();
    entry[slot] = entry[slot].checked_add(minor)?;
    Some(())
}

/// `net(a, b) = M[a][b] − M[b][a]`, reported from the positive side only.
fn netted_pairs<I>(
    matrix: &BalanceMatrix,
    participants: I,
    currency: Currency,
) -> Vec<PairwiseBalance>
where
    I: IntoIterator<Item = Participant>,
{
    let participants: Vec<Participant> = participants.into_iter().collect();
    let mut balances = Vec::new();

    for (i, &a) in participants.iter().enumerate() {
        for &b in &participants[i + 1..] {
            let net = i128::from(matrix.get(a, b)) - i128::from(matrix.get(b, a));
            let (debtor, creditor, amount) = match net.cmp(&0) {
                std::cmp::Ordering::Greater => (a, b, net),
                std::cmp::Ordering::Less => (b, a, -net),
                std::cmp::Ordering::Equal => continue,
            };
            // Each cell fits in i64 and both are non-negative, so the difference does too.
            let Ok(amount) = i64::try_from(amount) else {
                continue;
            };
            balances.push(PairwiseBalance {
                debtor,
                creditor,
                amount: Money::new(amount, currency),
            });
        }
    }

    balances.sort_by_key(|b| (b.debtor, b.creditor));
    balances
}

fn net_positions<I>(
    scope: Scope,
    currency: Currency,
    matrix: &BalanceMatrix,
    pairwise: &[PairwiseBalance],
    participants: I,
) -> Result<Vec<NetPosition>, LedgerError>
where
    I: IntoIterator<Item = Participant>,
{
    let mut positions = Vec::new();
    let mut sum = 0_i128;

    for participant in participants {
        let from_matrix = matrix
            .net_of(participant)
            .ok_or_else(|| violation(scope, "amount overflow"))?;

        let from_pairs: i128 = pairwise
            .iter()
            .map(|b| {
                if b.creditor == participant {
                    i128::from(b.amount.minor)
                } else if b.debtor == participant {
                    -i128::from(b.amount.minor)
                } else {
                    0
                }
            })
            .sum();

        if i128::from(from_matrix) != from_pairs {
            return Err(violation(
                scope,
                &format!("net of {participant} is {from_matrix} by matrix, {from_pairs} by pairs"),
            ));
        }

        sum += i128::from(from_matrix);
        positions.push(NetPosition {
            scope,
            participant,
            amount: Money::new(from_matrix, currency),
        });
    }

    if sum != 0 {
        return Err(violation(scope, &format!("net positions sum to {sum}")));
    }

    Ok(positions)
}

fn violation(scope: Scope, detail: &str) -> LedgerError {
    error!(%scope, detail, "Balance aggregation invariant violated");
    LedgerError::InvariantViolation(format!("scope {scope}: {detail}"))
}
