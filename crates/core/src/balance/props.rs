//! Property-based tests for allocation, aggregation and simplification.
//!
//! - Pairwise allocation conserves every expense total
//! - Net positions sum to zero, with or without settlements
//! - Applying a settlement plan zeroes every position in at most N - 1 transfers
//! - Recomputing over unchanged data gives identical results

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use splitledger_shared::types::{Currency, ExpenseId, GroupId, Money, SettlementId, UserId};

use super::matrix::ScopeLedger;
use super::pairwise::allocate_expense;
use super::simplify::simplify;
use super::types::NetPosition;
use crate::currency::AllocationUtil;
use crate::ledger::types::{
    Expense, Participant, Payment, Scope, Settlement, SettlementStatus, Split, SplitType,
};

const PEOPLE: u128 = 8;

fn p(n: u128) -> Participant {
    Participant::User(UserId::from_u128(n))
}

fn usd(minor: i64) -> Money {
    Money::new(minor, Currency::Usd)
}

fn scope() -> Scope {
    Scope::group(GroupId::from_u128(1))
}

fn people() -> Vec<u128> {
    (1..=PEOPLE).collect()
}

/// Strategy: distinct payers with positive amounts.
fn payers() -> impl Strategy<Value = Vec<(u128, i64)>> {
    prop::sample::subsequence(people(), 1..=4).prop_flat_map(|ids| {
        let len = ids.len();
        prop::collection::vec(1i64..100_000, len)
            .prop_map(move |amounts| ids.iter().copied().zip(amounts).collect::<Vec<_>>())
    })
}

/// Strategy: distinct owers with positive weights.
fn owers() -> impl Strategy<Value = Vec<(u128, u64)>> {
    prop::sample::subsequence(people(), 1..=6).prop_flat_map(|ids| {
        let len = ids.len();
        prop::collection::vec(1u64..10, len)
            .prop_map(move |weights| ids.iter().copied().zip(weights).collect::<Vec<_>>())
    })
}

fn build_expense(id: u128, payers: &[(u128, i64)], owers: &[(u128, u64)]) -> Expense {
    let total = usd(payers.iter().map(|(_, m)| m).sum());
    let weights: Vec<u64> = owers.iter().map(|(_, w)| *w).collect();
    let owed = AllocationUtil::allocate_by_weights(total, &weights).unwrap();
    let now = Utc::now();

    Expense {
        id: ExpenseId::from_u128(id),
        scope: scope(),
        title: "prop".to_string(),
        notes: None,
        amount: total,
        date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        category: None,
        created_by: UserId::from_u128(payers[0].0),
        payments: payers
            .iter()
            .map(|(n, minor)| Payment {
                participant: p(*n),
                amount: usd(*minor),
                method: None,
            })
            .collect(),
        splits: owers
            .iter()
            .zip(owed)
            .filter(|(_, amount)| amount.is_positive())
            .map(|((n, _), amount)| Split {
                participant: p(*n),
                amount_owed: amount,
                split_type: SplitType::Shares,
                share_value: None,
            })
            .collect(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

fn expenses() -> impl Strategy<Value = Vec<Expense>> {
    prop::collection::vec((payers(), owers()), 0..8).prop_map(|items| {
        items
            .iter()
            .zip(1u128..)
            .map(|((payers, owers), id)| build_expense(id, payers, owers))
            .collect::<Vec<_>>()
    })
}

fn settlements() -> impl Strategy<Value = Vec<Settlement>> {
    prop::collection::vec((1..=PEOPLE, 1..=PEOPLE, 1i64..50_000, any::<bool>()), 0..6).prop_map(
        |items| {
            let now = Utc::now();
            items
                .into_iter()
                .filter(|(payer, payee, _, _)| payer != payee)
                .zip(1u128..)
                .map(|((payer, payee, minor, completed), id)| Settlement {
                    id: SettlementId::from_u128(id),
                    scope: scope(),
                    payer: p(payer),
                    payee: p(payee),
                    amount: usd(minor),
                    status: if completed {
                        SettlementStatus::Completed
                    } else {
                        SettlementStatus::Pending
                    },
                    method: None,
                    reference: None,
                    notes: None,
                    created_by: UserId::from_u128(payer),
                    created_at: now,
                    updated_at: now,
                    completed_at: None,
                })
                .collect::<Vec<_>>()
        },
    )
}

/// Strategy: signed positions over distinct participants summing to zero.
fn balanced_positions() -> impl Strategy<Value = Vec<NetPosition>> {
    prop::collection::vec(-100_000i64..100_000, 1..10).prop_map(|mut amounts| {
        let sum: i64 = amounts.iter().sum();
        amounts.push(-sum);
        amounts
            .into_iter()
            .zip(1u128..)
            .map(|(minor, n)| NetPosition {
                scope: scope(),
                participant: p(n),
                amount: usd(minor),
            })
            .collect::<Vec<_>>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Edges plus retained self-shares equal the expense total, for any payers and owers.
    #[test]
    fn prop_allocation_conserves_total(payers in payers(), owers in owers()) {
        let expense = build_expense(1, &payers, &owers);
        let allocation = allocate_expense(&expense).unwrap();

        let edges: i64 = allocation.edges.iter().map(|e| e.amount.minor).sum();
        prop_assert_eq!(edges + allocation.retained.minor, expense.amount.minor);
        prop_assert!(allocation
            .edges
            .iter()
            .all(|e| e.amount.is_positive() && e.debtor != e.creditor));
    }

    /// Without settlements, net positions sum to zero.
    #[test]
    fn prop_net_positions_sum_to_zero(expenses in expenses()) {
        let ledger = ScopeLedger::build(scope(), Currency::Usd, &expenses, &[]).unwrap();
        let sum: i64 = ledger.net_positions().iter().map(|n| n.amount.minor).sum();
        prop_assert_eq!(sum, 0);
    }

    /// Completed settlements, including overpayments, keep the sum at zero.
    #[test]
    fn prop_settlements_keep_sum_zero(expenses in expenses(), settlements in settlements()) {
        let ledger = ScopeLedger::build(scope(), Currency::Usd, &expenses, &settlements).unwrap();
        let sum: i64 = ledger.net_positions().iter().map(|n| n.amount.minor).sum();
        prop_assert_eq!(sum, 0);
    }

    /// Pairwise balances are positive and never list a pair twice.
    #[test]
    fn prop_pairwise_balances_are_netted(expenses in expenses(), settlements in settlements()) {
        let ledger = ScopeLedger::build(scope(), Currency::Usd, &expenses, &settlements).unwrap();
        let balances = ledger.pairwise_balances();
        prop_assert!(balances.iter().all(|b| b.amount.is_positive()));
        for (i, a) in balances.iter().enumerate() {
            for b in &balances[i + 1..] {
                let same_pair = (a.debtor == b.debtor && a.creditor == b.creditor)
                    || (a.debtor == b.creditor && a.creditor == b.debtor);
                prop_assert!(!same_pair);
            }
        }
    }

    /// With one payer per expense, net = paid - owed + sent - received.
    #[test]
    fn prop_single_payer_summary_matches_net(
        items in prop::collection::vec((1..=PEOPLE, 1i64..100_000, owers()), 0..8),
        settlements in settlements(),
    ) {
        let expenses: Vec<Expense> = items
            .iter()
            .zip(1u128..)
            .map(|((payer, amount, owers), id)| build_expense(id, &[(*payer, *amount)], owers))
            .collect();
        let ledger = ScopeLedger::build(scope(), Currency::Usd, &expenses, &settlements).unwrap();

        for position in ledger.net_positions() {
            let s = ledger.summary_of(position.participant);
            prop_assert_eq!(
                s.paid.minor - s.owed.minor + s.sent.minor - s.received.minor,
                position.amount.minor
            );
        }
    }

    /// Applying the plan zeroes every position, in at most N - 1 transfers.
    #[test]
    fn prop_plan_settles_everything(positions in balanced_positions()) {
        let plan = simplify(scope(), Currency::Usd, &positions).unwrap();

        let mut remaining: BTreeMap<Participant, i64> = positions
            .iter()
            .map(|n| (n.participant, n.amount.minor))
            .collect();
        for transfer in &plan.transactions {
            prop_assert!(transfer.amount.is_positive());
            *remaining.get_mut(&transfer.from).unwrap() += transfer.amount.minor;
            *remaining.get_mut(&transfer.to).unwrap() -= transfer.amount.minor;
        }
        prop_assert!(remaining.values().all(|v| *v == 0));

        let non_zero = positions.iter().filter(|n| !n.amount.is_zero()).count();
        prop_assert!(plan.transactions.len() <= non_zero.saturating_sub(1));
    }

    /// Full pipeline: positions from history simplify to a plan that settles them.
    #[test]
    fn prop_history_plan_settles(expenses in expenses(), settlements in settlements()) {
        let ledger = ScopeLedger::build(scope(), Currency::Usd, &expenses, &settlements).unwrap();
        let plan = simplify(scope(), Currency::Usd, ledger.net_positions()).unwrap();

        let mut remaining: BTreeMap<Participant, i64> = ledger
            .net_positions()
            .iter()
            .map(|n| (n.participant, n.amount.minor))
            .collect();
        for transfer in &plan.transactions {
            *remaining.entry(transfer.from).or_default() += transfer.amount.minor;
            *remaining.entry(transfer.to).or_default() -= transfer.amount.minor;
        }
        prop_assert!(remaining.values().all(|v| *v == 0));
    }

    /// Recomputing over unchanged input is bit-identical.
    #[test]
    fn prop_recompute_is_idempotent(expenses in expenses(), settlements in settlements()) {
        let first = ScopeLedger::build(scope(), Currency::Usd, &expenses, &settlements).unwrap();
        let second = ScopeLedger::build(scope(), Currency::Usd, &expenses, &settlements).unwrap();
        prop_assert_eq!(&first, &second);

        let plan_a = simplify(scope(), Currency::Usd, first.net_positions()).unwrap();
        let plan_b = simplify(scope(), Currency::Usd, second.net_positions()).unwrap();
        prop_assert_eq!(plan_a, plan_b);
    }
}
