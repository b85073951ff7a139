//! Property-based tests for `LedgerService`.
//!
//! Every expense the service accepts has payments and splits that each sum
//! exactly to the total, and nothing is persisted for rejected input.

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use splitledger_shared::types::{Currency, GroupId, Money};

use super::error::LedgerError;
use super::service::LedgerService;
use super::types::{ExpenseInput, ParticipantRef, PaymentInput, Scope, SplitInput, SplitType};
use crate::testing::{FakeLedger, participant, user};

const MEMBERS: u128 = 6;

fn setup() -> (Arc<FakeLedger>, LedgerService<FakeLedger, FakeLedger>) {
    let members: Vec<_> = (1..=MEMBERS).map(participant).collect();
    let fake = Arc::new(FakeLedger::with_group(
        GroupId::from_u128(1),
        Currency::Usd,
        &members,
    ));
    let service = LedgerService::new(Arc::clone(&fake), Arc::clone(&fake));
    (fake, service)
}

/// Strategy: total in cents, and positive payment pieces that add up to it.
fn payment_partition() -> impl Strategy<Value = (i64, Vec<i64>)> {
    prop::collection::vec(1i64..50_000, 1..=MEMBERS as usize).prop_map(|pieces| {
        let total = pieces.iter().sum();
        (total, pieces)
    })
}

fn input(total: i64, payments: &[i64], owers: usize) -> ExpenseInput {
    ExpenseInput {
        scope: Scope::group(GroupId::from_u128(1)),
        title: "Groceries".to_string(),
        notes: None,
        amount: Decimal::new(total, 2),
        currency: Some(Currency::Usd),
        date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        category: None,
        created_by: user(1),
        payments: payments
            .iter()
            .zip(1u128..)
            .map(|(cents, n)| PaymentInput {
                participant: ParticipantRef::user(user(n)),
                amount: Decimal::new(*cents, 2),
                method: None,
            })
            .collect(),
        splits: (1..=owers as u128)
            .map(|n| SplitInput {
                participant: ParticipantRef::user(user(n)),
                split_type: SplitType::Equal,
                amount: None,
                percentage: None,
                shares: None,
            })
            .collect(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Accepted expenses satisfy both sum invariants exactly.
    #[test]
    fn prop_accepted_expense_sums_match(
        (total, payments) in payment_partition(),
        owers in 1usize..=MEMBERS as usize,
    ) {
        prop_assume!(total >= owers as i64);
        let (fake, service) = setup();
        let expense = service.record_expense(&input(total, &payments, owers)).unwrap();

        let paid = Money::sum(expense.payments.iter().map(|p| p.amount), Currency::Usd).unwrap();
        let owed = Money::sum(expense.splits.iter().map(|s| s.amount_owed), Currency::Usd).unwrap();
        prop_assert_eq!(paid, expense.amount);
        prop_assert_eq!(owed, expense.amount);
        prop_assert_eq!(fake.expense_count(), 1);
    }

    /// A payment set that misses the total by any amount is rejected and not stored.
    #[test]
    fn prop_payment_mismatch_rejected(
        (total, payments) in payment_partition(),
        delta in prop_oneof![-100i64..0, 1i64..100],
    ) {
        prop_assume!(total + delta > 0);
        let (fake, service) = setup();
        let mut expense = input(total, &payments, 2);
        expense.amount = Decimal::new(total + delta, 2);

        let result = service.record_expense(&expense);
        prop_assert!(
            matches!(
                result,
                Err(LedgerError::PaymentTotalMismatch { .. } | LedgerError::InvalidAmount(_))
            ),
            "got {:?}",
            result
        );
        prop_assert_eq!(fake.expense_count(), 0);
    }
}
