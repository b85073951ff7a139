//! Property-based tests for split resolution.
//!
//! Whatever the split type, resolved splits sum exactly to the expense total
//! and every owed amount is positive.

use proptest::prelude::*;
use rust_decimal::Decimal;
use splitledger_shared::types::{Currency, Money, UserId};

use super::error::LedgerError;
use super::types::{ParticipantRef, SplitInput, SplitType};
use super::validation::resolve_splits;

fn split_input(idx: usize, split_type: SplitType) -> SplitInput {
    SplitInput {
        participant: ParticipantRef::user(UserId::from_u128(idx as u128 + 1)),
        split_type,
        amount: None,
        percentage: None,
        shares: None,
    }
}

fn owed_total(total: Money, inputs: &[SplitInput]) -> Result<i64, LedgerError> {
    let splits = resolve_splits(inputs, total)?;
    Ok(splits.iter().map(|s| s.amount_owed.minor).sum())
}

/// Random partition of `total` minor units into `parts` positive pieces.
fn partition(total: i64, cuts: &[i64]) -> Vec<i64> {
    let mut points: Vec<i64> = cuts.iter().map(|c| c.rem_euclid(total - 1) + 1).collect();
    points.sort_unstable();
    points.dedup();
    let mut pieces = Vec::with_capacity(points.len() + 1);
    let mut last = 0;
    for point in points {
        pieces.push(point - last);
        last = point;
    }
    pieces.push(total - last);
    pieces
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Equal splits always sum to the total once every share is at least one unit.
    #[test]
    fn prop_equal_splits_sum_to_total(
        count in 1usize..12,
        extra in 0i64..10_000_000,
    ) {
        let total = Money::new(count as i64 + extra, Currency::Usd);
        let inputs: Vec<_> = (0..count).map(|i| split_input(i, SplitType::Equal)).collect();
        prop_assert_eq!(owed_total(total, &inputs).unwrap(), total.minor);
    }

    /// Shares splits sum to the total or reject a zero share.
    #[test]
    fn prop_shares_splits_sum_to_total(
        shares in prop::collection::vec(1u32..20, 1..8),
        minor in 1_000i64..10_000_000,
    ) {
        let total = Money::new(minor, Currency::Eur);
        let inputs: Vec<_> = shares
            .iter()
            .enumerate()
            .map(|(i, n)| SplitInput { shares: Some(*n), ..split_input(i, SplitType::Shares) })
            .collect();
        prop_assert_eq!(owed_total(total, &inputs).unwrap(), minor);
    }

    /// Percentages built from a random partition of 100.00% always sum to the total.
    #[test]
    fn prop_percentage_splits_sum_to_total(
        cuts in prop::collection::vec(any::<i64>(), 0..6),
        minor in 10_000i64..10_000_000,
    ) {
        let total = Money::new(minor, Currency::Usd);
        let inputs: Vec<_> = partition(10_000, &cuts)
            .into_iter()
            .enumerate()
            .map(|(i, basis_points)| SplitInput {
                percentage: Some(Decimal::new(basis_points, 2)),
                ..split_input(i, SplitType::Percentage)
            })
            .collect();
        prop_assert_eq!(owed_total(total, &inputs).unwrap(), minor);
    }

    /// Exact splits are accepted iff they partition the total.
    #[test]
    fn prop_exact_splits_must_partition_total(
        cuts in prop::collection::vec(any::<i64>(), 0..6),
        minor in 100i64..1_000_000,
        skew in -5i64..5,
    ) {
        let total = Money::new(minor, Currency::Usd);
        let mut pieces = partition(minor, &cuts);
        let last = pieces.len() - 1;
        pieces[last] += skew;

        let inputs: Vec<_> = pieces
            .iter()
            .enumerate()
            .map(|(i, p)| SplitInput {
                amount: Some(Decimal::new(*p, 2)),
                ..split_input(i, SplitType::Exact)
            })
            .collect();

        let result = resolve_splits(&inputs, total);
        if skew == 0 {
            prop_assert!(result.is_ok());
        } else if pieces[last] <= 0 {
            prop_assert!(matches!(result, Err(LedgerError::InvalidAmount(_))), "got {:?}", result);
        } else {
            prop_assert!(
                matches!(result, Err(LedgerError::SplitTotalMismatch { .. })),
                "got {:?}",
                result
            );
        }
    }
}
