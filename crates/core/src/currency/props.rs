//! Property-based tests for allocation.
//!
//! - Equal split sum and fairness invariant
//! - Weighted allocation sum invariant
//! - Determinism

use proptest::prelude::*;
use splitledger_shared::types::{Currency, Money};

use super::allocation::AllocationUtil;

/// Strategy to generate non-negative totals (0.00 to 1,000,000.00).
fn total_amount() -> impl Strategy<Value = Money> {
    (0i64..100_000_000i64).prop_map(|cents| Money::new(cents, Currency::Usd))
}

/// Strategy to generate recipient counts (1 to 50).
fn recipient_count() -> impl Strategy<Value = usize> {
    1usize..50
}

/// Strategy to generate weights with at least one non-zero entry.
fn weights() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..1_000_000, 1..12)
        .prop_filter("weights must not all be zero", |w| w.iter().any(|v| *v > 0))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// *For any* T >= 0 and n >= 1, split_evenly returns n shares summing to T,
    /// each within one minor unit of T / n.
    #[test]
    fn prop_split_evenly_sums_to_total(
        total in total_amount(),
        count in recipient_count(),
    ) {
        let shares = AllocationUtil::split_evenly(total, count);
        prop_assert_eq!(shares.len(), count);
        prop_assert_eq!(shares.iter().map(|m| m.minor).sum::<i64>(), total.minor);

        let n = i64::try_from(count).unwrap();
        for share in &shares {
            // |share - T/n| < 1  <=>  |share * n - T| < n
            prop_assert!((share.minor * n - total.minor).abs() < n);
        }
    }

    /// *For any* total and weights, the weighted allocation sums to the total.
    #[test]
    fn prop_weighted_allocation_sums_to_total(
        total in total_amount(),
        weights in weights(),
    ) {
        let shares = AllocationUtil::allocate_by_weights(total, &weights).unwrap();
        prop_assert_eq!(shares.len(), weights.len());
        prop_assert_eq!(shares.iter().map(|m| m.minor).sum::<i64>(), total.minor);
        for (share, weight) in shares.iter().zip(&weights) {
            if *weight == 0 {
                prop_assert_eq!(share.minor, 0);
            }
        }
    }

    /// *For any* input, allocating twice gives identical results.
    #[test]
    fn prop_weighted_allocation_is_deterministic(
        total in total_amount(),
        weights in weights(),
    ) {
        let first = AllocationUtil::allocate_by_weights(total, &weights);
        let second = AllocationUtil::allocate_by_weights(total, &weights);
        prop_assert_eq!(first, second);
    }
}
