//! Amount allocation utilities using the Largest Remainder Method.
//!
//! This module provides functions for allocating amounts fairly while
//! ensuring the sum exactly equals the original total (no cents lost).
//!
//! The Largest Remainder Method works by:
//! 1. Calculate exact allocations
//! 2. Round down each allocation
//! 3. Calculate the remainder (total - sum of rounded)
//! 4. Distribute remainder units to items with largest fractional parts
//!
//! Everything runs on integer minor units. Ties between equal fractional parts
//! go to the earlier index, so the caller decides who wins by ordering the input.

use rust_decimal::Decimal;
use splitledger_shared::types::Money;

/// Allocation utility for distributing amounts.
///
/// Uses the Largest Remainder Method to ensure:
/// - Fair distribution of amounts
/// - Sum of allocations EXACTLY equals the original total
/// - Repeated runs over the same input give the same output
pub struct AllocationUtil;

impl AllocationUtil {
    /// Allocate amount equally across `count` recipients.
    ///
    /// The first `total mod count` recipients receive one extra minor unit.
    ///
    /// # Example
    ///
    /// ```
    /// use splitledger_core::currency::AllocationUtil;
    /// use splitledger_shared::types::{Currency, Money};
    ///
    /// // 100.01 / 3 = [33.34, 33.34, 33.33]
    /// let shares = AllocationUtil::split_evenly(Money::new(10001, Currency::Usd), 3);
    /// assert_eq!(shares.iter().map(|m| m.minor).sum::<i64>(), 10001);
    /// ```
    #[must_use]
    pub fn split_evenly(total: Money, count: usize) -> Vec<Money> {
        total.split_evenly(count)
    }

    /// Allocate proportionally to non-negative integer weights.
    ///
    /// Returns `None` when there are no weights or they sum to zero.
    #[must_use]
    pub fn allocate_by_weights(total: Money, weights: &[u64]) -> Option<Vec<Money>> {
        let weights: Vec<i128> = weights.iter().map(|w| i128::from(*w)).collect();
        largest_remainder(total, &weights)
    }

    /// Allocate by share counts (e.g. 2 shares vs 1 share).
    ///
    /// Returns `None` when there are no shares or they sum to zero.
    #[must_use]
    pub fn allocate_by_shares(total: Money, shares: &[u32]) -> Option<Vec<Money>> {
        let weights: Vec<i128> = shares.iter().map(|s| i128::from(*s)).collect();
        largest_remainder(total, &weights)
    }

    /// Allocate by percentages.
    ///
    /// Allocation is proportional to the given percentages; when they sum to 100
    /// each recipient gets `total * pct / 100` with the leftover units handed out
    /// by largest remainder. Returns `None` for empty input, a negative percentage,
    /// or a zero sum.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use splitledger_core::currency::AllocationUtil;
    /// use splitledger_shared::types::{Currency, Money};
    ///
    /// let total = Money::new(10000, Currency::Usd);
    /// let percentages = [dec!(50), dec!(30), dec!(20)];
    /// let shares = AllocationUtil::allocate_by_percentages(total, &percentages).unwrap();
    /// assert_eq!(shares.iter().map(|m| m.minor).collect::<Vec<_>>(), vec![5000, 3000, 2000]);
    /// ```
    #[must_use]
    pub fn allocate_by_percentages(total: Money, percentages: &[Decimal]) -> Option<Vec<Money>> {
        if percentages.iter().any(|p| p.is_sign_negative()) {
            return None;
        }

        // Bring every percentage to a common scale so they become integer weights.
        let max_scale = percentages.iter().map(Decimal::scale).max()?;
        let weights = percentages
            .iter()
            .map(|p| {
                let factor = 10_i128.checked_pow(max_scale - p.scale())?;
                p.mantissa().checked_mul(factor)
            })
            .collect::<Option<Vec<i128>>>()?;

        largest_remainder(total, &weights)
    }
}

fn largest_remainder(total: Money, weights: &[i128]) -> Option<Vec<Money>> {
    if weights.is_empty() || weights.iter().any(|w| *w < 0) {
        return None;
    }
    let weight_sum = weights
        .iter()
        .try_fold(0_i128, |acc, w| acc.checked_add(*w))?;
    if weight_sum == 0 {
        return None;
    }

    let total_minor = i128::from(total.minor);
    let mut floors = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());

    for (idx, weight) in weights.iter().enumerate() {
        let product = total_minor.checked_mul(*weight)?;
        floors.push(product.div_euclid(weight_sum));
        remainders.push((idx, product.rem_euclid(weight_sum)));
    }

    let allocated: i128 = floors.iter().sum();
    let leftover = usize::try_from(total_minor - allocated).ok()?;

    // Largest fractional part first, earlier index on ties.
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (idx, _) in remainders.iter().take(leftover) {
        floors[*idx] += 1;
    }

    floors
        .into_iter()
        .map(|minor| i64::try_from(minor).ok().map(|m| Money::new(m, total.currency)))
        .collect()
}
