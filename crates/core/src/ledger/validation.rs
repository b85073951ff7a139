//! Business rule validation for expenses and settlements.
//!
//! These functions are pure: they turn raw input into exact [`Money`] records or
//! reject it. Membership checks need a directory and live in
//! [`LedgerService`](super::service::LedgerService).

use std::collections::HashSet;

use rust_decimal::Decimal;
use splitledger_shared::types::{Currency, Money};

use super::error::LedgerError;
use super::types::{Participant, Payment, PaymentInput, Split, SplitInput, SplitType};
use crate::currency::AllocationUtil;

/// Percentage splits must add up to exactly this.
const FULL_PERCENTAGE: Decimal = Decimal::ONE_HUNDRED;

/// Trims the title and rejects it if nothing is left.
///
/// # Errors
///
/// Returns `TitleRequired` for blank titles.
pub fn validate_title(title: &str) -> Result<String, LedgerError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::TitleRequired);
    }
    Ok(trimmed.to_string())
}

/// Derives the category slug: lowercase ASCII alphanumerics joined by single hyphens.
///
/// # Errors
///
/// Returns `InvalidCategoryName` if the name has no usable characters.
pub fn category_slug(name: &str) -> Result<String, LedgerError> {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if (ch == ' ' || ch == '-') && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        return Err(LedgerError::InvalidCategoryName);
    }
    Ok(slug)
}

/// Converts a decimal amount and rejects anything that is not strictly positive.
///
/// # Errors
///
/// Returns `InvalidAmount` for zero, negative or over-precise amounts.
pub fn positive_money(amount: Decimal, currency: Currency) -> Result<Money, LedgerError> {
    let money = Money::from_decimal(amount, currency).map_err(|e| LedgerError::invalid_amount(&e))?;
    if !money.is_positive() {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(money)
}

/// Resolves payment inputs into validated payments.
///
/// # Errors
///
/// `MissingPayments`, `InvalidParticipant`, `InvalidAmount` or `DuplicateParticipant`.
pub fn resolve_payments(
    inputs: &[PaymentInput],
    currency: Currency,
) -> Result<Vec<Payment>, LedgerError> {
    if inputs.is_empty() {
        return Err(LedgerError::MissingPayments);
    }

    let payments = inputs
        .iter()
        .map(|input| {
            Ok(Payment {
                participant: input.participant.resolve()?,
                amount: positive_money(input.amount, currency)?,
                method: input.method.clone(),
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;

    ensure_unique(payments.iter().map(|p| p.participant))?;
    Ok(payments)
}

/// Resolves split inputs into validated splits that sum exactly to `total`.
///
/// # Errors
///
/// `MissingSplits`, `MixedSplitTypes`, `InvalidParticipant`, `DuplicateParticipant`,
/// the per-type requirement errors, `InvalidAmount` for a non-positive share, or
/// `SplitTotalMismatch`.
pub fn resolve_splits(inputs: &[SplitInput], total: Money) -> Result<Vec<Split>, LedgerError> {
    let Some(first) = inputs.first() else {
        return Err(LedgerError::MissingSplits);
    };
    let split_type = first.split_type;
    if inputs.iter().any(|s| s.split_type != split_type) {
        return Err(LedgerError::MixedSplitTypes);
    }

    let participants = inputs
        .iter()
        .map(|s| s.participant.resolve())
        .collect::<Result<Vec<_>, _>>()?;
    ensure_unique(participants.iter().copied())?;

    let (amounts, share_values) = match split_type {
        SplitType::Equal => (equal_amounts(&participants, total), vec![None; inputs.len()]),
        SplitType::Exact => exact_amounts(inputs, total.currency)?,
        SplitType::Percentage => percentage_amounts(inputs, &participants, total)?,
        SplitType::Shares => shares_amounts(inputs, &participants, total)?,
    };

    let splits = participants
        .into_iter()
        .zip(amounts)
        .zip(share_values)
        .map(|((participant, amount_owed), share_value)| {
            if !amount_owed.is_positive() {
                return Err(LedgerError::InvalidAmount(format!(
                    "split for {participant} must be positive, got {}",
                    amount_owed.to_decimal()
                )));
            }
            Ok(Split {
                participant,
                amount_owed,
                split_type,
                share_value,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let split_total = sum(splits.iter().map(|s| s.amount_owed), total.currency)?;
    if split_total != total {
        return Err(LedgerError::SplitTotalMismatch {
            expected: total.to_decimal(),
            actual: split_total.to_decimal(),
        });
    }

    Ok(splits)
}

/// Checks that payments add up to the expense total.
///
/// # Errors
///
/// Returns `PaymentTotalMismatch` unless the sum is exact.
pub fn validate_payment_total(payments: &[Payment], total: Money) -> Result<(), LedgerError> {
    let paid = sum(payments.iter().map(|p| p.amount), total.currency)?;
    if paid != total {
        return Err(LedgerError::PaymentTotalMismatch {
            expected: total.to_decimal(),
            actual: paid.to_decimal(),
        });
    }
    Ok(())
}

/// Rejects a participant that appears more than once.
///
/// # Errors
///
/// Returns `DuplicateParticipant` naming the first repeat.
pub fn ensure_unique<I>(participants: I) -> Result<(), LedgerError>
where
    I: IntoIterator<Item = Participant>,
{
    let mut seen = HashSet::new();
    for participant in participants {
        if !seen.insert(participant) {
            return Err(LedgerError::DuplicateParticipant(participant.to_string()));
        }
    }
    Ok(())
}

fn sum<I>(amounts: I, currency: Currency) -> Result<Money, LedgerError>
where
    I: IntoIterator<Item = Money>,
{
    Money::sum(amounts, currency).map_err(|e| LedgerError::invalid_amount(&e))
}

/// Indices of `participants` in ascending participant order.
fn ascending_order(participants: &[Participant]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..participants.len()).collect();
    order.sort_by_key(|&idx| participants[idx]);
    order
}

/// Places values computed in ascending participant order back into input order.
fn scatter(order: &[usize], ranked: Vec<Money>, currency: Currency) -> Vec<Money> {
    let mut amounts = vec![Money::zero(currency); order.len()];
    for (&idx, amount) in order.iter().zip(ranked) {
        amounts[idx] = amount;
    }
    amounts
}

fn equal_amounts(participants: &[Participant], total: Money) -> Vec<Money> {
    let order = ascending_order(participants);
    let shares = AllocationUtil::split_evenly(total, participants.len());
    scatter(&order, shares, total.currency)
}

type Resolved = (Vec<Money>, Vec<Option<Decimal>>);

fn exact_amounts(inputs: &[SplitInput], currency: Currency) -> Result<Resolved, LedgerError> {
    let amounts = inputs
        .iter()
        .map(|s| {
            let amount = s.amount.ok_or(LedgerError::AmountRequired)?;
            Money::from_decimal(amount, currency).map_err(|e| LedgerError::invalid_amount(&e))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((amounts, vec![None; inputs.len()]))
}

fn percentage_amounts(
    inputs: &[SplitInput],
    participants: &[Participant],
    total: Money,
) -> Result<Resolved, LedgerError> {
    let percentages = inputs
        .iter()
        .map(|s| match s.percentage {
            None => Err(LedgerError::PercentageRequired),
            Some(p) if p <= Decimal::ZERO => Err(LedgerError::InvalidAmount(format!(
                "percentage must be positive, got {p}"
            ))),
            Some(p) => Ok(p),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let percentage_sum = percentages
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(*p))
        .ok_or_else(|| LedgerError::InvalidAmount("percentages overflow".to_string()))?;
    if percentage_sum != FULL_PERCENTAGE {
        return Err(LedgerError::PercentageTotalMismatch(percentage_sum));
    }

    let order = ascending_order(participants);
    let ranked: Vec<Decimal> = order.iter().map(|&idx| percentages[idx]).collect();
    let shares = AllocationUtil::allocate_by_percentages(total, &ranked).ok_or_else(|| {
        LedgerError::InvalidAmount("percentages cannot be allocated".to_string())
    })?;

    Ok((
        scatter(&order, shares, total.currency),
        percentages.into_iter().map(Some).collect(),
    ))
}

fn shares_amounts(
    inputs: &[SplitInput],
    participants: &[Participant],
    total: Money,
) -> Result<Resolved, LedgerError> {
    let counts = inputs
        .iter()
        .map(|s| match s.shares {
            Some(n) if n > 0 => Ok(n),
            _ => Err(LedgerError::SharesRequired),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let order = ascending_order(participants);
    let ranked: Vec<u32> = order.iter().map(|&idx| counts[idx]).collect();
    let shares =
        AllocationUtil::allocate_by_shares(total, &ranked).ok_or(LedgerError::SharesRequired)?;

    Ok((
        scatter(&order, shares, total.currency),
        counts.into_iter().map(|n| Some(Decimal::from(n))).collect(),
    ))
}
