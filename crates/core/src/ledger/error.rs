//! Ledger error types.
//!
//! Every error the engine can produce is a variant of [`LedgerError`], so callers
//! match exhaustively instead of comparing error values by identity. Variants fall
//! into four kinds (see [`ErrorKind`]): caller mistakes, authorization failures,
//! missing resources, and internal failures.

use rust_decimal::Decimal;
use splitledger_shared::AppError;
use splitledger_shared::types::{Currency, ExpenseId, MoneyError, SettlementId};
use thiserror::Error;

use super::types::SettlementStatus;

/// Broad classification of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input was wrong. Never retried, nothing written.
    Validation,
    /// The requester may not act on the scope.
    Authorization,
    /// The referenced resource does not exist.
    NotFound,
    /// Internal consistency failure or collaborator failure.
    Internal,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// An amount is zero, negative, unparseable, or in the wrong currency.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Payments do not add up to the expense total.
    #[error("Payment total {actual} does not match expense amount {expected}")]
    PaymentTotalMismatch {
        /// The expense total.
        expected: Decimal,
        /// The sum of all payments.
        actual: Decimal,
    },

    /// Splits do not add up to the expense total.
    #[error("Split total {actual} does not match expense amount {expected}")]
    SplitTotalMismatch {
        /// The expense total.
        expected: Decimal,
        /// The sum of all splits.
        actual: Decimal,
    },

    /// Percentage splits do not add up to 100.
    #[error("Percentages must sum to 100, got {0}")]
    PercentageTotalMismatch(Decimal),

    /// Splits of one expense use different split types.
    #[error("All splits must have the same type")]
    MixedSplitTypes,

    /// An exact split is missing its amount.
    #[error("Amount required for exact splits")]
    AmountRequired,

    /// A percentage split is missing its percentage.
    #[error("Percentage required for percentage splits")]
    PercentageRequired,

    /// A shares split is missing its share count or it is zero.
    #[error("Shares required and must be > 0 for shares splits")]
    SharesRequired,

    /// The expense has no payments.
    #[error("At least one payment is required")]
    MissingPayments,

    /// The expense has no splits.
    #[error("At least one split is required")]
    MissingSplits,

    /// A participant reference names both a user and a pending user, or neither.
    #[error("Participant must reference exactly one of user or pending user")]
    InvalidParticipant,

    /// A participant appears twice in the same list.
    #[error("Participant {0} appears more than once")]
    DuplicateParticipant(String),

    /// The title is empty after trimming.
    #[error("Title is required")]
    TitleRequired,

    /// The category name is empty or has no usable characters.
    #[error("Category name is required")]
    InvalidCategoryName,

    /// A settlement names the same participant as payer and payee.
    #[error("Payer and payee cannot be the same participant")]
    SelfSettlement,

    /// A settlement status change that is not allowed.
    #[error("Cannot move settlement from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: SettlementStatus,
        /// Requested status.
        to: SettlementStatus,
    },

    // ========== Authorization Errors ==========
    /// The participant is not a member of the group.
    #[error("Not a member of this group")]
    NotGroupMember,

    /// No friendship exists between the two users.
    #[error("Friendship not found")]
    FriendNotFound,

    /// The friendship does not allow this action (not accepted, or a third party involved).
    #[error("Invalid friend action")]
    InvalidFriendAction,

    // ========== Not Found Errors ==========
    /// Expense not found (or deleted).
    #[error("Expense not found: {0}")]
    ExpenseNotFound(ExpenseId),

    /// Group not found.
    #[error("Group not found")]
    GroupNotFound,

    /// Settlement not found.
    #[error("Settlement not found: {0}")]
    SettlementNotFound(SettlementId),

    // ========== Internal Errors ==========
    /// A ledger invariant did not hold. Logged with full context where detected.
    #[error("Ledger invariant violated: {0}")]
    InvariantViolation(String),

    /// A collaborator (store, directory) failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_)
            | Self::PaymentTotalMismatch { .. }
            | Self::SplitTotalMismatch { .. }
            | Self::PercentageTotalMismatch(_)
            | Self::MixedSplitTypes
            | Self::AmountRequired
            | Self::PercentageRequired
            | Self::SharesRequired
            | Self::MissingPayments
            | Self::MissingSplits
            | Self::InvalidParticipant
            | Self::DuplicateParticipant(_)
            | Self::TitleRequired
            | Self::InvalidCategoryName
            | Self::SelfSettlement
            | Self::InvalidStatusTransition { .. } => ErrorKind::Validation,

            Self::NotGroupMember | Self::FriendNotFound | Self::InvalidFriendAction => {
                ErrorKind::Authorization
            }

            Self::ExpenseNotFound(_) | Self::GroupNotFound | Self::SettlementNotFound(_) => {
                ErrorKind::NotFound
            }

            Self::InvariantViolation(_) | Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::PaymentTotalMismatch { .. } => "PAYMENT_TOTAL_MISMATCH",
            Self::SplitTotalMismatch { .. } => "SPLIT_TOTAL_MISMATCH",
            Self::PercentageTotalMismatch(_) => "PERCENTAGE_TOTAL_MISMATCH",
            Self::MixedSplitTypes => "MIXED_SPLIT_TYPES",
            Self::AmountRequired => "AMOUNT_REQUIRED",
            Self::PercentageRequired => "PERCENTAGE_REQUIRED",
            Self::SharesRequired => "SHARES_REQUIRED",
            Self::MissingPayments => "MISSING_PAYMENTS",
            Self::MissingSplits => "MISSING_SPLITS",
            Self::InvalidParticipant => "INVALID_PARTICIPANT",
            Self::DuplicateParticipant(_) => "DUPLICATE_PARTICIPANT",
            Self::TitleRequired => "TITLE_REQUIRED",
            Self::InvalidCategoryName => "INVALID_CATEGORY_NAME",
            Self::SelfSettlement => "SELF_SETTLEMENT",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::NotGroupMember => "NOT_GROUP_MEMBER",
            Self::FriendNotFound => "FRIEND_NOT_FOUND",
            Self::InvalidFriendAction => "INVALID_FRIEND_ACTION",
            Self::ExpenseNotFound(_) => "EXPENSE_NOT_FOUND",
            Self::GroupNotFound => "GROUP_NOT_FOUND",
            Self::SettlementNotFound(_) => "SETTLEMENT_NOT_FOUND",
            Self::InvariantViolation(_) | Self::Storage(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Always false: retries belong to the persistence layer, not the ledger.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }

    pub(crate) fn invalid_amount(err: &MoneyError) -> Self {
        Self::InvalidAmount(err.to_string())
    }

    pub(crate) fn currency_mismatch(expected: Currency, actual: Currency) -> Self {
        Self::InvalidAmount(format!(
            "currency {actual} does not match scope currency {expected}"
        ))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err.kind() {
            ErrorKind::Validation => Self::Validation(err.to_string()),
            ErrorKind::Authorization => Self::Forbidden(err.to_string()),
            ErrorKind::NotFound => Self::NotFound(err.to_string()),
            // Opaque on purpose: the detail was logged where it was detected.
            ErrorKind::Internal => Self::Internal("ledger computation failed".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::InvalidAmount(String::new()).error_code(),
            "INVALID_AMOUNT"
        );
        assert_eq!(
            LedgerError::PaymentTotalMismatch {
                expected: Decimal::new(10000, 2),
                actual: Decimal::new(5000, 2),
            }
            .error_code(),
            "PAYMENT_TOTAL_MISMATCH"
        );
        assert_eq!(LedgerError::NotGroupMember.error_code(), "NOT_GROUP_MEMBER");
        assert_eq!(
            LedgerError::InvariantViolation(String::new()).error_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_kinds_and_status_codes() {
        assert_eq!(LedgerError::MixedSplitTypes.kind(), ErrorKind::Validation);
        assert_eq!(LedgerError::MixedSplitTypes.http_status_code(), 400);
        assert_eq!(LedgerError::FriendNotFound.kind(), ErrorKind::Authorization);
        assert_eq!(LedgerError::FriendNotFound.http_status_code(), 403);
        assert_eq!(LedgerError::GroupNotFound.http_status_code(), 404);
        assert_eq!(
            LedgerError::ExpenseNotFound(ExpenseId::from_u128(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::Storage("down".to_string()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_nothing_is_retryable() {
        assert!(!LedgerError::Storage("down".to_string()).is_retryable());
        assert!(!LedgerError::InvalidParticipant.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::SplitTotalMismatch {
            expected: Decimal::new(10000, 2),
            actual: Decimal::new(9999, 2),
        };
        assert_eq!(
            err.to_string(),
            "Split total 99.99 does not match expense amount 100.00"
        );

        let err = LedgerError::InvalidStatusTransition {
            from: SettlementStatus::Cancelled,
            to: SettlementStatus::Completed,
        };
        assert_eq!(err.to_string(), "Cannot move settlement from cancelled to completed");
    }

    #[test]
    fn test_internal_errors_are_opaque_at_the_boundary() {
        let app: AppError = LedgerError::InvariantViolation("edges 99 != total 100".into()).into();
        assert_eq!(app.error_code(), "INTERNAL_ERROR");
        assert!(!app.to_string().contains("edges"));

        let app: AppError = LedgerError::NotGroupMember.into();
        assert_eq!(app.status_code(), 403);
    }
}
