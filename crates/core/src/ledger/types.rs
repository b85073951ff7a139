//! Ledger domain types.
//!
//! Inputs (`*Input`, [`ParticipantRef`]) mirror what a caller submits: raw decimals
//! and optional references. Validated records ([`Expense`], [`Settlement`]) hold
//! exact [`Money`] and tagged [`Participant`]s and are only produced by
//! [`LedgerService`](super::service::LedgerService).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use splitledger_shared::types::{
    Currency, ExpenseId, GroupId, Money, PendingUserId, SettlementId, UserId,
};

use super::error::LedgerError;

/// A person referenced by an expense or settlement.
///
/// Ordering puts registered users before pending users, then orders by id.
/// Every deterministic tie-break in the engine relies on this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Participant {
    /// A registered user.
    User(UserId),
    /// An invited person who has not registered yet.
    Pending(PendingUserId),
}

impl Participant {
    /// Returns the registered user id, if this is a registered user.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Pending(_) => None,
        }
    }

    /// Rewrites `pending` to `user`; any other participant is returned unchanged.
    #[must_use]
    pub fn reconcile(self, pending: PendingUserId, user: UserId) -> Self {
        match self {
            Self::Pending(id) if id == pending => Self::User(user),
            other => other,
        }
    }
}

impl std::fmt::Display for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Pending(id) => write!(f, "pending:{id}"),
        }
    }
}

impl From<UserId> for Participant {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl From<PendingUserId> for Participant {
    fn from(id: PendingUserId) -> Self {
        Self::Pending(id)
    }
}

/// Raw participant reference as submitted by a caller: two optional ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRef {
    /// Registered user id.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Pending user id.
    #[serde(default)]
    pub pending_user_id: Option<PendingUserId>,
}

impl ParticipantRef {
    /// Reference to a registered user.
    #[must_use]
    pub const fn user(id: UserId) -> Self {
        Self {
            user_id: Some(id),
            pending_user_id: None,
        }
    }

    /// Reference to a pending user.
    #[must_use]
    pub const fn pending(id: PendingUserId) -> Self {
        Self {
            user_id: None,
            pending_user_id: Some(id),
        }
    }

    /// Converts the reference into a [`Participant`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidParticipant` unless exactly one id is set.
    pub fn resolve(&self) -> Result<Participant, LedgerError> {
        match (self.user_id, self.pending_user_id) {
            (Some(user), None) => Ok(Participant::User(user)),
            (None, Some(pending)) => Ok(Participant::Pending(pending)),
            _ => Err(LedgerError::InvalidParticipant),
        }
    }
}

impl From<Participant> for ParticipantRef {
    fn from(participant: Participant) -> Self {
        match participant {
            Participant::User(id) => Self::user(id),
            Participant::Pending(id) => Self::pending(id),
        }
    }
}

/// The balance universe being queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scope {
    /// All expenses and settlements of one group.
    Group {
        /// The group.
        group_id: GroupId,
    },
    /// Direct expenses between two friends, outside any group.
    ///
    /// Always stored with `low < high`; build it with [`Scope::friends`].
    Friends {
        /// The smaller user id of the pair.
        low: UserId,
        /// The larger user id of the pair.
        high: UserId,
    },
}

impl Scope {
    /// Group scope.
    #[must_use]
    pub const fn group(group_id: GroupId) -> Self {
        Self::Group { group_id }
    }

    /// Friend scope with the pair in canonical order, so `(a, b)` and `(b, a)` match.
    #[must_use]
    pub fn friends(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self::Friends { low: a, high: b }
        } else {
            Self::Friends { low: b, high: a }
        }
    }

    /// Restores the `low < high` order of a friend pair that arrived from outside,
    /// for example through deserialization.
    #[must_use]
    pub fn canonical(self) -> Self {
        match self {
            Self::Friends { low, high } => Self::friends(low, high),
            group @ Self::Group { .. } => group,
        }
    }

    /// Returns the group id for group scopes.
    #[must_use]
    pub const fn group_id(&self) -> Option<GroupId> {
        match self {
            Self::Group { group_id } => Some(*group_id),
            Self::Friends { .. } => None,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Group { group_id } => write!(f, "group:{group_id}"),
            Self::Friends { low, high } => write!(f, "friends:{low}:{high}"),
        }
    }
}

/// How a split's amount is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    /// Total divided evenly; remainder cents go to the lowest participants.
    Equal,
    /// Caller supplies each amount.
    #[serde(alias = "fixed", alias = "custom")]
    Exact,
    /// Caller supplies percentages summing to 100.
    Percentage,
    /// Caller supplies integer share counts.
    Shares,
}

/// A payment as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    /// Who paid.
    #[serde(flatten)]
    pub participant: ParticipantRef,
    /// Amount paid, as an exact decimal.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Payment method, free text.
    #[serde(default)]
    pub method: Option<String>,
}

/// A split as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitInput {
    /// Who owes.
    #[serde(flatten)]
    pub participant: ParticipantRef,
    /// How the amount is determined.
    #[serde(rename = "type")]
    pub split_type: SplitType,
    /// Amount for exact splits.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub amount: Option<Decimal>,
    /// Percentage for percentage splits.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub percentage: Option<Decimal>,
    /// Share count for shares splits.
    #[serde(default)]
    pub shares: Option<u32>,
}

/// Input for creating or replacing an expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseInput {
    /// Scope the expense belongs to.
    pub scope: Scope,
    /// Short description.
    pub title: String,
    /// Optional notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Total amount, as an exact decimal.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Currency; defaults to the scope currency and must match it.
    #[serde(default)]
    pub currency: Option<Currency>,
    /// Date of the expense.
    pub date: NaiveDate,
    /// Optional category name.
    #[serde(default)]
    pub category: Option<String>,
    /// User recording the expense.
    pub created_by: UserId,
    /// Who paid, in order.
    pub payments: Vec<PaymentInput>,
    /// Who owes, in order.
    pub splits: Vec<SplitInput>,
}

/// Money a participant put in toward an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Who paid.
    pub participant: Participant,
    /// Amount paid.
    pub amount: Money,
    /// Payment method, free text.
    pub method: Option<String>,
}

/// A participant's share of responsibility for an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Who owes.
    pub participant: Participant,
    /// Amount owed.
    pub amount_owed: Money,
    /// How the amount was determined.
    pub split_type: SplitType,
    /// Percentage or share count behind the amount, if any.
    pub share_value: Option<Decimal>,
}

/// A validated expense.
///
/// Payments and splits each sum exactly to `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    /// Expense id.
    pub id: ExpenseId,
    /// Scope the expense belongs to.
    pub scope: Scope,
    /// Short description.
    pub title: String,
    /// Optional notes.
    pub notes: Option<String>,
    /// Total amount.
    pub amount: Money,
    /// Date of the expense.
    pub date: NaiveDate,
    /// Category slug.
    pub category: Option<String>,
    /// User who recorded the expense.
    pub created_by: UserId,
    /// Who paid, in input order.
    pub payments: Vec<Payment>,
    /// Who owes, in input order.
    pub splits: Vec<Split>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last replacement time.
    pub updated_at: DateTime<Utc>,
    /// Soft-deletion time.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Expense {
    /// Returns the expense currency.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.amount.currency
    }

    /// Returns true if the expense has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Rewrites every reference to `pending` as `user`.
    ///
    /// If `user` already paid or owed, the rewritten entry is folded into the
    /// existing one so each participant still appears at most once per side.
    pub fn reconcile(&mut self, pending: PendingUserId, user: UserId) {
        let mut payments: Vec<Payment> = Vec::with_capacity(self.payments.len());
        for mut payment in std::mem::take(&mut self.payments) {
            payment.participant = payment.participant.reconcile(pending, user);
            match payments
                .iter_mut()
                .find(|p| p.participant == payment.participant)
            {
                // Both parts are bounded by the expense total.
                Some(existing) => {
                    existing.amount.minor =
                        existing.amount.minor.saturating_add(payment.amount.minor);
                }
                None => payments.push(payment),
            }
        }
        self.payments = payments;

        let mut splits: Vec<Split> = Vec::with_capacity(self.splits.len());
        for mut split in std::mem::take(&mut self.splits) {
            split.participant = split.participant.reconcile(pending, user);
            match splits.iter_mut().find(|s| s.participant == split.participant) {
                Some(existing) => {
                    existing.amount_owed.minor = existing
                        .amount_owed
                        .minor
                        .saturating_add(split.amount_owed.minor);
                    existing.share_value = existing
                        .share_value
                        .zip(split.share_value)
                        .and_then(|(a, b)| a.checked_add(b));
                }
                None => splits.push(split),
            }
        }
        self.splits = splits;
    }
}

/// Settlement lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Recorded but not confirmed.
    Pending,
    /// Money changed hands; counts toward balances.
    Completed,
    /// Abandoned; never counts.
    Cancelled,
}

impl SettlementStatus {
    /// Returns true if settlements in this status reduce debts.
    #[must_use]
    pub const fn counts_toward_balance(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if moving from `self` to `next` is allowed.
    ///
    /// Only pending settlements change state; re-applying the current status is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next || (self == Self::Pending && next != Self::Pending)
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Input for recording a settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementInput {
    /// Scope the settlement belongs to.
    pub scope: Scope,
    /// Who pays.
    pub payer: ParticipantRef,
    /// Who receives.
    pub payee: ParticipantRef,
    /// Amount transferred, as an exact decimal.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// Currency; defaults to the scope currency and must match it.
    #[serde(default)]
    pub currency: Option<Currency>,
    /// Initial status; defaults to pending.
    #[serde(default)]
    pub status: Option<SettlementStatus>,
    /// Payment method, free text.
    #[serde(default)]
    pub method: Option<String>,
    /// External transaction reference.
    #[serde(default)]
    pub reference: Option<String>,
    /// Optional notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// User recording the settlement.
    pub created_by: UserId,
}

/// An explicit transfer that reduces the payer's debt to the payee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Settlement id.
    pub id: SettlementId,
    /// Scope the settlement belongs to.
    pub scope: Scope,
    /// Who pays.
    pub payer: Participant,
    /// Who receives.
    pub payee: Participant,
    /// Amount transferred. Immutable once recorded.
    pub amount: Money,
    /// Lifecycle status.
    pub status: SettlementStatus,
    /// Payment method, free text.
    pub method: Option<String>,
    /// External transaction reference.
    pub reference: Option<String>,
    /// Optional notes.
    pub notes: Option<String>,
    /// User who recorded the settlement.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
    /// When the settlement was completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Settlement {
    /// Rewrites every reference to `pending` as `user`.
    ///
    /// A settlement between `pending` and `user` becomes a transfer to oneself
    /// and is cancelled.
    pub fn reconcile(&mut self, pending: PendingUserId, user: UserId) {
        self.payer = self.payer.reconcile(pending, user);
        self.payee = self.payee.reconcile(pending, user);
        if self.payer == self.payee && self.status != SettlementStatus::Cancelled {
            self.status = SettlementStatus::Cancelled;
            self.updated_at = Utc::now();
        }
    }
}
