//! Collaborator traits the engine depends on but does not implement.
//!
//! Membership, history reads and persistence live behind these seams so the
//! engine stays free of I/O. Implementations must hand out transactionally
//! consistent snapshots: an expense is always read with its complete payment
//! and split set, never a partial one.

use chrono::{DateTime, Utc};
use splitledger_shared::types::{Currency, ExpenseId, PendingUserId, SettlementId, UserId};

use super::error::LedgerError;
use super::types::{Expense, Participant, Scope, Settlement, SettlementStatus};

/// Membership and scope metadata.
pub trait ScopeDirectory: Send + Sync {
    /// Returns the settlement currency of a scope.
    ///
    /// This doubles as the existence check for the scope.
    ///
    /// # Errors
    ///
    /// `GroupNotFound` for unknown groups, `FriendNotFound` when the two users are
    /// not friends, `InvalidFriendAction` when the friendship is not accepted.
    fn scope_currency(&self, scope: &Scope) -> Result<Currency, LedgerError>;

    /// Returns true if `participant` belongs to `scope`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the directory cannot be read.
    fn is_member(&self, scope: &Scope, participant: &Participant) -> Result<bool, LedgerError>;

    /// Returns every scope `user` participates in.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the directory cannot be read.
    fn scopes_for_user(&self, user: UserId) -> Result<Vec<Scope>, LedgerError>;
}

/// The balance-relevant history of one scope: live expenses and completed
/// settlements, read as one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeHistory {
    /// Non-deleted expenses.
    pub expenses: Vec<Expense>,
    /// Completed settlements.
    pub settlements: Vec<Settlement>,
}

/// Read access to the history of a scope.
pub trait LedgerHistory: Send + Sync {
    /// Returns all non-deleted expenses of the scope.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if history cannot be read.
    fn fetch_expenses(&self, scope: &Scope) -> Result<Vec<Expense>, LedgerError>;

    /// Returns all settlements of the scope in the given status.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if history cannot be read.
    fn fetch_settlements(
        &self,
        scope: &Scope,
        status: SettlementStatus,
    ) -> Result<Vec<Settlement>, LedgerError>;

    /// Returns a counter that changes on every mutation of the scope.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if history cannot be read.
    fn revision(&self, scope: &Scope) -> Result<u64, LedgerError>;

    /// Returns the expenses and completed settlements of the scope as one
    /// consistent snapshot.
    ///
    /// The default issues the two reads back to back. Stores that can serve
    /// both under one lock or transaction should override it.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if history cannot be read.
    fn fetch_history(&self, scope: &Scope) -> Result<ScopeHistory, LedgerError> {
        Ok(ScopeHistory {
            expenses: self.fetch_expenses(scope)?,
            settlements: self.fetch_settlements(scope, SettlementStatus::Completed)?,
        })
    }
}

/// Persistence of validated records.
///
/// Each call is atomic: an expense is written or replaced together with its
/// payments and splits.
pub trait ExpenseStore: Send + Sync {
    /// Inserts or replaces an expense.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on write failure.
    fn save_expense(&self, expense: Expense) -> Result<Expense, LedgerError>;

    /// Looks up an expense, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on read failure.
    fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, LedgerError>;

    /// Soft-deletes an expense.
    ///
    /// # Errors
    ///
    /// Returns `ExpenseNotFound` if it does not exist or is already deleted.
    fn delete_expense(&self, id: ExpenseId, at: DateTime<Utc>) -> Result<(), LedgerError>;

    /// Inserts or replaces a settlement.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on write failure.
    fn save_settlement(&self, settlement: Settlement) -> Result<Settlement, LedgerError>;

    /// Looks up a settlement.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on read failure.
    fn find_settlement(&self, id: SettlementId) -> Result<Option<Settlement>, LedgerError>;

    /// Rewrites every reference to `pending` as `user`, returning the number of
    /// records touched.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on write failure.
    fn reconcile_pending_user(
        &self,
        pending: PendingUserId,
        user: UserId,
    ) -> Result<usize, LedgerError>;
}

/// Fails with the scope's denial error unless `participant` belongs to `scope`.
///
/// Group scopes deny with `NotGroupMember`. Friend scopes deny with
/// `InvalidFriendAction`: only the two friends may appear.
///
/// # Errors
///
/// See above, plus any error of [`ScopeDirectory::is_member`].
pub fn ensure_member<D>(
    directory: &D,
    scope: &Scope,
    participant: &Participant,
) -> Result<(), LedgerError>
where
    D: ScopeDirectory + ?Sized,
{
    if directory.is_member(scope, participant)? {
        return Ok(());
    }
    match scope {
        Scope::Group { .. } => Err(LedgerError::NotGroupMember),
        Scope::Friends { .. } => Err(LedgerError::InvalidFriendAction),
    }
}
