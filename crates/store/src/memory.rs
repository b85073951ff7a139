//! Thread-safe in-memory ledger.
//!
//! [`MemoryLedger`] implements all three collaborator traits of the engine on
//! top of `DashMap`s. Every record is stored and replaced as one value, so a
//! reader never sees an expense with half of its payment and split set.
//!
//! Each scope carries a revision taken from one shared clock. Writers store
//! the record first and bump the revision second, so a reader that saw a
//! revision always sees data at least that new.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use splitledger_core::ledger::{
    Expense, ExpenseStore, LedgerError, LedgerHistory, Participant, Scope, ScopeDirectory,
    ScopeHistory, Settlement, SettlementStatus,
};
use splitledger_shared::types::{Currency, ExpenseId, GroupId, PendingUserId, SettlementId, UserId};
use tracing::debug;

/// Reads of a scope's history retried before giving up under write contention.
const HISTORY_READ_ATTEMPTS: usize = 64;

/// A group known to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Display name.
    pub name: String,
    /// Settlement currency of every expense in the group.
    pub currency: Currency,
    /// Registered and pending members.
    pub members: BTreeSet<Participant>,
}

/// State of a friendship between two users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    /// Requested, not yet accepted. Expenses are refused.
    Pending,
    /// Both sides agreed. Direct expenses are allowed.
    Accepted,
}

#[derive(Debug, Clone, Copy)]
struct FriendshipRecord {
    currency: Currency,
    status: FriendshipStatus,
}

/// In-memory directory, history and store.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    groups: DashMap<GroupId, GroupRecord>,
    friendships: DashMap<Scope, FriendshipRecord>,
    expenses: DashMap<ExpenseId, Expense>,
    settlements: DashMap<SettlementId, Settlement>,
    revisions: DashMap<Scope, u64>,
    clock: AtomicU64,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a group. Returns `false` and changes nothing if the id is taken.
    pub fn add_group(
        &self,
        id: GroupId,
        name: impl Into<String>,
        currency: Currency,
        members: impl IntoIterator<Item = Participant>,
    ) -> bool {
        match self.groups.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(GroupRecord {
                    name: name.into(),
                    currency,
                    members: members.into_iter().collect(),
                });
                self.touch(Scope::group(id));
                true
            }
        }
    }

    /// Adds a member to an existing group.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` if the group does not exist.
    pub fn add_member(&self, group: GroupId, participant: Participant) -> Result<(), LedgerError> {
        self.groups
            .get_mut(&group)
            .ok_or(LedgerError::GroupNotFound)?
            .members
            .insert(participant);
        self.touch(Scope::group(group));
        Ok(())
    }

    /// Creates or replaces the friendship between `a` and `b`.
    pub fn set_friendship(
        &self,
        a: UserId,
        b: UserId,
        currency: Currency,
        status: FriendshipStatus,
    ) {
        let scope = Scope::friends(a, b);
        self.friendships
            .insert(scope, FriendshipRecord { currency, status });
        self.touch(scope);
    }

    /// Returns a copy of a group record.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<GroupRecord> {
        self.groups.get(&id).map(|g| g.value().clone())
    }

    /// Number of stored expenses, deleted ones included.
    #[must_use]
    pub fn expense_count(&self) -> usize {
        self.expenses.len()
    }

    /// Advances the revision of `scope`. Never moves it backwards, even when two
    /// writers finish out of clock order.
    fn touch(&self, scope: Scope) {
        let revision = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        self.revisions
            .entry(scope)
            .and_modify(|current| *current = (*current).max(revision))
            .or_insert(revision);
    }
}

impl ScopeDirectory for MemoryLedger {
    fn scope_currency(&self, scope: &Scope) -> Result<Currency, LedgerError> {
        match scope.canonical() {
            Scope::Group { group_id } => self
                .groups
                .get(&group_id)
                .map(|g| g.currency)
                .ok_or(LedgerError::GroupNotFound),
            friends @ Scope::Friends { .. } => {
                let record = self
                    .friendships
                    .get(&friends)
                    .ok_or(LedgerError::FriendNotFound)?;
                match record.status {
                    FriendshipStatus::Accepted => Ok(record.currency),
                    FriendshipStatus::Pending => Err(LedgerError::InvalidFriendAction),
                }
            }
        }
    }

    fn is_member(&self, scope: &Scope, participant: &Participant) -> Result<bool, LedgerError> {
        Ok(match scope.canonical() {
            Scope::Group { group_id } => self
                .groups
                .get(&group_id)
                .is_some_and(|g| g.members.contains(participant)),
            Scope::Friends { low, high } => {
                matches!(participant, Participant::User(id) if *id == low || *id == high)
            }
        })
    }

    fn scopes_for_user(&self, user: UserId) -> Result<Vec<Scope>, LedgerError> {
        let me = Participant::User(user);
        let mut scopes: Vec<Scope> = self
            .groups
            .iter()
            .filter(|g| g.members.contains(&me))
            .map(|g| Scope::group(*g.key()))
            .collect();
        scopes.extend(self.friendships.iter().filter_map(|f| match *f.key() {
            Scope::Friends { low, high }
                if f.status == FriendshipStatus::Accepted && (low == user || high == user) =>
            {
                Some(*f.key())
            }
            _ => None,
        }));
        Ok(scopes)
    }
}

impl LedgerHistory for MemoryLedger {
    fn fetch_expenses(&self, scope: &Scope) -> Result<Vec<Expense>, LedgerError> {
        let scope = scope.canonical();
        let mut expenses: Vec<Expense> = self
            .expenses
            .iter()
            .filter(|e| e.scope == scope && !e.is_deleted())
            .map(|e| e.value().clone())
            .collect();
        expenses.sort_by_key(|e| e.id);
        Ok(expenses)
    }

    fn fetch_settlements(
        &self,
        scope: &Scope,
        status: SettlementStatus,
    ) -> Result<Vec<Settlement>, LedgerError> {
        let scope = scope.canonical();
        let mut settlements: Vec<Settlement> = self
            .settlements
            .iter()
            .filter(|s| s.scope == scope && s.status == status)
            .map(|s| s.value().clone())
            .collect();
        settlements.sort_by_key(|s| s.id);
        Ok(settlements)
    }

    fn revision(&self, scope: &Scope) -> Result<u64, LedgerError> {
        Ok(self
            .revisions
            .get(&scope.canonical())
            .map_or(0, |r| *r.value()))
    }

    /// Reads both lists and accepts them only if no write to the scope was
    /// published in between. Each attempt that races a writer is repeated.
    fn fetch_history(&self, scope: &Scope) -> Result<ScopeHistory, LedgerError> {
        let mut revision = self.revision(scope)?;
        for _ in 0..HISTORY_READ_ATTEMPTS {
            let history = ScopeHistory {
                expenses: self.fetch_expenses(scope)?,
                settlements: self.fetch_settlements(scope, SettlementStatus::Completed)?,
            };
            let after = self.revision(scope)?;
            if after == revision {
                return Ok(history);
            }
            revision = after;
        }
        Err(LedgerError::Storage(format!(
            "history of {scope} changed on every one of {HISTORY_READ_ATTEMPTS} reads"
        )))
    }
}

impl ExpenseStore for MemoryLedger {
    fn save_expense(&self, expense: Expense) -> Result<Expense, LedgerError> {
        let scope = expense.scope;
        self.expenses.insert(expense.id, expense.clone());
        self.touch(scope);
        Ok(expense)
    }

    fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, LedgerError> {
        Ok(self.expenses.get(&id).map(|e| e.value().clone()))
    }

    fn delete_expense(&self, id: ExpenseId, at: DateTime<Utc>) -> Result<(), LedgerError> {
        let scope = {
            let mut expense = self
                .expenses
                .get_mut(&id)
                .filter(|e| !e.is_deleted())
                .ok_or(LedgerError::ExpenseNotFound(id))?;
            expense.deleted_at = Some(at);
            expense.updated_at = at;
            expense.scope
        };
        self.touch(scope);
        Ok(())
    }

    fn save_settlement(&self, settlement: Settlement) -> Result<Settlement, LedgerError> {
        let scope = settlement.scope;
        self.settlements.insert(settlement.id, settlement.clone());
        self.touch(scope);
        Ok(settlement)
    }

    fn find_settlement(&self, id: SettlementId) -> Result<Option<Settlement>, LedgerError> {
        Ok(self.settlements.get(&id).map(|s| s.value().clone()))
    }

    fn reconcile_pending_user(
        &self,
        pending: PendingUserId,
        user: UserId,
    ) -> Result<usize, LedgerError> {
        let mut touched = BTreeSet::new();
        let mut records = 0;

        for mut expense in self.expenses.iter_mut() {
            let before = expense.value().clone();
            expense.reconcile(pending, user);
            if *expense.value() != before {
                records += 1;
                touched.insert(expense.scope);
            }
        }
        for mut settlement in self.settlements.iter_mut() {
            let before = settlement.value().clone();
            settlement.reconcile(pending, user);
            if *settlement.value() != before {
                records += 1;
                touched.insert(settlement.scope);
            }
        }
        for mut group in self.groups.iter_mut() {
            if group.members.remove(&Participant::Pending(pending)) {
                group.members.insert(Participant::User(user));
                touched.insert(Scope::group(*group.key()));
            }
        }

        debug!(
            pending_user_id = %pending,
            user_id = %user,
            records,
            scopes = touched.len(),
            "Pending user rewritten"
        );
        for scope in touched {
            self.touch(scope);
        }
        Ok(records)
    }
}
