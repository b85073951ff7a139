//! In-crate test doubles for the collaborator traits.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use splitledger_shared::types::{Currency, ExpenseId, GroupId, PendingUserId, SettlementId, UserId};

use crate::ledger::error::LedgerError;
use crate::ledger::store::{ExpenseStore, LedgerHistory, ScopeDirectory};
use crate::ledger::types::{Expense, Participant, Scope, Settlement, SettlementStatus};

#[derive(Default)]
struct State {
    groups: BTreeMap<GroupId, (Currency, BTreeSet<Participant>)>,
    friends: BTreeMap<Scope, (Currency, bool)>,
    expenses: BTreeMap<ExpenseId, Expense>,
    settlements: BTreeMap<SettlementId, Settlement>,
    revision: u64,
}

/// Lock-guarded fake of the directory, history and store.
#[derive(Default)]
pub struct FakeLedger {
    state: RwLock<State>,
}

pub fn user(n: u128) -> UserId {
    UserId::from_u128(n)
}

pub fn participant(n: u128) -> Participant {
    Participant::User(user(n))
}

impl FakeLedger {
    pub fn with_group(group: GroupId, currency: Currency, members: &[Participant]) -> Self {
        let fake = Self::default();
        fake.add_group(group, currency, members);
        fake
    }

    pub fn add_group(&self, group: GroupId, currency: Currency, members: &[Participant]) {
        self.state
            .write()
            .unwrap()
            .groups
            .insert(group, (currency, members.iter().copied().collect()));
    }

    pub fn add_friendship(&self, a: UserId, b: UserId, currency: Currency, accepted: bool) {
        self.state
            .write()
            .unwrap()
            .friends
            .insert(Scope::friends(a, b), (currency, accepted));
    }

    pub fn expense_count(&self) -> usize {
        self.state.read().unwrap().expenses.len()
    }
}

impl ScopeDirectory for FakeLedger {
    fn scope_currency(&self, scope: &Scope) -> Result<Currency, LedgerError> {
        let state = self.state.read().unwrap();
        match scope {
            Scope::Group { group_id } => state
                .groups
                .get(group_id)
                .map(|(currency, _)| *currency)
                .ok_or(LedgerError::GroupNotFound),
            Scope::Friends { .. } => match state.friends.get(scope) {
                None => Err(LedgerError::FriendNotFound),
                Some((_, false)) => Err(LedgerError::InvalidFriendAction),
                Some((currency, true)) => Ok(*currency),
            },
        }
    }

    fn is_member(&self, scope: &Scope, participant: &Participant) -> Result<bool, LedgerError> {
        let state = self.state.read().unwrap();
        Ok(match scope {
            Scope::Group { group_id } => state
                .groups
                .get(group_id)
                .is_some_and(|(_, members)| members.contains(participant)),
            Scope::Friends { low, high } => {
                matches!(participant, Participant::User(id) if id == low || id == high)
            }
        })
    }

    fn scopes_for_user(&self, user: UserId) -> Result<Vec<Scope>, LedgerError> {
        let state = self.state.read().unwrap();
        let me = Participant::User(user);
        let groups = state
            .groups
            .iter()
            .filter(|(_, (_, members))| members.contains(&me))
            .map(|(id, _)| Scope::group(*id));
        let friends = state.friends.iter().filter_map(|(scope, (_, accepted))| match scope {
            Scope::Friends { low, high } if *accepted && (*low == user || *high == user) => {
                Some(*scope)
            }
            _ => None,
        });
        Ok(groups.chain(friends).collect())
    }
}

impl LedgerHistory for FakeLedger {
    fn fetch_expenses(&self, scope: &Scope) -> Result<Vec<Expense>, LedgerError> {
        let state = self.state.read().unwrap();
        Ok(state
            .expenses
            .values()
            .filter(|e| e.scope == *scope && !e.is_deleted())
            .cloned()
            .collect())
    }

    fn fetch_settlements(
        &self,
        scope: &Scope,
        status: SettlementStatus,
    ) -> Result<Vec<Settlement>, LedgerError> {
        let state = self.state.read().unwrap();
        Ok(state
            .settlements
            .values()
            .filter(|s| s.scope == *scope && s.status == status)
            .cloned()
            .collect())
    }

    fn revision(&self, _scope: &Scope) -> Result<u64, LedgerError> {
        Ok(self.state.read().unwrap().revision)
    }
}

impl ExpenseStore for FakeLedger {
    fn save_expense(&self, expense: Expense) -> Result<Expense, LedgerError> {
        let mut state = self.state.write().unwrap();
        state.revision += 1;
        state.expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    fn find_expense(&self, id: ExpenseId) -> Result<Option<Expense>, LedgerError> {
        Ok(self.state.read().unwrap().expenses.get(&id).cloned())
    }

    fn delete_expense(&self, id: ExpenseId, at: DateTime<Utc>) -> Result<(), LedgerError> {
        let mut state = self.state.write().unwrap();
        let expense = state
            .expenses
            .get_mut(&id)
            .filter(|e| !e.is_deleted())
            .ok_or(LedgerError::ExpenseNotFound(id))?;
        expense.deleted_at = Some(at);
        state.revision += 1;
        Ok(())
    }

    fn save_settlement(&self, settlement: Settlement) -> Result<Settlement, LedgerError> {
        let mut state = self.state.write().unwrap();
        state.revision += 1;
        state.settlements.insert(settlement.id, settlement.clone());
        Ok(settlement)
    }

    fn find_settlement(&self, id: SettlementId) -> Result<Option<Settlement>, LedgerError> {
        Ok(self.state.read().unwrap().settlements.get(&id).cloned())
    }

    fn reconcile_pending_user(
        &self,
        pending: PendingUserId,
        user: UserId,
    ) -> Result<usize, LedgerError> {
        let mut state = self.state.write().unwrap();
        let mut touched = 0;
        for expense in state.expenses.values_mut() {
            let before = expense.clone();
            expense.reconcile(pending, user);
            touched += usize::from(*expense != before);
        }
        for settlement in state.settlements.values_mut() {
            let before = settlement.clone();
            settlement.reconcile(pending, user);
            touched += usize::from(*settlement != before);
        }
        for (_, members) in state.groups.values_mut() {
            if members.remove(&Participant::Pending(pending)) {
                members.insert(Participant::User(user));
            }
        }
        state.revision += 1;
        Ok(touched)
    }
}
