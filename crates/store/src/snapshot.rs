//! JSON snapshots of a ledger.
//!
//! A snapshot declares groups and friendships, then lists raw expense and
//! settlement inputs. Replaying it pushes every input through
//! [`LedgerService`], so a snapshot can never smuggle in a record the
//! validator would refuse. Refused records are reported, not fatal.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use splitledger_core::ledger::{
    ErrorKind, Expense, ExpenseInput, LedgerError, LedgerService, ParticipantRef, Settlement,
    SettlementInput,
};
use splitledger_shared::types::{Currency, GroupId, PendingUserId, UserId};
use thiserror::Error;
use tracing::{info, warn};

use crate::memory::{FriendshipStatus, MemoryLedger};

/// Errors that stop a snapshot from loading.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file could not be read.
    #[error("Cannot read snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid snapshot document.
    #[error("Malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// Two groups share an id.
    #[error("Group {0} is declared twice")]
    DuplicateGroup(GroupId),

    /// A friendship names the same user on both sides.
    #[error("User {0} cannot befriend themselves")]
    SelfFriendship(UserId),

    /// A declaration was invalid, or the engine failed internally.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A group declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSeed {
    /// Group id.
    pub id: GroupId,
    /// Display name.
    pub name: String,
    /// Settlement currency.
    pub currency: Currency,
    /// Registered or pending members.
    #[serde(default)]
    pub members: Vec<ParticipantRef>,
}

/// A friendship declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendshipSeed {
    /// The two friends, in any order.
    pub users: (UserId, UserId),
    /// Settlement currency; the configured default when absent.
    #[serde(default)]
    pub currency: Option<Currency>,
    /// Whether the request was accepted.
    pub status: FriendshipStatus,
}

/// A pending user who registered after the history was written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Registration {
    /// The placeholder used in the history.
    pub pending_user_id: PendingUserId,
    /// The account it became.
    pub user_id: UserId,
}

/// A full ledger document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Groups with their members.
    #[serde(default)]
    pub groups: Vec<GroupSeed>,
    /// Friend pairs for direct expenses.
    #[serde(default)]
    pub friendships: Vec<FriendshipSeed>,
    /// Expenses, recorded in order.
    #[serde(default)]
    pub expenses: Vec<ExpenseInput>,
    /// Settlements, recorded in order after the expenses.
    #[serde(default)]
    pub settlements: Vec<SettlementInput>,
    /// Registrations, applied last.
    #[serde(default)]
    pub registrations: Vec<Registration>,
}

/// The kind of record a [`Rejection`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// An entry of `expenses`.
    Expense,
    /// An entry of `settlements`.
    Settlement,
}

/// A snapshot record the validator refused.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    /// Which list the record came from.
    pub record: RecordKind,
    /// Position in that list.
    pub index: usize,
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable reason.
    pub message: String,
}

/// Outcome of replaying a snapshot.
#[derive(Debug)]
pub struct Replay {
    /// The populated ledger.
    pub ledger: Arc<MemoryLedger>,
    /// Expenses as recorded.
    pub expenses: Vec<Expense>,
    /// Settlements as recorded.
    pub settlements: Vec<Settlement>,
    /// Records the validator refused.
    pub rejected: Vec<Rejection>,
    /// Records rewritten by registrations.
    pub reconciled: usize,
}

impl Replay {
    fn reject(
        &mut self,
        record: RecordKind,
        index: usize,
        err: LedgerError,
    ) -> Result<(), SnapshotError> {
        if err.kind() == ErrorKind::Internal {
            return Err(err.into());
        }
        warn!(?record, index, code = err.error_code(), error = %err, "Snapshot record rejected");
        self.rejected.push(Rejection {
            record,
            index,
            code: err.error_code(),
            message: err.to_string(),
        });
        Ok(())
    }
}

impl Snapshot {
    /// Reads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses a snapshot from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `Json` if the document is malformed.
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Builds a fresh [`MemoryLedger`] and records the whole snapshot into it.
    ///
    /// Declarations are applied first, then expenses, settlements and
    /// registrations in document order. An expense or settlement that fails
    /// validation, authorization or lookup is listed in [`Replay::rejected`]
    /// and replay continues.
    ///
    /// # Errors
    ///
    /// Fails on invalid declarations and on internal engine errors.
    pub fn replay(&self, default_currency: Currency) -> Result<Replay, SnapshotError> {
        let ledger = Arc::new(MemoryLedger::new());

        for group in &self.groups {
            let members = group
                .members
                .iter()
                .map(ParticipantRef::resolve)
                .collect::<Result<Vec<_>, _>>()?;
            if !ledger.add_group(group.id, group.name.as_str(), group.currency, members) {
                return Err(SnapshotError::DuplicateGroup(group.id));
            }
        }

        for friendship in &self.friendships {
            let (a, b) = friendship.users;
            if a == b {
                return Err(SnapshotError::SelfFriendship(a));
            }
            let currency = friendship.currency.unwrap_or(default_currency);
            ledger.set_friendship(a, b, currency, friendship.status);
        }

        let service = LedgerService::new(Arc::clone(&ledger), Arc::clone(&ledger));
        let mut replay = Replay {
            ledger: Arc::clone(&ledger),
            expenses: Vec::with_capacity(self.expenses.len()),
            settlements: Vec::with_capacity(self.settlements.len()),
            rejected: Vec::new(),
            reconciled: 0,
        };

        for (index, input) in self.expenses.iter().enumerate() {
            match service.record_expense(input) {
                Ok(expense) => replay.expenses.push(expense),
                Err(err) => replay.reject(RecordKind::Expense, index, err)?,
            }
        }

        for (index, input) in self.settlements.iter().enumerate() {
            match service.record_settlement(input) {
                Ok(settlement) => replay.settlements.push(settlement),
                Err(err) => replay.reject(RecordKind::Settlement, index, err)?,
            }
        }

        for registration in &self.registrations {
            replay.reconciled +=
                service.reconcile_pending_user(registration.pending_user_id, registration.user_id)?;
        }

        info!(
            groups = self.groups.len(),
            friendships = self.friendships.len(),
            expenses = replay.expenses.len(),
            settlements = replay.settlements.len(),
            rejected = replay.rejected.len(),
            "Snapshot replayed"
        );
        Ok(replay)
    }
}
