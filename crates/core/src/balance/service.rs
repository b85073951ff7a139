//! Balance service: the read side of the engine.
//!
//! Every query checks authorization first, then reads the scope history in one
//! fetch and recomputes from scratch (or takes a cached ledger for the same
//! revision). Nothing here writes.

use std::sync::Arc;

use rayon::prelude::*;
use splitledger_shared::types::{Currency, GroupId, UserId};
use tracing::debug;

use super::cache::BalanceCache;
use super::matrix::ScopeLedger;
use super::simplify::simplify;
use super::types::{NetPosition, PairwiseBalance, SettlementPlan, UserBalance};
use crate::ledger::error::LedgerError;
use crate::ledger::store::{LedgerHistory, ScopeDirectory, ensure_member};
use crate::ledger::types::{Participant, Scope};

/// Balance queries over a directory and a history.
pub struct BalanceService<D, H> {
    directory: Arc<D>,
    history: Arc<H>,
    cache: Option<BalanceCache>,
}

impl<D, H> Clone for BalanceService<D, H> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            history: Arc::clone(&self.history),
            cache: self.cache.clone(),
        }
    }
}

impl<D, H> BalanceService<D, H>
where
    D: ScopeDirectory,
    H: LedgerHistory,
{
    /// Creates a balance service without caching.
    #[must_use]
    pub const fn new(directory: Arc<D>, history: Arc<H>) -> Self {
        Self {
            directory,
            history,
            cache: None,
        }
    }

    /// Enables or disables the scope ledger cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Option<BalanceCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Netted pairwise balances of a group.
    ///
    /// # Errors
    ///
    /// `GroupNotFound`, `NotGroupMember` if `requester` is not in the group, or
    /// an internal error.
    pub fn compute_group_balances(
        &self,
        group_id: GroupId,
        requester: UserId,
    ) -> Result<Vec<PairwiseBalance>, LedgerError> {
        let ledger = self.authorized_ledger(Scope::group(group_id), requester)?;
        Ok(ledger.pairwise_balances().to_vec())
    }

    /// A user's net position in a group with its pairwise breakdown.
    ///
    /// # Errors
    ///
    /// `GroupNotFound`, `NotGroupMember`, or an internal error.
    pub fn compute_user_balance(
        &self,
        group_id: GroupId,
        user_id: UserId,
    ) -> Result<UserBalance, LedgerError> {
        let ledger = self.authorized_ledger(Scope::group(group_id), user_id)?;
        Ok(user_balance(&ledger, user_id))
    }

    /// A user's net position in every scope they belong to, ordered by scope.
    ///
    /// Scopes are computed in parallel. Positions in different scopes may be in
    /// different currencies and are never summed.
    ///
    /// # Errors
    ///
    /// The first error of any scope.
    pub fn compute_overall_balance(
        &self,
        user_id: UserId,
    ) -> Result<Vec<NetPosition>, LedgerError> {
        let mut scopes = self.directory.scopes_for_user(user_id)?;
        scopes.sort_unstable();
        scopes.dedup();

        let participant = Participant::User(user_id);
        let positions = scopes
            .par_iter()
            .map(|scope| {
                let ledger = self.ledger(*scope)?;
                Ok(ledger.position_of(participant))
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        debug!(user_id = %user_id, scopes = positions.len(), "Overall balance computed");
        Ok(positions)
    }

    /// Settlement plan for a group.
    ///
    /// # Errors
    ///
    /// `GroupNotFound`, `NotGroupMember`, or `InvariantViolation` if the positions
    /// are inconsistent.
    pub fn simplify_debts(
        &self,
        group_id: GroupId,
        requester: UserId,
    ) -> Result<SettlementPlan, LedgerError> {
        let ledger = self.authorized_ledger(Scope::group(group_id), requester)?;
        simplify(ledger.scope(), ledger.currency(), ledger.net_positions())
    }

    /// A user's balance with one friend, outside any group.
    ///
    /// # Errors
    ///
    /// `FriendNotFound`, `InvalidFriendAction` for a friendship that is not
    /// accepted, or an internal error.
    pub fn compute_friend_balance(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<UserBalance, LedgerError> {
        let ledger = self.authorized_ledger(Scope::friends(user_id, friend_id), user_id)?;
        Ok(user_balance(&ledger, user_id))
    }

    /// Settlement plan between two friends.
    ///
    /// # Errors
    ///
    /// As [`BalanceService::compute_friend_balance`], plus `InvariantViolation`.
    pub fn simplify_friend_debts(
        &self,
        user_id: UserId,
        friend_id: UserId,
    ) -> Result<SettlementPlan, LedgerError> {
        let ledger = self.authorized_ledger(Scope::friends(user_id, friend_id), user_id)?;
        simplify(ledger.scope(), ledger.currency(), ledger.net_positions())
    }

    /// Checks that `requester` may read `scope`, then computes its ledger.
    fn authorized_ledger(
        &self,
        scope: Scope,
        requester: UserId,
    ) -> Result<Arc<ScopeLedger>, LedgerError> {
        self.directory.scope_currency(&scope)?;
        ensure_member(self.directory.as_ref(), &scope, &Participant::User(requester))?;
        self.ledger(scope)
    }

    fn ledger(&self, scope: Scope) -> Result<Arc<ScopeLedger>, LedgerError> {
        let currency = self.directory.scope_currency(&scope)?;

        let Some(cache) = &self.cache else {
            return self.compute(scope, currency).map(Arc::new);
        };

        // The revision is read before the history so a concurrent write can only
        // make the cached entry newer than its key, never older.
        let revision = self.history.revision(&scope)?;
        if let Some(hit) = cache.get(scope, revision) {
            debug!(%scope, revision, "Scope ledger cache hit");
            return Ok(hit);
        }

        let ledger = Arc::new(self.compute(scope, currency)?);
        cache.insert(revision, Arc::clone(&ledger));
        Ok(ledger)
    }

    fn compute(&self, scope: Scope, currency: Currency) -> Result<ScopeLedger, LedgerError> {
        let history = self.history.fetch_history(&scope)?;
        ScopeLedger::build(scope, currency, &history.expenses, &history.settlements)
    }
}

fn user_balance(ledger: &ScopeLedger, user_id: UserId) -> UserBalance {
    let participant = Participant::User(user_id);
    let (owes, owed_by) = ledger
        .pairwise_balances()
        .iter()
        .filter(|b| b.debtor == participant || b.creditor == participant)
        .copied()
        .partition(|b| b.debtor == participant);

    UserBalance {
        user: user_id,
        position: ledger.position_of(participant),
        summary: ledger.summary_of(participant),
        owes,
        owed_by,
    }
}
