//! Ledger service for expense and settlement validation and recording.
//!
//! The service validates input, checks membership through a [`ScopeDirectory`]
//! and hands validated records to an [`ExpenseStore`]. Nothing is written unless
//! validation succeeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use splitledger_shared::types::{Currency, ExpenseId, PendingUserId, SettlementId, UserId};
use tracing::{debug, info};

use super::error::LedgerError;
use super::store::{ExpenseStore, ScopeDirectory, ensure_member};
use super::types::{
    Expense, ExpenseInput, Participant, Scope, Settlement, SettlementInput, SettlementStatus,
};
use super::validation::{
    category_slug, positive_money, resolve_payments, resolve_splits, validate_payment_total,
    validate_title,
};

/// Ledger service for expense and settlement mutations.
pub struct LedgerService<D, S> {
    directory: Arc<D>,
    store: Arc<S>,
}

impl<D, S> Clone for LedgerService<D, S> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            store: Arc::clone(&self.store),
        }
    }
}

impl<D, S> LedgerService<D, S>
where
    D: ScopeDirectory,
    S: ExpenseStore,
{
    /// Creates a new ledger service.
    #[must_use]
    pub const fn new(directory: Arc<D>, store: Arc<S>) -> Self {
        Self { directory, store }
    }

    /// Validate an expense and build the record to persist.
    ///
    /// Steps, in order:
    /// 1. Title is present
    /// 2. The scope exists and the creator belongs to it
    /// 3. Currency matches the scope and the total is positive
    /// 4. Payments and splits resolve to exact amounts
    /// 5. Every participant belongs to the scope
    /// 6. Payments and splits each sum exactly to the total
    /// 7. The category name yields a slug
    ///
    /// # Errors
    ///
    /// Returns the first `LedgerError` encountered. Nothing is persisted.
    pub fn validate_and_prepare(&self, input: &ExpenseInput) -> Result<Expense, LedgerError> {
        let now = Utc::now();
        self.build_expense(
            input,
            input.scope.canonical(),
            ExpenseId::new(),
            input.created_by,
            now,
            now,
        )
    }

    /// Validate a replacement for `existing`.
    ///
    /// The id, scope, creator and creation time are kept; the payment and split
    /// sets are replaced as a whole.
    ///
    /// # Errors
    ///
    /// Returns `ExpenseNotFound` if `existing` is deleted, otherwise the errors of
    /// [`LedgerService::validate_and_prepare`].
    pub fn prepare_update(
        &self,
        existing: &Expense,
        input: &ExpenseInput,
    ) -> Result<Expense, LedgerError> {
        if existing.is_deleted() {
            return Err(LedgerError::ExpenseNotFound(existing.id));
        }
        self.build_expense(
            input,
            existing.scope,
            existing.id,
            existing.created_by,
            existing.created_at,
            Utc::now(),
        )
    }

    /// Validate and persist a new expense.
    ///
    /// # Errors
    ///
    /// Validation errors, or `Storage` if the store fails.
    pub fn record_expense(&self, input: &ExpenseInput) -> Result<Expense, LedgerError> {
        let expense = self.validate_and_prepare(input)?;
        let saved = self.store.save_expense(expense)?;
        info!(
            expense_id = %saved.id,
            scope = %saved.scope,
            amount = %saved.amount,
            payments = saved.payments.len(),
            splits = saved.splits.len(),
            "Expense recorded"
        );
        Ok(saved)
    }

    /// Replace an expense's details, payments and splits.
    ///
    /// # Errors
    ///
    /// `ExpenseNotFound` for unknown or deleted expenses, an authorization error if
    /// `requester` is not in the scope, otherwise validation errors.
    pub fn update_expense(
        &self,
        id: ExpenseId,
        input: &ExpenseInput,
        requester: UserId,
    ) -> Result<Expense, LedgerError> {
        let existing = self.live_expense(id)?;
        self.directory.scope_currency(&existing.scope)?;
        ensure_member(self.directory.as_ref(), &existing.scope, &requester.into())?;

        let updated = self.prepare_update(&existing, input)?;
        let saved = self.store.save_expense(updated)?;
        info!(
            expense_id = %saved.id,
            scope = %saved.scope,
            amount = %saved.amount,
            "Expense updated"
        );
        Ok(saved)
    }

    /// Soft-delete an expense together with its payments and splits.
    ///
    /// # Errors
    ///
    /// `ExpenseNotFound` for unknown or already deleted expenses, or an
    /// authorization error if `requester` is not in the scope.
    pub fn delete_expense(&self, id: ExpenseId, requester: UserId) -> Result<(), LedgerError> {
        let existing = self.live_expense(id)?;
        ensure_member(self.directory.as_ref(), &existing.scope, &requester.into())?;

        self.store.delete_expense(id, Utc::now())?;
        info!(expense_id = %id, scope = %existing.scope, "Expense deleted");
        Ok(())
    }

    /// Validate and persist a settlement.
    ///
    /// The status defaults to pending. A settlement created as completed gets
    /// its completion time set immediately.
    ///
    /// # Errors
    ///
    /// `InvalidParticipant`, `SelfSettlement`, `InvalidAmount`, authorization
    /// errors, or `Storage`.
    pub fn record_settlement(&self, input: &SettlementInput) -> Result<Settlement, LedgerError> {
        let scope = input.scope.canonical();
        let currency = self.directory.scope_currency(&scope)?;
        ensure_member(self.directory.as_ref(), &scope, &input.created_by.into())?;

        let payer = input.payer.resolve()?;
        let payee = input.payee.resolve()?;
        if payer == payee {
            return Err(LedgerError::SelfSettlement);
        }
        ensure_currency(currency, input.currency)?;
        let amount = positive_money(input.amount, currency)?;
        ensure_member(self.directory.as_ref(), &scope, &payer)?;
        ensure_member(self.directory.as_ref(), &scope, &payee)?;

        let now = Utc::now();
        let status = input.status.unwrap_or(SettlementStatus::Pending);
        let settlement = Settlement {
            id: SettlementId::new(),
            scope,
            payer,
            payee,
            amount,
            status,
            method: input.method.clone(),
            reference: input.reference.clone(),
            notes: input.notes.clone(),
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            completed_at: (status == SettlementStatus::Completed).then_some(now),
        };

        let saved = self.store.save_settlement(settlement)?;
        info!(
            settlement_id = %saved.id,
            scope = %saved.scope,
            payer = %saved.payer,
            payee = %saved.payee,
            amount = %saved.amount,
            status = %saved.status,
            "Settlement recorded"
        );
        Ok(saved)
    }

    /// Move a settlement to a new status.
    ///
    /// Only pending settlements change state. Re-applying the current status
    /// returns the settlement unchanged. The amount never changes.
    ///
    /// # Errors
    ///
    /// `SettlementNotFound`, an authorization error, `InvalidStatusTransition`,
    /// or `Storage`.
    pub fn update_settlement_status(
        &self,
        id: SettlementId,
        status: SettlementStatus,
        requester: UserId,
    ) -> Result<Settlement, LedgerError> {
        let mut settlement = self
            .store
            .find_settlement(id)?
            .ok_or(LedgerError::SettlementNotFound(id))?;
        ensure_member(self.directory.as_ref(), &settlement.scope, &requester.into())?;

        if !settlement.status.can_transition_to(status) {
            return Err(LedgerError::InvalidStatusTransition {
                from: settlement.status,
                to: status,
            });
        }
        if settlement.status == status {
            debug!(settlement_id = %id, %status, "Settlement status unchanged");
            return Ok(settlement);
        }

        let now = Utc::now();
        let from = settlement.status;
        settlement.status = status;
        settlement.updated_at = now;
        if status == SettlementStatus::Completed {
            settlement.completed_at = Some(now);
        }

        let saved = self.store.save_settlement(settlement)?;
        info!(settlement_id = %id, %from, to = %status, "Settlement status changed");
        Ok(saved)
    }

    /// Rewrite every reference to a pending user as the registered user they became.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store fails.
    pub fn reconcile_pending_user(
        &self,
        pending: PendingUserId,
        user: UserId,
    ) -> Result<usize, LedgerError> {
        let touched = self.store.reconcile_pending_user(pending, user)?;
        info!(
            pending_user_id = %pending,
            user_id = %user,
            records = touched,
            "Pending user reconciled"
        );
        Ok(touched)
    }

    fn live_expense(&self, id: ExpenseId) -> Result<Expense, LedgerError> {
        self.store
            .find_expense(id)?
            .filter(|e| !e.is_deleted())
            .ok_or(LedgerError::ExpenseNotFound(id))
    }

    fn build_expense(
        &self,
        input: &ExpenseInput,
        scope: Scope,
        id: ExpenseId,
        created_by: UserId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Expense, LedgerError> {
        let title = validate_title(&input.title)?;

        // Authorization short-circuits before any arithmetic.
        let currency = self.directory.scope_currency(&scope)?;
        ensure_member(self.directory.as_ref(), &scope, &Participant::User(created_by))?;

        ensure_currency(currency, input.currency)?;
        let amount = positive_money(input.amount, currency)?;

        let payments = resolve_payments(&input.payments, currency)?;
        let splits = resolve_splits(&input.splits, amount)?;

        for participant in payments
            .iter()
            .map(|p| &p.participant)
            .chain(splits.iter().map(|s| &s.participant))
        {
            ensure_member(self.directory.as_ref(), &scope, participant)?;
        }

        validate_payment_total(&payments, amount)?;

        let category = input
            .category
            .as_deref()
            .map(category_slug)
            .transpose()?;

        debug!(
            expense_id = %id,
            %scope,
            amount = %amount,
            payments = payments.len(),
            splits = splits.len(),
            "Expense validated"
        );

        Ok(Expense {
            id,
            scope,
            title,
            notes: input.notes.clone(),
            amount,
            date: input.date,
            category,
            created_by,
            payments,
            splits,
            created_at,
            updated_at,
            deleted_at: None,
        })
    }
}

fn ensure_currency(scope_currency: Currency, given: Option<Currency>) -> Result<(), LedgerError> {
    match given {
        Some(currency) if currency != scope_currency => {
            Err(LedgerError::currency_mismatch(scope_currency, currency))
        }
        _ => Ok(()),
    }
}
