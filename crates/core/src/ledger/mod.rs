//! Expense and settlement ledger.
//!
//! This module implements the write side of the engine:
//! - Domain types for expenses, payments, splits and settlements
//! - Split resolution and business rule validation
//! - Collaborator traits for membership, history and persistence
//! - Ledger service for validated recording
//! - Error types for ledger operations

pub mod error;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod validation_props;

pub use error::{ErrorKind, LedgerError};
pub use service::LedgerService;
pub use store::{ExpenseStore, LedgerHistory, ScopeDirectory, ScopeHistory, ensure_member};
pub use types::{
    Expense, ExpenseInput, Participant, ParticipantRef, Payment, PaymentInput, Scope, Settlement,
    SettlementInput, SettlementStatus, Split, SplitInput, SplitType,
};
