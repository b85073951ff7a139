//! Core ledger logic for Splitledger.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Membership, history and persistence are reached through the traits in
//! [`ledger::store`].
//!
//! # Modules
//!
//! - `currency` - Exact allocation of money amounts
//! - `ledger` - Expense and settlement validation and recording
//! - `balance` - Pairwise balances, net positions and settlement plans

pub mod balance;
pub mod currency;
pub mod ledger;

#[cfg(test)]
mod testing;
