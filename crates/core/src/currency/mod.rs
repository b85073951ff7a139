//! Exact money allocation.

pub mod allocation;

#[cfg(test)]
mod props;

pub use allocation::AllocationUtil;
