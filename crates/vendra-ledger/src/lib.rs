//! Vendra Ledger - Vendor wallet service and customer personal ledger
//!
//! The vendor ledger is:
//! - Account-keyed by VendorId, created lazily on first reference
//! - Split into an available balance and a pending balance (funds held
//!   during the return window)
//! - Immutable (entries are append-only)
//! - The sole mutation path for vendor balances
//!
//! # Invariants
//!
//! 1. Every balance mutation writes exactly one ledger entry in the same
//!    lock scope as the balance change
//! 2. `balance_after = balance_before ± amount` per the entry kind
//! 3. Concurrent operations on the same vendor serialize behind the
//!    store's write lock
//! 4. The available balance may go negative only through the refund-debit
//!    fallback; the pending balance may drift below zero only through the
//!    documented release leniency
//!
//! The customer ledger is the structurally identical sibling keyed by
//! CustomerId, used for cancellation and return refunds. Customer balances
//! never go negative.

mod customer;
mod vendor;

pub use customer::CustomerLedger;
pub use vendor::VendorLedger;
