//! Vendra Types - Canonical domain types for the fulfillment engine
//!
//! This crate contains all foundational types for Vendra with zero
//! dependencies on other vendra crates. It defines the complete type
//! system for:
//!
//! - Identity types (OrderId, VendorId, CustomerId, etc.)
//! - Orders: statuses, role-gated history, cancellation records,
//!   per-vendor breakdowns
//! - Vendor and customer wallets with their append-only ledger entries
//! - Withdrawal requests
//! - Return requests and refund transactions
//! - Engine configuration (commission, return window, settlement policy)
//!
//! # Architectural Invariants
//!
//! 1. Status history and ledger entries are append-only
//! 2. Exactly one ledger entry per wallet mutation, written atomically
//!    with the balance change it describes
//! 3. `funds_released` only ever transitions false -> true
//! 4. Failure is explicit: every fallible operation returns a stable
//!    error kind

pub mod config;
pub mod error;
pub mod identity;
pub mod order;
pub mod returns;
pub mod wallet;

pub use config::*;
pub use error::*;
pub use identity::*;
pub use order::*;
pub use returns::*;
pub use wallet::*;

/// Version of the Vendra types schema
pub const TYPES_VERSION: &str = "0.1.0";
