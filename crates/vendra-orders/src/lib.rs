//! Vendra Orders - Order lifecycle management
//!
//! Owns the order record and its append-only status history. Transitions
//! are validated against a role-keyed table (admin exempt), and the money
//! side effects of a transition (cancellation refunds and delivery
//! settlement) run inside the same mutation scope as the status change.
//!
//! # Invariants
//!
//! 1. A rejected transition leaves the order unchanged
//! 2. Every applied transition appends exactly one history entry
//!    (cancellation rejection appends a second, explanatory one)
//! 3. Delivery settles vendor earnings exactly once, guarded by
//!    `tracking.delivered_at`
//! 4. Cancellation refunds the customer exactly once, guarded by the
//!    absence of a prior cancellation record

pub mod catalog;
pub mod manager;
pub mod rules;

pub use catalog::{Catalog, InMemoryCatalog, ProductInfo};
pub use manager::{NewOrderLine, OrderManager, OrderRef};
