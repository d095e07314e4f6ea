//! Return and refund types for Vendra

use crate::{
    ActorId, ActorRole, CustomerId, LedgerEntryId, OrderId, ProductId, RefundId, ReturnRequestId,
    VendorId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Return request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
    Completed,
    Cancelled,
}

impl ReturnStatus {
    /// Terminal states no longer block a new return for the same order
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Rejected)
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Refund progress for a return request (and for cancellation refunds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

/// How the refund reaches the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    /// Credit to the customer's personal wallet
    Wallet,
    /// Reverse through the original payment channel
    OriginalPayment,
}

/// One item of a return request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub product: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub reason: Option<String>,
}

impl ReturnItem {
    pub fn total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// One append-only return status history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnHistoryEntry {
    pub status: ReturnStatus,
    pub actor: ActorId,
    pub role: ActorRole,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// A customer's request to return delivered items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: ReturnRequestId,
    pub order: OrderId,
    pub customer: CustomerId,
    /// Responsible vendor, taken from the order's first breakdown entry
    pub vendor: VendorId,
    pub items: Vec<ReturnItem>,
    pub reason: String,
    pub refund_amount: Decimal,
    pub status: ReturnStatus,
    pub refund_status: RefundStatus,
    pub method: RefundMethod,
    /// Append-only; never mutated or reordered
    pub history: Vec<ReturnHistoryEntry>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Links a return request to the customer-wallet credit and the
/// vendor-wallet debit it produced. Immutable once completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundTransaction {
    pub id: RefundId,
    pub request: ReturnRequestId,
    pub order: OrderId,
    pub customer: CustomerId,
    pub vendor: VendorId,
    pub amount: Decimal,
    pub customer_entry: LedgerEntryId,
    pub vendor_entry: LedgerEntryId,
    pub created_at: DateTime<Utc>,
}
