//! Wallet and ledger types for Vendra
//!
//! A `VendorWallet` holds a withdrawable balance and a pending balance
//! (earnings held during the return window). Every balance mutation is
//! described by exactly one immutable `LedgerEntry`, written in the same
//! atomic unit as the wallet update.

use crate::{ActorId, CustomerId, LedgerEntryId, OrderId, RefundId, VendorId, WithdrawalId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One wallet per vendor, created lazily on first reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorWallet {
    pub vendor: VendorId,
    /// Withdrawable funds. Steady-state non-negative; may go negative as
    /// the last-resort refund-debit fallback.
    pub balance: Decimal,
    /// Funds held during the return window, not withdrawable
    pub pending_balance: Decimal,
    pub total_withdrawn: Decimal,
    pub last_withdrawal_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VendorWallet {
    pub fn new(vendor: VendorId) -> Self {
        Self {
            vendor,
            balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
            last_withdrawal_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Credit,
    Debit,
    Withdrawal,
    Refund,
    Adjustment,
}

impl EntryKind {
    /// Whether entries of this kind increase the balance they touch
    pub fn is_increase(&self) -> bool {
        matches!(self, Self::Credit | Self::Adjustment)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::Withdrawal => "withdrawal",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
        };
        f.write_str(name)
    }
}

/// What a ledger entry refers back to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntryReference {
    Order(OrderId),
    Withdrawal(WithdrawalId),
    Refund(RefundId),
    Manual,
}

/// An immutable record of one vendor-wallet balance mutation
///
/// `balance_before`/`balance_after` describe the balance bucket the
/// operation mutated (available or pending); the amount always satisfies
/// `balance_after = balance_before ± amount` per the entry kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub vendor: VendorId,
    pub kind: EntryKind,
    /// Always positive; the kind carries the sign
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    pub reference: EntryReference,
    pub actor: Option<ActorId>,
    pub created_at: DateTime<Utc>,
}

/// An immutable record of one customer-wallet balance mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerLedgerEntry {
    pub id: LedgerEntryId,
    pub customer: CustomerId,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: String,
    pub reference: EntryReference,
    pub created_at: DateTime<Utc>,
}

/// Withdrawal request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A vendor's request to withdraw their entire available balance
///
/// At most one pending request per vendor at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub vendor: VendorId,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<ActorId>,
    pub external_txn_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
}
