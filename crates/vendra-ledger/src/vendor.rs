//! Vendor wallet service

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use vendra_types::{
    ActorId, EntryKind, EntryReference, LedgerEntry, LedgerEntryId, Result, VendorId, VendorWallet,
    VendraError, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};

/// The vendor wallet service
///
/// Sole mutator of vendor wallets. Every operation reads-or-creates the
/// wallet, computes the new balances, and persists wallet + one ledger
/// entry inside a single write-lock scope.
#[derive(Clone)]
pub struct VendorLedger {
    wallets: Arc<RwLock<HashMap<VendorId, VendorWallet>>>,
    /// All entries (append-only)
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
    withdrawals: Arc<RwLock<HashMap<WithdrawalId, WithdrawalRequest>>>,
}

impl VendorLedger {
    /// Create a new in-memory vendor ledger
    pub fn new() -> Self {
        Self {
            wallets: Arc::new(RwLock::new(HashMap::new())),
            entries: Arc::new(RwLock::new(Vec::new())),
            withdrawals: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn ensure_positive(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(VendraError::validation(
                "amount",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    fn push_entry(
        entries: &mut Vec<LedgerEntry>,
        vendor: &VendorId,
        kind: EntryKind,
        amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
        description: String,
        reference: EntryReference,
        actor: Option<ActorId>,
    ) -> LedgerEntryId {
        let entry = LedgerEntry {
            id: LedgerEntryId::new(),
            vendor: vendor.clone(),
            kind,
            amount,
            balance_before,
            balance_after,
            description,
            reference,
            actor,
            created_at: Utc::now(),
        };
        let id = entry.id.clone();
        entries.push(entry);
        id
    }

    /// Credit the available balance
    pub async fn credit(
        &self,
        vendor: &VendorId,
        amount: Decimal,
        description: impl Into<String>,
        reference: EntryReference,
    ) -> Result<(VendorWallet, LedgerEntryId)> {
        Self::ensure_positive(amount)?;

        let mut wallets = self.wallets.write().await;
        let mut entries = self.entries.write().await;

        let wallet = wallets
            .entry(vendor.clone())
            .or_insert_with(|| VendorWallet::new(vendor.clone()));

        let before = wallet.balance;
        wallet.balance += amount;

        let entry_id = Self::push_entry(
            &mut entries,
            vendor,
            EntryKind::Credit,
            amount,
            before,
            wallet.balance,
            description.into(),
            reference,
            None,
        );

        info!(vendor = %vendor, %amount, balance = %wallet.balance, "wallet credited");
        Ok((wallet.clone(), entry_id))
    }

    /// Credit the pending balance (hold-policy settlement)
    pub async fn credit_pending(
        &self,
        vendor: &VendorId,
        amount: Decimal,
        description: impl Into<String>,
        reference: EntryReference,
    ) -> Result<(VendorWallet, LedgerEntryId)> {
        Self::ensure_positive(amount)?;

        let mut wallets = self.wallets.write().await;
        let mut entries = self.entries.write().await;

        let wallet = wallets
            .entry(vendor.clone())
            .or_insert_with(|| VendorWallet::new(vendor.clone()));

        let before = wallet.pending_balance;
        wallet.pending_balance += amount;

        let entry_id = Self::push_entry(
            &mut entries,
            vendor,
            EntryKind::Credit,
            amount,
            before,
            wallet.pending_balance,
            description.into(),
            reference,
            None,
        );

        info!(vendor = %vendor, %amount, pending = %wallet.pending_balance, "pending balance credited");
        Ok((wallet.clone(), entry_id))
    }

    /// Move funds from the pending balance to the available balance
    ///
    /// Proceeds even when the pending balance does not cover the amount:
    /// pending totals may drift from recomputed earnings, so a shortfall is
    /// logged rather than refused. Soft invariant, not a hard guarantee.
    pub async fn release_pending(
        &self,
        vendor: &VendorId,
        amount: Decimal,
        description: impl Into<String>,
        reference: EntryReference,
    ) -> Result<(VendorWallet, LedgerEntryId)> {
        Self::ensure_positive(amount)?;

        let mut wallets = self.wallets.write().await;
        let mut entries = self.entries.write().await;

        let wallet = wallets
            .entry(vendor.clone())
            .or_insert_with(|| VendorWallet::new(vendor.clone()));

        if wallet.pending_balance < amount {
            warn!(
                vendor = %vendor,
                pending = %wallet.pending_balance,
                %amount,
                "releasing more than the held pending balance"
            );
        }

        wallet.pending_balance -= amount;
        let before = wallet.balance;
        wallet.balance += amount;

        let entry_id = Self::push_entry(
            &mut entries,
            vendor,
            EntryKind::Credit,
            amount,
            before,
            wallet.balance,
            description.into(),
            reference,
            None,
        );

        info!(vendor = %vendor, %amount, balance = %wallet.balance, "pending funds released");
        Ok((wallet.clone(), entry_id))
    }

    /// Debit the available balance
    ///
    /// Permitted to go negative: a vendor may owe the platform after a
    /// refund exceeding their balance.
    pub async fn debit(
        &self,
        vendor: &VendorId,
        amount: Decimal,
        description: impl Into<String>,
        reference: EntryReference,
    ) -> Result<(VendorWallet, LedgerEntryId)> {
        Self::ensure_positive(amount)?;

        let mut wallets = self.wallets.write().await;
        let mut entries = self.entries.write().await;

        let wallet = wallets
            .entry(vendor.clone())
            .or_insert_with(|| VendorWallet::new(vendor.clone()));

        let before = wallet.balance;
        wallet.balance -= amount;

        let entry_id = Self::push_entry(
            &mut entries,
            vendor,
            EntryKind::Debit,
            amount,
            before,
            wallet.balance,
            description.into(),
            reference,
            None,
        );

        info!(vendor = %vendor, %amount, balance = %wallet.balance, "wallet debited");
        Ok((wallet.clone(), entry_id))
    }

    /// Debit preferring the pending balance
    ///
    /// Drains pending first when it covers the amount (refunds typically
    /// occur while the funds are still held), otherwise falls back to the
    /// available balance, which may go negative.
    pub async fn debit_pending_or_balance(
        &self,
        vendor: &VendorId,
        amount: Decimal,
        description: impl Into<String>,
        reference: EntryReference,
    ) -> Result<(VendorWallet, LedgerEntryId)> {
        Self::ensure_positive(amount)?;

        let mut wallets = self.wallets.write().await;
        let mut entries = self.entries.write().await;

        let wallet = wallets
            .entry(vendor.clone())
            .or_insert_with(|| VendorWallet::new(vendor.clone()));

        let kind = if matches!(reference, EntryReference::Refund(_)) {
            EntryKind::Refund
        } else {
            EntryKind::Debit
        };

        let (before, after) = if wallet.pending_balance >= amount {
            let before = wallet.pending_balance;
            wallet.pending_balance -= amount;
            (before, wallet.pending_balance)
        } else {
            let before = wallet.balance;
            wallet.balance -= amount;
            if wallet.balance < Decimal::ZERO {
                warn!(vendor = %vendor, balance = %wallet.balance, "vendor balance went negative");
            }
            (before, wallet.balance)
        };

        let entry_id = Self::push_entry(
            &mut entries,
            vendor,
            kind,
            amount,
            before,
            after,
            description.into(),
            reference,
            None,
        );

        info!(vendor = %vendor, %amount, "wallet debited (pending preferred)");
        Ok((wallet.clone(), entry_id))
    }

    /// Manual balance correction by staff
    pub async fn adjust(
        &self,
        vendor: &VendorId,
        amount: Decimal,
        description: impl Into<String>,
        actor: ActorId,
    ) -> Result<(VendorWallet, LedgerEntryId)> {
        Self::ensure_positive(amount)?;

        let mut wallets = self.wallets.write().await;
        let mut entries = self.entries.write().await;

        let wallet = wallets
            .entry(vendor.clone())
            .or_insert_with(|| VendorWallet::new(vendor.clone()));

        let before = wallet.balance;
        wallet.balance += amount;

        let entry_id = Self::push_entry(
            &mut entries,
            vendor,
            EntryKind::Adjustment,
            amount,
            before,
            wallet.balance,
            description.into(),
            EntryReference::Manual,
            Some(actor),
        );

        info!(vendor = %vendor, %amount, "manual adjustment recorded");
        Ok((wallet.clone(), entry_id))
    }

    // ========================================================================
    // Withdrawals
    // ========================================================================

    /// File a withdrawal request for the entire current available balance
    ///
    /// No partial withdrawals. The wallet is untouched until approval.
    pub async fn request_withdrawal(&self, vendor: &VendorId) -> Result<WithdrawalRequest> {
        let wallets = self.wallets.read().await;
        let mut withdrawals = self.withdrawals.write().await;

        if withdrawals
            .values()
            .any(|r| &r.vendor == vendor && r.status == WithdrawalStatus::Pending)
        {
            return Err(VendraError::DuplicateRequest {
                vendor: vendor.to_string(),
            });
        }

        let balance = wallets
            .get(vendor)
            .map(|w| w.balance)
            .unwrap_or(Decimal::ZERO);
        if balance <= Decimal::ZERO {
            return Err(VendraError::InsufficientBalance {
                vendor: vendor.to_string(),
                available: balance.to_string(),
            });
        }

        let request = WithdrawalRequest {
            id: WithdrawalId::new(),
            vendor: vendor.clone(),
            amount: balance,
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
            processed_by: None,
            external_txn_id: None,
            rejection_reason: None,
            notes: None,
        };
        withdrawals.insert(request.id.clone(), request.clone());

        info!(vendor = %vendor, amount = %request.amount, "withdrawal requested");
        Ok(request)
    }

    /// Approve a pending withdrawal request
    ///
    /// The balance is re-checked at approval time: it may have shrunk
    /// through a refund debit since the request was filed.
    pub async fn approve_withdrawal(
        &self,
        request_id: &WithdrawalId,
        admin: ActorId,
        notes: Option<String>,
        external_txn_id: Option<String>,
    ) -> Result<WithdrawalRequest> {
        let mut wallets = self.wallets.write().await;
        let mut entries = self.entries.write().await;
        let mut withdrawals = self.withdrawals.write().await;

        let request = withdrawals
            .get_mut(request_id)
            .ok_or_else(|| VendraError::WithdrawalNotFound {
                request: request_id.to_string(),
            })?;

        if request.status != WithdrawalStatus::Pending {
            return Err(VendraError::WithdrawalNotPending {
                request: request_id.to_string(),
                state: request.status.to_string(),
            });
        }

        let wallet = wallets
            .entry(request.vendor.clone())
            .or_insert_with(|| VendorWallet::new(request.vendor.clone()));

        if wallet.balance < request.amount {
            return Err(VendraError::InsufficientBalance {
                vendor: request.vendor.to_string(),
                available: wallet.balance.to_string(),
            });
        }

        let now = Utc::now();
        let before = wallet.balance;
        wallet.balance -= request.amount;
        wallet.total_withdrawn += request.amount;
        wallet.last_withdrawal_at = Some(now);

        Self::push_entry(
            &mut entries,
            &request.vendor,
            EntryKind::Withdrawal,
            request.amount,
            before,
            wallet.balance,
            format!("Withdrawal {} approved", request.id),
            EntryReference::Withdrawal(request.id.clone()),
            Some(admin.clone()),
        );

        request.status = WithdrawalStatus::Approved;
        request.processed_at = Some(now);
        request.processed_by = Some(admin);
        request.notes = notes;
        request.external_txn_id = external_txn_id;

        info!(vendor = %request.vendor, amount = %request.amount, "withdrawal approved");
        Ok(request.clone())
    }

    /// Reject a pending withdrawal request; no wallet mutation
    pub async fn reject_withdrawal(
        &self,
        request_id: &WithdrawalId,
        admin: ActorId,
        reason: impl Into<String>,
    ) -> Result<WithdrawalRequest> {
        let mut withdrawals = self.withdrawals.write().await;

        let request = withdrawals
            .get_mut(request_id)
            .ok_or_else(|| VendraError::WithdrawalNotFound {
                request: request_id.to_string(),
            })?;

        if request.status != WithdrawalStatus::Pending {
            return Err(VendraError::WithdrawalNotPending {
                request: request_id.to_string(),
                state: request.status.to_string(),
            });
        }

        request.status = WithdrawalStatus::Rejected;
        request.processed_at = Some(Utc::now());
        request.processed_by = Some(admin);
        request.rejection_reason = Some(reason.into());

        info!(vendor = %request.vendor, "withdrawal rejected");
        Ok(request.clone())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Snapshot of a vendor's wallet (zeroed if never touched)
    pub async fn wallet(&self, vendor: &VendorId) -> VendorWallet {
        let wallets = self.wallets.read().await;
        wallets
            .get(vendor)
            .cloned()
            .unwrap_or_else(|| VendorWallet::new(vendor.clone()))
    }

    /// Current pending balance for a vendor
    pub async fn pending_balance(&self, vendor: &VendorId) -> Decimal {
        let wallets = self.wallets.read().await;
        wallets
            .get(vendor)
            .map(|w| w.pending_balance)
            .unwrap_or(Decimal::ZERO)
    }

    /// All ledger entries for a vendor
    pub async fn entries_for(&self, vendor: &VendorId) -> Vec<LedgerEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| &e.vendor == vendor)
            .cloned()
            .collect()
    }

    /// Entries referencing a given order/withdrawal/refund
    pub async fn entries_for_reference(&self, reference: &EntryReference) -> Vec<LedgerEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| &e.reference == reference)
            .cloned()
            .collect()
    }

    /// Total number of ledger entries
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Look up a withdrawal request
    pub async fn withdrawal(&self, id: &WithdrawalId) -> Result<WithdrawalRequest> {
        let withdrawals = self.withdrawals.read().await;
        withdrawals
            .get(id)
            .cloned()
            .ok_or_else(|| VendraError::WithdrawalNotFound {
                request: id.to_string(),
            })
    }

    /// The vendor's pending withdrawal request, if any
    pub async fn pending_withdrawal_for(&self, vendor: &VendorId) -> Option<WithdrawalRequest> {
        let withdrawals = self.withdrawals.read().await;
        withdrawals
            .values()
            .find(|r| &r.vendor == vendor && r.status == WithdrawalStatus::Pending)
            .cloned()
    }
}

impl Default for VendorLedger {
    fn default() -> Self {
        Self::new()
    }
}
