//! Customer personal ledger
//!
//! Sibling of the vendor ledger, keyed by customer. Used by order
//! cancellations and return refunds. Customer balances never go negative.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;

use vendra_types::{
    CustomerId, CustomerLedgerEntry, EntryKind, EntryReference, LedgerEntryId, Result, VendraError,
};

/// The customer wallet service
#[derive(Clone)]
pub struct CustomerLedger {
    balances: Arc<RwLock<HashMap<CustomerId, Decimal>>>,
    /// All entries (append-only)
    entries: Arc<RwLock<Vec<CustomerLedgerEntry>>>,
}

impl CustomerLedger {
    /// Create a new in-memory customer ledger
    pub fn new() -> Self {
        Self {
            balances: Arc::new(RwLock::new(HashMap::new())),
            entries: Arc::new(RwLock::new(Vec::new())),
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

    /// Credit a customer's wallet
    pub async fn credit(
        &self,
        customer: &CustomerId,
        amount: Decimal,
        description: impl Into<String>,
        reference: EntryReference,
    ) -> Result<(Decimal, LedgerEntryId)> {
        Self::ensure_positive(amount)?;

        let mut balances = self.balances.write().await;
        let mut entries = self.entries.write().await;

        let balance = balances.entry(customer.clone()).or_insert(Decimal::ZERO);
        let before = *balance;
        *balance += amount;

        let kind = if matches!(reference, EntryReference::Refund(_) | EntryReference::Order(_)) {
            EntryKind::Refund
        } else {
            EntryKind::Credit
        };

        let entry = CustomerLedgerEntry {
            id: LedgerEntryId::new(),
            customer: customer.clone(),
            kind,
            amount,
            balance_before: before,
            balance_after: *balance,
            description: description.into(),
            reference,
            created_at: Utc::now(),
        };
        let entry_id = entry.id.clone();
        entries.push(entry);

        info!(customer = %customer, %amount, balance = %*balance, "customer wallet credited");
        Ok((*balance, entry_id))
    }

    /// Debit a customer's wallet; refused below zero
    pub async fn debit(
        &self,
        customer: &CustomerId,
        amount: Decimal,
        description: impl Into<String>,
        reference: EntryReference,
    ) -> Result<(Decimal, LedgerEntryId)> {
        Self::ensure_positive(amount)?;

        let mut balances = self.balances.write().await;
        let mut entries = self.entries.write().await;

        let balance = balances.entry(customer.clone()).or_insert(Decimal::ZERO);
        if *balance < amount {
            return Err(VendraError::InsufficientCustomerFunds {
                customer: customer.to_string(),
                requested: amount.to_string(),
                available: balance.to_string(),
            });
        }

        let before = *balance;
        *balance -= amount;

        let entry = CustomerLedgerEntry {
            id: LedgerEntryId::new(),
            customer: customer.clone(),
            kind: EntryKind::Debit,
            amount,
            balance_before: before,
            balance_after: *balance,
            description: description.into(),
            reference,
            created_at: Utc::now(),
        };
        let entry_id = entry.id.clone();
        entries.push(entry);

        info!(customer = %customer, %amount, balance = %*balance, "customer wallet debited");
        Ok((*balance, entry_id))
    }

    /// Current balance (zero if never touched)
    pub async fn balance(&self, customer: &CustomerId) -> Decimal {
        let balances = self.balances.read().await;
        balances.get(customer).copied().unwrap_or(Decimal::ZERO)
    }

    /// All entries for a customer
    pub async fn entries_for(&self, customer: &CustomerId) -> Vec<CustomerLedgerEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| &e.customer == customer)
            .cloned()
            .collect()
    }
}

impl Default for CustomerLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn credit_and_balance() {
        let ledger = CustomerLedger::new();
        let customer = CustomerId::new();

        let (balance, _) = ledger
            .credit(&customer, dec!(500), "cancellation refund", EntryReference::Manual)
            .await
            .unwrap();
        assert_eq!(balance, dec!(500));
        assert_eq!(ledger.balance(&customer).await, dec!(500));
    }

    #[tokio::test]
    async fn debit_below_zero_is_refused() {
        let ledger = CustomerLedger::new();
        let customer = CustomerId::new();

        ledger
            .credit(&customer, dec!(100), "topup", EntryReference::Manual)
            .await
            .unwrap();
        let err = ledger
            .debit(&customer, dec!(200), "purchase", EntryReference::Manual)
            .await
            .unwrap_err();
        assert!(matches!(err, VendraError::InsufficientCustomerFunds { .. }));
        assert_eq!(ledger.balance(&customer).await, dec!(100));
    }

    #[tokio::test]
    async fn order_reference_records_refund_kind() {
        let ledger = CustomerLedger::new();
        let customer = CustomerId::new();
        let order = vendra_types::OrderId::new();

        ledger
            .credit(
                &customer,
                dec!(500),
                "order cancelled",
                EntryReference::Order(order),
            )
            .await
            .unwrap();

        let entries = ledger.entries_for(&customer).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Refund);
    }
}
