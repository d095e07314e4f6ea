//! Vendra Settlement - Release of held vendor earnings
//!
//! A batch sweep over delivered orders whose funds are still held: once
//! the return window has lapsed, each vendor's earnings move from the
//! pending balance to the available balance (or are credited directly
//! when the order was settled under the direct policy but never flagged).
//!
//! The sweep is restartable and idempotent: `funds_released` guards every
//! order, re-runs are no-ops, and a failure on one order is recorded and
//! never stops the rest of the batch. It is driven by an external
//! scheduler (daily cron) or invoked manually; both may overlap safely.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vendra_ledger::VendorLedger;
use vendra_orders::OrderManager;
use vendra_types::{EntryReference, Order, OrderId, Result};

/// One order the sweep could not settle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepFailure {
    pub order: OrderId,
    pub error: String,
}

/// Outcome of one sweep run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Orders matching the selection
    pub scanned: usize,
    /// Orders whose funds were released this run
    pub released: usize,
    pub failures: Vec<SweepFailure>,
}

/// The settlement scheduler
#[derive(Clone)]
pub struct SettlementScheduler {
    orders: Arc<OrderManager>,
    ledger: Arc<VendorLedger>,
}

impl SettlementScheduler {
    pub fn new(orders: Arc<OrderManager>, ledger: Arc<VendorLedger>) -> Self {
        Self { orders, ledger }
    }

    /// Sweep with the current clock
    pub async fn run(&self) -> SweepReport {
        self.run_at(Utc::now()).await
    }

    /// Sweep as of `now`; orders without a return window count as lapsed
    pub async fn run_at(&self, now: DateTime<Utc>) -> SweepReport {
        let due = self.orders.unsettled_delivered(now).await;
        let mut report = SweepReport {
            scanned: due.len(),
            ..SweepReport::default()
        };

        for order in due {
            match self.settle_order(&order).await {
                Ok(()) => report.released += 1,
                Err(err) => {
                    warn!(order = %order.code, error = %err, "settlement failed for order");
                    report.failures.push(SweepFailure {
                        order: order.id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            scanned = report.scanned,
            released = report.released,
            failed = report.failures.len(),
            "settlement sweep finished"
        );
        report
    }

    async fn settle_order(&self, order: &Order) -> Result<()> {
        if order.vendor_breakdown.is_empty() {
            // Nothing to pay out; just close the order for settlement.
            self.orders.mark_funds_released(&order.id).await?;
            return Ok(());
        }

        for share in &order.vendor_breakdown {
            let earnings = share.earnings();
            if earnings <= Decimal::ZERO {
                continue;
            }

            let held = self.ledger.pending_balance(&share.vendor).await;
            if held >= earnings {
                self.ledger
                    .release_pending(
                        &share.vendor,
                        earnings,
                        format!("Return window closed for order {}", order.code),
                        EntryReference::Order(order.id.clone()),
                    )
                    .await?;
            } else {
                // Order settled under the direct policy but never flagged,
                // or the hold drifted; credit straight to available.
                self.ledger
                    .credit(
                        &share.vendor,
                        earnings,
                        format!("Late settlement for order {}", order.code),
                        EntryReference::Order(order.id.clone()),
                    )
                    .await?;
            }
        }

        self.orders.mark_funds_released(&order.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use vendra_ledger::CustomerLedger;
    use vendra_notify::LogNotifier;
    use vendra_orders::{InMemoryCatalog, NewOrderLine, OrderRef, ProductInfo};
    use vendra_types::{
        ActorId, ActorRole, CustomerId, EngineConfig, OrderStatus, PaymentStatus, ProductId,
        SettlementPolicy, VendorId,
    };

    struct Fixture {
        scheduler: SettlementScheduler,
        manager: Arc<OrderManager>,
        ledger: Arc<VendorLedger>,
        catalog: InMemoryCatalog,
    }

    async fn fixture(policy: SettlementPolicy) -> Fixture {
        let config = EngineConfig {
            settlement_policy: policy,
            ..EngineConfig::default()
        };
        let ledger = Arc::new(VendorLedger::new());
        let catalog = InMemoryCatalog::new();
        let manager = Arc::new(OrderManager::new(
            config,
            Arc::new(catalog.clone()),
            Arc::new(LogNotifier),
            ledger.clone(),
            Arc::new(CustomerLedger::new()),
        ));
        let scheduler = SettlementScheduler::new(manager.clone(), ledger.clone());
        Fixture {
            scheduler,
            manager,
            ledger,
            catalog,
        }
    }

    async fn delivered_order(fx: &Fixture, vendor: &VendorId, price: Decimal) -> Order {
        let product = ProductId::new();
        fx.catalog
            .insert(ProductInfo {
                id: product.clone(),
                vendor: vendor.clone(),
                name: "widget".to_string(),
                unit_price: price,
            })
            .await;
        let order = fx
            .manager
            .create_order(
                CustomerId::new(),
                vec![NewOrderLine {
                    product,
                    quantity: 10,
                }],
                PaymentStatus::Completed,
                None,
            )
            .await
            .unwrap();
        fx.manager
            .change_status(
                OrderRef::Id(order.id.clone()),
                OrderStatus::Delivered,
                ActorId::new(),
                ActorRole::Admin,
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sweep_releases_held_funds_after_window() {
        let fx = fixture(SettlementPolicy::HoldUntilWindowClose).await;
        let vendor = VendorId::new();
        let order = delivered_order(&fx, &vendor, dec!(100)).await;

        assert!(!order.funds_released);
        assert_eq!(fx.ledger.pending_balance(&vendor).await, dec!(900.00));

        // Window still open: nothing to do
        let report = fx.scheduler.run().await;
        assert_eq!(report.scanned, 0);

        // Eight days later the window has lapsed
        let later = Utc::now() + Duration::days(8);
        let report = fx.scheduler.run_at(later).await;
        assert_eq!(report.scanned, 1);
        assert_eq!(report.released, 1);
        assert!(report.failures.is_empty());

        let wallet = fx.ledger.wallet(&vendor).await;
        assert_eq!(wallet.pending_balance, Decimal::ZERO);
        assert_eq!(wallet.balance, dec!(900.00));

        let settled = fx.manager.order(OrderRef::Id(order.id)).await.unwrap();
        assert!(settled.funds_released);
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let fx = fixture(SettlementPolicy::HoldUntilWindowClose).await;
        let vendor = VendorId::new();
        delivered_order(&fx, &vendor, dec!(100)).await;

        let later = Utc::now() + Duration::days(8);
        fx.scheduler.run_at(later).await;
        let balance_after_first = fx.ledger.wallet(&vendor).await.balance;

        let report = fx.scheduler.run_at(later).await;
        assert_eq!(report.scanned, 0);
        assert_eq!(report.released, 0);
        assert_eq!(fx.ledger.wallet(&vendor).await.balance, balance_after_first);
    }

    #[tokio::test]
    async fn sweep_falls_back_to_direct_credit_without_held_funds() {
        // Delivered under hold policy, but the hold was consumed by a
        // refund debit: the sweep credits the shortfall directly.
        let fx = fixture(SettlementPolicy::HoldUntilWindowClose).await;
        let vendor = VendorId::new();
        delivered_order(&fx, &vendor, dec!(100)).await;

        fx.ledger
            .debit_pending_or_balance(&vendor, dec!(900), "refund", EntryReference::Manual)
            .await
            .unwrap();
        assert_eq!(fx.ledger.pending_balance(&vendor).await, Decimal::ZERO);

        let later = Utc::now() + Duration::days(8);
        let report = fx.scheduler.run_at(later).await;
        assert_eq!(report.released, 1);

        let wallet = fx.ledger.wallet(&vendor).await;
        assert_eq!(wallet.balance, dec!(900.00));
        assert_eq!(wallet.pending_balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn direct_policy_orders_are_not_rescanned() {
        let fx = fixture(SettlementPolicy::Direct).await;
        let vendor = VendorId::new();
        let order = delivered_order(&fx, &vendor, dec!(100)).await;
        assert!(order.funds_released);

        let later = Utc::now() + Duration::days(8);
        let report = fx.scheduler.run_at(later).await;
        assert_eq!(report.scanned, 0);
        assert_eq!(fx.ledger.wallet(&vendor).await.balance, dec!(900.00));
    }
}
