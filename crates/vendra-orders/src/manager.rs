//! Order lifecycle manager
//!
//! Sole owner of order records. Validates role-gated transitions, appends
//! status history, and drives the settlement and refund side effects of a
//! transition inside the same mutation scope: an order is never observable
//! as delivered while the vendor credit it implies is missing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use vendra_ledger::{CustomerLedger, VendorLedger};
use vendra_notify::{Notification, Notifier, Recipient};
use vendra_types::{
    ActorId, ActorRole, Cancellation, CancellationRequest, CancellationResolution, CustomerId,
    EngineConfig, EntryReference, Order, OrderId, OrderLine, OrderStatus, PaymentStatus,
    RefundStatus, Result, SettlementPolicy, StatusEntry, Tracking, VendorId, VendorShare,
    VendraError,
};

use crate::catalog::Catalog;
use crate::rules;

/// An order reference: endpoints accept the id and the human-readable
/// code interchangeably
#[derive(Debug, Clone)]
pub enum OrderRef {
    Id(OrderId),
    Code(String),
}

impl From<OrderId> for OrderRef {
    fn from(id: OrderId) -> Self {
        Self::Id(id)
    }
}

impl From<&OrderId> for OrderRef {
    fn from(id: &OrderId) -> Self {
        Self::Id(id.clone())
    }
}

impl From<&str> for OrderRef {
    fn from(code: &str) -> Self {
        Self::Code(code.to_string())
    }
}

/// One requested line at checkout; pricing and vendor attribution come
/// from the catalog
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product: vendra_types::ProductId,
    pub quantity: u32,
}

/// The order lifecycle manager
#[derive(Clone)]
pub struct OrderManager {
    config: EngineConfig,
    catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn Notifier>,
    vendors: Arc<VendorLedger>,
    customers: Arc<CustomerLedger>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    /// code -> id index
    codes: Arc<RwLock<HashMap<String, OrderId>>>,
    /// coupon code -> usage counter
    coupon_uses: Arc<RwLock<HashMap<String, u32>>>,
    seq: Arc<AtomicU64>,
}

impl OrderManager {
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn Catalog>,
        notifier: Arc<dyn Notifier>,
        vendors: Arc<VendorLedger>,
        customers: Arc<CustomerLedger>,
    ) -> Self {
        Self {
            config,
            catalog,
            notifier,
            vendors,
            customers,
            orders: Arc::new(RwLock::new(HashMap::new())),
            codes: Arc::new(RwLock::new(HashMap::new())),
            coupon_uses: Arc::new(RwLock::new(HashMap::new())),
            seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Create an order from checkout lines
    ///
    /// Lines are priced through the catalog and grouped per vendor; the
    /// platform commission is stamped into each vendor share at the
    /// configured rate, so later settlement never consults a live rate.
    pub async fn create_order(
        &self,
        customer: CustomerId,
        lines: Vec<NewOrderLine>,
        payment_status: PaymentStatus,
        coupon: Option<String>,
    ) -> Result<Order> {
        if lines.is_empty() {
            return Err(VendraError::validation("lines", "order has no items"));
        }
        if lines.iter().any(|l| l.quantity == 0) {
            return Err(VendraError::validation("quantity", "must be at least one"));
        }

        let mut order_lines = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = self.catalog.product(&line.product).await?;
            order_lines.push(OrderLine {
                product: product.id,
                vendor: product.vendor,
                quantity: line.quantity,
                unit_price: product.unit_price,
            });
        }

        // Group subtotals per vendor, preserving first-seen order
        let mut shares: Vec<VendorShare> = Vec::new();
        for line in &order_lines {
            match shares.iter_mut().find(|s| s.vendor == line.vendor) {
                Some(share) => share.subtotal += line.total(),
                None => shares.push(VendorShare {
                    vendor: line.vendor.clone(),
                    subtotal: line.total(),
                    shipping: Decimal::ZERO,
                    tax: Decimal::ZERO,
                    discount: Decimal::ZERO,
                    commission: Decimal::ZERO,
                }),
            }
        }
        for share in &mut shares {
            share.commission = (share.subtotal * self.config.commission_rate).round_dp(2);
        }

        let total: Decimal = order_lines.iter().map(OrderLine::total).sum();
        let now = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let code = format!("ORD-{}-{:04}", now.format("%Y%m%d"), seq);

        let order = Order {
            id: OrderId::new(),
            code: code.clone(),
            customer: customer.clone(),
            lines: order_lines,
            total,
            status: OrderStatus::Pending,
            payment_status,
            history: vec![StatusEntry {
                status: OrderStatus::Pending,
                actor: ActorId::from_uuid(*customer.as_uuid()),
                role: ActorRole::User,
                at: now,
                note: None,
            }],
            cancellation: None,
            cancellation_request: None,
            tracking: Tracking::default(),
            return_window_expires_at: None,
            funds_released: false,
            vendor_breakdown: shares,
            coupon: coupon.clone(),
            created_at: now,
        };

        let mut orders = self.orders.write().await;
        let mut codes = self.codes.write().await;
        codes.insert(code.clone(), order.id.clone());
        orders.insert(order.id.clone(), order.clone());
        drop(codes);
        drop(orders);

        if let Some(code) = &coupon {
            *self.coupon_uses.write().await.entry(code.clone()).or_insert(0) += 1;
        }

        info!(order = %order.code, customer = %customer, total = %total, "order created");

        for vendor in order.vendors() {
            self.dispatch(Notification::new(
                Recipient::Vendor(vendor),
                format!("New order {}", order.code),
                format!("Order {} was placed with items from your store", order.code),
            ))
            .await;
        }

        Ok(order)
    }

    /// Move an order to a new status on behalf of an actor
    ///
    /// Rejects transitions outside the actor role's allowed set, then
    /// applies the status change, its history entry, and any money side
    /// effects as one mutation: on any failure the stored order is
    /// untouched. Notifications go out after the mutation commits and
    /// never roll it back.
    pub async fn change_status(
        &self,
        order_ref: OrderRef,
        new_status: OrderStatus,
        actor: ActorId,
        role: ActorRole,
        note: Option<String>,
    ) -> Result<Order> {
        let id = self.resolve(&order_ref).await?;
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| VendraError::OrderNotFound {
                order: id.to_string(),
            })?;

        if !rules::is_allowed(role, order.status, new_status) {
            return Err(VendraError::InvalidTransition {
                from: order.status,
                to: new_status,
                role,
            });
        }

        // Work on a copy: wallet failures must leave the stored order
        // untouched.
        let mut updated = order.clone();
        let now = Utc::now();

        updated.status = new_status;
        updated.history.push(StatusEntry {
            status: new_status,
            actor: actor.clone(),
            role,
            at: now,
            note: note.clone(),
        });

        match new_status {
            OrderStatus::Cancelled => {
                self.apply_cancellation(&mut updated, &note, now).await?;
            }
            OrderStatus::CancellationRejected => {
                Self::apply_cancellation_rejection(&mut updated, &actor, role, now)?;
            }
            OrderStatus::Delivered => {
                self.apply_delivery(&mut updated, now).await?;
            }
            _ => {}
        }

        *order = updated.clone();
        drop(orders);

        info!(order = %updated.code, status = %new_status, %role, "order status changed");

        self.dispatch(Notification::new(
            Recipient::Customer(updated.customer.clone()),
            format!("Order {} update", updated.code),
            format!("Your order is now {}", updated.status),
        ))
        .await;
        for vendor in updated.vendors() {
            self.dispatch(Notification::new(
                Recipient::Vendor(vendor),
                format!("Order {} update", updated.code),
                format!("Order {} is now {}", updated.code, updated.status),
            ))
            .await;
        }

        Ok(updated)
    }

    /// Customer asks to cancel; valid only before fulfillment starts.
    /// Pure state change, money moves only if the request is later
    /// approved into `cancelled`.
    pub async fn request_cancellation(
        &self,
        order_ref: OrderRef,
        customer: &CustomerId,
    ) -> Result<Order> {
        let id = self.resolve(&order_ref).await?;
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| VendraError::OrderNotFound {
                order: id.to_string(),
            })?;

        if &order.customer != customer {
            return Err(VendraError::unauthorized(
                "only the ordering customer may request cancellation",
            ));
        }
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Processing) {
            return Err(VendraError::InvalidTransition {
                from: order.status,
                to: OrderStatus::CancellationRequested,
                role: ActorRole::User,
            });
        }

        let now = Utc::now();
        order.cancellation_request = Some(CancellationRequest {
            original_status: order.status,
            requested_at: now,
            resolution: CancellationResolution::Open,
        });
        order.status = OrderStatus::CancellationRequested;
        order.history.push(StatusEntry {
            status: OrderStatus::CancellationRequested,
            actor: ActorId::from_uuid(*customer.as_uuid()),
            role: ActorRole::User,
            at: now,
            note: None,
        });

        let snapshot = order.clone();
        drop(orders);

        info!(order = %snapshot.code, "cancellation requested");
        for vendor in snapshot.vendors() {
            self.dispatch(Notification::new(
                Recipient::Vendor(vendor),
                format!("Cancellation requested for {}", snapshot.code),
                "The customer asked to cancel this order".to_string(),
            ))
            .await;
        }

        Ok(snapshot)
    }

    async fn apply_cancellation(
        &self,
        updated: &mut Order,
        note: &Option<String>,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        // The absence of a cancellation record is the exactly-once guard
        // for the refund credit.
        if updated.cancellation.is_some() {
            return Ok(());
        }

        let mut cancellation = Cancellation {
            reason: note.clone().unwrap_or_else(|| "cancelled".to_string()),
            cancelled_at: now,
            refund_status: None,
            refund_amount: None,
        };

        if let Some(resolution) = updated.cancellation_request.as_mut() {
            resolution.resolution = CancellationResolution::Approved;
        }

        if let Some(coupon) = &updated.coupon {
            let mut uses = self.coupon_uses.write().await;
            if let Some(count) = uses.get_mut(coupon) {
                *count = count.saturating_sub(1);
            }
        }

        if updated.payment_status == PaymentStatus::Completed {
            self.customers
                .credit(
                    &updated.customer,
                    updated.total,
                    format!("Refund for cancelled order {}", updated.code),
                    EntryReference::Order(updated.id.clone()),
                )
                .await?;
            cancellation.refund_status = Some(RefundStatus::Processed);
            cancellation.refund_amount = Some(updated.total);
        }

        updated.cancellation = Some(cancellation);
        Ok(())
    }

    fn apply_cancellation_rejection(
        updated: &mut Order,
        actor: &ActorId,
        role: ActorRole,
        now: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let request = updated.cancellation_request.as_mut().ok_or_else(|| {
            VendraError::validation("cancellation_request", "order has no open request to reject")
        })?;

        let original = request.original_status;
        request.resolution = CancellationResolution::Rejected;
        updated.status = original;
        updated.history.push(StatusEntry {
            status: original,
            actor: actor.clone(),
            role,
            at: now,
            note: Some(format!("cancellation rejected; order back to {original}")),
        });
        Ok(())
    }

    async fn apply_delivery(&self, updated: &mut Order, now: chrono::DateTime<Utc>) -> Result<()> {
        // Redelivery is a no-op for settlement: the first delivery stamped
        // the tracking record.
        if updated.tracking.delivered_at.is_some() {
            return Ok(());
        }

        updated.tracking.delivered_at = Some(now);
        updated.return_window_expires_at =
            Some(now + Duration::days(self.config.return_window_days));

        let earnings: Vec<(VendorId, Decimal)> = updated
            .vendor_breakdown
            .iter()
            .map(|share| (share.vendor.clone(), share.earnings()))
            .filter(|(_, amount)| *amount > Decimal::ZERO)
            .collect();

        match self.config.settlement_policy {
            SettlementPolicy::Direct => {
                for (vendor, amount) in earnings {
                    self.vendors
                        .credit(
                            &vendor,
                            amount,
                            format!("Earnings for delivered order {}", updated.code),
                            EntryReference::Order(updated.id.clone()),
                        )
                        .await?;
                }
                updated.funds_released = true;
            }
            SettlementPolicy::HoldUntilWindowClose => {
                for (vendor, amount) in earnings {
                    self.vendors
                        .credit_pending(
                            &vendor,
                            amount,
                            format!("Held earnings for delivered order {}", updated.code),
                            EntryReference::Order(updated.id.clone()),
                        )
                        .await?;
                }
                // The settlement sweep flips funds_released once the
                // return window closes.
            }
        }
        Ok(())
    }

    // ========================================================================
    // Settlement support
    // ========================================================================

    /// Delivered orders whose funds are still held and whose return
    /// window has lapsed (orders without a window count as lapsed)
    pub async fn unsettled_delivered(&self, now: chrono::DateTime<Utc>) -> Vec<Order> {
        let orders = self.orders.read().await;
        orders
            .values()
            .filter(|o| {
                o.status == OrderStatus::Delivered
                    && !o.funds_released
                    && o.return_window_expires_at.map_or(true, |w| w <= now)
            })
            .cloned()
            .collect()
    }

    /// Flip `funds_released`; false -> true only
    pub async fn mark_funds_released(&self, id: &OrderId) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| VendraError::OrderNotFound {
                order: id.to_string(),
            })?;

        if order.funds_released {
            return Err(VendraError::FundsAlreadyReleased {
                order: order.code.clone(),
            });
        }
        order.funds_released = true;
        Ok(order.clone())
    }

    /// Patch the order's cancellation record with refund display fields
    /// after a return refund settles
    pub async fn record_refund(&self, id: &OrderId, amount: Decimal) -> Result<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| VendraError::OrderNotFound {
                order: id.to_string(),
            })?;

        let cancellation = order.cancellation.get_or_insert_with(|| Cancellation {
            reason: "return refund".to_string(),
            cancelled_at: Utc::now(),
            refund_status: None,
            refund_amount: None,
        });
        cancellation.refund_status = Some(RefundStatus::Processed);
        cancellation.refund_amount = Some(amount);
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Look up an order by id or code
    pub async fn order(&self, order_ref: OrderRef) -> Result<Order> {
        let id = self.resolve(&order_ref).await?;
        let orders = self.orders.read().await;
        orders
            .get(&id)
            .cloned()
            .ok_or_else(|| VendraError::OrderNotFound {
                order: id.to_string(),
            })
    }

    /// All orders for a customer
    pub async fn orders_for_customer(&self, customer: &CustomerId) -> Vec<Order> {
        let orders = self.orders.read().await;
        orders
            .values()
            .filter(|o| &o.customer == customer)
            .cloned()
            .collect()
    }

    /// All orders with items from a vendor
    pub async fn orders_for_vendor(&self, vendor: &VendorId) -> Vec<Order> {
        let orders = self.orders.read().await;
        orders
            .values()
            .filter(|o| o.vendor_breakdown.iter().any(|s| &s.vendor == vendor))
            .cloned()
            .collect()
    }

    /// Times a coupon has been used (net of cancellations)
    pub async fn coupon_usage(&self, code: &str) -> u32 {
        self.coupon_uses.read().await.get(code).copied().unwrap_or(0)
    }

    async fn resolve(&self, order_ref: &OrderRef) -> Result<OrderId> {
        match order_ref {
            OrderRef::Id(id) => Ok(id.clone()),
            OrderRef::Code(code) => {
                let codes = self.codes.read().await;
                codes
                    .get(code)
                    .cloned()
                    .ok_or_else(|| VendraError::OrderNotFound {
                        order: code.clone(),
                    })
            }
        }
    }

    async fn dispatch(&self, notification: Notification) {
        if let Err(err) = self.notifier.notify(notification).await {
            warn!(error = %err, "notification delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, ProductInfo};
    use rust_decimal_macros::dec;
    use vendra_notify::RecordingNotifier;
    use vendra_types::ProductId;

    struct Fixture {
        manager: OrderManager,
        vendors: Arc<VendorLedger>,
        customers: Arc<CustomerLedger>,
        notifier: RecordingNotifier,
        catalog: InMemoryCatalog,
    }

    async fn fixture(config: EngineConfig) -> Fixture {
        let vendors = Arc::new(VendorLedger::new());
        let customers = Arc::new(CustomerLedger::new());
        let notifier = RecordingNotifier::new();
        let catalog = InMemoryCatalog::new();
        let manager = OrderManager::new(
            config,
            Arc::new(catalog.clone()),
            Arc::new(notifier.clone()),
            vendors.clone(),
            customers.clone(),
        );
        Fixture {
            manager,
            vendors,
            customers,
            notifier,
            catalog,
        }
    }

    async fn seed_product(fx: &Fixture, vendor: &VendorId, price: Decimal) -> ProductId {
        let product = ProductId::new();
        fx.catalog
            .insert(ProductInfo {
                id: product.clone(),
                vendor: vendor.clone(),
                name: "widget".to_string(),
                unit_price: price,
            })
            .await;
        product
    }

    async fn place_order(
        fx: &Fixture,
        customer: &CustomerId,
        product: &ProductId,
        quantity: u32,
        payment: PaymentStatus,
    ) -> Order {
        fx.manager
            .create_order(
                customer.clone(),
                vec![NewOrderLine {
                    product: product.clone(),
                    quantity,
                }],
                payment,
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn checkout_stamps_commission_into_breakdown() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(100)).await;

        let order = place_order(&fx, &customer, &product, 10, PaymentStatus::Completed).await;

        assert_eq!(order.total, dec!(1000));
        assert_eq!(order.vendor_breakdown.len(), 1);
        let share = &order.vendor_breakdown[0];
        assert_eq!(share.subtotal, dec!(1000));
        assert_eq!(share.commission, dec!(100.00));
        assert_eq!(share.earnings(), dec!(900.00));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.history.len(), 1);
    }

    #[tokio::test]
    async fn empty_checkout_is_rejected() {
        let fx = fixture(EngineConfig::default()).await;
        let err = fx
            .manager
            .create_order(
                CustomerId::new(),
                vec![],
                PaymentStatus::Pending,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VendraError::Validation { .. }));
    }

    #[tokio::test]
    async fn invalid_transition_leaves_order_unchanged() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(50)).await;
        let order = place_order(&fx, &customer, &product, 1, PaymentStatus::Completed).await;

        let before = fx.manager.order(OrderRef::Id(order.id.clone())).await.unwrap();
        let err = fx
            .manager
            .change_status(
                OrderRef::Id(order.id.clone()),
                OrderStatus::Delivered,
                ActorId::new(),
                ActorRole::Vendor,
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, VendraError::InvalidTransition { .. }));
        let after = fx.manager.order(OrderRef::Id(order.id)).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn valid_transition_appends_one_history_entry() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(50)).await;
        let order = place_order(&fx, &customer, &product, 1, PaymentStatus::Completed).await;

        let actor = ActorId::new();
        let updated = fx
            .manager
            .change_status(
                OrderRef::Id(order.id),
                OrderStatus::Processing,
                actor.clone(),
                ActorRole::Vendor,
                Some("picking".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Processing);
        assert_eq!(updated.history.len(), 2);
        let entry = updated.history.last().unwrap();
        assert_eq!(entry.status, OrderStatus::Processing);
        assert_eq!(entry.actor, actor);
        assert_eq!(entry.role, ActorRole::Vendor);
        assert_eq!(entry.note.as_deref(), Some("picking"));
    }

    #[tokio::test]
    async fn delivery_credits_vendor_directly_and_releases_funds() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(100)).await;
        let order = place_order(&fx, &customer, &product, 10, PaymentStatus::Completed).await;

        let admin = ActorId::new();
        let delivered = fx
            .manager
            .change_status(
                OrderRef::Id(order.id),
                OrderStatus::Delivered,
                admin,
                ActorRole::Admin,
                None,
            )
            .await
            .unwrap();

        assert!(delivered.funds_released);
        assert!(delivered.tracking.delivered_at.is_some());
        assert!(delivered.return_window_expires_at.is_some());
        let wallet = fx.vendors.wallet(&vendor).await;
        assert_eq!(wallet.balance, dec!(900.00));
        assert_eq!(wallet.pending_balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn redelivery_credits_exactly_once() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(100)).await;
        let order = place_order(&fx, &customer, &product, 10, PaymentStatus::Completed).await;

        let admin = ActorId::new();
        for _ in 0..2 {
            fx.manager
                .change_status(
                    OrderRef::Id(order.id.clone()),
                    OrderStatus::Delivered,
                    admin.clone(),
                    ActorRole::Admin,
                    None,
                )
                .await
                .unwrap();
        }

        let wallet = fx.vendors.wallet(&vendor).await;
        assert_eq!(wallet.balance, dec!(900.00));
        assert_eq!(fx.vendors.entries_for(&vendor).await.len(), 1);
    }

    #[tokio::test]
    async fn hold_policy_credits_pending_and_keeps_funds_held() {
        let config = EngineConfig {
            settlement_policy: SettlementPolicy::HoldUntilWindowClose,
            ..EngineConfig::default()
        };
        let fx = fixture(config).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(100)).await;
        let order = place_order(&fx, &customer, &product, 10, PaymentStatus::Completed).await;

        let delivered = fx
            .manager
            .change_status(
                OrderRef::Id(order.id),
                OrderStatus::Delivered,
                ActorId::new(),
                ActorRole::Admin,
                None,
            )
            .await
            .unwrap();

        assert!(!delivered.funds_released);
        let wallet = fx.vendors.wallet(&vendor).await;
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(wallet.pending_balance, dec!(900.00));
    }

    #[tokio::test]
    async fn admin_cancellation_refunds_paid_order() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(500)).await;
        let order = place_order(&fx, &customer, &product, 1, PaymentStatus::Completed).await;

        let cancelled = fx
            .manager
            .change_status(
                OrderRef::Id(order.id),
                OrderStatus::Cancelled,
                ActorId::new(),
                ActorRole::Admin,
                Some("out of stock".to_string()),
            )
            .await
            .unwrap();

        let cancellation = cancelled.cancellation.unwrap();
        assert_eq!(cancellation.refund_amount, Some(dec!(500)));
        assert_eq!(cancellation.refund_status, Some(RefundStatus::Processed));
        assert_eq!(fx.customers.balance(&customer).await, dec!(500));

        let entries = fx.customers.entries_for(&customer).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, vendra_types::EntryKind::Refund);
    }

    #[tokio::test]
    async fn cancelling_twice_refunds_once() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(500)).await;
        let order = place_order(&fx, &customer, &product, 1, PaymentStatus::Completed).await;

        let admin = ActorId::new();
        for _ in 0..2 {
            fx.manager
                .change_status(
                    OrderRef::Id(order.id.clone()),
                    OrderStatus::Cancelled,
                    admin.clone(),
                    ActorRole::Admin,
                    None,
                )
                .await
                .unwrap();
        }

        assert_eq!(fx.customers.balance(&customer).await, dec!(500));
        assert_eq!(fx.customers.entries_for(&customer).await.len(), 1);
    }

    #[tokio::test]
    async fn unpaid_cancellation_moves_no_money() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(500)).await;
        let order = place_order(&fx, &customer, &product, 1, PaymentStatus::Pending).await;

        let cancelled = fx
            .manager
            .change_status(
                OrderRef::Id(order.id),
                OrderStatus::Cancelled,
                ActorId::new(),
                ActorRole::Admin,
                None,
            )
            .await
            .unwrap();

        let cancellation = cancelled.cancellation.unwrap();
        assert_eq!(cancellation.refund_amount, None);
        assert_eq!(fx.customers.balance(&customer).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn cancellation_releases_coupon_use() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(100)).await;

        let order = fx
            .manager
            .create_order(
                customer.clone(),
                vec![NewOrderLine {
                    product,
                    quantity: 1,
                }],
                PaymentStatus::Pending,
                Some("SPRING10".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(fx.manager.coupon_usage("SPRING10").await, 1);

        fx.manager
            .change_status(
                OrderRef::Id(order.id),
                OrderStatus::Cancelled,
                ActorId::new(),
                ActorRole::Admin,
                None,
            )
            .await
            .unwrap();
        assert_eq!(fx.manager.coupon_usage("SPRING10").await, 0);
    }

    #[tokio::test]
    async fn cancellation_request_reverts_on_rejection() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(100)).await;
        let order = place_order(&fx, &customer, &product, 1, PaymentStatus::Completed).await;

        // Move into processing first, then the customer asks to cancel
        fx.manager
            .change_status(
                OrderRef::Id(order.id.clone()),
                OrderStatus::Processing,
                ActorId::new(),
                ActorRole::Vendor,
                None,
            )
            .await
            .unwrap();
        let requested = fx
            .manager
            .request_cancellation(OrderRef::Id(order.id.clone()), &customer)
            .await
            .unwrap();
        assert_eq!(requested.status, OrderStatus::CancellationRequested);
        assert_eq!(
            requested.cancellation_request.as_ref().unwrap().original_status,
            OrderStatus::Processing
        );

        let history_before = requested.history.len();
        let rejected = fx
            .manager
            .change_status(
                OrderRef::Id(order.id),
                OrderStatus::CancellationRejected,
                ActorId::new(),
                ActorRole::Vendor,
                None,
            )
            .await
            .unwrap();

        assert_eq!(rejected.status, OrderStatus::Processing);
        assert_eq!(
            rejected.cancellation_request.as_ref().unwrap().resolution,
            CancellationResolution::Rejected
        );
        // rejection entry plus the explanatory revert entry
        assert_eq!(rejected.history.len(), history_before + 2);
    }

    #[tokio::test]
    async fn request_cancellation_requires_owner() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(100)).await;
        let order = place_order(&fx, &customer, &product, 1, PaymentStatus::Completed).await;

        let stranger = CustomerId::new();
        let err = fx
            .manager
            .request_cancellation(OrderRef::Id(order.id), &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, VendraError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn orders_resolve_by_code() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(100)).await;
        let order = place_order(&fx, &customer, &product, 1, PaymentStatus::Completed).await;

        let by_code = fx
            .manager
            .order(OrderRef::Code(order.code.clone()))
            .await
            .unwrap();
        assert_eq!(by_code.id, order.id);

        let err = fx.manager.order(OrderRef::from("ORD-MISSING")).await.unwrap_err();
        assert!(matches!(err, VendraError::OrderNotFound { .. }));
    }

    #[tokio::test]
    async fn status_changes_notify_customer_and_vendor() {
        let fx = fixture(EngineConfig::default()).await;
        let vendor = VendorId::new();
        let customer = CustomerId::new();
        let product = seed_product(&fx, &vendor, dec!(100)).await;
        let order = place_order(&fx, &customer, &product, 1, PaymentStatus::Completed).await;

        fx.manager
            .change_status(
                OrderRef::Id(order.id),
                OrderStatus::Processing,
                ActorId::new(),
                ActorRole::Vendor,
                None,
            )
            .await
            .unwrap();

        let sent = fx.notifier.sent().await;
        assert!(sent
            .iter()
            .any(|n| n.recipient == Recipient::Customer(customer.clone())));
        assert!(sent
            .iter()
            .any(|n| n.recipient == Recipient::Vendor(vendor.clone())));
    }
}
