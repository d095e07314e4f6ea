//! Vendra Returns - Return request and refund workflow
//!
//! Customers open return requests against delivered orders inside the
//! return window. A policy decides whether the refund runs immediately or
//! waits for staff review; either way the refund credits the customer's
//! personal wallet and debits the responsible vendor through the same
//! wallet service used by settlement, so all balance changes share one
//! mutation path.
//!
//! # Invariants
//!
//! 1. At most one non-terminal return per order/customer pair
//! 2. A refund is processed at most once, guarded by `refund_status`
//! 3. Customer credit, vendor debit, and the linking refund transaction
//!    commit together or not at all
//! 4. A failed immediate refund leaves the request marked `failed` for
//!    manual retry; it never fails the creation call

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use vendra_ledger::{CustomerLedger, VendorLedger};
use vendra_notify::{Notification, Notifier, Recipient};
use vendra_orders::{OrderManager, OrderRef};
use vendra_types::{
    ActorId, ActorRole, CustomerId, EngineConfig, EntryReference, Order, OrderStatus, ProductId,
    RefundId, RefundMethod, RefundStatus, RefundTransaction, Result, ReturnHistoryEntry,
    ReturnItem, ReturnRequest, ReturnRequestId, ReturnStatus, VendraError,
};

/// One requested return line; pricing comes from the order
#[derive(Debug, Clone)]
pub struct ReturnItemRequest {
    pub product: ProductId,
    pub quantity: u32,
    pub reason: Option<String>,
}

/// The return/refund workflow service
#[derive(Clone)]
pub struct ReturnService {
    config: EngineConfig,
    orders: Arc<OrderManager>,
    vendors: Arc<VendorLedger>,
    customers: Arc<CustomerLedger>,
    notifier: Arc<dyn Notifier>,
    requests: Arc<RwLock<HashMap<ReturnRequestId, ReturnRequest>>>,
    refunds: Arc<RwLock<HashMap<RefundId, RefundTransaction>>>,
}

impl ReturnService {
    pub fn new(
        config: EngineConfig,
        orders: Arc<OrderManager>,
        vendors: Arc<VendorLedger>,
        customers: Arc<CustomerLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            orders,
            vendors,
            customers,
            notifier,
            requests: Arc::new(RwLock::new(HashMap::new())),
            refunds: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Whether `customer` may open a return against `order` as of `now`
    ///
    /// Requires a delivered order, a live return window (measured from the
    /// delivered history timestamp), and no open return for the pair.
    pub async fn check_eligibility(
        &self,
        order: &Order,
        customer: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let requests = self.requests.read().await;
        Self::eligibility(&requests, &self.config, order, customer, now)
    }

    fn eligibility(
        requests: &HashMap<ReturnRequestId, ReturnRequest>,
        config: &EngineConfig,
        order: &Order,
        customer: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if order.status != OrderStatus::Delivered {
            return Err(VendraError::OrderNotDelivered {
                order: order.code.clone(),
            });
        }

        let delivered_at = order
            .delivered_history_at()
            .or(order.tracking.delivered_at)
            .ok_or_else(|| VendraError::OrderNotDelivered {
                order: order.code.clone(),
            })?;

        let closes_at = delivered_at + Duration::days(config.return_window_days);
        if now > closes_at {
            return Err(VendraError::ReturnWindowClosed {
                order: order.code.clone(),
                closed_at: closes_at.to_rfc3339(),
            });
        }

        let open_exists = requests.values().any(|r| {
            r.order == order.id && &r.customer == customer && !r.status.is_terminal()
        });
        if open_exists {
            return Err(VendraError::ReturnAlreadyOpen {
                order: order.code.clone(),
            });
        }

        Ok(())
    }

    /// Open a return request; the refund runs immediately when the
    /// auto-approval policy allows it
    pub async fn create_return_request(
        &self,
        customer: CustomerId,
        order_ref: OrderRef,
        items: Vec<ReturnItemRequest>,
        reason: String,
        method: RefundMethod,
    ) -> Result<ReturnRequest> {
        if items.is_empty() {
            return Err(VendraError::validation("items", "return has no items"));
        }

        let mut requests = self.requests.write().await;
        let order = self.orders.order(order_ref).await?;

        if order.customer != customer {
            return Err(VendraError::unauthorized(
                "only the ordering customer may open a return",
            ));
        }

        let now = Utc::now();
        Self::eligibility(&requests, &self.config, &order, &customer, now)?;

        let mut return_items = Vec::with_capacity(items.len());
        for item in &items {
            let line = order
                .lines
                .iter()
                .find(|l| l.product == item.product)
                .ok_or_else(|| {
                    VendraError::validation("items", format!("product {} is not on the order", item.product))
                })?;
            if item.quantity == 0 || item.quantity > line.quantity {
                return Err(VendraError::validation(
                    "quantity",
                    format!("cannot return {} of {} ordered", item.quantity, line.quantity),
                ));
            }
            return_items.push(ReturnItem {
                product: item.product.clone(),
                quantity: item.quantity,
                unit_price: line.unit_price,
                reason: item.reason.clone(),
            });
        }

        let refund_amount: Decimal = return_items.iter().map(ReturnItem::total).sum();
        if refund_amount <= Decimal::ZERO {
            return Err(VendraError::validation("items", "refund amount must be positive"));
        }

        // Returns spanning several vendors are not modeled; the first
        // breakdown entry is the responsible vendor.
        let vendor = order
            .vendor_breakdown
            .first()
            .map(|s| s.vendor.clone())
            .ok_or_else(|| {
                VendraError::validation("vendor_breakdown", "order has no vendor breakdown")
            })?;

        let actor = ActorId::from_uuid(*customer.as_uuid());
        let mut request = ReturnRequest {
            id: ReturnRequestId::new(),
            order: order.id.clone(),
            customer: customer.clone(),
            vendor: vendor.clone(),
            items: return_items,
            reason,
            refund_amount,
            status: ReturnStatus::Pending,
            refund_status: RefundStatus::Pending,
            method,
            history: vec![ReturnHistoryEntry {
                status: ReturnStatus::Pending,
                actor: actor.clone(),
                role: ActorRole::User,
                at: now,
                note: None,
            }],
            rejection_reason: None,
            created_at: now,
        };

        info!(request = %request.id, order = %order.code, amount = %refund_amount, "return request created");

        let policy = &self.config.return_policy;
        if policy.auto_approve_enabled && refund_amount <= policy.auto_approve_max_amount {
            if let Err(err) = self.refund_into(&mut request, &actor, ActorRole::User).await {
                // Left for manual retry; creation itself still succeeds.
                warn!(request = %request.id, error = %err, "immediate refund failed");
                request.refund_status = RefundStatus::Failed;
            }
        }

        requests.insert(request.id.clone(), request.clone());
        drop(requests);

        self.dispatch(Notification::new(
            Recipient::Customer(customer),
            format!("Return opened for order {}", order.code),
            format!("Return request for {refund_amount} was received"),
        ))
        .await;
        self.dispatch(Notification::new(
            Recipient::Vendor(vendor),
            format!("Return opened for order {}", order.code),
            "A customer opened a return request against your items".to_string(),
        ))
        .await;

        Ok(request)
    }

    /// Process the refund for a return request
    ///
    /// Credits the customer wallet, debits the vendor wallet (pending
    /// preferred), and records the linking refund transaction as one unit.
    pub async fn process_refund(
        &self,
        request_id: &ReturnRequestId,
        actor: ActorId,
        role: ActorRole,
    ) -> Result<ReturnRequest> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(request_id)
            .ok_or_else(|| VendraError::ReturnNotFound {
                request: request_id.to_string(),
            })?;

        self.refund_into(request, &actor, role).await?;
        let snapshot = request.clone();
        drop(requests);

        self.dispatch(Notification::new(
            Recipient::Customer(snapshot.customer.clone()),
            "Refund processed".to_string(),
            format!("Your refund of {} was credited to your wallet", snapshot.refund_amount),
        ))
        .await;

        Ok(snapshot)
    }

    /// Staff review of a return request
    ///
    /// Approving a pending request drives the refund; rejecting stores the
    /// reason and marks the refund failed. The customer is notified either
    /// way.
    pub async fn update_status(
        &self,
        request_id: &ReturnRequestId,
        new_status: ReturnStatus,
        actor: ActorId,
        role: ActorRole,
        note: Option<String>,
        rejection_reason: Option<String>,
    ) -> Result<ReturnRequest> {
        if role == ActorRole::User {
            return Err(VendraError::unauthorized(
                "return review is limited to vendor and admin staff",
            ));
        }
        if new_status == ReturnStatus::Pending {
            return Err(VendraError::validation(
                "status",
                "a reviewed request cannot go back to pending",
            ));
        }

        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(request_id)
            .ok_or_else(|| VendraError::ReturnNotFound {
                request: request_id.to_string(),
            })?;

        let now = Utc::now();
        request.history.push(ReturnHistoryEntry {
            status: new_status,
            actor: actor.clone(),
            role,
            at: now,
            note: note.clone(),
        });

        match new_status {
            ReturnStatus::Approved => {
                request.status = ReturnStatus::Approved;
                if request.refund_status != RefundStatus::Processed {
                    self.refund_into(request, &actor, role).await?;
                }
            }
            ReturnStatus::Rejected => {
                request.status = ReturnStatus::Rejected;
                request.rejection_reason = rejection_reason;
                request.refund_status = RefundStatus::Failed;
            }
            other => {
                request.status = other;
            }
        }

        let snapshot = request.clone();
        drop(requests);

        info!(request = %snapshot.id, status = %snapshot.status, "return request reviewed");

        self.dispatch(Notification::new(
            Recipient::Customer(snapshot.customer.clone()),
            format!("Return request {}", snapshot.status),
            note.unwrap_or_else(|| format!("Your return request is now {}", snapshot.status)),
        ))
        .await;

        Ok(snapshot)
    }

    /// The shared refund path: wallet mutations, the linking refund
    /// transaction, and the request flip happen together.
    async fn refund_into(
        &self,
        request: &mut ReturnRequest,
        actor: &ActorId,
        role: ActorRole,
    ) -> Result<()> {
        if request.refund_status == RefundStatus::Processed {
            return Err(VendraError::RefundAlreadyProcessed {
                request: request.id.to_string(),
            });
        }

        // The originating order must still resolve before money moves.
        let order = self.orders.order(OrderRef::Id(request.order.clone())).await?;

        let refund_id = RefundId::new();
        let amount = request.refund_amount;

        let (_, customer_entry) = self
            .customers
            .credit(
                &request.customer,
                amount,
                format!("Refund for return on order {}", order.code),
                EntryReference::Refund(refund_id.clone()),
            )
            .await?;
        let (_, vendor_entry) = self
            .vendors
            .debit_pending_or_balance(
                &request.vendor,
                amount,
                format!("Refund for return on order {}", order.code),
                EntryReference::Refund(refund_id.clone()),
            )
            .await?;

        let refund = RefundTransaction {
            id: refund_id.clone(),
            request: request.id.clone(),
            order: request.order.clone(),
            customer: request.customer.clone(),
            vendor: request.vendor.clone(),
            amount,
            customer_entry,
            vendor_entry,
            created_at: Utc::now(),
        };
        self.refunds.write().await.insert(refund_id, refund);

        request.refund_status = RefundStatus::Processed;
        request.status = ReturnStatus::Completed;
        request.history.push(ReturnHistoryEntry {
            status: ReturnStatus::Completed,
            actor: actor.clone(),
            role,
            at: Utc::now(),
            note: Some("refund processed".to_string()),
        });

        self.orders.record_refund(&request.order, amount).await?;

        info!(request = %request.id, %amount, "refund processed");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Look up a return request
    pub async fn request(&self, id: &ReturnRequestId) -> Result<ReturnRequest> {
        let requests = self.requests.read().await;
        requests
            .get(id)
            .cloned()
            .ok_or_else(|| VendraError::ReturnNotFound {
                request: id.to_string(),
            })
    }

    /// All return requests for a customer
    pub async fn requests_for_customer(&self, customer: &CustomerId) -> Vec<ReturnRequest> {
        let requests = self.requests.read().await;
        requests
            .values()
            .filter(|r| &r.customer == customer)
            .cloned()
            .collect()
    }

    /// The refund transaction produced by a processed return, if any
    pub async fn refund_for_request(&self, request: &ReturnRequestId) -> Option<RefundTransaction> {
        let refunds = self.refunds.read().await;
        refunds.values().find(|r| &r.request == request).cloned()
    }

    async fn dispatch(&self, notification: Notification) {
        if let Err(err) = self.notifier.notify(notification).await {
            warn!(error = %err, "notification delivery failed");
        }
    }
}
