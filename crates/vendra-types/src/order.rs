//! Order types for Vendra
//!
//! An order is created at checkout, mutated only through the lifecycle
//! manager, and never deleted: cancellation is a status, not a removal.
//! The status history is append-only and never reordered.

use crate::{ActorId, CustomerId, OrderId, ProductId, RefundStatus, VendorId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    ReadyToShip,
    Dispatched,
    ShippedSeller,
    Shipped,
    OutForDelivery,
    Delivered,
    CancellationRequested,
    CancellationRejected,
    Cancelled,
    Refunded,
    OnHold,
}

impl OrderStatus {
    /// Every status, in declaration order. Used by the transition rules
    /// and by exhaustive tests.
    pub const ALL: [OrderStatus; 13] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::ReadyToShip,
        OrderStatus::Dispatched,
        OrderStatus::ShippedSeller,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::CancellationRequested,
        OrderStatus::CancellationRejected,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::OnHold,
    ];

    /// Wire name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::ReadyToShip => "ready_to_ship",
            Self::Dispatched => "dispatched",
            Self::ShippedSeller => "shipped_seller",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::CancellationRequested => "cancellation_requested",
            Self::CancellationRejected => "cancellation_rejected",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::OnHold => "on_hold",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Role of the actor performing a mutation
///
/// The transition table is keyed by role; admin is the escape hatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    User,
    Vendor,
    Admin,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Vendor => "vendor",
            Self::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// A single order line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: ProductId,
    pub vendor: VendorId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderLine {
    /// Line total (`unit_price * quantity`)
    pub fn total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The per-vendor slice of a multi-vendor order
///
/// Commission is stamped at order-creation time; settlement always uses
/// the stamped value, never a live rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorShare {
    pub vendor: VendorId,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub commission: Decimal,
}

impl VendorShare {
    /// Vendor earnings for this share (`subtotal - commission`)
    pub fn earnings(&self) -> Decimal {
        self.subtotal - self.commission
    }
}

/// One append-only status history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub actor: ActorId,
    pub role: ActorRole,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// Cancellation metadata, stamped exactly once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
    pub refund_status: Option<RefundStatus>,
    pub refund_amount: Option<Decimal>,
}

/// Resolution of a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationResolution {
    Open,
    Approved,
    Rejected,
}

/// A customer's request to cancel, holding the typed status to revert to
/// if the request is rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationRequest {
    pub original_status: OrderStatus,
    pub requested_at: DateTime<Utc>,
    pub resolution: CancellationResolution,
}

/// Delivery tracking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub number: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// A marketplace order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Unique human-readable code, accepted interchangeably with the id
    pub code: String,
    pub customer: CustomerId,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Append-only; never mutated or reordered
    pub history: Vec<StatusEntry>,
    pub cancellation: Option<Cancellation>,
    pub cancellation_request: Option<CancellationRequest>,
    pub tracking: Tracking,
    pub return_window_expires_at: Option<DateTime<Utc>>,
    /// May only transition false -> true, never back
    pub funds_released: bool,
    pub vendor_breakdown: Vec<VendorShare>,
    pub coupon: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Sum of all line totals
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(OrderLine::total).sum()
    }

    /// Timestamp of the delivered history entry, if any
    pub fn delivered_history_at(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .rev()
            .find(|e| e.status == OrderStatus::Delivered)
            .map(|e| e.at)
    }

    /// Vendors contributing to this order, in breakdown order
    pub fn vendors(&self) -> Vec<VendorId> {
        self.vendor_breakdown
            .iter()
            .map(|s| s.vendor.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn line_total() {
        let line = OrderLine {
            product: ProductId::new(),
            vendor: VendorId::new(),
            quantity: 3,
            unit_price: dec!(19.99),
        };
        assert_eq!(line.total(), dec!(59.97));
    }

    #[test]
    fn share_earnings() {
        let share = VendorShare {
            vendor: VendorId::new(),
            subtotal: dec!(1000),
            shipping: Decimal::ZERO,
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            commission: dec!(100),
        };
        assert_eq!(share.earnings(), dec!(900));
    }

    #[test]
    fn status_round_trips_through_serde() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: OrderStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }
}
