//! Role-gated status transition rules
//!
//! The table is keyed by actor role, not global: a customer can only ask
//! for cancellation, a vendor walks the fulfillment path, and admin is the
//! escape hatch with every transition permitted.

use vendra_types::{ActorRole, OrderStatus};

/// Statuses the given role may move an order to from `from`
pub fn allowed(role: ActorRole, from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match role {
        ActorRole::Admin => &OrderStatus::ALL,
        ActorRole::User => match from {
            Pending | Processing => &[CancellationRequested],
            _ => &[],
        },
        ActorRole::Vendor => match from {
            Pending => &[Processing, Cancelled, OnHold, CancellationRequested],
            Processing => &[
                ReadyToShip,
                OnHold,
                Dispatched,
                Cancelled,
                CancellationRequested,
            ],
            ReadyToShip => &[Dispatched, ShippedSeller],
            Dispatched => &[ShippedSeller, Delivered],
            ShippedSeller => &[Delivered],
            OnHold => &[Processing, ReadyToShip],
            CancellationRequested => &[Cancelled, CancellationRejected, Processing],
            CancellationRejected => &[Processing, Cancelled],
            _ => &[],
        },
    }
}

/// Whether `role` may move an order from `from` to `to`
pub fn is_allowed(role: ActorRole, from: OrderStatus, to: OrderStatus) -> bool {
    allowed(role, from).contains(&to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn admin_may_do_anything() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert!(is_allowed(ActorRole::Admin, from, to));
            }
        }
    }

    #[test]
    fn user_may_only_request_cancellation_early() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let expected = matches!(from, Pending | Processing) && to == CancellationRequested;
                assert_eq!(is_allowed(ActorRole::User, from, to), expected);
            }
        }
    }

    #[test]
    fn vendor_fulfillment_path() {
        assert!(is_allowed(ActorRole::Vendor, Pending, Processing));
        assert!(is_allowed(ActorRole::Vendor, Processing, ReadyToShip));
        assert!(is_allowed(ActorRole::Vendor, ReadyToShip, Dispatched));
        assert!(is_allowed(ActorRole::Vendor, Dispatched, Delivered));
        assert!(is_allowed(ActorRole::Vendor, ShippedSeller, Delivered));
        assert!(is_allowed(ActorRole::Vendor, OnHold, Processing));
        assert!(is_allowed(ActorRole::Vendor, CancellationRequested, Cancelled));
        assert!(is_allowed(
            ActorRole::Vendor,
            CancellationRejected,
            Processing
        ));
    }

    #[test]
    fn vendor_cannot_leave_terminal_states() {
        for to in OrderStatus::ALL {
            assert!(!is_allowed(ActorRole::Vendor, Delivered, to));
            assert!(!is_allowed(ActorRole::Vendor, Cancelled, to));
            assert!(!is_allowed(ActorRole::Vendor, Refunded, to));
        }
    }

    #[test]
    fn vendor_cannot_skip_to_delivery_from_pending() {
        assert!(!is_allowed(ActorRole::Vendor, Pending, Delivered));
        assert!(!is_allowed(ActorRole::Vendor, Pending, Shipped));
        assert!(!is_allowed(ActorRole::Vendor, Pending, OutForDelivery));
    }
}
