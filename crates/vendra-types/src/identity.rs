//! Identity types for Vendra
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types (a vendor id is not an order id).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

// Party identity types
define_id_type!(CustomerId, "cust", "Unique identifier for a customer");
define_id_type!(VendorId, "vendor", "Unique identifier for a marketplace vendor");
define_id_type!(ActorId, "actor", "Identifier for the actor behind a mutation (customer, vendor staff, or admin)");

// Catalog identity types
define_id_type!(ProductId, "prod", "Unique identifier for a catalog product");

// Order and fulfillment identity types
define_id_type!(OrderId, "order", "Unique identifier for an order");
define_id_type!(ReturnRequestId, "ret", "Unique identifier for a return request");
define_id_type!(RefundId, "refund", "Unique identifier for a refund transaction");

// Ledger identity types
define_id_type!(LedgerEntryId, "entry", "Unique identifier for a ledger entry");
define_id_type!(WithdrawalId, "wd", "Unique identifier for a withdrawal request");
