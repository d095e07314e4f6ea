//! Error types for Vendra
//!
//! Every operation returns a stable error kind plus a human-readable
//! message. Callers never see partial mutations alongside an error.

use crate::{ActorRole, OrderStatus};
use thiserror::Error;

/// Result type for Vendra operations
pub type Result<T> = std::result::Result<T, VendraError>;

/// Vendra error types
#[derive(Debug, Clone, Error)]
pub enum VendraError {
    // ========================================================================
    // Not-found Errors
    // ========================================================================

    /// Order not found (by id or code)
    #[error("Order {order} not found")]
    OrderNotFound { order: String },

    /// Product not found in the catalog
    #[error("Product {product} not found")]
    ProductNotFound { product: String },

    /// Withdrawal request not found
    #[error("Withdrawal request {request} not found")]
    WithdrawalNotFound { request: String },

    /// Return request not found
    #[error("Return request {request} not found")]
    ReturnNotFound { request: String },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================

    /// Status transition not allowed for this actor role
    #[error("Transition {from} -> {to} is not allowed for role {role}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        role: ActorRole,
    },

    /// Order funds have already been released
    #[error("Funds for order {order} have already been released")]
    FundsAlreadyReleased { order: String },

    // ========================================================================
    // Wallet Errors
    // ========================================================================

    /// Withdrawal against a non-positive balance
    #[error("Insufficient balance for vendor {vendor}: available {available}")]
    InsufficientBalance { vendor: String, available: String },

    /// A pending withdrawal request already exists for the vendor
    #[error("Vendor {vendor} already has a pending withdrawal request")]
    DuplicateRequest { vendor: String },

    /// Withdrawal request is not in the pending state
    #[error("Withdrawal request {request} is not pending (state: {state})")]
    WithdrawalNotPending { request: String, state: String },

    /// Customer wallet debit below zero
    #[error("Insufficient customer funds for {customer}: requested {requested}, available {available}")]
    InsufficientCustomerFunds {
        customer: String,
        requested: String,
        available: String,
    },

    // ========================================================================
    // Return & Refund Errors
    // ========================================================================

    /// Refund has already been processed
    #[error("Refund for return request {request} has already been processed")]
    RefundAlreadyProcessed { request: String },

    /// Return requested against an order that is not delivered
    #[error("Order {order} is not delivered; returns require a delivered order")]
    OrderNotDelivered { order: String },

    /// Return window has lapsed
    #[error("Return window for order {order} closed at {closed_at}")]
    ReturnWindowClosed { order: String, closed_at: String },

    /// A non-terminal return already exists for this order/customer pair
    #[error("An open return request already exists for order {order}")]
    ReturnAlreadyOpen { order: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Caller is not permitted to perform the action
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// Malformed input
    #[error("Invalid input: {field} - {reason}")]
    Validation { field: String, reason: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl VendraError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Get a stable error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            Self::ProductNotFound { .. } => "PRODUCT_NOT_FOUND",
            Self::WithdrawalNotFound { .. } => "WITHDRAWAL_NOT_FOUND",
            Self::ReturnNotFound { .. } => "RETURN_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::FundsAlreadyReleased { .. } => "FUNDS_ALREADY_RELEASED",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::DuplicateRequest { .. } => "DUPLICATE_REQUEST",
            Self::WithdrawalNotPending { .. } => "WITHDRAWAL_NOT_PENDING",
            Self::InsufficientCustomerFunds { .. } => "INSUFFICIENT_CUSTOMER_FUNDS",
            Self::RefundAlreadyProcessed { .. } => "REFUND_ALREADY_PROCESSED",
            Self::OrderNotDelivered { .. } => "ORDER_NOT_DELIVERED",
            Self::ReturnWindowClosed { .. } => "RETURN_WINDOW_CLOSED",
            Self::ReturnAlreadyOpen { .. } => "RETURN_ALREADY_OPEN",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Validation { .. } => "VALIDATION",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the transport layer should map this error to
    pub fn http_status(&self) -> u16 {
        match self {
            Self::OrderNotFound { .. }
            | Self::ProductNotFound { .. }
            | Self::WithdrawalNotFound { .. }
            | Self::ReturnNotFound { .. } => 404,
            Self::Unauthorized { .. } => 401,
            Self::FundsAlreadyReleased { .. }
            | Self::RefundAlreadyProcessed { .. }
            | Self::DuplicateRequest { .. } => 409,
            Self::Internal { .. } => 500,
            _ => 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let err = VendraError::InsufficientBalance {
            vendor: "v1".to_string(),
            available: "0".to_string(),
        };
        assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = VendraError::OrderNotFound {
            order: "x".to_string(),
        };
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn reentrancy_maps_to_409() {
        let err = VendraError::RefundAlreadyProcessed {
            request: "r".to_string(),
        };
        assert_eq!(err.http_status(), 409);
    }
}
