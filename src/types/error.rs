//! Error types for the RFID checkout server
//!
//! This module defines all error types that can occur while staging,
//! resolving, and settling checkouts. Every error carries an explicit kind;
//! callers branch on the variant (or the derived HTTP status), never on the
//! message text.
//!
//! # Error Categories
//!
//! - **Client input errors**: malformed UID, empty cart, bad line items
//! - **Auth errors**: shared hardware key absent or mismatched
//! - **Not-found errors**: unknown UID, unknown product, no pending work
//! - **Business rejections**: insufficient balance (atomic unit aborted)
//! - **Infrastructure failures**: store unreachable, commit conflicts,
//!   catalog unreachable

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

/// Main error type for the checkout server
///
/// Each variant includes the context needed to diagnose the failure and to
/// map it to an HTTP response without inspecting message strings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckoutError {
    /// RFID UID could not be normalized
    ///
    /// The UID was empty, odd-length, or contained non-hex characters after
    /// separator stripping. No state change.
    #[error("Malformed RFID UID '{uid}'")]
    MalformedUid {
        /// The rejected input as supplied by the caller
        uid: String,
    },

    /// Checkout staging was attempted with no line items
    #[error("Checkout for UID {uid} contains no items")]
    EmptyCart {
        /// Normalized UID of the staging request
        uid: String,
    },

    /// A staged line item failed validation
    ///
    /// Zero quantity or negative unit price. No state change.
    #[error("Invalid line item '{name}': {reason}")]
    InvalidLineItem {
        /// Display name of the offending item
        name: String,
        /// Why the item was rejected
        reason: String,
    },

    /// Shared hardware API key absent or mismatched
    ///
    /// Also raised when no key is configured at all: the server never
    /// accepts hardware settlement requests without a configured secret.
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// No account matches the scanned UID
    #[error("No user found for UID {uid}")]
    UserNotFound {
        /// Normalized UID that missed
        uid: String,
    },

    /// Product catalog has no entry for the barcode
    #[error("No product found for barcode {barcode}")]
    ProductNotFound {
        /// Barcode that missed
        barcode: String,
    },

    /// Settlement was triggered for a UID with no pending entries
    #[error("No pending checkout found for UID {uid}")]
    NoPendingWork {
        /// Normalized UID of the settlement attempt
        uid: String,
    },

    /// Account balance does not cover the pending total
    ///
    /// The atomic unit was aborted; balance, transaction log, and pending
    /// entries are untouched.
    #[error("Insufficient balance for UID {uid}: available {available}, required {required}")]
    InsufficientBalance {
        /// Normalized UID of the rejected settlement
        uid: String,
        /// Balance read inside the atomic scope
        available: Decimal,
        /// Recomputed pending total
        required: Decimal,
    },

    /// The store detected a concurrent write to the account record
    ///
    /// Retryable: the engine re-runs the read-validate-write cycle a
    /// bounded number of times before giving up.
    #[error("Settlement commit hit a concurrent write conflict")]
    WriteConflict,

    /// The bounded conflict-retry budget was exhausted
    #[error("Settlement commit failed after {attempts} conflicting attempts")]
    CommitConflict {
        /// How many commit attempts were made
        attempts: u32,
    },

    /// Underlying store failure (unreachable, timeout, protocol error)
    #[error("Storage error: {message}")]
    Storage {
        /// Driver-level description, logged but not sent to clients
        message: String,
    },

    /// Product catalog could not be reached
    #[error("Product catalog error: {message}")]
    Catalog {
        /// Client-level description, logged but not sent to clients
        message: String,
    },
}

impl CheckoutError {
    /// Create a MalformedUid error
    pub fn malformed_uid(uid: impl Into<String>) -> Self {
        CheckoutError::MalformedUid { uid: uid.into() }
    }

    /// Create an EmptyCart error
    pub fn empty_cart(uid: impl Into<String>) -> Self {
        CheckoutError::EmptyCart { uid: uid.into() }
    }

    /// Create an InvalidLineItem error
    pub fn invalid_line_item(name: impl Into<String>, reason: impl Into<String>) -> Self {
        CheckoutError::InvalidLineItem {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a UserNotFound error
    pub fn user_not_found(uid: impl Into<String>) -> Self {
        CheckoutError::UserNotFound { uid: uid.into() }
    }

    /// Create a ProductNotFound error
    pub fn product_not_found(barcode: impl Into<String>) -> Self {
        CheckoutError::ProductNotFound {
            barcode: barcode.into(),
        }
    }

    /// Create a NoPendingWork error
    pub fn no_pending_work(uid: impl Into<String>) -> Self {
        CheckoutError::NoPendingWork { uid: uid.into() }
    }

    /// Create an InsufficientBalance error
    pub fn insufficient_balance(
        uid: impl Into<String>,
        available: Decimal,
        required: Decimal,
    ) -> Self {
        CheckoutError::InsufficientBalance {
            uid: uid.into(),
            available,
            required,
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        CheckoutError::Storage {
            message: message.into(),
        }
    }

    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::MalformedUid { .. }
            | CheckoutError::EmptyCart { .. }
            | CheckoutError::InvalidLineItem { .. }
            | CheckoutError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            CheckoutError::InvalidApiKey => StatusCode::FORBIDDEN,
            CheckoutError::UserNotFound { .. }
            | CheckoutError::ProductNotFound { .. }
            | CheckoutError::NoPendingWork { .. } => StatusCode::NOT_FOUND,
            CheckoutError::WriteConflict
            | CheckoutError::CommitConflict { .. }
            | CheckoutError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CheckoutError::Catalog { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message exposed to HTTP clients
    ///
    /// Infrastructure failures collapse to a generic message; store and
    /// catalog internals stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            CheckoutError::WriteConflict
            | CheckoutError::CommitConflict { .. }
            | CheckoutError::Storage { .. } => "Internal server error".to_string(),
            CheckoutError::Catalog { .. } => "Product catalog unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

// Conversion from io::Error (listener setup, seed files)
impl From<std::io::Error> for CheckoutError {
    fn from(error: std::io::Error) -> Self {
        CheckoutError::Storage {
            message: error.to_string(),
        }
    }
}

// Conversion from mongodb driver errors, distinguishing retryable
// transaction conflicts from hard storage failures via error labels.
impl From<mongodb::error::Error> for CheckoutError {
    fn from(error: mongodb::error::Error) -> Self {
        if error.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR)
            || error.contains_label(mongodb::error::UNKNOWN_TRANSACTION_COMMIT_RESULT)
        {
            CheckoutError::WriteConflict
        } else {
            CheckoutError::Storage {
                message: error.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for CheckoutError {
    fn from(error: reqwest::Error) -> Self {
        CheckoutError::Catalog {
            message: error.to_string(),
        }
    }
}

impl IntoResponse for CheckoutError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "message": self.client_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::malformed_uid(
        CheckoutError::malformed_uid("zz"),
        "Malformed RFID UID 'zz'"
    )]
    #[case::empty_cart(
        CheckoutError::empty_cart("04:A1"),
        "Checkout for UID 04:A1 contains no items"
    )]
    #[case::invalid_line_item(
        CheckoutError::invalid_line_item("Cola", "quantity must be at least 1"),
        "Invalid line item 'Cola': quantity must be at least 1"
    )]
    #[case::user_not_found(
        CheckoutError::user_not_found("04:A1"),
        "No user found for UID 04:A1"
    )]
    #[case::no_pending_work(
        CheckoutError::no_pending_work("04:A1"),
        "No pending checkout found for UID 04:A1"
    )]
    #[case::insufficient_balance(
        CheckoutError::insufficient_balance("04:A1", Decimal::new(1000, 2), Decimal::new(2500, 2)),
        "Insufficient balance for UID 04:A1: available 10.00, required 25.00"
    )]
    #[case::commit_conflict(
        CheckoutError::CommitConflict { attempts: 3 },
        "Settlement commit failed after 3 conflicting attempts"
    )]
    fn test_error_display(#[case] error: CheckoutError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::malformed_uid(CheckoutError::malformed_uid("zz"), StatusCode::BAD_REQUEST)]
    #[case::empty_cart(CheckoutError::empty_cart("04:A1"), StatusCode::BAD_REQUEST)]
    #[case::bad_key(CheckoutError::InvalidApiKey, StatusCode::FORBIDDEN)]
    #[case::user_not_found(CheckoutError::user_not_found("04:A1"), StatusCode::NOT_FOUND)]
    #[case::no_pending(CheckoutError::no_pending_work("04:A1"), StatusCode::NOT_FOUND)]
    #[case::insufficient(
        CheckoutError::insufficient_balance("04:A1", Decimal::ZERO, Decimal::ONE),
        StatusCode::BAD_REQUEST
    )]
    #[case::storage(CheckoutError::storage("socket closed"), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case::conflict(CheckoutError::WriteConflict, StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_status_mapping(#[case] error: CheckoutError, #[case] expected: StatusCode) {
        assert_eq!(error.status_code(), expected);
    }

    #[test]
    fn test_storage_internals_not_exposed_to_clients() {
        let error = CheckoutError::storage("connection refused to mongodb://internal-host");
        assert_eq!(error.client_message(), "Internal server error");
        assert!(error.to_string().contains("connection refused"));
    }
}
