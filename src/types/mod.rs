//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: User account tied to an RFID tag
//! - `pending`: Staged cart entries and line items
//! - `transaction`: Immutable settlement audit records
//! - `scan`: Last-scan state slot
//! - `error`: Error taxonomy for the checkout server

pub mod account;
pub mod error;
pub mod pending;
pub mod scan;
pub mod transaction;

pub use account::UserAccount;
pub use error::CheckoutError;
pub use pending::{LineItem, PendingEntry, PendingId, PendingStatus};
pub use scan::{ScanState, ScanStatus};
pub use transaction::{
    SettledItem, SettlementOutcome, SettlementReceipt, TransactionId, TransactionRecord,
    TransactionStatus,
};
