//! Transaction-related types for the RFID checkout server
//!
//! This module defines the immutable audit record produced by a settlement
//! and the result types the settlement engine returns to its callers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pending::{LineItem, PendingId};

/// Transaction identifier
pub type TransactionId = Uuid;

/// Status of a transaction record
///
/// Only completed transactions are ever persisted; rejected or failed
/// settlement attempts leave no transaction record behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Settled and durably recorded
    Completed,
}

/// One purchased item inside a transaction record
///
/// A flattened [`LineItem`] annotated with the pending entry it came from,
/// preserving the audit trail from transaction back to staged cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledItem {
    /// Pending entry this item originated from
    pub pending_id: PendingId,

    /// Product display name
    pub name: String,

    /// Product barcode
    pub barcode: String,

    /// Price per unit
    pub unit_price: Decimal,

    /// Units purchased
    pub quantity: u32,
}

impl SettledItem {
    /// Annotate a line item with its originating pending entry
    pub fn from_line(pending_id: PendingId, item: &LineItem) -> Self {
        SettledItem {
            pending_id,
            name: item.name.clone(),
            barcode: item.barcode.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

/// Immutable audit entry for one settlement
///
/// Created exactly once per successful settlement, never mutated or
/// deleted. Aggregates the items of every pending entry consumed by the
/// settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique transaction identifier
    pub id: TransactionId,

    /// Identifier of the debited user account
    pub user_id: String,

    /// Normalized RFID UID the settlement was triggered with
    pub rfid_uid: String,

    /// Total amount debited, recomputed from line items
    pub amount: Decimal,

    /// Flattened purchased items with pending-entry provenance
    pub items: Vec<SettledItem>,

    /// Number of purchased items (line count)
    pub item_count: usize,

    /// Server-assigned creation timestamp
    pub created_at: DateTime<Utc>,

    /// Always [`TransactionStatus::Completed`] at creation
    pub status: TransactionStatus,
}

/// Result of the store-level atomic commit
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReceipt {
    /// Account balance after the debit
    pub new_balance: Decimal,
}

/// Result of a successful end-to-end settlement
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    /// Identifier of the created transaction record
    pub transaction_id: TransactionId,

    /// Total amount debited
    pub total: Decimal,

    /// Account balance after the debit
    pub new_balance: Decimal,

    /// Number of pending entries consumed
    pub settled_entries: usize,
}
