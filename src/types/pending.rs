//! Pending-entry types for the RFID checkout server
//!
//! This module defines the staged cart record awaiting payment and its line
//! items. A pending entry is created by checkout staging, transitions to
//! completed exactly once inside the settlement commit, and is otherwise
//! only removed by the administrative clear operation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pending-entry identifier
pub type PendingId = Uuid;

/// Lifecycle status of a pending entry
///
/// The only transition is `Pending -> Completed`, performed inside the
/// settlement engine's atomic commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    /// Staged and awaiting payment
    Pending,

    /// Consumed by a settlement
    ///
    /// A completed entry carries the processed timestamp and a reference to
    /// the settling transaction. It is never returned by a pending fetch.
    Completed,
}

/// One cart line as staged by the storefront client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product display name
    pub name: String,

    /// Product barcode
    pub barcode: String,

    /// Price per unit
    pub unit_price: Decimal,

    /// Units purchased (at least 1)
    pub quantity: u32,
}

impl LineItem {
    /// Line subtotal: unit price times quantity
    ///
    /// Settlement totals are always recomputed from these subtotals; stored
    /// aggregate fields are never trusted.
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// One staged cart awaiting payment
///
/// The `total` field is a server-recomputed cache written at staging time.
/// The settlement engine ignores it and re-derives the amount from the line
/// items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// Unique entry identifier
    pub id: PendingId,

    /// Normalized RFID UID of the owning account
    pub rfid_uid: String,

    /// Ordered line items (non-empty)
    pub items: Vec<LineItem>,

    /// Cached total as recomputed at staging time
    pub total: Decimal,

    /// Current lifecycle status
    pub status: PendingStatus,

    /// Server-assigned staging timestamp
    ///
    /// Settlement consumes entries in ascending order of this field.
    pub created_at: DateTime<Utc>,

    /// When the entry was consumed, set on completion
    pub processed_at: Option<DateTime<Utc>>,

    /// Identifier of the settling transaction, set on completion
    pub transaction_id: Option<Uuid>,
}

impl PendingEntry {
    /// Create a new pending entry with a fresh id and staging timestamp
    ///
    /// The total is recomputed from the items; any caller-supplied total has
    /// already been discarded by this point.
    pub fn new(rfid_uid: impl Into<String>, items: Vec<LineItem>) -> Self {
        let total = items.iter().map(LineItem::subtotal).sum();
        PendingEntry {
            id: Uuid::new_v4(),
            rfid_uid: rfid_uid.into(),
            items,
            total,
            status: PendingStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            transaction_id: None,
        }
    }

    /// Sum of the line subtotals
    pub fn recompute_total(&self) -> Decimal {
        self.items.iter().map(LineItem::subtotal).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn item(price: &str, quantity: u32) -> LineItem {
        LineItem {
            name: "item".to_string(),
            barcode: "0000".to_string(),
            unit_price: price.parse().unwrap(),
            quantity,
        }
    }

    #[rstest]
    #[case::single_unit("2.50", 1, "2.50")]
    #[case::multiple_units("2.50", 3, "7.50")]
    #[case::zero_price("0.00", 5, "0.00")]
    fn test_line_subtotal(#[case] price: &str, #[case] quantity: u32, #[case] expected: &str) {
        let expected: Decimal = expected.parse().unwrap();
        assert_eq!(item(price, quantity).subtotal(), expected);
    }

    #[test]
    fn test_new_entry_recomputes_total() {
        let entry = PendingEntry::new("04:A1", vec![item("12.50", 1), item("2.50", 3)]);

        assert_eq!(entry.total, "20.00".parse::<Decimal>().unwrap());
        assert_eq!(entry.total, entry.recompute_total());
        assert_eq!(entry.status, PendingStatus::Pending);
        assert!(entry.processed_at.is_none());
        assert!(entry.transaction_id.is_none());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PendingStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&PendingStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
