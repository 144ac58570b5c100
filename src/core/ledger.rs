//! Pending ledger operations
//!
//! This module provides the `PendingLedger`, the staging side of the
//! settlement protocol. Carts are validated and appended here with status
//! pending; the settlement engine later consumes them. Totals are always
//! recomputed from line items on the server, so a tampered or stale
//! caller-supplied total never reaches an account balance.

use std::sync::Arc;

use tracing::info;

use crate::core::identity::normalize_uid;
use crate::store::{CheckoutStore, PendingStore};
use crate::types::{CheckoutError, LineItem, PendingEntry};

/// Upper bound on entries consumed by one settlement
///
/// Keeps a single transaction payload bounded; anything beyond the oldest
/// batch settles on the next scan.
pub const PENDING_BATCH_LIMIT: usize = 64;

/// Staging store of cart checkouts awaiting payment
pub struct PendingLedger {
    store: Arc<dyn CheckoutStore>,
}

impl PendingLedger {
    /// Create a ledger over the given store
    pub fn new(store: Arc<dyn CheckoutStore>) -> Self {
        PendingLedger { store }
    }

    /// Stage a cart as a new pending entry
    ///
    /// Validates the UID and line items, recomputes the total (any
    /// caller-supplied total has been dropped before this point), and
    /// persists the entry with status pending and a server-assigned
    /// timestamp.
    ///
    /// # Errors
    ///
    /// * [`CheckoutError::MalformedUid`] if the UID cannot be normalized
    /// * [`CheckoutError::EmptyCart`] if `items` is empty
    /// * [`CheckoutError::InvalidLineItem`] for zero quantities or negative
    ///   prices
    pub async fn stage(
        &self,
        raw_uid: &str,
        items: Vec<LineItem>,
    ) -> Result<PendingEntry, CheckoutError> {
        let uid = normalize_uid(raw_uid)?;

        if items.is_empty() {
            return Err(CheckoutError::empty_cart(uid));
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(CheckoutError::invalid_line_item(
                    &item.name,
                    "quantity must be at least 1",
                ));
            }
            if item.unit_price.is_sign_negative() {
                return Err(CheckoutError::invalid_line_item(
                    &item.name,
                    "unit price must not be negative",
                ));
            }
        }

        let entry = PendingEntry::new(uid, items);
        let entry = self.store.stage_pending(entry).await?;

        info!(
            uid = %entry.rfid_uid,
            pending_id = %entry.id,
            total = %entry.total,
            "staged pending checkout"
        );

        Ok(entry)
    }

    /// Oldest pending entries for a UID, bounded to the settlement batch size
    pub async fn pending_for(&self, raw_uid: &str) -> Result<Vec<PendingEntry>, CheckoutError> {
        let uid = normalize_uid(raw_uid)?;
        self.store.fetch_pending(&uid, PENDING_BATCH_LIMIT).await
    }

    /// Remove every entry for a UID regardless of status
    ///
    /// Administrative reset, not part of the settlement path. Returns the
    /// number of removed entries.
    pub async fn clear(&self, raw_uid: &str) -> Result<u64, CheckoutError> {
        let uid = normalize_uid(raw_uid)?;
        let removed = self.store.clear_pending(&uid).await?;
        info!(uid = %uid, removed, "cleared pending entries");
        Ok(removed)
    }

    /// Debug listing of every entry for a UID, any status
    pub async fn entries_for(&self, raw_uid: &str) -> Result<Vec<PendingEntry>, CheckoutError> {
        let uid = normalize_uid(raw_uid)?;
        self.store.list_entries(&uid).await
    }
}
