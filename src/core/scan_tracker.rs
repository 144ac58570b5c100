//! Last-scan tracker
//!
//! Explicitly passed cache object over the store's single scan slot. The
//! storefront client polls it to learn about the most recent hardware scan;
//! the settlement engine never reads it, so it can be swapped or mocked
//! independently of financial correctness.

use std::sync::Arc;

use crate::core::identity::normalize_uid;
use crate::store::{CheckoutStore, ScanStore};
use crate::types::{CheckoutError, ScanState, ScanStatus};

/// Write-latest-wins tracker for the most recent RFID scan
pub struct ScanTracker {
    store: Arc<dyn CheckoutStore>,
}

impl ScanTracker {
    /// Create a tracker over the given store
    pub fn new(store: Arc<dyn CheckoutStore>) -> Self {
        ScanTracker { store }
    }

    /// Record a hardware scan event, overwriting the slot
    pub async fn record_scan(&self, raw_uid: &str) -> Result<ScanState, CheckoutError> {
        let uid = normalize_uid(raw_uid)?;
        let state = ScanState::now(uid, ScanStatus::Scanned);
        self.store.record_scan(state.clone()).await?;
        Ok(state)
    }

    /// Mark the slot completed after a successful settlement
    pub async fn mark_completed(&self, raw_uid: &str) -> Result<ScanState, CheckoutError> {
        let uid = normalize_uid(raw_uid)?;
        let state = ScanState::now(uid, ScanStatus::Completed);
        self.store.record_scan(state.clone()).await?;
        Ok(state)
    }

    /// Current slot value, if any scan has happened yet
    pub async fn latest(&self) -> Result<Option<ScanState>, CheckoutError> {
        self.store.latest_scan().await
    }
}
