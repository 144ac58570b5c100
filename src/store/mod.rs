//! Storage traits and backends
//!
//! This module defines the trait abstractions that allow the in-memory and
//! MongoDB backends to be used interchangeably, mirroring the persisted
//! collections: `users`, `pending_transactions`, `transactions`, and the
//! singleton `current_scan_state` slot.

use async_trait::async_trait;

use crate::types::{
    CheckoutError, PendingEntry, ScanState, SettlementReceipt, TransactionRecord, UserAccount,
};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Trait for reading user accounts
///
/// Accounts are administered externally; the server only looks them up by
/// their normalized RFID UID.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find the unique account matching a normalized UID
    async fn find_user_by_uid(
        &self,
        rfid_uid: &str,
    ) -> Result<Option<UserAccount>, CheckoutError>;
}

/// Trait for the append-only pending ledger
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Persist a freshly staged entry
    async fn stage_pending(&self, entry: PendingEntry) -> Result<PendingEntry, CheckoutError>;

    /// All entries with status pending for a UID, oldest first, bounded
    ///
    /// Entries staged after this call returns are not part of the batch; a
    /// settlement only sees what was pending at the instant of aggregation.
    async fn fetch_pending(
        &self,
        rfid_uid: &str,
        limit: usize,
    ) -> Result<Vec<PendingEntry>, CheckoutError>;

    /// Delete every entry for a UID regardless of status, returning the count
    async fn clear_pending(&self, rfid_uid: &str) -> Result<u64, CheckoutError>;

    /// Debug listing of every entry for a UID, oldest first
    async fn list_entries(&self, rfid_uid: &str) -> Result<Vec<PendingEntry>, CheckoutError>;
}

/// Trait for the settlement atomic unit
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Atomically debit, record, and consume
    ///
    /// Inside one atomic scope: re-read the account balance (never a value
    /// cached by the caller), reject with
    /// [`CheckoutError::InsufficientBalance`] if it does not cover
    /// `record.amount`, otherwise write the debited balance, insert the
    /// transaction record, and mark every entry completed with the
    /// transaction id. All writes apply or none do.
    ///
    /// A detected concurrent write to the account surfaces as
    /// [`CheckoutError::WriteConflict`] so the engine can retry the whole
    /// read-validate-write cycle.
    async fn commit_settlement(
        &self,
        record: &TransactionRecord,
        entries: &[PendingEntry],
    ) -> Result<SettlementReceipt, CheckoutError>;
}

/// Trait for the single last-scan slot
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Overwrite the slot unconditionally
    async fn record_scan(&self, state: ScanState) -> Result<(), CheckoutError>;

    /// Read the current slot value
    async fn latest_scan(&self) -> Result<Option<ScanState>, CheckoutError>;
}

/// Full storage surface required by the checkout server
///
/// Blanket-implemented for anything providing all four component traits, so
/// handlers and the engine hold a single `Arc<dyn CheckoutStore>`.
pub trait CheckoutStore: UserStore + PendingStore + SettlementStore + ScanStore {}

impl<T: UserStore + PendingStore + SettlementStore + ScanStore> CheckoutStore for T {}
