//! In-memory storage backend
//!
//! This module provides the `MemoryStore`, a `DashMap`-based implementation
//! of the storage traits used by tests and by the `--backend memory`
//! development mode.
//!
//! # Thread Safety
//!
//! All maps use DashMap for fine-grained locking per entry. The settlement
//! commit holds the debited account's map entry for the whole
//! validate-and-write sequence, so two settlements for the same user are
//! serialized and cannot both pass validation against a stale balance.
//! Settlements for different users proceed in parallel.

use std::path::Path;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use async_trait::async_trait;

use crate::core::identity::normalize_uid;
use crate::store::{PendingStore, ScanStore, SettlementStore, UserStore};
use crate::types::{
    CheckoutError, PendingEntry, PendingId, PendingStatus, ScanState, SettlementReceipt,
    TransactionId, TransactionRecord, UserAccount,
};

/// One user record in a `--seed` file
#[derive(Debug, Deserialize)]
struct SeedUser {
    name: String,
    rfid_uid: String,
    balance: Decimal,
}

/// In-memory implementation of the full storage surface
///
/// Holds users keyed by normalized UID, pending entries and transactions
/// keyed by id, and the single scan slot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Accounts keyed by normalized RFID UID
    accounts: DashMap<String, UserAccount>,

    /// Pending ledger keyed by entry id
    pending: DashMap<PendingId, PendingEntry>,

    /// Transaction log keyed by transaction id
    transactions: DashMap<TransactionId, TransactionRecord>,

    /// Single write-latest-wins scan slot
    scan_slot: Mutex<Option<ScanState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user account
    ///
    /// The account's UID must already be normalized; lookups are exact.
    pub fn insert_user(&self, account: UserAccount) {
        self.accounts.insert(account.rfid_uid.clone(), account);
    }

    /// Load user accounts from a JSON seed file
    ///
    /// The file holds an array of `{ name, rfid_uid, balance }` records.
    /// UIDs are normalized on the way in and each account gets a fresh id.
    /// Returns the number of accounts loaded.
    pub fn load_seed(&self, path: &Path) -> Result<usize, CheckoutError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CheckoutError::storage(format!("failed to read seed file: {e}")))?;
        let seeds: Vec<SeedUser> = serde_json::from_str(&raw)
            .map_err(|e| CheckoutError::storage(format!("invalid seed file: {e}")))?;

        let count = seeds.len();
        for seed in seeds {
            let uid = normalize_uid(&seed.rfid_uid)?;
            self.insert_user(UserAccount::new(
                Uuid::new_v4().to_string(),
                seed.name,
                uid,
                seed.balance,
            ));
        }
        Ok(count)
    }

    /// Look up a transaction record by id
    ///
    /// Audit/diagnostic access; the request path never reads transactions.
    pub fn get_transaction(&self, id: TransactionId) -> Option<TransactionRecord> {
        self.transactions.get(&id).map(|t| t.clone())
    }

    /// All transactions recorded for a UID, oldest first
    pub fn transactions_for_uid(&self, rfid_uid: &str) -> Vec<TransactionRecord> {
        let mut records: Vec<TransactionRecord> = self
            .transactions
            .iter()
            .filter(|t| t.rfid_uid == rfid_uid)
            .map(|t| t.clone())
            .collect();
        records.sort_by_key(|t| t.created_at);
        records
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_uid(
        &self,
        rfid_uid: &str,
    ) -> Result<Option<UserAccount>, CheckoutError> {
        Ok(self.accounts.get(rfid_uid).map(|a| a.clone()))
    }
}

#[async_trait]
impl PendingStore for MemoryStore {
    async fn stage_pending(&self, entry: PendingEntry) -> Result<PendingEntry, CheckoutError> {
        self.pending.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn fetch_pending(
        &self,
        rfid_uid: &str,
        limit: usize,
    ) -> Result<Vec<PendingEntry>, CheckoutError> {
        let mut entries: Vec<PendingEntry> = self
            .pending
            .iter()
            .filter(|e| e.rfid_uid == rfid_uid && e.status == PendingStatus::Pending)
            .map(|e| e.clone())
            .collect();
        entries.sort_by_key(|e| (e.created_at, e.id));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn clear_pending(&self, rfid_uid: &str) -> Result<u64, CheckoutError> {
        let mut removed = 0u64;
        self.pending.retain(|_, e| {
            if e.rfid_uid == rfid_uid {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn list_entries(&self, rfid_uid: &str) -> Result<Vec<PendingEntry>, CheckoutError> {
        let mut entries: Vec<PendingEntry> = self
            .pending
            .iter()
            .filter(|e| e.rfid_uid == rfid_uid)
            .map(|e| e.clone())
            .collect();
        entries.sort_by_key(|e| (e.created_at, e.id));
        Ok(entries)
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn commit_settlement(
        &self,
        record: &TransactionRecord,
        entries: &[PendingEntry],
    ) -> Result<SettlementReceipt, CheckoutError> {
        // The entry guard is held until every write below lands, which
        // serializes concurrent settlements for the same account.
        let mut account = self
            .accounts
            .get_mut(&record.rfid_uid)
            .ok_or_else(|| CheckoutError::user_not_found(&record.rfid_uid))?;

        // Validate against the live balance, not anything the caller read
        // earlier. Reject before any mutation so a failed attempt leaves
        // every record untouched.
        if account.balance < record.amount {
            return Err(CheckoutError::insufficient_balance(
                &record.rfid_uid,
                account.balance,
                record.amount,
            ));
        }

        // Same-user commits are serialized by the account guard, so the
        // status observed here cannot flip before the writes below. An
        // entry consumed by a competing settlement aborts the whole unit.
        for entry in entries {
            let still_pending = self
                .pending
                .get(&entry.id)
                .map(|e| e.status == PendingStatus::Pending)
                .unwrap_or(false);
            if !still_pending {
                return Err(CheckoutError::WriteConflict);
            }
        }

        let new_balance = account
            .balance
            .checked_sub(record.amount)
            .ok_or_else(|| CheckoutError::storage("balance underflow in settlement debit"))?;
        account.balance = new_balance;

        self.transactions.insert(record.id, record.clone());

        for entry in entries {
            if let Some(mut pending) = self.pending.get_mut(&entry.id) {
                pending.status = PendingStatus::Completed;
                pending.processed_at = Some(record.created_at);
                pending.transaction_id = Some(record.id);
            }
        }

        Ok(SettlementReceipt { new_balance })
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn record_scan(&self, state: ScanState) -> Result<(), CheckoutError> {
        *self.scan_slot.lock().await = Some(state);
        Ok(())
    }

    async fn latest_scan(&self) -> Result<Option<ScanState>, CheckoutError> {
        Ok(self.scan_slot.lock().await.clone())
    }
}
