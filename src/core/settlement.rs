//! Settlement engine
//!
//! This module provides the `SettlementEngine`, which converts a user's
//! pending entries into a balance debit plus a durable transaction record.
//! A settlement attempt moves through resolving the UID, aggregating the
//! pending batch, and a validate-and-commit step executed as one atomic
//! unit by the store.
//!
//! The engine enforces the protocol invariants:
//! - totals are recomputed from line items, never read from stored
//!   aggregate fields
//! - the balance check and the debit live inside the same atomic scope, so
//!   two concurrent settlements for one user cannot both validate against a
//!   stale balance and jointly overdraw the account
//! - a rejected or failed attempt leaves balance, transaction log, and
//!   pending entries untouched
//!
//! Detected write conflicts re-run the whole aggregate-validate-commit
//! cycle a bounded number of times before surfacing as a server failure.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::identity::IdentityResolver;
use crate::core::ledger::PENDING_BATCH_LIMIT;
use crate::store::{CheckoutStore, PendingStore, SettlementStore};
use crate::types::{
    CheckoutError, PendingEntry, SettledItem, SettlementOutcome, TransactionRecord,
    TransactionStatus, UserAccount,
};

/// Maximum aggregate-validate-commit attempts per settlement
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Orchestrates the pending-to-completed settlement protocol
///
/// Coordinates the identity resolver, the pending ledger, and the store's
/// atomic commit. One engine is shared across requests; all state lives in
/// the store.
pub struct SettlementEngine {
    store: Arc<dyn CheckoutStore>,
    resolver: IdentityResolver,
}

impl SettlementEngine {
    /// Create an engine over the given store
    pub fn new(store: Arc<dyn CheckoutStore>) -> Self {
        SettlementEngine {
            resolver: IdentityResolver::new(Arc::clone(&store)),
            store,
        }
    }

    /// Settle all pending entries for a scanned UID
    ///
    /// Runs the full state sequence for one settlement attempt:
    ///
    /// 1. **Resolving**: map the UID to a user account.
    /// 2. **Aggregating**: fetch the oldest pending batch and recompute the
    ///    total from line-item subtotals.
    /// 3. **Validating + Committing**: one atomic store operation re-reads
    ///    the balance, rejects on insufficient funds, and otherwise writes
    ///    the debit, the transaction record, and the completed markers.
    ///
    /// # Errors
    ///
    /// * [`CheckoutError::MalformedUid`] - UID failed normalization
    /// * [`CheckoutError::UserNotFound`] - no account for the UID
    /// * [`CheckoutError::NoPendingWork`] - nothing staged for the UID
    /// * [`CheckoutError::InsufficientBalance`] - balance below the
    ///   recomputed total; no partial writes
    /// * [`CheckoutError::CommitConflict`] - concurrent writes exhausted
    ///   the retry budget
    /// * [`CheckoutError::Storage`] - infrastructure failure, atomic unit
    ///   left no partial state
    pub async fn settle(&self, raw_uid: &str) -> Result<SettlementOutcome, CheckoutError> {
        // Resolving
        let user = self.resolver.resolve(raw_uid).await?;
        let uid = user.rfid_uid.clone();

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            // Aggregating: only entries pending at this instant take part;
            // anything staged later waits for the next settlement.
            let entries = self.store.fetch_pending(&uid, PENDING_BATCH_LIMIT).await?;
            if entries.is_empty() {
                return Err(CheckoutError::no_pending_work(uid.clone()));
            }

            let total: Decimal = entries.iter().map(PendingEntry::recompute_total).sum();
            let record = build_record(&user, total, &entries);

            // Validating + committing, atomically in the store
            match self.store.commit_settlement(&record, &entries).await {
                Ok(receipt) => {
                    info!(
                        uid = %uid,
                        transaction_id = %record.id,
                        total = %total,
                        new_balance = %receipt.new_balance,
                        entries = entries.len(),
                        "settlement committed"
                    );
                    return Ok(SettlementOutcome {
                        transaction_id: record.id,
                        total,
                        new_balance: receipt.new_balance,
                        settled_entries: entries.len(),
                    });
                }
                Err(CheckoutError::WriteConflict) => {
                    if attempt >= MAX_COMMIT_ATTEMPTS {
                        return Err(CheckoutError::CommitConflict {
                            attempts: MAX_COMMIT_ATTEMPTS,
                        });
                    }
                    warn!(uid = %uid, attempt, "settlement commit conflict, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Build the immutable audit record for one settlement attempt
///
/// Flattens every entry's items in batch order, annotating each with its
/// originating pending entry.
fn build_record(
    user: &UserAccount,
    total: Decimal,
    entries: &[PendingEntry],
) -> TransactionRecord {
    let items: Vec<SettledItem> = entries
        .iter()
        .flat_map(|entry| entry.items.iter().map(|item| SettledItem::from_line(entry.id, item)))
        .collect();

    TransactionRecord {
        id: Uuid::new_v4(),
        user_id: user.id.clone(),
        rfid_uid: user.rfid_uid.clone(),
        amount: total,
        item_count: items.len(),
        items,
        created_at: Utc::now(),
        status: TransactionStatus::Completed,
    }
}
