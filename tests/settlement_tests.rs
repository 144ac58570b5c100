//! End-to-end settlement protocol tests
//!
//! These tests drive the settlement engine and pending ledger against the
//! in-memory backend and check the protocol guarantees:
//!
//! - atomicity: a rejected settlement leaves balance, transaction log, and
//!   pending entries untouched
//! - no double-spend: concurrent settlements never jointly overdraw
//! - idempotent consumption: a completed entry is never settled again
//! - total integrity: amounts are recomputed from line items
//! - ordering: entries settle in staging order

use std::sync::Arc;

use rstest::rstest;
use rust_decimal::Decimal;

use rfid_checkout_server::core::{PendingLedger, SettlementEngine};
use rfid_checkout_server::store::{CheckoutStore, MemoryStore, PendingStore, UserStore};
use rfid_checkout_server::types::{
    CheckoutError, LineItem, PendingEntry, PendingStatus, UserAccount,
};

const UID: &str = "04:A1:B2";

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn item(name: &str, price: &str, quantity: u32) -> LineItem {
    LineItem {
        name: name.to_string(),
        barcode: "0000000000000".to_string(),
        unit_price: price.parse().unwrap(),
        quantity,
    }
}

/// Store, engine, and ledger over one account with the given balance
fn setup(balance: &str) -> (Arc<MemoryStore>, SettlementEngine, PendingLedger) {
    let store = Arc::new(MemoryStore::new());
    store.insert_user(UserAccount::new("u-1", "Alice", UID, dec(balance)));
    let engine = SettlementEngine::new(store.clone() as Arc<dyn CheckoutStore>);
    let ledger = PendingLedger::new(store.clone() as Arc<dyn CheckoutStore>);
    (store, engine, ledger)
}

// One pending entry within balance settles cleanly.
#[tokio::test]
async fn test_single_settlement_happy_path() {
    let (store, engine, ledger) = setup("50.00");
    ledger.stage(UID, vec![item("Groceries", "30.00", 1)]).await.unwrap();

    let outcome = engine.settle(UID).await.unwrap();

    assert_eq!(outcome.total, dec("30.00"));
    assert_eq!(outcome.new_balance, dec("20.00"));

    let user = store.find_user_by_uid(UID).await.unwrap().unwrap();
    assert_eq!(user.balance, dec("20.00"));

    let transactions = store.transactions_for_uid(UID);
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, dec("30.00"));

    let entries = store.list_entries(UID).await.unwrap();
    assert_eq!(entries[0].status, PendingStatus::Completed);
}

// Insufficient balance rejects with no state change.
#[tokio::test]
async fn test_insufficient_balance_is_atomic() {
    let (store, engine, ledger) = setup("10.00");
    ledger.stage(UID, vec![item("A", "15.00", 1)]).await.unwrap();
    ledger.stage(UID, vec![item("B", "10.00", 1)]).await.unwrap();

    let result = engine.settle(UID).await;
    match result.unwrap_err() {
        CheckoutError::InsufficientBalance {
            available,
            required,
            ..
        } => {
            assert_eq!(available, dec("10.00"));
            assert_eq!(required, dec("25.00"));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }

    let user = store.find_user_by_uid(UID).await.unwrap().unwrap();
    assert_eq!(user.balance, dec("10.00"));
    assert!(store.transactions_for_uid(UID).is_empty());
    for entry in store.list_entries(UID).await.unwrap() {
        assert_eq!(entry.status, PendingStatus::Pending);
        assert!(entry.transaction_id.is_none());
        assert!(entry.processed_at.is_none());
    }
}

// A UID with zero pending entries is rejected with no writes.
#[tokio::test]
async fn test_no_pending_work() {
    let (store, engine, _ledger) = setup("50.00");

    let result = engine.settle(UID).await;
    assert!(matches!(
        result.unwrap_err(),
        CheckoutError::NoPendingWork { .. }
    ));
    assert!(store.transactions_for_uid(UID).is_empty());
}

// An unknown UID is rejected before any pending lookup.
#[tokio::test]
async fn test_unknown_uid() {
    let store = Arc::new(MemoryStore::new());
    store
        .stage_pending(PendingEntry::new("FF:FF", vec![item("A", "1.00", 1)]))
        .await
        .unwrap();
    let engine = SettlementEngine::new(store.clone() as Arc<dyn CheckoutStore>);

    let result = engine.settle("FF:FF").await;
    assert!(matches!(
        result.unwrap_err(),
        CheckoutError::UserNotFound { .. }
    ));

    // The pending entry was never touched.
    let entries = store.list_entries("FF:FF").await.unwrap();
    assert_eq!(entries[0].status, PendingStatus::Pending);
}

// Two pending entries aggregate into one transaction.
#[tokio::test]
async fn test_multiple_entries_one_transaction() {
    let (store, engine, ledger) = setup("50.00");
    ledger.stage(UID, vec![item("A", "12.50", 1)]).await.unwrap();
    ledger.stage(UID, vec![item("B", "7.50", 1)]).await.unwrap();

    let outcome = engine.settle(UID).await.unwrap();

    assert_eq!(outcome.total, dec("20.00"));
    assert_eq!(outcome.settled_entries, 2);

    let transactions = store.transactions_for_uid(UID);
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, dec("20.00"));
    assert_eq!(transactions[0].item_count, 2);

    let entries = store.list_entries(UID).await.unwrap();
    assert!(entries
        .iter()
        .all(|e| e.transaction_id == Some(outcome.transaction_id)));
}

// Concurrent settlements against one balance never jointly overdraw.
#[tokio::test]
async fn test_concurrent_settlements_cannot_double_spend() {
    let (store, _engine, _ledger) = setup("10.00");

    // Ten tasks each stage a 10.00 cart and immediately trigger
    // settlement, mimicking parallel hardware triggers for the same tag.
    // The balance covers exactly one cart.
    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let ledger = PendingLedger::new(store.clone() as Arc<dyn CheckoutStore>);
            ledger.stage(UID, vec![item("A", "10.00", 1)]).await.unwrap();
            SettlementEngine::new(store as Arc<dyn CheckoutStore>)
                .settle(UID)
                .await
        }));
    }

    let mut total_debited = Decimal::ZERO;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => total_debited += outcome.total,
            Err(CheckoutError::InsufficientBalance { .. })
            | Err(CheckoutError::NoPendingWork { .. })
            | Err(CheckoutError::CommitConflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    // Cumulative debits stay within the initial balance.
    assert!(total_debited <= dec("10.00"));

    let user = store.find_user_by_uid(UID).await.unwrap().unwrap();
    assert_eq!(user.balance, dec("10.00") - total_debited);
    assert!(user.balance >= Decimal::ZERO);

    // Conservation: every debit is accounted for by completed entries.
    let completed_total: Decimal = store
        .list_entries(UID)
        .await
        .unwrap()
        .iter()
        .filter(|e| e.status == PendingStatus::Completed)
        .map(|e| e.recompute_total())
        .sum();
    assert_eq!(completed_total, total_debited);
}

// Re-running settlement never re-includes completed entries.
#[tokio::test]
async fn test_settlement_is_idempotent_over_completed_entries() {
    let (store, engine, ledger) = setup("100.00");
    ledger.stage(UID, vec![item("A", "30.00", 1)]).await.unwrap();

    engine.settle(UID).await.unwrap();

    // Stage a second cart; the next settlement covers only the new entry.
    ledger.stage(UID, vec![item("B", "5.00", 1)]).await.unwrap();
    let outcome = engine.settle(UID).await.unwrap();

    assert_eq!(outcome.total, dec("5.00"));
    let user = store.find_user_by_uid(UID).await.unwrap().unwrap();
    assert_eq!(user.balance, dec("65.00"));
    assert_eq!(store.transactions_for_uid(UID).len(), 2);
}

// The recorded amount always comes from line items.
#[rstest]
#[case::inflated("99.00")]
#[case::deflated("0.01")]
#[case::zeroed("0.00")]
#[tokio::test]
async fn test_tampered_totals_are_ignored(#[case] tampered: &str) {
    let (store, engine, _ledger) = setup("50.00");

    let mut entry = PendingEntry::new(UID, vec![item("A", "10.00", 2)]);
    entry.total = dec(tampered);
    store.stage_pending(entry).await.unwrap();

    let outcome = engine.settle(UID).await.unwrap();
    assert_eq!(outcome.total, dec("20.00"));

    let transactions = store.transactions_for_uid(UID);
    assert_eq!(transactions[0].amount, dec("20.00"));
}

// Entries settle and are stamped in ascending creation order.
#[tokio::test]
async fn test_settlement_order_follows_staging_order() {
    let (store, engine, ledger) = setup("100.00");

    let mut staged_ids = Vec::new();
    for price in ["1.00", "2.00", "3.00", "4.00"] {
        let entry = ledger.stage(UID, vec![item("A", price, 1)]).await.unwrap();
        staged_ids.push(entry.id);
    }

    let outcome = engine.settle(UID).await.unwrap();

    let record = store.get_transaction(outcome.transaction_id).unwrap();
    let settled_order: Vec<_> = record.items.iter().map(|i| i.pending_id).collect();
    assert_eq!(settled_order, staged_ids);
}

// The invariant from the data model: completed debits account for the
// whole balance drop.
#[tokio::test]
async fn test_debit_sum_matches_balance_delta() {
    let (store, engine, ledger) = setup("100.00");

    for price in ["12.50", "7.50", "30.00"] {
        ledger.stage(UID, vec![item("A", price, 1)]).await.unwrap();
        engine.settle(UID).await.unwrap();
    }

    let debited: Decimal = store
        .transactions_for_uid(UID)
        .iter()
        .map(|t| t.amount)
        .sum();
    let user = store.find_user_by_uid(UID).await.unwrap().unwrap();

    assert_eq!(debited, dec("100.00") - user.balance);
}

// A zero-total cart is still a valid settlement: it records a transaction
// without moving the balance.
#[tokio::test]
async fn test_zero_total_cart_settles_without_debit() {
    let (store, engine, ledger) = setup("10.00");
    ledger.stage(UID, vec![item("Freebie", "0.00", 1)]).await.unwrap();

    let outcome = engine.settle(UID).await.unwrap();

    assert_eq!(outcome.total, Decimal::ZERO);
    let user = store.find_user_by_uid(UID).await.unwrap().unwrap();
    assert_eq!(user.balance, dec("10.00"));
    assert_eq!(store.transactions_for_uid(UID).len(), 1);
}
