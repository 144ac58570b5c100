//! MongoDB implementations of the storage traits.
//!
//! Collections: `users`, `pending_transactions`, `transactions`, and the
//! singleton `current_scan_state` document. Monetary amounts are persisted
//! as integer minor units (i64 cents) and converted at this boundary; the
//! settlement commit runs inside a session transaction so the debit, the
//! transaction insert, and the pending-status transitions apply together or
//! not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::store::{PendingStore, ScanStore, SettlementStore, UserStore};
use crate::types::{
    CheckoutError, PendingEntry, PendingStatus, ScanState, ScanStatus, SettledItem,
    SettlementReceipt, TransactionRecord, TransactionStatus, UserAccount,
};

/// Collection names.
const USERS_COLLECTION: &str = "users";
const PENDING_COLLECTION: &str = "pending_transactions";
const TRANSACTIONS_COLLECTION: &str = "transactions";
const SCAN_STATE_COLLECTION: &str = "current_scan_state";

/// Fixed `_id` of the singleton scan-state document.
const SCAN_STATE_ID: &str = "current";

/// MongoDB implementation of the full storage surface.
pub struct MongoStore {
    client: Client,
    users: Collection<Document>,
    pending: Collection<Document>,
    transactions: Collection<Document>,
    scan_state: Collection<Document>,
}

impl MongoStore {
    /// Connect to the database and initialize indexes.
    pub async fn connect(uri: &str, database_name: &str) -> Result<Self, CheckoutError> {
        let client = Client::with_uri_str(uri).await?;
        let database: Database = client.database(database_name);

        let store = Self {
            users: database.collection(USERS_COLLECTION),
            pending: database.collection(PENDING_COLLECTION),
            transactions: database.collection(TRANSACTIONS_COLLECTION),
            scan_state: database.collection(SCAN_STATE_COLLECTION),
            client,
        };
        store.init().await?;

        Ok(store)
    }

    /// Initialize indexes for lookup and aggregation paths.
    async fn init(&self) -> Result<(), CheckoutError> {
        // One account per tag
        let uid_index = IndexModel::builder()
            .keys(doc! { "rfid_uid": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users.create_index(uid_index).await?;

        // Pending aggregation: by uid and status, in staging order
        let pending_index = IndexModel::builder()
            .keys(doc! { "rfid_uid": 1, "status": 1, "created_at": 1 })
            .build();
        self.pending.create_index(pending_index).await?;

        Ok(())
    }

    /// Run the settlement writes inside an open session transaction.
    async fn commit_in_session(
        &self,
        session: &mut ClientSession,
        record: &TransactionRecord,
        entries: &[PendingEntry],
    ) -> Result<SettlementReceipt, CheckoutError> {
        let user_doc = self
            .users
            .find_one(doc! { "rfid_uid": &record.rfid_uid })
            .session(&mut *session)
            .await?
            .ok_or_else(|| CheckoutError::user_not_found(&record.rfid_uid))?;

        let balance_minor = get_i64(&user_doc, "balance")?;
        let amount_minor = to_minor_units(record.amount)?;

        if balance_minor < amount_minor {
            return Err(CheckoutError::insufficient_balance(
                &record.rfid_uid,
                from_minor_units(balance_minor),
                record.amount,
            ));
        }

        let new_balance_minor = balance_minor - amount_minor;

        // Conditional write: the filter repeats the balance read above, so
        // a competing debit that slipped between read and write matches
        // nothing and the attempt is retried instead of overdrawing.
        let debit = self
            .users
            .update_one(
                doc! { "rfid_uid": &record.rfid_uid, "balance": balance_minor },
                doc! { "$set": { "balance": new_balance_minor } },
            )
            .session(&mut *session)
            .await?;
        if debit.modified_count != 1 {
            return Err(CheckoutError::WriteConflict);
        }

        self.transactions
            .insert_one(transaction_to_doc(record)?)
            .session(&mut *session)
            .await?;

        let processed_at = to_bson_date(record.created_at);
        for entry in entries {
            let consumed = self
                .pending
                .update_one(
                    doc! { "_id": entry.id.to_string(), "status": status_str(PendingStatus::Pending) },
                    doc! { "$set": {
                        "status": status_str(PendingStatus::Completed),
                        "processed_at": processed_at,
                        "transaction_id": record.id.to_string(),
                    } },
                )
                .session(&mut *session)
                .await?;
            // An entry already consumed by a competing settlement aborts
            // the whole unit.
            if consumed.modified_count != 1 {
                return Err(CheckoutError::WriteConflict);
            }
        }

        Ok(SettlementReceipt {
            new_balance: from_minor_units(new_balance_minor),
        })
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn find_user_by_uid(
        &self,
        rfid_uid: &str,
    ) -> Result<Option<UserAccount>, CheckoutError> {
        let result = self.users.find_one(doc! { "rfid_uid": rfid_uid }).await?;
        result.map(|doc| doc_to_user(&doc)).transpose()
    }
}

#[async_trait]
impl PendingStore for MongoStore {
    async fn stage_pending(&self, entry: PendingEntry) -> Result<PendingEntry, CheckoutError> {
        self.pending.insert_one(pending_to_doc(&entry)?).await?;
        Ok(entry)
    }

    async fn fetch_pending(
        &self,
        rfid_uid: &str,
        limit: usize,
    ) -> Result<Vec<PendingEntry>, CheckoutError> {
        let filter = doc! {
            "rfid_uid": rfid_uid,
            "status": status_str(PendingStatus::Pending),
        };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .limit(limit as i64)
            .build();

        let mut cursor = self.pending.find(filter).with_options(options).await?;

        let mut entries = Vec::new();
        while cursor.advance().await? {
            entries.push(doc_to_pending(&cursor.deserialize_current()?)?);
        }

        Ok(entries)
    }

    async fn clear_pending(&self, rfid_uid: &str) -> Result<u64, CheckoutError> {
        let result = self.pending.delete_many(doc! { "rfid_uid": rfid_uid }).await?;
        Ok(result.deleted_count)
    }

    async fn list_entries(&self, rfid_uid: &str) -> Result<Vec<PendingEntry>, CheckoutError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();

        let mut cursor = self
            .pending
            .find(doc! { "rfid_uid": rfid_uid })
            .with_options(options)
            .await?;

        let mut entries = Vec::new();
        while cursor.advance().await? {
            entries.push(doc_to_pending(&cursor.deserialize_current()?)?);
        }

        Ok(entries)
    }
}

#[async_trait]
impl SettlementStore for MongoStore {
    async fn commit_settlement(
        &self,
        record: &TransactionRecord,
        entries: &[PendingEntry],
    ) -> Result<SettlementReceipt, CheckoutError> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        match self.commit_in_session(&mut session, record, entries).await {
            Ok(receipt) => {
                session.commit_transaction().await?;
                Ok(receipt)
            }
            Err(err) => {
                // Abort failures are secondary to the original error.
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }
}

#[async_trait]
impl ScanStore for MongoStore {
    async fn record_scan(&self, state: ScanState) -> Result<(), CheckoutError> {
        let update = doc! {
            "$set": {
                "rfid_uid": &state.rfid_uid,
                "status": scan_status_str(state.status),
                "seen_at": to_bson_date(state.seen_at),
            }
        };
        let options = UpdateOptions::builder().upsert(true).build();

        self.scan_state
            .update_one(doc! { "_id": SCAN_STATE_ID }, update)
            .with_options(options)
            .await?;

        Ok(())
    }

    async fn latest_scan(&self) -> Result<Option<ScanState>, CheckoutError> {
        let result = self.scan_state.find_one(doc! { "_id": SCAN_STATE_ID }).await?;
        result.map(|doc| doc_to_scan(&doc)).transpose()
    }
}

// ---------------------------------------------------------------------------
// Document mapping

fn missing_field(name: &str) -> CheckoutError {
    CheckoutError::storage(format!("document missing field '{name}'"))
}

fn get_str(doc: &Document, name: &str) -> Result<String, CheckoutError> {
    doc.get_str(name)
        .map(str::to_string)
        .map_err(|_| missing_field(name))
}

fn get_i64(doc: &Document, name: &str) -> Result<i64, CheckoutError> {
    doc.get_i64(name).map_err(|_| missing_field(name))
}

/// Convert a decimal amount to integer minor units (cents).
///
/// Sub-cent amounts are refused rather than silently rounded.
fn to_minor_units(amount: Decimal) -> Result<i64, CheckoutError> {
    let scaled = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| CheckoutError::storage("amount overflow in minor-unit conversion"))?;
    if !scaled.fract().is_zero() {
        return Err(CheckoutError::storage(format!(
            "amount {amount} has sub-cent precision"
        )));
    }
    scaled
        .to_i64()
        .ok_or_else(|| CheckoutError::storage("amount overflow in minor-unit conversion"))
}

fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

fn to_bson_date(dt: DateTime<Utc>) -> mongodb::bson::DateTime {
    mongodb::bson::DateTime::from_millis(dt.timestamp_millis())
}

fn from_bson_date(dt: mongodb::bson::DateTime) -> Result<DateTime<Utc>, CheckoutError> {
    DateTime::from_timestamp_millis(dt.timestamp_millis())
        .ok_or_else(|| CheckoutError::storage("timestamp out of range"))
}

fn status_str(status: PendingStatus) -> &'static str {
    match status {
        PendingStatus::Pending => "pending",
        PendingStatus::Completed => "completed",
    }
}

fn parse_status(raw: &str) -> Result<PendingStatus, CheckoutError> {
    match raw {
        "pending" => Ok(PendingStatus::Pending),
        "completed" => Ok(PendingStatus::Completed),
        other => Err(CheckoutError::storage(format!(
            "unknown pending status '{other}'"
        ))),
    }
}

fn scan_status_str(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Scanned => "scanned",
        ScanStatus::Completed => "completed",
    }
}

fn parse_scan_status(raw: &str) -> Result<ScanStatus, CheckoutError> {
    match raw {
        "scanned" => Ok(ScanStatus::Scanned),
        "completed" => Ok(ScanStatus::Completed),
        other => Err(CheckoutError::storage(format!(
            "unknown scan status '{other}'"
        ))),
    }
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, CheckoutError> {
    Uuid::parse_str(raw).map_err(|_| CheckoutError::storage(format!("invalid uuid in '{field}'")))
}

/// Accounts are administered externally, so `_id` may be any BSON type.
fn doc_to_user(doc: &Document) -> Result<UserAccount, CheckoutError> {
    let id = match doc.get("_id") {
        Some(Bson::String(s)) => s.clone(),
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => other.to_string(),
        None => return Err(missing_field("_id")),
    };

    Ok(UserAccount {
        id,
        name: get_str(doc, "name")?,
        rfid_uid: get_str(doc, "rfid_uid")?,
        balance: from_minor_units(get_i64(doc, "balance")?),
    })
}

fn pending_to_doc(entry: &PendingEntry) -> Result<Document, CheckoutError> {
    let items: Vec<Bson> = entry
        .items
        .iter()
        .map(|item| {
            Ok(Bson::Document(doc! {
                "name": &item.name,
                "barcode": &item.barcode,
                "unit_price": to_minor_units(item.unit_price)?,
                "quantity": item.quantity as i32,
            }))
        })
        .collect::<Result<_, CheckoutError>>()?;

    Ok(doc! {
        "_id": entry.id.to_string(),
        "rfid_uid": &entry.rfid_uid,
        "items": items,
        "total": to_minor_units(entry.total)?,
        "status": status_str(entry.status),
        "created_at": to_bson_date(entry.created_at),
    })
}

fn doc_to_pending(doc: &Document) -> Result<PendingEntry, CheckoutError> {
    let items = doc
        .get_array("items")
        .map_err(|_| missing_field("items"))?
        .iter()
        .map(|bson| {
            let item = bson
                .as_document()
                .ok_or_else(|| CheckoutError::storage("pending item is not a document"))?;
            Ok(crate::types::LineItem {
                name: get_str(item, "name")?,
                barcode: get_str(item, "barcode")?,
                unit_price: from_minor_units(
                    item.get_i64("unit_price")
                        .or_else(|_| item.get_i32("unit_price").map(i64::from))
                        .map_err(|_| missing_field("unit_price"))?,
                ),
                quantity: item.get_i32("quantity").map_err(|_| missing_field("quantity"))? as u32,
            })
        })
        .collect::<Result<Vec<_>, CheckoutError>>()?;

    let processed_at = match doc.get_datetime("processed_at") {
        Ok(dt) => Some(from_bson_date(*dt)?),
        Err(_) => None,
    };
    let transaction_id = match doc.get_str("transaction_id") {
        Ok(raw) => Some(parse_uuid(raw, "transaction_id")?),
        Err(_) => None,
    };

    Ok(PendingEntry {
        id: parse_uuid(doc.get_str("_id").map_err(|_| missing_field("_id"))?, "_id")?,
        rfid_uid: get_str(doc, "rfid_uid")?,
        items,
        total: from_minor_units(get_i64(doc, "total")?),
        status: parse_status(doc.get_str("status").map_err(|_| missing_field("status"))?)?,
        created_at: from_bson_date(
            *doc.get_datetime("created_at")
                .map_err(|_| missing_field("created_at"))?,
        )?,
        processed_at,
        transaction_id,
    })
}

fn transaction_to_doc(record: &TransactionRecord) -> Result<Document, CheckoutError> {
    let items: Vec<Bson> = record
        .items
        .iter()
        .map(|item: &SettledItem| {
            Ok(Bson::Document(doc! {
                "pending_id": item.pending_id.to_string(),
                "name": &item.name,
                "barcode": &item.barcode,
                "unit_price": to_minor_units(item.unit_price)?,
                "quantity": item.quantity as i32,
            }))
        })
        .collect::<Result<_, CheckoutError>>()?;

    let status = match record.status {
        TransactionStatus::Completed => "completed",
    };

    Ok(doc! {
        "_id": record.id.to_string(),
        "user_id": &record.user_id,
        "rfid_uid": &record.rfid_uid,
        "amount": to_minor_units(record.amount)?,
        "items": items,
        "item_count": record.item_count as i64,
        "created_at": to_bson_date(record.created_at),
        "status": status,
    })
}

fn doc_to_scan(doc: &Document) -> Result<ScanState, CheckoutError> {
    Ok(ScanState {
        rfid_uid: get_str(doc, "rfid_uid")?,
        status: parse_scan_status(doc.get_str("status").map_err(|_| missing_field("status"))?)?,
        seen_at: from_bson_date(
            *doc.get_datetime("seen_at")
                .map_err(|_| missing_field("seen_at"))?,
        )?,
    })
}
