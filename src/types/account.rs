//! Account-related types for the RFID checkout server
//!
//! This module defines the user account structure tied to an RFID tag.
//! Accounts are created and removed by external administration; the server
//! only reads them and debits the balance during settlement.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User account backed by an RFID tag
///
/// Represents one storefront user. The RFID UID doubles as the account
/// lookup key and the payment token; the stored balance is the only field
/// the server ever mutates, and only through the settlement commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Opaque unique account identifier
    pub id: String,

    /// Display name shown to the storefront client
    pub name: String,

    /// Normalized RFID tag UID (unique per account)
    ///
    /// Always stored in the canonical hex-pair form produced by
    /// [`crate::core::identity::normalize_uid`]. Lookups are exact matches
    /// on this field.
    pub rfid_uid: String,

    /// Stored balance in currency units
    ///
    /// Non-negative by invariant: the settlement engine only debits after
    /// validating sufficient funds inside the atomic commit.
    pub balance: Decimal,
}

impl UserAccount {
    /// Create a new account with the given identity and starting balance
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rfid_uid: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        UserAccount {
            id: id.into(),
            name: name.into(),
            rfid_uid: rfid_uid.into(),
            balance,
        }
    }
}
