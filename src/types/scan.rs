//! Scan-state types for the RFID checkout server
//!
//! A single write-latest-wins slot per deployment recording the most recent
//! hardware scan. Used only for client polling; never consulted by the
//! settlement engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status tag of the last scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Tag was scanned, settlement not yet run
    Scanned,

    /// A settlement for this tag completed
    Completed,
}

/// Most recent scan observation
///
/// Overwritten unconditionally on every scan event and again on settlement
/// completion. No history is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanState {
    /// Normalized RFID UID of the last scan
    pub rfid_uid: String,

    /// Status tag for the last scan
    pub status: ScanStatus,

    /// When the slot was last overwritten
    pub seen_at: DateTime<Utc>,
}

impl ScanState {
    /// Build a fresh slot value stamped with the current time
    pub fn now(rfid_uid: impl Into<String>, status: ScanStatus) -> Self {
        ScanState {
            rfid_uid: rfid_uid.into(),
            status,
            seen_at: Utc::now(),
        }
    }
}
