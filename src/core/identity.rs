//! RFID identity resolution
//!
//! This module maps raw scanner output to exactly one user account. Scanner
//! firmware differs in how it prints tag UIDs (colon-joined hex pairs,
//! dash-joined, or bare hex), so every UID entering the system passes
//! through one canonical normalization before any lookup or write.

use std::sync::Arc;

use crate::store::{CheckoutStore, UserStore};
use crate::types::{CheckoutError, UserAccount};

/// Normalize a raw RFID UID to its canonical form
///
/// Strips `:`/`-`/space separators, requires a non-empty even-length hex
/// string, uppercases it, and joins byte pairs with `:`. The same scheme is
/// applied at login, staging, scan, and settlement time, so differing
/// hardware formats resolve to the same account key.
///
/// # Errors
///
/// Returns [`CheckoutError::MalformedUid`] for empty, odd-length, or
/// non-hex input.
pub fn normalize_uid(raw: &str) -> Result<String, CheckoutError> {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | ' '))
        .collect();

    if stripped.is_empty()
        || stripped.len() % 2 != 0
        || !stripped.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(CheckoutError::malformed_uid(raw.trim()));
    }

    let bytes = stripped.to_ascii_uppercase().into_bytes();
    let mut canonical = String::with_capacity(bytes.len() + bytes.len() / 2);
    for (i, pair) in bytes.chunks(2).enumerate() {
        if i > 0 {
            canonical.push(':');
        }
        canonical.push(pair[0] as char);
        canonical.push(pair[1] as char);
    }

    Ok(canonical)
}

/// Resolves a scanned UID to the unique matching user account
///
/// Pure lookup component: normalizes the UID and queries the user store.
/// No side effects.
pub struct IdentityResolver {
    store: Arc<dyn CheckoutStore>,
}

impl IdentityResolver {
    /// Create a resolver over the given store
    pub fn new(store: Arc<dyn CheckoutStore>) -> Self {
        IdentityResolver { store }
    }

    /// Resolve a raw UID to its user account
    ///
    /// # Errors
    ///
    /// * [`CheckoutError::MalformedUid`] if the UID cannot be normalized
    /// * [`CheckoutError::UserNotFound`] if no account matches
    pub async fn resolve(&self, raw_uid: &str) -> Result<UserAccount, CheckoutError> {
        let uid = normalize_uid(raw_uid)?;
        self.store
            .find_user_by_uid(&uid)
            .await?
            .ok_or_else(|| CheckoutError::user_not_found(uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::UserAccount;
    use rstest::rstest;
    use rust_decimal::Decimal;

    #[rstest]
    #[case::already_canonical("04:A1:B2", "04:A1:B2")]
    #[case::lowercase("04:a1:b2", "04:A1:B2")]
    #[case::dashes("04-a1-b2", "04:A1:B2")]
    #[case::bare_hex("04a1b2", "04:A1:B2")]
    #[case::spaces("04 a1 b2", "04:A1:B2")]
    #[case::surrounding_whitespace("  04a1b2  ", "04:A1:B2")]
    #[case::single_byte("ff", "FF")]
    fn test_normalize_accepts_hardware_formats(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_uid(raw).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::whitespace_only("   ")]
    #[case::separators_only(":-:")]
    #[case::odd_length("04a")]
    #[case::non_hex("hello")]
    #[case::mixed("04:zz")]
    fn test_normalize_rejects_malformed_input(#[case] raw: &str) {
        assert!(matches!(
            normalize_uid(raw).unwrap_err(),
            CheckoutError::MalformedUid { .. }
        ));
    }

    #[tokio::test]
    async fn test_resolve_matches_across_formats() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(UserAccount::new(
            "u-1",
            "Alice",
            "04:A1:B2",
            Decimal::new(5000, 2),
        ));
        let resolver = IdentityResolver::new(store);

        // The same tag reported in three firmware formats resolves to the
        // same account.
        for raw in ["04:A1:B2", "04-a1-b2", "04a1b2"] {
            let user = resolver.resolve(raw).await.unwrap();
            assert_eq!(user.id, "u-1");
        }
    }

    #[tokio::test]
    async fn test_resolve_unknown_uid() {
        let resolver = IdentityResolver::new(Arc::new(MemoryStore::new()));

        let result = resolver.resolve("04:A1:B2").await;
        assert!(matches!(
            result.unwrap_err(),
            CheckoutError::UserNotFound { .. }
        ));
    }
}
