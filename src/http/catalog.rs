//! External product-catalog client
//!
//! Product data lives in an external collaborator service; this client
//! proxies barcode lookups to it and maps its responses onto the server's
//! error taxonomy.

use crate::types::CheckoutError;

/// HTTP client for the external product catalog
pub struct ProductCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl ProductCatalog {
    /// Create a client against the given catalog base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        ProductCatalog {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn product_url(&self, barcode: &str) -> String {
        format!("{}/product/{barcode}", self.base_url.trim_end_matches('/'))
    }

    /// Look up a product record by barcode
    ///
    /// The catalog's payload is passed through untouched.
    ///
    /// # Errors
    ///
    /// * [`CheckoutError::ProductNotFound`] when the catalog answers 404
    /// * [`CheckoutError::Catalog`] when the catalog is unreachable or
    ///   answers with another error status
    pub async fn lookup(&self, barcode: &str) -> Result<serde_json::Value, CheckoutError> {
        let response = self.client.get(self.product_url(barcode)).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CheckoutError::product_not_found(barcode));
        }
        let response = response.error_for_status()?;

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_url_joins_cleanly() {
        let catalog = ProductCatalog::new("http://catalog:7070/");
        assert_eq!(
            catalog.product_url("4006381333931"),
            "http://catalog:7070/product/4006381333931"
        );

        let catalog = ProductCatalog::new("http://catalog:7070");
        assert_eq!(
            catalog.product_url("4006381333931"),
            "http://catalog:7070/product/4006381333931"
        );
    }
}
