//! Environment configuration
//!
//! All deployment settings arrive through environment variables. Every
//! lookup logs what it falls back to, and missing database credentials are
//! an explicit startup failure for the mongodb backend rather than a
//! silently null-credentialed client.

use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

/// Runtime configuration for the checkout server
pub struct Config {
    /// HTTP listening port
    pub port: u16,

    /// MongoDB connection URI, absent when unset
    pub mongodb_uri: Option<String>,

    /// MongoDB database name
    pub mongodb_database: String,

    /// Shared secret for hardware settlement requests
    ///
    /// When absent, every `/transaction` request is rejected.
    pub api_key: Option<String>,

    /// Base URL of the external product catalog
    pub catalog_url: String,
}

impl Config {
    /// Load configuration from the environment
    pub fn load() -> Self {
        let api_key = env::var("API_KEY").ok().filter(|key| !key.is_empty());
        if api_key.is_none() {
            warn!("API_KEY not set; hardware settlement requests will be rejected");
        }

        let mongodb_uri = env::var("MONGODB_URI").ok().filter(|uri| !uri.is_empty());
        if mongodb_uri.is_none() {
            warn!("MONGODB_URI not set; the mongodb backend will refuse to start");
        }

        Self {
            port: try_load("PORT", "3000"),
            mongodb_uri,
            mongodb_database: try_load("MONGODB_DB", "checkout"),
            api_key,
            catalog_url: try_load("PRODUCT_API_URL", "http://localhost:7070"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
