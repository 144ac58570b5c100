//! RFID Checkout Server CLI
//!
//! Binary entry point for the point-of-sale checkout backend.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --backend mongodb
//! cargo run -- --backend memory --seed demo-users.json --port 8080
//! ```
//!
//! Configuration comes from the environment (`PORT`, `MONGODB_URI`,
//! `MONGODB_DB`, `API_KEY`, `PRODUCT_API_URL`); command-line flags select
//! the storage backend and may override the port.
//!
//! # Exit Codes
//!
//! - 0: Clean shutdown after a termination signal
//! - 1: Startup error (missing credentials, unreachable database, bind failure)

use std::process;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use rfid_checkout_server::cli::{self, BackendType};
use rfid_checkout_server::store::{CheckoutStore, MemoryStore, MongoStore};
use rfid_checkout_server::{http, Config};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = cli::parse_args();

    let mut config = Config::load();
    if let Some(port) = args.port {
        config.port = port;
    }

    // Select the storage backend from CLI arguments
    let store: Arc<dyn CheckoutStore> = match args.backend {
        BackendType::Memory => {
            let store = MemoryStore::new();
            if let Some(path) = &args.seed {
                match store.load_seed(path) {
                    Ok(count) => info!(count, path = %path.display(), "seeded user accounts"),
                    Err(e) => {
                        error!(error = %e, "failed to load seed file");
                        process::exit(1);
                    }
                }
            }
            Arc::new(store)
        }
        BackendType::Mongodb => {
            if args.seed.is_some() {
                warn!("--seed is ignored with the mongodb backend");
            }
            let Some(uri) = config.mongodb_uri.clone() else {
                error!("MONGODB_URI is not set; refusing to start without database credentials");
                process::exit(1);
            };
            match MongoStore::connect(&uri, &config.mongodb_database).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!(error = %e, "failed to connect to MongoDB");
                    process::exit(1);
                }
            }
        }
    };

    if let Err(e) = http::serve(store, &config).await {
        error!(error = %e, "server error");
        process::exit(1);
    }
}
