//! HTTP surface
//!
//! Thin axum layer over the core components: routing, CORS, graceful
//! shutdown, and the request/response payloads. All business decisions live
//! in [`crate::core`]; handlers translate between JSON payloads and the
//! typed error taxonomy.

use std::sync::Arc;

use axum::http::{header::CONTENT_TYPE, HeaderName, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::core::{IdentityResolver, PendingLedger, ScanTracker, SettlementEngine};
use crate::store::CheckoutStore;
use crate::types::CheckoutError;

pub mod catalog;
pub mod routes;

pub use catalog::ProductCatalog;

use routes::{
    add_pending_handler, checkout_handler, clear_pending_handler, health_handler, login_handler,
    pending_debug_handler, product_handler, rfid_scan_handler, transaction_handler, user_handler,
};

/// Shared state for axum handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<IdentityResolver>,
    pub ledger: Arc<PendingLedger>,
    pub engine: Arc<SettlementEngine>,
    pub scans: Arc<ScanTracker>,
    pub catalog: Arc<ProductCatalog>,
    /// Shared hardware secret; `None` rejects all settlement requests
    pub api_key: Option<String>,
}

impl AppState {
    /// Wire the core components over one shared store
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        api_key: Option<String>,
        catalog_url: &str,
    ) -> Self {
        AppState {
            resolver: Arc::new(IdentityResolver::new(Arc::clone(&store))),
            ledger: Arc::new(PendingLedger::new(Arc::clone(&store))),
            engine: Arc::new(SettlementEngine::new(Arc::clone(&store))),
            scans: Arc::new(ScanTracker::new(store)),
            catalog: Arc::new(ProductCatalog::new(catalog_url)),
            api_key,
        }
    }
}

/// Build the axum router (separated for testing)
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-api-key")]);

    Router::new()
        .route("/", get(health_handler))
        .route("/login", post(login_handler))
        .route("/user/:rfid_uid", get(user_handler))
        .route("/product/:barcode", get(product_handler))
        .route("/checkout", post(checkout_handler))
        .route("/addPending", post(add_pending_handler))
        .route("/clearPending/:rfid_uid", delete(clear_pending_handler))
        .route("/pendingTest", get(pending_debug_handler))
        .route("/rfidScan", post(rfid_scan_handler))
        .route("/transaction", post(transaction_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until a shutdown signal arrives
pub async fn serve(store: Arc<dyn CheckoutStore>, config: &Config) -> Result<(), CheckoutError> {
    let state = AppState::new(store, config.api_key.clone(), &config.catalog_url);
    let app = router(state);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
