//! Documentation of the Aureliana jewelry storefront and back office.
//!
//!
//!
//! # General Infrastructure
//! - One axum service answers every storefront and admin request as JSON
//! - One SQLite file holds accounts, inventory, orders, carts, reviews and feedback
//! - Dashboards subscribe to `/ws` and receive inventory and order changes live
//! - The `aureliana-admin` binary works on the same database file for seeding and restocks
//!
//!
//!
//! # Inventory Consistency
//!
//! **Goal**: Stock on hand never goes negative and every movement can be traced.
//!
//! - Checkout checks all lines first, then reserves them, inside one transaction
//! - Each stock movement appends one immutable row to `inventory_log`
//! - Completing an order records fulfilment against the reservation without moving stock again
//! - Cancelling an unpaid order puts its reserved stock back
//! - Broadcasts go out only after the transaction commits
//!
//!
//!
//! # Notes
//!
//! ## SQLite
//! A single connection behind a mutex serializes every read and write. Store work runs on the
//! blocking pool so the async workers stay free for sockets.
//!
//! ## Sessions
//! A signed cookie carries the account id and role. There is no server side session table, so
//! logging out only clears the cookie.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run locally.
//! ```sh
//! SESSION_SECRET=dev RUST_LOG=info cargo run --bin aureliana
//! ```
//!
//! Seed and inspect the database without the server.
//! ```sh
//! cargo run --bin aureliana-admin -- seed
//! cargo run --bin aureliana-admin -- stock
//! cargo run --bin aureliana-admin -- restock RG001 5
//! cargo run --bin aureliana-admin -- audit --limit 20
//! ```
use std::{io, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use thiserror::Error;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod accounts;
pub mod cart;
pub mod config;
pub mod dashboard;
pub mod database;
pub mod error;
pub mod events;
pub mod feedback;
pub mod inventory;
pub mod orders;
pub mod reviews;
pub mod routes;
pub mod session;
pub mod state;
pub mod utils;

use config::{Config, ConfigError};
use error::AppError;
use events::ws_handler;
use routes::*;
use state::State;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] AppError),

    #[error("Failed to bind {address}: {source}")]
    Bind { address: String, source: io::Error },

    #[error("Server error: {0}")]
    Serve(io::Error),
}

pub async fn start_server() -> Result<(), StartupError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config)?;

    info!("Starting server...");
    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    info!("Server shut down");

    Ok(())
}

pub fn build_router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(&state.config.allowed_origin))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/test_server", get(test_server_handler))
        .route("/test_admin", get(test_admin_handler))
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/api/check_login", get(check_login_handler))
        .route("/api/user_info", get(user_info_handler))
        .route("/account", get(account_handler))
        .route("/update_profile", post(update_profile_handler))
        .route("/update_address", post(update_address_handler))
        .route("/update_password", post(update_password_handler))
        .route("/api/inventory", get(inventory_handler))
        .route("/api/inventory/{id}", get(inventory_item_handler))
        .route("/collections/{category}", get(collection_handler))
        .route("/product/{code}", get(product_handler))
        .route("/api/cart", get(cart_handler).post(add_to_cart_handler))
        .route(
            "/api/cart/{inventory_id}",
            put(update_cart_handler).delete(remove_cart_handler),
        )
        .route("/api/clear_cart", post(clear_cart_handler))
        .route("/place_order", post(place_order_handler))
        .route("/receipt/{order_id}", get(receipt_handler))
        .route("/order_paid/{order_id}", post(order_paid_handler))
        .route("/order_received/{order_id}", post(order_received_handler))
        .route("/order_cancel/{order_id}", post(order_cancel_handler))
        .route("/submit_review", post(submit_review_handler))
        .route("/submit-feedback", post(submit_feedback_handler))
        .route("/admin", get(admin_handler))
        .route("/update_stock", post(update_stock_handler))
        .route("/restock", post(restock_handler))
        .route("/update_inventory", post(update_inventory_handler))
        .route("/api/inventory_logs", get(inventory_logs_handler))
        .route("/api/orders", get(orders_handler))
        .route("/api/clients", get(clients_handler))
        .route("/api/feedback", get(feedback_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn allowed_origin(origin: &str) -> AllowOrigin {
    if origin == "*" {
        return AllowOrigin::any();
    }

    match HeaderValue::from_str(origin) {
        Ok(value) => AllowOrigin::exact(value),
        Err(e) => {
            warn!("Invalid allowed origin {origin}: {e}, allowing any");
            AllowOrigin::any()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
