//! # Catalog
//!
//! Shared vocabulary between the storefront server and the admin tooling.
//!
//! ## Contents
//!
//! - [`models`]: categories, roles, payment methods, order statuses and the
//!   inventory actions written to the audit log. All of them are stored in
//!   SQLite as their display text so the database stays readable by hand.
//! - [`products`]: the launch collection seeded into an empty inventory.
//! - [`address`]: the five part shipping address and its composed form.

pub mod address;
pub mod models;
pub mod products;

pub use address::Address;
pub use models::{
    Category, InventoryAction, OrderStatus, ParseError, PaymentDetails, PaymentMethod, Role,
};
pub use products::{SEED_PRODUCTS, SeedProduct};
