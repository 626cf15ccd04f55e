//! # Inventory
//!
//! Stock levels, the audit trail behind them and the product listings built on
//! top of both.
//!
//! ## Stock changes
//!
//! - [`apply_stock_change`] is the only code path that writes
//!   `inventory.current_stock`. It runs on a caller supplied connection so
//!   checkout, completion and cancellation can fold many changes into one
//!   transaction.
//! - The new level is clamped at zero and every call appends exactly one
//!   `inventory_log` row recording the level before and after.
//! - Admin operations here commit first and publish the resulting
//!   [`InventoryEvent`] afterwards.
use catalog::{Category, InventoryAction};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    database::{Store, is_constraint_violation, text_column},
    error::AppError,
    events::{EventHub, InventoryEvent, StoreEvent},
    reviews::{ProductReview, product_reviews},
    utils::{add_quantities, sanitize},
};

const PRODUCT_COLUMNS: &str = "inventory_id, product_code, name, category, material, price, image,
     size, initial_stock, current_stock, low_stock_threshold";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Product {
    pub inventory_id: i64,
    pub product_code: String,
    pub name: String,
    pub category: Category,
    pub material: String,
    pub price: f64,
    pub image: String,
    pub size: String,
    pub initial_stock: i64,
    pub current_stock: i64,
    pub low_stock_threshold: i64,
    pub low_stock: bool,
    pub in_stock: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub average_rating: Option<f64>,
    pub review_count: usize,
    pub reviews: Vec<ProductReview>,
}

/// One requested change to a single item's stock.
#[derive(Debug, Clone, Copy)]
pub struct StockChange {
    pub inventory_id: i64,
    pub delta: i64,
    pub action: InventoryAction,
    pub order_id: Option<i64>,
    pub user_id: Option<i64>,
    /// Quantity written to the log when it differs from `|delta|`.
    pub logged_quantity: Option<i64>,
}

impl StockChange {
    pub fn new(inventory_id: i64, delta: i64, action: InventoryAction) -> Self {
        Self {
            inventory_id,
            delta,
            action,
            order_id: None,
            user_id: None,
            logged_quantity: None,
        }
    }

    /// Records fulfilment of `quantity` units that were already reserved.
    pub fn fulfilment(inventory_id: i64, quantity: i64) -> Self {
        Self {
            logged_quantity: Some(quantity),
            ..Self::new(inventory_id, 0, InventoryAction::OrderCompleted)
        }
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn by(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Admin edit of an item's details and stock level.
#[derive(Deserialize, Debug, Clone)]
pub struct ProductUpdate {
    pub product_code: String,
    pub name: String,
    pub category: Category,
    pub price: f64,
    pub image: String,
    pub current_stock: i64,
    pub material: Option<String>,
    pub size: Option<String>,
    pub low_stock_threshold: Option<i64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub log_id: i64,
    pub inventory_id: i64,
    pub name: String,
    pub product_code: String,
    pub category: Category,
    pub action: InventoryAction,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub timestamp: DateTime<Utc>,
    pub order_id: Option<i64>,
    pub user_id: Option<i64>,
    pub user_name: String,
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let current_stock: i64 = row.get(9)?;
    let low_stock_threshold: i64 = row.get(10)?;

    Ok(Product {
        inventory_id: row.get(0)?,
        product_code: row.get(1)?,
        name: row.get(2)?,
        category: text_column(row, 3)?,
        material: row.get(4)?,
        price: row.get(5)?,
        image: row.get(6)?,
        size: row.get(7)?,
        initial_stock: row.get(8)?,
        current_stock,
        low_stock_threshold,
        low_stock: current_stock <= low_stock_threshold,
        in_stock: current_stock > 0,
    })
}

fn query_products(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Product>, AppError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM inventory {filter} ORDER BY inventory_id");
    let mut stmt = conn.prepare(&sql)?;
    let products = stmt
        .query_map(args, product_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(products)
}

pub fn list_products(conn: &Connection) -> Result<Vec<Product>, AppError> {
    query_products(conn, "", [])
}

pub fn low_stock_products(conn: &Connection) -> Result<Vec<Product>, AppError> {
    query_products(conn, "WHERE current_stock <= low_stock_threshold", [])
}

pub fn product(conn: &Connection, inventory_id: i64) -> Result<Product, AppError> {
    query_products(conn, "WHERE inventory_id = ?1", [inventory_id])?
        .pop()
        .ok_or_else(|| AppError::not_found("Product not found."))
}

pub fn product_by_code(conn: &Connection, product_code: &str) -> Result<Product, AppError> {
    query_products(conn, "WHERE product_code = ?1", [product_code.trim()])?
        .pop()
        .ok_or_else(|| AppError::not_found("Product not found."))
}

pub fn product_by_name(conn: &Connection, name: &str) -> Result<Option<Product>, AppError> {
    Ok(query_products(conn, "WHERE name = ?1", [sanitize(name)])?
        .into_iter()
        .next())
}

/// Products in one collection. `slug` accepts `rings` as well as `Ring`.
pub fn collection(conn: &Connection, slug: &str) -> Result<Vec<Product>, AppError> {
    let category: Category = slug
        .parse()
        .map_err(|_| AppError::not_found("Collection not found."))?;

    query_products(conn, "WHERE category = ?1", [category.as_str()])
}

pub fn product_detail(conn: &Connection, product_code: &str) -> Result<ProductDetail, AppError> {
    let product = product_by_code(conn, product_code)?;
    let reviews = product_reviews(conn, &product.name)?;

    let average_rating = if reviews.is_empty() {
        None
    } else {
        let total: i64 = reviews.iter().map(|r| r.rating).sum();
        Some((total as f64 / reviews.len() as f64 * 100.0).round() / 100.0)
    };

    Ok(ProductDetail {
        product,
        average_rating,
        review_count: reviews.len(),
        reviews,
    })
}

/// Applies one change and appends its audit row. Does not publish.
pub fn apply_stock_change(
    conn: &Connection,
    change: &StockChange,
) -> Result<InventoryEvent, AppError> {
    let (name, category, product_code, previous_stock): (String, Category, String, i64) = conn
        .query_row(
            "SELECT name, category, product_code, current_stock
             FROM inventory WHERE inventory_id = ?1",
            [change.inventory_id],
            |row| Ok((row.get(0)?, text_column(row, 1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Inventory item not found."))?;

    let current_stock = add_quantities(previous_stock, change.delta)?.max(0);
    let quantity = change.logged_quantity.unwrap_or(change.delta.saturating_abs());

    conn.execute(
        "UPDATE inventory SET current_stock = ?1 WHERE inventory_id = ?2",
        params![current_stock, change.inventory_id],
    )?;
    conn.execute(
        "INSERT INTO inventory_log
         (inventory_id, action, quantity, previous_stock, new_stock, timestamp, order_id, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            change.inventory_id,
            change.action.as_str(),
            quantity,
            previous_stock,
            current_stock,
            Utc::now(),
            change.order_id,
            change.user_id,
        ],
    )?;

    info!(
        inventory_id = change.inventory_id,
        action = change.action.as_str(),
        previous_stock,
        current_stock,
        "Stock changed"
    );

    Ok(InventoryEvent {
        inventory_id: change.inventory_id,
        name,
        category,
        product_code,
        current_stock,
        previous_stock,
        action: change.action,
        quantity,
    })
}

fn commit_and_publish(
    store: &Store,
    events: &EventHub,
    change: StockChange,
) -> Result<InventoryEvent, AppError> {
    let event = store.transaction(|tx| apply_stock_change(tx, &change))?;
    events.publish(StoreEvent::InventoryUpdated(event.clone()));

    Ok(event)
}

/// Admin sets an absolute stock level.
pub fn set_stock(
    store: &Store,
    events: &EventHub,
    inventory_id: i64,
    new_stock: i64,
    admin_id: Option<i64>,
) -> Result<InventoryEvent, AppError> {
    if new_stock < 0 {
        return Err(AppError::validation("Stock cannot be negative."));
    }

    let event = store.transaction(|tx| {
        let current = product(tx, inventory_id)?.current_stock;
        let change = StockChange::new(
            inventory_id,
            new_stock - current,
            InventoryAction::ManualAdjustment,
        )
        .by(admin_id);

        apply_stock_change(tx, &change)
    })?;
    events.publish(StoreEvent::InventoryUpdated(event.clone()));

    Ok(event)
}

pub fn restock(
    store: &Store,
    events: &EventHub,
    inventory_id: i64,
    quantity: i64,
    admin_id: Option<i64>,
) -> Result<InventoryEvent, AppError> {
    if quantity < 1 {
        return Err(AppError::validation("Restock quantity must be at least 1."));
    }

    commit_and_publish(
        store,
        events,
        StockChange::new(inventory_id, quantity, InventoryAction::Restock).by(admin_id),
    )
}

pub fn update_item(
    store: &Store,
    events: &EventHub,
    inventory_id: i64,
    update: ProductUpdate,
    admin_id: Option<i64>,
) -> Result<Product, AppError> {
    let product_code = sanitize(&update.product_code);
    let name = sanitize(&update.name);
    let image = update.image.trim().to_string();

    if product_code.is_empty() || name.is_empty() {
        return Err(AppError::validation("Product code and name are required."));
    }
    if !update.price.is_finite() || update.price < 0.0 {
        return Err(AppError::validation("Price cannot be negative."));
    }
    if update.current_stock < 0 {
        return Err(AppError::validation("Stock cannot be negative."));
    }
    if update.low_stock_threshold.is_some_and(|t| t < 0) {
        return Err(AppError::validation("Low stock threshold cannot be negative."));
    }

    let (event, updated) = store.transaction(|tx| {
        let existing = product(tx, inventory_id)?;

        tx.execute(
            "UPDATE inventory
             SET product_code = ?1, name = ?2, category = ?3, price = ?4, image = ?5,
                 material = ?6, size = ?7, low_stock_threshold = ?8
             WHERE inventory_id = ?9",
            params![
                product_code,
                name,
                update.category.as_str(),
                update.price,
                image,
                update.material.as_deref().map(sanitize).unwrap_or_else(|| existing.material.clone()),
                update.size.as_deref().map(sanitize).unwrap_or_else(|| existing.size.clone()),
                update.low_stock_threshold.unwrap_or(existing.low_stock_threshold),
                inventory_id,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                AppError::conflict("Product code already exists.")
            } else {
                e.into()
            }
        })?;

        let event = if update.current_stock != existing.current_stock {
            let change = StockChange::new(
                inventory_id,
                update.current_stock - existing.current_stock,
                InventoryAction::InventoryUpdate,
            )
            .by(admin_id);

            apply_stock_change(tx, &change)?
        } else {
            InventoryEvent {
                inventory_id,
                name: name.clone(),
                category: update.category,
                product_code: product_code.clone(),
                current_stock: existing.current_stock,
                previous_stock: existing.current_stock,
                action: InventoryAction::InventoryUpdate,
                quantity: 0,
            }
        };

        Ok((event, product(tx, inventory_id)?))
    })?;

    info!(inventory_id, product_code = %updated.product_code, "Inventory item updated");
    events.publish(StoreEvent::InventoryUpdated(event));

    Ok(updated)
}

/// Newest entries first. `inventory_id` narrows the trail to one item.
pub fn audit_log(
    conn: &Connection,
    limit: usize,
    inventory_id: Option<i64>,
) -> Result<Vec<AuditEntry>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT l.log_id, l.inventory_id, i.name, i.product_code, i.category, l.action,
                l.quantity, l.previous_stock, l.new_stock, l.timestamp, l.order_id, l.user_id,
                c.full_name, c.email
         FROM inventory_log l
         JOIN inventory i ON i.inventory_id = l.inventory_id
         LEFT JOIN clients c ON c.client_id = l.user_id
         WHERE ?1 IS NULL OR l.inventory_id = ?1
         ORDER BY l.log_id DESC
         LIMIT ?2",
    )?;

    let entries = stmt
        .query_map(params![inventory_id, limit as i64], |row| {
            let full_name: Option<String> = row.get(12)?;
            let email: Option<String> = row.get(13)?;

            Ok(AuditEntry {
                log_id: row.get(0)?,
                inventory_id: row.get(1)?,
                name: row.get(2)?,
                product_code: row.get(3)?,
                category: text_column(row, 4)?,
                action: text_column(row, 5)?,
                quantity: row.get(6)?,
                previous_stock: row.get(7)?,
                new_stock: row.get(8)?,
                timestamp: row.get(9)?,
                order_id: row.get(10)?,
                user_id: row.get(11)?,
                user_name: acting_user_name(full_name, email),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

fn acting_user_name(full_name: Option<String>, email: Option<String>) -> String {
    match (full_name, email) {
        (Some(name), Some(email)) => format!("{name} ({email})"),
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => "System".to_string(),
    }
}
