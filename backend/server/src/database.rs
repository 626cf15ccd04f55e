//! # SQLite
//!
//! Single relational store for accounts, inventory, orders, carts, reviews and
//! feedback.
//!
//! ## Concurrency
//!
//! - One connection behind one mutex. Every read and write in the service goes
//!   through [`Store::with_conn`] or [`Store::transaction`], so database access
//!   is serialized process wide.
//! - Multi-row mutations (checkout, order completion, cancellation) run inside a
//!   single transaction and either land together or not at all.
//!
//! ## Schema
//!
//! - Versioned migrations recorded in `schema_migrations`.
//! - `inventory.current_stock` carries a `CHECK (current_stock >= 0)`.
//! - `inventory_log` is append-only: triggers abort any `UPDATE` or `DELETE`.
//! - Timestamps are stored as UTC text through rusqlite's chrono support.
use std::{
    fmt::Display,
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use catalog::{Role, SEED_PRODUCTS};
use chrono::Utc;
use rusqlite::{
    Connection, ErrorCode, OptionalExtension, Row, Transaction, params, types::Type,
};
use tracing::{info, warn};

use crate::{error::AppError, utils::hash_password};

pub const SCHEMA_VERSION: i64 = 3;

pub const ADMIN_EMAIL: &str = "admin@aureliana.com";
pub const CLIENT_EMAIL: &str = "client@aureliana.com";

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub products_inserted: usize,
    pub accounts_created: usize,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA temp_store = MEMORY;",
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.ensure_schema()?;

        Ok(store)
    }

    /// Recovers a poisoned lock. A holder that panicked rolled back its open
    /// transaction while unwinding.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("Recovering sqlite store lock after a panic");
            self.conn.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }

    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let conn = self.lock();
        f(&conn)
    }

    /// Runs `f` inside one transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;

        Ok(value)
    }

    pub fn schema_version(&self) -> Result<i64, AppError> {
        self.with_conn(current_schema_version)
    }

    fn ensure_schema(&self) -> Result<(), AppError> {
        self.transaction(|tx| {
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    applied_at TEXT NOT NULL
                )",
            )?;

            let current = current_schema_version(tx)?;
            if current > SCHEMA_VERSION {
                return Err(AppError::InternalError(
                    format!(
                        "sqlite schema version {current} is newer than supported {SCHEMA_VERSION}"
                    )
                    .into(),
                ));
            }

            if current < 1 {
                apply_migration_v1(tx)?;
                record_migration(tx, 1, "baseline_storefront_tables")?;
            }
            if current < 2 {
                apply_migration_v2(tx)?;
                record_migration(tx, 2, "inventory_log_append_only")?;
            }
            if current < 3 {
                apply_migration_v3(tx)?;
                record_migration(tx, 3, "server_side_cart")?;
            }

            Ok(())
        })
    }

    /// Fills an empty inventory with the launch collection and creates the
    /// built-in admin and test customer accounts when they are missing.
    pub fn seed(&self) -> Result<SeedReport, AppError> {
        let report = self.transaction(|tx| {
            let mut report = SeedReport::default();

            let count: i64 = tx.query_row("SELECT COUNT(*) FROM inventory", [], |r| r.get(0))?;
            if count == 0 {
                let mut stmt = tx.prepare(
                    "INSERT INTO inventory
                     (product_code, name, category, material, price, image, size,
                      initial_stock, current_stock, low_stock_threshold)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9)",
                )?;
                for product in SEED_PRODUCTS {
                    stmt.execute(params![
                        product.code,
                        product.name,
                        product.category.as_str(),
                        product.material,
                        product.price,
                        product.image,
                        product.size,
                        product.initial_stock,
                        product.low_stock_threshold,
                    ])?;
                    report.products_inserted += 1;
                }
            }

            let accounts = [
                ("Admin", ADMIN_EMAIL, "09918614591", "admin", Role::Admin),
                ("Test Client", CLIENT_EMAIL, "0987654321", "client123", Role::User),
            ];
            for (full_name, email, phone, password, role) in accounts {
                let exists = tx
                    .query_row(
                        "SELECT 1 FROM clients WHERE email = ?1",
                        params![email],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();

                if !exists {
                    tx.execute(
                        "INSERT INTO clients (full_name, email, phone, password, role, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            full_name,
                            email,
                            phone,
                            hash_password(password),
                            role.as_str(),
                            Utc::now()
                        ],
                    )?;
                    report.accounts_created += 1;
                }
            }

            Ok(report)
        })?;

        if report != SeedReport::default() {
            info!(
                products = report.products_inserted,
                accounts = report.accounts_created,
                "Seeded database"
            );
        }

        Ok(report)
    }
}

/// Reads a text column into one of the catalog enums stored by display name.
pub(crate) fn text_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = row.get(idx)?;

    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

fn current_schema_version(conn: &Connection) -> Result<i64, AppError> {
    let version: Option<i64> = conn.query_row(
        "SELECT MAX(version) FROM schema_migrations",
        [],
        |r| r.get(0),
    )?;

    Ok(version.unwrap_or(0))
}

fn record_migration(conn: &Connection, version: i64, name: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![version, name, Utc::now()],
    )?;
    info!(version, name, "Applied migration");

    Ok(())
}

fn apply_migration_v1(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE clients (
            client_id INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL DEFAULT '',
            password TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            address TEXT,
            address_details TEXT,
            region TEXT,
            province TEXT,
            city TEXT,
            barangay TEXT,
            last_login TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE inventory (
            inventory_id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            material TEXT NOT NULL,
            price REAL NOT NULL CHECK (price >= 0),
            image TEXT NOT NULL,
            size TEXT NOT NULL,
            initial_stock INTEGER NOT NULL,
            current_stock INTEGER NOT NULL CHECK (current_stock >= 0),
            low_stock_threshold INTEGER NOT NULL
        );
        CREATE INDEX idx_inventory_category ON inventory(category);
        CREATE INDEX idx_inventory_name ON inventory(name);

        CREATE TABLE orders (
            order_id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(client_id),
            order_number TEXT UNIQUE,
            status TEXT NOT NULL,
            recipient_name TEXT NOT NULL,
            subtotal REAL NOT NULL,
            shipping_fee REAL NOT NULL,
            total_amount REAL NOT NULL,
            shipping_address TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_orders_client ON orders(client_id, created_at);

        CREATE TABLE order_items (
            item_id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL REFERENCES orders(order_id),
            inventory_id INTEGER NOT NULL REFERENCES inventory(inventory_id),
            product_name TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            unit_price REAL NOT NULL
        );
        CREATE INDEX idx_order_items_order ON order_items(order_id);

        CREATE TABLE inventory_log (
            log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            inventory_id INTEGER NOT NULL REFERENCES inventory(inventory_id),
            action TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            previous_stock INTEGER NOT NULL,
            new_stock INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            order_id INTEGER REFERENCES orders(order_id),
            user_id INTEGER REFERENCES clients(client_id)
        );
        CREATE INDEX idx_inventory_log_item ON inventory_log(inventory_id);

        CREATE TABLE reviews (
            review_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES clients(client_id),
            order_id INTEGER NOT NULL REFERENCES orders(order_id),
            product_name TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment TEXT NOT NULL,
            anonymous INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (user_id, product_name)
        );
        CREATE INDEX idx_reviews_product ON reviews(product_name);

        CREATE TABLE feedback (
            feedback_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )?;

    Ok(())
}

fn apply_migration_v2(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TRIGGER inventory_log_no_update
         BEFORE UPDATE ON inventory_log
         BEGIN
             SELECT RAISE(ABORT, 'inventory_log is append-only');
         END;

         CREATE TRIGGER inventory_log_no_delete
         BEFORE DELETE ON inventory_log
         BEGIN
             SELECT RAISE(ABORT, 'inventory_log is append-only');
         END;",
    )?;

    Ok(())
}

fn apply_migration_v3(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE cart_items (
            client_id INTEGER NOT NULL REFERENCES clients(client_id),
            inventory_id INTEGER NOT NULL REFERENCES inventory(inventory_id),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            added_at TEXT NOT NULL,
            PRIMARY KEY (client_id, inventory_id)
        );",
    )?;

    Ok(())
}
