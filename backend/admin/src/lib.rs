//! # Admin Tooling
//!
//! Maintenance commands that work straight on the storefront's SQLite file.
//!
//! - Stock changes made here go through the same inventory code as the server,
//!   so they land in the audit log with the acting user shown as `System`.
//! - Running servers do not hear about these changes over `/ws`; dashboards
//!   pick them up on their next fetch.
use std::io::Write;

use anyhow::Result;
use storefront::{
    database::{SeedReport, Store},
    events::{EventHub, InventoryEvent},
    inventory::{audit_log, list_products, low_stock_products, product_by_code, restock},
};
use tracing::info;

pub fn seed(store: &Store, out: &mut impl Write) -> Result<SeedReport> {
    let report = store.seed()?;

    writeln!(
        out,
        "Seeded {} products and {} accounts (schema v{})",
        report.products_inserted,
        report.accounts_created,
        store.schema_version()?
    )?;

    Ok(report)
}

pub fn print_stock(store: &Store, low_only: bool, out: &mut impl Write) -> Result<()> {
    let products = if low_only {
        store.with_conn(low_stock_products)?
    } else {
        store.with_conn(list_products)?
    };

    writeln!(out, "{:<8} {:<24} {:<10} {:>6}", "CODE", "NAME", "CATEGORY", "STOCK")?;
    for product in &products {
        let marker = if !product.in_stock {
            "  OUT"
        } else if product.low_stock {
            "  LOW"
        } else {
            ""
        };

        writeln!(
            out,
            "{:<8} {:<24} {:<10} {:>6}{marker}",
            product.product_code,
            product.name,
            product.category.as_str(),
            product.current_stock
        )?;
    }

    Ok(())
}

pub fn restock_code(
    store: &Store,
    product_code: &str,
    quantity: i64,
    out: &mut impl Write,
) -> Result<InventoryEvent> {
    let item = store.with_conn(|c| product_by_code(c, product_code))?;
    let event = restock(store, &EventHub::new(1), item.inventory_id, quantity, None)?;
    info!(product_code = %event.product_code, quantity, "Restocked from admin tooling");

    writeln!(
        out,
        "{} {}: {} -> {}",
        event.product_code, event.name, event.previous_stock, event.current_stock
    )?;

    Ok(event)
}

pub fn print_audit(store: &Store, limit: usize, out: &mut impl Write) -> Result<()> {
    let entries = store.with_conn(|c| audit_log(c, limit, None))?;

    for entry in &entries {
        writeln!(
            out,
            "{} #{} {:<8} {:<24} {:>4} {:>4} -> {:<4} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.log_id,
            entry.product_code,
            entry.action.as_str(),
            entry.quantity,
            entry.previous_stock,
            entry.new_stock,
            entry.user_name
        )?;
    }

    if entries.is_empty() {
        writeln!(out, "No stock movements recorded")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Store {
        let store = Store::open_in_memory().expect("open store");
        seed(&store, &mut Vec::new()).expect("seed");
        store
    }

    fn output(f: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer);
        String::from_utf8(buffer).expect("utf8")
    }

    #[test]
    fn test_seed_report() {
        let store = Store::open_in_memory().expect("open store");

        let text = output(|out| {
            seed(&store, out).expect("seed");
        });
        assert!(text.starts_with("Seeded 24 products and 2 accounts"));

        let again = output(|out| {
            seed(&store, out).expect("seed again");
        });
        assert!(again.starts_with("Seeded 0 products and 0 accounts"));
    }

    #[test]
    fn test_restock_then_audit() {
        let store = seeded();

        let text = output(|out| {
            restock_code(&store, "RG002", 5, out).expect("restock");
        });
        assert_eq!(text.trim(), "RG002 Butterfly Bliss: 10 -> 15");

        let audit = output(|out| print_audit(&store, 5, out).expect("audit"));
        assert!(audit.contains("Stock Restock"));
        assert!(audit.trim_end().ends_with("System"));
    }

    #[test]
    fn test_restock_rejects_unknown_code_and_bad_quantity() {
        let store = seeded();

        assert!(restock_code(&store, "XX999", 5, &mut Vec::new()).is_err());
        assert!(restock_code(&store, "RG001", 0, &mut Vec::new()).is_err());

        let audit = output(|out| print_audit(&store, 5, out).expect("audit"));
        assert_eq!(audit.trim(), "No stock movements recorded");
    }

    #[test]
    fn test_stock_listing() {
        let store = seeded();

        let all = output(|out| print_stock(&store, false, out).expect("stock"));
        assert_eq!(all.lines().count(), 25);
        assert!(!all.contains("LOW"));

        let low = output(|out| print_stock(&store, true, out).expect("stock"));
        assert_eq!(low.lines().count(), 1);
    }

    #[test]
    fn test_restock_persists_in_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("admin.db");

        let store = Store::open(&path).expect("open");
        seed(&store, &mut Vec::new()).expect("seed");
        restock_code(&store, "EG001", 2, &mut Vec::new()).expect("restock");
        drop(store);

        let reopened = Store::open(&path).expect("reopen");
        let item = reopened
            .with_conn(|c| product_by_code(c, "EG001"))
            .expect("item");
        assert_eq!(item.current_stock, 12);
    }
}
