use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::{
    database::Store,
    error::AppError,
    inventory::product,
    utils::{add_quantities, round_money},
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CartLine {
    pub inventory_id: i64,
    pub product_code: String,
    pub name: String,
    pub image: String,
    pub unit_price: f64,
    pub quantity: i64,
    pub line_total: f64,
    pub available: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub item_count: i64,
    pub subtotal: f64,
}

pub fn cart(conn: &Connection, client_id: i64) -> Result<Cart, AppError> {
    let mut stmt = conn.prepare(
        "SELECT c.inventory_id, i.product_code, i.name, i.image, i.price, c.quantity, i.current_stock
         FROM cart_items c
         JOIN inventory i ON i.inventory_id = c.inventory_id
         WHERE c.client_id = ?1
         ORDER BY c.added_at, c.inventory_id",
    )?;

    let items = stmt
        .query_map([client_id], |row| {
            let unit_price: f64 = row.get(4)?;
            let quantity: i64 = row.get(5)?;

            Ok(CartLine {
                inventory_id: row.get(0)?,
                product_code: row.get(1)?,
                name: row.get(2)?,
                image: row.get(3)?,
                unit_price,
                quantity,
                line_total: round_money(unit_price * quantity as f64),
                available: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cart {
        item_count: items.iter().map(|line| line.quantity).sum(),
        subtotal: round_money(items.iter().map(|line| line.line_total).sum()),
        items,
    })
}

/// `(inventory_id, quantity)` pairs in the order they were added.
pub(crate) fn cart_lines(conn: &Connection, client_id: i64) -> Result<Vec<(i64, i64)>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT inventory_id, quantity FROM cart_items
         WHERE client_id = ?1 ORDER BY added_at, inventory_id",
    )?;
    let lines = stmt
        .query_map([client_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lines)
}

fn cart_quantity(conn: &Connection, client_id: i64, inventory_id: i64) -> Result<i64, AppError> {
    Ok(conn
        .query_row(
            "SELECT quantity FROM cart_items WHERE client_id = ?1 AND inventory_id = ?2",
            params![client_id, inventory_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0))
}

fn write_line(conn: &Connection, client_id: i64, inventory_id: i64, quantity: i64) -> Result<(), AppError> {
    let item = product(conn, inventory_id)?;
    if quantity > item.current_stock {
        return Err(AppError::InsufficientStock {
            name: item.name,
            available: item.current_stock,
        });
    }

    conn.execute(
        "INSERT INTO cart_items (client_id, inventory_id, quantity, added_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (client_id, inventory_id) DO UPDATE SET quantity = excluded.quantity",
        params![client_id, inventory_id, quantity, Utc::now()],
    )?;

    Ok(())
}

pub fn add_to_cart(store: &Store, client_id: i64, inventory_id: i64, quantity: i64) -> Result<Cart, AppError> {
    if quantity < 1 {
        return Err(AppError::validation("Quantity must be at least 1."));
    }

    store.transaction(|tx| {
        let existing = cart_quantity(tx, client_id, inventory_id)?;
        write_line(tx, client_id, inventory_id, add_quantities(existing, quantity)?)?;

        cart(tx, client_id)
    })
}

/// Zero removes the line.
pub fn set_cart_quantity(
    store: &Store,
    client_id: i64,
    inventory_id: i64,
    quantity: i64,
) -> Result<Cart, AppError> {
    if quantity < 0 {
        return Err(AppError::validation("Quantity cannot be negative."));
    }
    if quantity == 0 {
        return remove_from_cart(store, client_id, inventory_id);
    }

    store.transaction(|tx| {
        write_line(tx, client_id, inventory_id, quantity)?;

        cart(tx, client_id)
    })
}

pub fn remove_from_cart(store: &Store, client_id: i64, inventory_id: i64) -> Result<Cart, AppError> {
    store.transaction(|tx| {
        tx.execute(
            "DELETE FROM cart_items WHERE client_id = ?1 AND inventory_id = ?2",
            params![client_id, inventory_id],
        )?;

        cart(tx, client_id)
    })
}

pub fn clear_cart(conn: &Connection, client_id: i64) -> Result<usize, AppError> {
    Ok(conn.execute("DELETE FROM cart_items WHERE client_id = ?1", [client_id])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT: i64 = 2;

    fn seeded() -> Store {
        let store = Store::open_in_memory().expect("open store");
        store.seed().expect("seed");
        store
    }

    #[test]
    fn test_add_merges_lines() {
        let store = seeded();

        add_to_cart(&store, CLIENT, 1, 2).expect("add");
        let cart = add_to_cart(&store, CLIENT, 1, 3).expect("add again");

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 5);
        assert_eq!(cart.items[0].line_total, 42500.0);
        assert_eq!(cart.subtotal, 42500.0);
        assert_eq!(cart.item_count, 5);
    }

    #[test]
    fn test_cannot_exceed_stock() {
        let store = seeded();

        add_to_cart(&store, CLIENT, 1, 8).expect("add");
        let err = add_to_cart(&store, CLIENT, 1, 3).unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock { available: 10, .. }));
        let cart = store.with_conn(|c| cart(c, CLIENT)).expect("cart");
        assert_eq!(cart.items[0].quantity, 8);
    }

    #[test]
    fn test_oversized_add_is_rejected_without_breaking_the_store() {
        let store = seeded();

        add_to_cart(&store, CLIENT, 1, 1).expect("add");
        let err = add_to_cart(&store, CLIENT, 1, i64::MAX).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let cart = add_to_cart(&store, CLIENT, 1, 1).expect("add after rejection");
        assert_eq!(cart.items[0].quantity, 2);
    }

    #[test]
    fn test_quantity_rules() {
        let store = seeded();

        assert!(matches!(add_to_cart(&store, CLIENT, 1, 0), Err(AppError::Validation(_))));
        assert!(matches!(add_to_cart(&store, CLIENT, 999, 1), Err(AppError::NotFound(_))));

        add_to_cart(&store, CLIENT, 2, 1).expect("add");
        let cart = set_cart_quantity(&store, CLIENT, 2, 4).expect("set");
        assert_eq!(cart.items[0].quantity, 4);

        let cart = set_cart_quantity(&store, CLIENT, 2, 0).expect("remove");
        assert!(cart.items.is_empty());
    }

    #[test]
    fn test_carts_are_per_client() {
        let store = seeded();

        add_to_cart(&store, CLIENT, 3, 1).expect("add");
        add_to_cart(&store, CLIENT, 4, 1).expect("add");
        assert!(store.with_conn(|c| cart(c, 1)).expect("cart").items.is_empty());

        let removed = store.with_conn(|c| clear_cart(c, CLIENT)).expect("clear");
        assert_eq!(removed, 2);
        assert!(store.with_conn(|c| cart(c, CLIENT)).expect("cart").items.is_empty());
    }
}
