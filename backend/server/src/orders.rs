//! # Orders
//!
//! Checkout and the order lifecycle.
//!
//! ## Checkout
//!
//! [`place_order`] runs in one transaction: every line's stock is checked
//! before any is reserved, so an order either reserves all of its lines or
//! leaves inventory, orders and the cart untouched. Totals use catalog prices.
//!
//! ## Lifecycle
//!
//! ```text
//! Pending Payment --paid/received--> Paid --received--> Completed
//!        |
//!        +--cancel--> Cancelled (reserved stock released)
//! ```
//!
//! Completion writes an `Order Completed` audit row per line against the stock
//! reserved at checkout; the level itself does not move again.
use catalog::{Address, InventoryAction, OrderStatus, PaymentDetails, PaymentMethod};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    accounts::profile,
    cart::{cart_lines, clear_cart},
    database::{Store, text_column},
    error::AppError,
    events::{EventHub, InventoryEvent, StoreEvent},
    inventory::{Product, StockChange, apply_stock_change, product, product_by_name},
    session::Session,
    utils::{add_quantities, round_money, sanitize},
};

const CANNOT_UPDATE: &str = "Order cannot be updated.";

const ORDER_COLUMNS: &str = "o.order_id, o.client_id, c.full_name, c.email,
     COALESCE(o.order_number, ''), o.status, o.recipient_name, o.subtotal, o.shipping_fee,
     o.total_amount, o.shipping_address, o.payment_method, o.created_at";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CheckoutLine {
    pub inventory_id: Option<i64>,
    pub name: Option<String>,
    pub quantity: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CheckoutRequest {
    /// Falls back to the customer's cart when empty.
    #[serde(default)]
    pub items: Vec<CheckoutLine>,
    pub recipient_name: Option<String>,
    /// Falls back to the saved account address when empty.
    #[serde(flatten)]
    pub address: Address,
    pub payment_method: PaymentMethod,
    #[serde(flatten)]
    pub payment: PaymentDetails,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: i64,
    pub order_number: String,
    pub status: OrderStatus,
    pub subtotal: f64,
    pub shipping_fee: f64,
    pub total_amount: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub inventory_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub line_total: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: i64,
    pub client_id: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub recipient_name: String,
    pub subtotal: f64,
    pub shipping_fee: f64,
    pub total_amount: f64,
    pub shipping_address: String,
    pub address: Address,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

/// `ORD` followed by the unix time of placement and the zero padded id.
pub fn order_number(placed_at: DateTime<Utc>, order_id: i64) -> String {
    format!("ORD{}{order_id:04}", placed_at.timestamp())
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let shipping_address: String = row.get(10)?;

    Ok(Order {
        order_id: row.get(0)?,
        client_id: row.get(1)?,
        customer_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        customer_email: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        order_number: row.get(4)?,
        status: text_column(row, 5)?,
        recipient_name: row.get(6)?,
        subtotal: row.get(7)?,
        shipping_fee: row.get(8)?,
        total_amount: row.get(9)?,
        address: Address::parse(&shipping_address),
        shipping_address,
        payment_method: text_column(row, 11)?,
        created_at: row.get(12)?,
        items: Vec::new(),
    })
}

fn order_items(conn: &Connection, order_id: i64) -> Result<Vec<OrderItem>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT inventory_id, product_name, quantity, unit_price
         FROM order_items WHERE order_id = ?1 ORDER BY item_id",
    )?;
    let items = stmt
        .query_map([order_id], |row| {
            let quantity: i64 = row.get(2)?;
            let unit_price: f64 = row.get(3)?;

            Ok(OrderItem {
                inventory_id: row.get(0)?,
                product_name: row.get(1)?,
                quantity,
                unit_price,
                line_total: round_money(unit_price * quantity as f64),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

fn query_orders(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Order>, AppError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders o
         LEFT JOIN clients c ON c.client_id = o.client_id
         {filter}
         ORDER BY o.created_at DESC, o.order_id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut orders = stmt
        .query_map(args, order_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for order in &mut orders {
        order.items = order_items(conn, order.order_id)?;
    }

    Ok(orders)
}

pub fn list_orders(conn: &Connection) -> Result<Vec<Order>, AppError> {
    query_orders(conn, "", [])
}

pub fn client_orders(conn: &Connection, client_id: i64) -> Result<Vec<Order>, AppError> {
    query_orders(conn, "WHERE o.client_id = ?1", [client_id])
}

/// Customers only see their own orders. Anyone else's reads as missing.
fn visible_order(conn: &Connection, viewer: &Session, order_id: i64) -> Result<Order, AppError> {
    query_orders(conn, "WHERE o.order_id = ?1", [order_id])?
        .pop()
        .filter(|order| viewer.role.is_admin() || order.client_id == viewer.client_id)
        .ok_or_else(|| AppError::not_found("Order not found."))
}

pub fn receipt(conn: &Connection, viewer: &Session, order_id: i64) -> Result<Order, AppError> {
    visible_order(conn, viewer, order_id)
}

/// Resolves request lines to `(product, quantity)`, merging repeats of one item.
fn resolve_lines(
    conn: &Connection,
    client_id: i64,
    requested: &[CheckoutLine],
) -> Result<Vec<(Product, i64)>, AppError> {
    let raw: Vec<(i64, i64)> = if requested.is_empty() {
        cart_lines(conn, client_id)?
    } else {
        requested
            .iter()
            .map(|line| {
                let inventory_id = match (line.inventory_id, line.name.as_deref()) {
                    (Some(id), _) => id,
                    (None, Some(name)) => {
                        product_by_name(conn, name)?
                            .ok_or_else(|| {
                                AppError::not_found(format!("Product {} not found.", sanitize(name)))
                            })?
                            .inventory_id
                    }
                    (None, None) => {
                        return Err(AppError::validation("Each item needs a product."));
                    }
                };

                Ok((inventory_id, line.quantity))
            })
            .collect::<Result<_, AppError>>()?
    };

    let mut lines: Vec<(Product, i64)> = Vec::with_capacity(raw.len());
    for (inventory_id, quantity) in raw {
        if quantity < 1 {
            return Err(AppError::validation("Quantity must be at least 1."));
        }

        match lines.iter_mut().find(|(p, _)| p.inventory_id == inventory_id) {
            Some((_, merged)) => *merged = add_quantities(*merged, quantity)?,
            None => lines.push((product(conn, inventory_id)?, quantity)),
        }
    }

    if lines.is_empty() {
        return Err(AppError::validation("No items to checkout."));
    }

    Ok(lines)
}

pub fn place_order(
    store: &Store,
    events: &EventHub,
    shipping_fee: f64,
    client_id: i64,
    request: &CheckoutRequest,
) -> Result<PlacedOrder, AppError> {
    if let Some(message) = request.payment.missing_fields_message(request.payment_method) {
        return Err(AppError::validation(message));
    }

    let (placed, reserved) = store.transaction(|tx| {
        let lines = resolve_lines(tx, client_id, &request.items)?;

        for (item, quantity) in &lines {
            if item.current_stock < *quantity {
                return Err(AppError::InsufficientStock {
                    name: item.name.clone(),
                    available: item.current_stock,
                });
            }
        }

        let account = profile(tx, client_id)?;
        let recipient_name = request
            .recipient_name
            .as_deref()
            .map(sanitize)
            .filter(|name| !name.is_empty())
            .unwrap_or(account.full_name);
        let address = if request.address.is_empty() {
            account.address
        } else {
            request.address.clone()
        };
        if address.is_empty() {
            return Err(AppError::validation("Please provide a shipping address."));
        }

        let subtotal = round_money(
            lines
                .iter()
                .map(|(item, quantity)| item.price * *quantity as f64)
                .sum(),
        );
        let total_amount = round_money(subtotal + shipping_fee);
        let status = request.payment_method.initial_status();
        let placed_at = Utc::now();

        tx.execute(
            "INSERT INTO orders (client_id, status, recipient_name, subtotal, shipping_fee,
             total_amount, shipping_address, payment_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                client_id,
                status.as_str(),
                recipient_name,
                subtotal,
                shipping_fee,
                total_amount,
                address.compose(),
                request.payment_method.as_str(),
                placed_at
            ],
        )?;
        let order_id = tx.last_insert_rowid();
        let number = order_number(placed_at, order_id);
        tx.execute(
            "UPDATE orders SET order_number = ?1 WHERE order_id = ?2",
            params![number, order_id],
        )?;

        let mut reserved = Vec::with_capacity(lines.len());
        for (item, quantity) in &lines {
            tx.execute(
                "INSERT INTO order_items (order_id, inventory_id, product_name, quantity, unit_price)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![order_id, item.inventory_id, item.name, quantity, item.price],
            )?;

            let change = StockChange::new(item.inventory_id, -quantity, InventoryAction::OrderPlaced)
                .for_order(order_id)
                .by(Some(client_id));
            reserved.push(apply_stock_change(tx, &change)?);
        }

        clear_cart(tx, client_id)?;

        Ok((
            PlacedOrder {
                order_id,
                order_number: number,
                status,
                subtotal,
                shipping_fee,
                total_amount,
            },
            reserved,
        ))
    })?;

    info!(
        order_id = placed.order_id,
        order_number = %placed.order_number,
        total = placed.total_amount,
        "Order placed"
    );

    events.publish_all(reserved.into_iter().map(StoreEvent::InventoryUpdated));
    events.publish(StoreEvent::NewOrder {
        order_id: placed.order_id,
        order_number: placed.order_number.clone(),
        total: placed.total_amount,
    });

    Ok(placed)
}

/// Moves an order to a new status inside one transaction, running `reconcile`
/// for any stock side effects, then publishes once committed.
fn transition(
    store: &Store,
    events: &EventHub,
    viewer: &Session,
    order_id: i64,
    next: impl FnOnce(&Order) -> Result<OrderStatus, AppError>,
) -> Result<OrderStatus, AppError> {
    let (status, stock_events) = store.transaction(|tx| {
        let order = visible_order(tx, viewer, order_id)?;
        let status = next(&order)?;

        if !order.status.can_transition_to(status) {
            return Err(AppError::InvalidTransition(CANNOT_UPDATE.to_string()));
        }

        tx.execute(
            "UPDATE orders SET status = ?1 WHERE order_id = ?2",
            params![status.as_str(), order_id],
        )?;

        let stock_events = reconcile(tx, &order, status, viewer.client_id)?;

        Ok((status, stock_events))
    })?;

    info!(order_id, status = status.as_str(), "Order status changed");

    events.publish_all(stock_events.into_iter().map(StoreEvent::InventoryUpdated));
    events.publish(StoreEvent::OrderStatus { order_id, status });

    Ok(status)
}

fn reconcile(
    conn: &Connection,
    order: &Order,
    status: OrderStatus,
    actor: i64,
) -> Result<Vec<InventoryEvent>, AppError> {
    let change_for = |item: &OrderItem| match status {
        OrderStatus::Completed => Some(StockChange::fulfilment(item.inventory_id, item.quantity)),
        OrderStatus::Cancelled => Some(StockChange::new(
            item.inventory_id,
            item.quantity,
            InventoryAction::OrderCancelled,
        )),
        OrderStatus::PendingPayment | OrderStatus::Paid => None,
    };

    order
        .items
        .iter()
        .filter_map(change_for)
        .map(|change| apply_stock_change(conn, &change.for_order(order.order_id).by(Some(actor))))
        .collect()
}

/// Cash on delivery settled by the customer.
pub fn mark_paid(
    store: &Store,
    events: &EventHub,
    viewer: &Session,
    order_id: i64,
) -> Result<OrderStatus, AppError> {
    transition(store, events, viewer, order_id, |order| {
        match (order.payment_method, order.status) {
            (PaymentMethod::CashOnDelivery, OrderStatus::PendingPayment) => Ok(OrderStatus::Paid),
            _ => Err(AppError::InvalidTransition(CANNOT_UPDATE.to_string())),
        }
    })
}

/// Customer confirms delivery. Unpaid cash on delivery orders become paid,
/// paid orders complete.
pub fn confirm_received(
    store: &Store,
    events: &EventHub,
    viewer: &Session,
    order_id: i64,
) -> Result<OrderStatus, AppError> {
    transition(store, events, viewer, order_id, |order| {
        match (order.payment_method, order.status) {
            (PaymentMethod::CashOnDelivery, OrderStatus::PendingPayment) => Ok(OrderStatus::Paid),
            (_, OrderStatus::Paid) => Ok(OrderStatus::Completed),
            _ => Err(AppError::InvalidTransition(CANNOT_UPDATE.to_string())),
        }
    })
}

pub fn cancel_order(
    store: &Store,
    events: &EventHub,
    viewer: &Session,
    order_id: i64,
) -> Result<OrderStatus, AppError> {
    transition(store, events, viewer, order_id, |order| match order.status {
        OrderStatus::PendingPayment => Ok(OrderStatus::Cancelled),
        _ => Err(AppError::InvalidTransition(
            "Only orders awaiting payment can be cancelled.".to_string(),
        )),
    })
}

/// Sum of paid and completed order totals.
pub fn revenue(conn: &Connection) -> Result<f64, AppError> {
    let total: Option<f64> = conn
        .query_row(
            "SELECT SUM(total_amount) FROM orders WHERE status IN (?1, ?2)",
            params![OrderStatus::Paid.as_str(), OrderStatus::Completed.as_str()],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    Ok(round_money(total.unwrap_or(0.0)))
}

#[cfg(test)]
mod tests {
    use catalog::Role;

    use super::*;
    use crate::{
        cart::{add_to_cart, cart},
        inventory::audit_log,
    };

    const FEE: f64 = 50.0;

    fn seeded() -> Store {
        let store = Store::open_in_memory().expect("open store");
        store.seed().expect("seed");
        store
    }

    fn customer() -> Session {
        Session {
            client_id: 2,
            role: Role::User,
        }
    }

    fn address() -> Address {
        Address {
            address_details: "12 Mabini St".into(),
            barangay: "San Roque".into(),
            city: "Marikina".into(),
            province: "Metro Manila".into(),
            region: "NCR".into(),
        }
    }

    fn checkout(method: PaymentMethod, items: Vec<CheckoutLine>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            recipient_name: None,
            address: address(),
            payment_method: method,
            payment: PaymentDetails {
                gcash_phone: Some("09171234567".into()),
                gcash_pin: Some("1234".into()),
                ..Default::default()
            },
        }
    }

    fn line(inventory_id: i64, quantity: i64) -> CheckoutLine {
        CheckoutLine {
            inventory_id: Some(inventory_id),
            name: None,
            quantity,
        }
    }

    fn stock_of(store: &Store, inventory_id: i64) -> i64 {
        store
            .with_conn(|c| product(c, inventory_id))
            .expect("product")
            .current_stock
    }

    #[test]
    fn test_order_number_format() {
        let placed_at = DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp");

        assert_eq!(order_number(placed_at, 7), "ORD17000000000007");
        assert_eq!(order_number(placed_at, 12345), "ORD170000000012345");
    }

    #[tokio::test]
    async fn test_checkout_reserves_and_publishes() {
        let store = seeded();
        let hub = EventHub::new(16);
        let mut rx = hub.subscribe();

        let request = checkout(PaymentMethod::GCash, vec![line(1, 2), line(7, 1), line(1, 1)]);
        let placed = place_order(&store, &hub, FEE, 2, &request).expect("order");

        assert_eq!(placed.status, OrderStatus::Paid);
        assert_eq!(placed.subtotal, 8500.0 * 3.0 + 7800.0);
        assert_eq!(placed.total_amount, placed.subtotal + FEE);
        assert!(placed.order_number.starts_with("ORD"));
        assert!(placed.order_number.ends_with(&format!("{:04}", placed.order_id)));

        assert_eq!(stock_of(&store, 1), 7);
        assert_eq!(stock_of(&store, 7), 9);

        for expected in [1, 7] {
            match rx.recv().await.expect("inventory event") {
                StoreEvent::InventoryUpdated(event) => {
                    assert_eq!(event.inventory_id, expected);
                    assert_eq!(event.action, InventoryAction::OrderPlaced);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(matches!(
            rx.recv().await.expect("order event"),
            StoreEvent::NewOrder { order_id, .. } if order_id == placed.order_id
        ));

        let order = store
            .with_conn(|c| receipt(c, &customer(), placed.order_id))
            .expect("receipt");
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.recipient_name, "Test Client");
        assert_eq!(order.address, address());
    }

    #[test]
    fn test_checkout_is_all_or_nothing() {
        let store = seeded();
        let hub = EventHub::new(16);
        add_to_cart(&store, 2, 3, 1).expect("cart");

        let request = checkout(PaymentMethod::GCash, vec![line(1, 2), line(2, 11)]);
        let err = place_order(&store, &hub, FEE, 2, &request).unwrap_err();

        assert_eq!(err.to_string(), "Not enough stock for Butterfly Bliss. Only 10 left.");
        assert_eq!(stock_of(&store, 1), 10);
        assert!(store.with_conn(list_orders).expect("orders").is_empty());
        assert!(store.with_conn(|c| audit_log(c, 10, None)).expect("audit").is_empty());
        assert_eq!(store.with_conn(|c| cart(c, 2)).expect("cart").items.len(), 1);
    }

    #[test]
    fn test_checkout_from_cart_clears_it() {
        let store = seeded();
        let hub = EventHub::new(16);
        add_to_cart(&store, 2, 4, 2).expect("cart");

        let placed = place_order(&store, &hub, FEE, 2, &checkout(PaymentMethod::CashOnDelivery, vec![]))
            .expect("order");

        assert_eq!(placed.status, OrderStatus::PendingPayment);
        assert_eq!(stock_of(&store, 4), 8);
        assert!(store.with_conn(|c| cart(c, 2)).expect("cart").items.is_empty());
    }

    #[test]
    fn test_checkout_by_product_name() {
        let store = seeded();
        let hub = EventHub::new(16);
        let by_name = CheckoutLine {
            inventory_id: None,
            name: Some("  Auric   Veil ".into()),
            quantity: 2,
        };

        let placed = place_order(&store, &hub, FEE, 2, &checkout(PaymentMethod::GCash, vec![by_name]))
            .expect("order by name");

        assert_eq!(placed.subtotal, 7800.0 * 2.0);
        assert_eq!(stock_of(&store, 7), 8);

        let too_many = CheckoutLine {
            inventory_id: None,
            name: Some("Auric Veil".into()),
            quantity: 9,
        };
        let err = place_order(&store, &hub, FEE, 2, &checkout(PaymentMethod::GCash, vec![too_many]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Not enough stock for Auric Veil. Only 8 left.");
    }

    #[test]
    fn test_merged_lines_past_the_limit_are_rejected() {
        let store = seeded();
        let hub = EventHub::new(16);

        let request = checkout(PaymentMethod::GCash, vec![line(1, 1), line(1, i64::MAX)]);
        let err = place_order(&store, &hub, FEE, 2, &request).unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(stock_of(&store, 1), 10);

        place_order(&store, &hub, FEE, 2, &checkout(PaymentMethod::GCash, vec![line(1, 1)]))
            .expect("store still usable");
    }

    #[test]
    fn test_checkout_rejections() {
        let store = seeded();
        let hub = EventHub::new(16);

        let empty = place_order(&store, &hub, FEE, 2, &checkout(PaymentMethod::GCash, vec![]));
        assert_eq!(empty.unwrap_err().to_string(), "No items to checkout.");

        let mut no_card = checkout(PaymentMethod::CreditCard, vec![line(1, 1)]);
        no_card.payment = PaymentDetails::default();
        assert!(matches!(
            place_order(&store, &hub, FEE, 2, &no_card),
            Err(AppError::Validation(_))
        ));

        let zero = place_order(&store, &hub, FEE, 2, &checkout(PaymentMethod::GCash, vec![line(1, 0)]));
        assert!(matches!(zero, Err(AppError::Validation(_))));

        let by_name = CheckoutLine {
            inventory_id: None,
            name: Some("Imaginary Ring".into()),
            quantity: 1,
        };
        let unknown = place_order(&store, &hub, FEE, 2, &checkout(PaymentMethod::GCash, vec![by_name]));
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        let mut nowhere = checkout(PaymentMethod::GCash, vec![line(1, 1)]);
        nowhere.address = Address::default();
        assert!(matches!(
            place_order(&store, &hub, FEE, 2, &nowhere),
            Err(AppError::Validation(_))
        ));
        assert_eq!(stock_of(&store, 1), 10);
    }

    #[test]
    fn test_cash_on_delivery_lifecycle() {
        let store = seeded();
        let hub = EventHub::new(16);
        let placed = place_order(
            &store,
            &hub,
            FEE,
            2,
            &checkout(PaymentMethod::CashOnDelivery, vec![line(5, 2)]),
        )
        .expect("order");

        assert_eq!(
            mark_paid(&store, &hub, &customer(), placed.order_id).expect("paid"),
            OrderStatus::Paid
        );
        assert!(matches!(
            mark_paid(&store, &hub, &customer(), placed.order_id),
            Err(AppError::InvalidTransition(_))
        ));
        assert!(matches!(
            cancel_order(&store, &hub, &customer(), placed.order_id),
            Err(AppError::InvalidTransition(_))
        ));

        assert_eq!(
            confirm_received(&store, &hub, &customer(), placed.order_id).expect("received"),
            OrderStatus::Completed
        );
        assert_eq!(stock_of(&store, 5), 8);

        let entries = store.with_conn(|c| audit_log(c, 10, Some(5))).expect("audit");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, InventoryAction::OrderCompleted);
        assert_eq!(entries[0].previous_stock, entries[0].new_stock);
        assert_eq!(entries[0].quantity, 2);

        assert!(matches!(
            confirm_received(&store, &hub, &customer(), placed.order_id),
            Err(AppError::InvalidTransition(_))
        ));
        assert_eq!(store.with_conn(revenue).expect("revenue"), placed.total_amount);
    }

    #[test]
    fn test_received_settles_unpaid_cash_order() {
        let store = seeded();
        let hub = EventHub::new(16);
        let placed = place_order(
            &store,
            &hub,
            FEE,
            2,
            &checkout(PaymentMethod::CashOnDelivery, vec![line(6, 1)]),
        )
        .expect("order");

        assert_eq!(
            confirm_received(&store, &hub, &customer(), placed.order_id).expect("received"),
            OrderStatus::Paid
        );
    }

    #[test]
    fn test_cancel_releases_stock() {
        let store = seeded();
        let hub = EventHub::new(16);
        let placed = place_order(
            &store,
            &hub,
            FEE,
            2,
            &checkout(PaymentMethod::CashOnDelivery, vec![line(8, 3), line(9, 1)]),
        )
        .expect("order");
        assert_eq!(stock_of(&store, 8), 7);

        assert_eq!(
            cancel_order(&store, &hub, &customer(), placed.order_id).expect("cancel"),
            OrderStatus::Cancelled
        );
        assert_eq!(stock_of(&store, 8), 10);
        assert_eq!(stock_of(&store, 9), 10);

        let entries = store.with_conn(|c| audit_log(c, 10, Some(8))).expect("audit");
        assert_eq!(entries[0].action, InventoryAction::OrderCancelled);
        assert_eq!(entries[0].order_id, Some(placed.order_id));

        assert!(matches!(
            mark_paid(&store, &hub, &customer(), placed.order_id),
            Err(AppError::InvalidTransition(_))
        ));
        assert_eq!(store.with_conn(revenue).expect("revenue"), 0.0);
    }

    #[test]
    fn test_orders_are_private() {
        let store = seeded();
        let hub = EventHub::new(16);
        let placed = place_order(&store, &hub, FEE, 2, &checkout(PaymentMethod::GCash, vec![line(1, 1)]))
            .expect("order");

        let stranger = Session {
            client_id: 99,
            role: Role::User,
        };
        let admin = Session {
            client_id: 1,
            role: Role::Admin,
        };

        assert!(matches!(
            store.with_conn(|c| receipt(c, &stranger, placed.order_id)),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            cancel_order(&store, &hub, &stranger, placed.order_id),
            Err(AppError::NotFound(_))
        ));
        assert!(store.with_conn(|c| receipt(c, &admin, placed.order_id)).is_ok());

        let all = store.with_conn(list_orders).expect("orders");
        assert_eq!(all[0].customer_name, "Test Client");
    }
}
