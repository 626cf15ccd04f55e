use catalog::OrderStatus;
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    accounts::{Account, list_clients},
    error::AppError,
    feedback::{Feedback, list_feedback},
    inventory::{Product, list_products},
    orders::{Order, list_orders, revenue},
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_clients: usize,
    pub total_orders: usize,
    pub pending_orders: usize,
    pub low_stock_items: usize,
    pub out_of_stock_items: usize,
    pub revenue: f64,
}

#[derive(Serialize, Debug, Clone)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub clients: Vec<Account>,
    pub orders: Vec<Order>,
    pub inventory: Vec<Product>,
    pub feedback: Vec<Feedback>,
}

pub fn dashboard(conn: &Connection) -> Result<Dashboard, AppError> {
    let clients = list_clients(conn)?;
    let orders = list_orders(conn)?;
    let inventory = list_products(conn)?;
    let feedback = list_feedback(conn)?;

    let stats = DashboardStats {
        total_clients: clients.len(),
        total_orders: orders.len(),
        pending_orders: orders
            .iter()
            .filter(|o| o.status == OrderStatus::PendingPayment)
            .count(),
        low_stock_items: inventory.iter().filter(|p| p.low_stock).count(),
        out_of_stock_items: inventory.iter().filter(|p| !p.in_stock).count(),
        revenue: revenue(conn)?,
    };

    Ok(Dashboard {
        stats,
        clients,
        orders,
        inventory,
        feedback,
    })
}
