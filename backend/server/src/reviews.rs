use catalog::OrderStatus;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    database::{is_constraint_violation, text_column},
    error::AppError,
    utils::{reviewer_display_name, sanitize},
};

const NOT_PURCHASED: &str = "You can only review products you have purchased and received.";
const ALREADY_REVIEWED: &str = "You have already reviewed this product.";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ReviewRequest {
    pub product_name: Option<String>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
    pub order_id: Option<i64>,
    #[serde(default)]
    pub anonymous: bool,
}

/// Review as shown on a product page.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProductReview {
    pub review_id: i64,
    pub display_name: String,
    pub rating: i64,
    pub comment: String,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

/// Review as listed on the reviewer's own account page.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ClientReview {
    pub review_id: i64,
    pub order_id: i64,
    pub product_name: String,
    pub rating: i64,
    pub comment: String,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

pub fn product_reviews(conn: &Connection, product_name: &str) -> Result<Vec<ProductReview>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT r.review_id, r.user_id, COALESCE(c.full_name, ''), r.rating, r.comment,
                r.anonymous, r.created_at
         FROM reviews r
         LEFT JOIN clients c ON c.client_id = r.user_id
         WHERE r.product_name = ?1
         ORDER BY r.created_at DESC, r.review_id DESC",
    )?;

    let reviews = stmt
        .query_map([product_name], |row| {
            let user_id: i64 = row.get(1)?;
            let full_name: String = row.get(2)?;
            let anonymous: bool = row.get(5)?;

            Ok(ProductReview {
                review_id: row.get(0)?,
                display_name: reviewer_display_name(&full_name, user_id, anonymous),
                rating: row.get(3)?,
                comment: row.get(4)?,
                anonymous,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(reviews)
}

pub fn client_reviews(conn: &Connection, client_id: i64) -> Result<Vec<ClientReview>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT review_id, order_id, product_name, rating, comment, anonymous, created_at
         FROM reviews WHERE user_id = ?1
         ORDER BY created_at DESC, review_id DESC",
    )?;

    let reviews = stmt
        .query_map([client_id], |row| {
            Ok(ClientReview {
                review_id: row.get(0)?,
                order_id: row.get(1)?,
                product_name: row.get(2)?,
                rating: row.get(3)?,
                comment: row.get(4)?,
                anonymous: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(reviews)
}

/// Stores one review per customer and product, only for goods from a settled order.
pub fn submit_review(
    conn: &Connection,
    client_id: i64,
    request: &ReviewRequest,
) -> Result<i64, AppError> {
    let product_name = request.product_name.as_deref().map(sanitize).unwrap_or_default();
    let comment = request.comment.as_deref().map(str::trim).unwrap_or_default();

    let (Some(rating), Some(order_id)) = (request.rating, request.order_id) else {
        return Err(AppError::validation("Please fill out all fields."));
    };
    if product_name.is_empty() || comment.is_empty() {
        return Err(AppError::validation("Please fill out all fields."));
    }
    if !(1..=5).contains(&rating) {
        return Err(AppError::validation("Rating must be between 1 and 5."));
    }

    let status: Option<OrderStatus> = conn
        .query_row(
            "SELECT o.status FROM orders o
             WHERE o.order_id = ?1 AND o.client_id = ?2
               AND EXISTS (SELECT 1 FROM order_items i
                           WHERE i.order_id = o.order_id AND i.product_name = ?3)",
            params![order_id, client_id, product_name],
            |row| text_column(row, 0),
        )
        .optional()?;

    if !status.is_some_and(|s| s.is_settled()) {
        return Err(AppError::forbidden(NOT_PURCHASED));
    }

    let duplicate = conn
        .query_row(
            "SELECT 1 FROM reviews WHERE user_id = ?1 AND product_name = ?2",
            params![client_id, product_name],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if duplicate {
        return Err(AppError::conflict(ALREADY_REVIEWED));
    }

    conn.execute(
        "INSERT INTO reviews (user_id, order_id, product_name, rating, comment, anonymous, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            client_id,
            order_id,
            product_name,
            rating,
            comment,
            request.anonymous,
            Utc::now()
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::conflict(ALREADY_REVIEWED)
        } else {
            e.into()
        }
    })?;

    let review_id = conn.last_insert_rowid();
    info!(review_id, client_id, product = %product_name, rating, "Review submitted");

    Ok(review_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Store;

    const CLIENT: i64 = 2;

    fn store_with_order(status: OrderStatus) -> Store {
        let store = Store::open_in_memory().expect("open store");
        store.seed().expect("seed");
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO orders (client_id, order_number, status, recipient_name, subtotal,
                     shipping_fee, total_amount, shipping_address, payment_method, created_at)
                     VALUES (?1, 'ORD1', ?2, 'Test Client', 8500, 50, 8550, 'addr', 'GCash', ?3)",
                    params![CLIENT, status.as_str(), Utc::now()],
                )?;
                conn.execute(
                    "INSERT INTO order_items (order_id, inventory_id, product_name, quantity, unit_price)
                     VALUES (1, 1, 'Opulent Eternity', 1, 8500)",
                    [],
                )?;
                Ok(())
            })
            .expect("order fixture");
        store
    }

    fn request(product_name: &str) -> ReviewRequest {
        ReviewRequest {
            product_name: Some(product_name.into()),
            rating: Some(5),
            comment: Some("Stunning piece".into()),
            order_id: Some(1),
            anonymous: false,
        }
    }

    #[test]
    fn test_review_settled_order() {
        let store = store_with_order(OrderStatus::Paid);

        store
            .with_conn(|conn| submit_review(conn, CLIENT, &request("Opulent Eternity")))
            .expect("review");

        let reviews = store
            .with_conn(|conn| product_reviews(conn, "Opulent Eternity"))
            .expect("reviews");
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].display_name, "Test Client T.");

        let again = store.with_conn(|conn| submit_review(conn, CLIENT, &request("Opulent Eternity")));
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_review_requires_purchase() {
        let store = store_with_order(OrderStatus::PendingPayment);

        let pending = store.with_conn(|conn| submit_review(conn, CLIENT, &request("Opulent Eternity")));
        assert!(matches!(pending, Err(AppError::Forbidden(_))));

        let other_product = store.with_conn(|conn| submit_review(conn, CLIENT, &request("Auric Veil")));
        assert!(matches!(other_product, Err(AppError::Forbidden(_))));

        let other_client = store.with_conn(|conn| submit_review(conn, 1, &request("Opulent Eternity")));
        assert!(matches!(other_client, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_review_validation() {
        let store = store_with_order(OrderStatus::Completed);

        let mut bad_rating = request("Opulent Eternity");
        bad_rating.rating = Some(6);
        let mut no_comment = request("Opulent Eternity");
        no_comment.comment = Some("  ".into());

        for invalid in [bad_rating, no_comment, ReviewRequest::default()] {
            let result = store.with_conn(|conn| submit_review(conn, CLIENT, &invalid));
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[test]
    fn test_anonymous_review_hides_name() {
        let store = store_with_order(OrderStatus::Completed);
        let mut anonymous = request("Opulent Eternity");
        anonymous.anonymous = true;

        store
            .with_conn(|conn| submit_review(conn, CLIENT, &anonymous))
            .expect("review");

        let reviews = store
            .with_conn(|conn| client_reviews(conn, CLIENT))
            .expect("reviews");
        assert!(reviews[0].anonymous);

        let shown = store
            .with_conn(|conn| product_reviews(conn, "Opulent Eternity"))
            .expect("reviews");
        assert!(shown[0].display_name.starts_with("T-"));
        assert!(!shown[0].display_name.contains("Client"));
    }
}
