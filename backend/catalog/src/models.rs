use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Ring,
    Bracelet,
    Necklace,
    Earring,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Ring,
        Category::Bracelet,
        Category::Necklace,
        Category::Earring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ring => "Ring",
            Category::Bracelet => "Bracelet",
            Category::Necklace => "Necklace",
            Category::Earring => "Earring",
        }
    }

    /// Collection slug used in `/collections/{slug}`.
    pub fn slug(&self) -> &'static str {
        match self {
            Category::Ring => "rings",
            Category::Bracelet => "bracelets",
            Category::Necklace => "necklaces",
            Category::Earring => "earrings",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts both the singular name ("Ring") and the collection slug ("rings").
impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();

        Category::ALL
            .into_iter()
            .find(|category| {
                lowered == category.slug() || lowered == category.as_str().to_ascii_lowercase()
            })
            .ok_or_else(|| ParseError::new("category", s))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseError::new("role", s)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    #[serde(rename = "Cash on Delivery")]
    CashOnDelivery,
    #[serde(rename = "Credit Card")]
    CreditCard,
    #[serde(rename = "GCash")]
    GCash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::GCash => "GCash",
        }
    }

    /// Cash on delivery starts unpaid, every other method is settled at checkout.
    pub fn initial_status(&self) -> OrderStatus {
        match self {
            PaymentMethod::CashOnDelivery => OrderStatus::PendingPayment,
            _ => OrderStatus::Paid,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Cash on Delivery" => Ok(PaymentMethod::CashOnDelivery),
            "Credit Card" => Ok(PaymentMethod::CreditCard),
            "GCash" => Ok(PaymentMethod::GCash),
            _ => Err(ParseError::new("payment method", s)),
        }
    }
}

/// Payment fields collected at checkout. Checked for presence, never persisted.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct PaymentDetails {
    pub cc_number: Option<String>,
    pub cc_expiry: Option<String>,
    pub cc_cvc: Option<String>,
    pub gcash_phone: Option<String>,
    pub gcash_pin: Option<String>,
}

impl PaymentDetails {
    pub fn missing_fields_message(&self, method: PaymentMethod) -> Option<&'static str> {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.trim().is_empty());

        match method {
            PaymentMethod::CashOnDelivery => None,
            PaymentMethod::CreditCard => {
                if present(&self.cc_number) && present(&self.cc_expiry) && present(&self.cc_cvc) {
                    None
                } else {
                    Some("Please provide all credit card details.")
                }
            }
            PaymentMethod::GCash => {
                if present(&self.gcash_phone) && present(&self.gcash_pin) {
                    None
                } else {
                    Some("Please provide GCash phone number and PIN.")
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    #[serde(rename = "Pending Payment")]
    PendingPayment,
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "Pending Payment",
            OrderStatus::Paid => "Paid",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::PendingPayment, OrderStatus::Paid)
                | (OrderStatus::PendingPayment, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Completed)
        )
    }

    /// Orders a customer may review products from.
    pub fn is_settled(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending Payment" => Ok(OrderStatus::PendingPayment),
            "Paid" => Ok(OrderStatus::Paid),
            "Completed" => Ok(OrderStatus::Completed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(ParseError::new("order status", s)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryAction {
    #[serde(rename = "Manual Stock Adjustment")]
    ManualAdjustment,
    #[serde(rename = "Inventory Update")]
    InventoryUpdate,
    #[serde(rename = "Order Placed")]
    OrderPlaced,
    #[serde(rename = "Order Completed")]
    OrderCompleted,
    #[serde(rename = "Order Cancelled")]
    OrderCancelled,
    #[serde(rename = "Stock Restock")]
    Restock,
}

impl InventoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryAction::ManualAdjustment => "Manual Stock Adjustment",
            InventoryAction::InventoryUpdate => "Inventory Update",
            InventoryAction::OrderPlaced => "Order Placed",
            InventoryAction::OrderCompleted => "Order Completed",
            InventoryAction::OrderCancelled => "Order Cancelled",
            InventoryAction::Restock => "Stock Restock",
        }
    }
}

impl fmt::Display for InventoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Manual Stock Adjustment" => Ok(InventoryAction::ManualAdjustment),
            "Inventory Update" => Ok(InventoryAction::InventoryUpdate),
            "Order Placed" => Ok(InventoryAction::OrderPlaced),
            "Order Completed" => Ok(InventoryAction::OrderCompleted),
            "Order Cancelled" => Ok(InventoryAction::OrderCancelled),
            "Stock Restock" => Ok(InventoryAction::Restock),
            _ => Err(ParseError::new("inventory action", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_slugs_and_names() {
        assert_eq!("rings".parse::<Category>(), Ok(Category::Ring));
        assert_eq!("Necklace".parse::<Category>(), Ok(Category::Necklace));
        assert_eq!(" EARRINGS ".parse::<Category>(), Ok(Category::Earring));
        assert!("anklets".parse::<Category>().is_err());
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(
            PaymentMethod::CashOnDelivery.initial_status(),
            OrderStatus::PendingPayment
        );
        assert_eq!(PaymentMethod::GCash.initial_status(), OrderStatus::Paid);
        assert_eq!(PaymentMethod::CreditCard.initial_status(), OrderStatus::Paid);
    }

    #[test]
    fn test_status_transitions() {
        use OrderStatus::*;

        assert!(PendingPayment.can_transition_to(Paid));
        assert!(PendingPayment.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Completed));

        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Paid));
        assert!(!Cancelled.can_transition_to(Paid));
        assert!(!PendingPayment.can_transition_to(Completed));
    }

    #[test]
    fn test_payment_details() {
        let empty = PaymentDetails::default();
        assert!(
            empty
                .missing_fields_message(PaymentMethod::CashOnDelivery)
                .is_none()
        );
        assert!(empty.missing_fields_message(PaymentMethod::CreditCard).is_some());
        assert!(empty.missing_fields_message(PaymentMethod::GCash).is_some());

        let card = PaymentDetails {
            cc_number: Some("4111111111111111".into()),
            cc_expiry: Some("12/30".into()),
            cc_cvc: Some("   ".into()),
            ..Default::default()
        };
        assert!(card.missing_fields_message(PaymentMethod::CreditCard).is_some());

        let gcash = PaymentDetails {
            gcash_phone: Some("09171234567".into()),
            gcash_pin: Some("1234".into()),
            ..Default::default()
        };
        assert!(gcash.missing_fields_message(PaymentMethod::GCash).is_none());
    }

    #[test]
    fn test_stored_text_round_trips() {
        for action in [
            InventoryAction::ManualAdjustment,
            InventoryAction::InventoryUpdate,
            InventoryAction::OrderPlaced,
            InventoryAction::OrderCompleted,
            InventoryAction::OrderCancelled,
            InventoryAction::Restock,
        ] {
            assert_eq!(action.as_str().parse::<InventoryAction>(), Ok(action));
        }

        assert_eq!(
            "Pending Payment".parse::<OrderStatus>(),
            Ok(OrderStatus::PendingPayment)
        );
        assert!("Shipped".parse::<OrderStatus>().is_err());
    }
}
