//! # Live Events
//!
//! Inventory and order changes fanned out to every connected dashboard.
//!
//! - Producers call [`EventHub::publish`] only after their transaction commits,
//!   so observers never see a change that was rolled back.
//! - `GET /ws` upgrades to a WebSocket and streams each [`StoreEvent`] as one
//!   JSON text frame: `{"event": "...", "data": {...}}`.
//! - A subscriber that falls behind the channel capacity skips ahead to the
//!   newest event instead of disconnecting.
use std::sync::Arc;

use axum::{
    extract::{
        State as AxumState,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use catalog::{Category, InventoryAction, OrderStatus};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::state::State;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InventoryEvent {
    pub inventory_id: i64,
    pub name: String,
    pub category: Category,
    pub product_code: String,
    pub current_stock: i64,
    pub previous_stock: i64,
    pub action: InventoryAction,
    pub quantity: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StoreEvent {
    InventoryUpdated(InventoryEvent),
    NewOrder {
        order_id: i64,
        order_number: String,
        total: f64,
    },
    OrderStatus {
        order_id: i64,
        status: OrderStatus,
    },
}

#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self { sender }
    }

    /// Delivers to current subscribers. Having none is fine.
    pub fn publish(&self, event: StoreEvent) {
        #[cfg(feature = "verbose")]
        debug!("Publishing {:?}", event);

        if self.sender.send(event).is_err() {
            debug!("No live subscribers");
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = StoreEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<Arc<State>>,
) -> impl IntoResponse {
    let events = state.events.subscribe();

    ws.on_upgrade(move |socket| stream_events(socket, events))
}

/// Next event for one subscriber, skipping past anything it lagged behind on.
/// `None` once the hub is gone.
async fn next_event(events: &mut broadcast::Receiver<StoreEvent>) -> Option<StoreEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Live feed subscriber lagged, skipped {skipped} events");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn stream_events(socket: WebSocket, mut events: broadcast::Receiver<StoreEvent>) {
    let (mut sender, mut receiver) = socket.split();
    info!("Live feed subscriber connected");

    loop {
        tokio::select! {
            event = next_event(&mut events) => match event {
                Some(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Failed to encode event: {e}");
                            continue;
                        }
                    };

                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("Live feed subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn sample_inventory_event() -> InventoryEvent {
        InventoryEvent {
            inventory_id: 7,
            name: "Auric Veil".into(),
            category: Category::Bracelet,
            product_code: "BG001".into(),
            current_stock: 8,
            previous_stock: 10,
            action: InventoryAction::OrderPlaced,
            quantity: 2,
        }
    }

    #[test]
    fn test_wire_shape() {
        let event = StoreEvent::InventoryUpdated(sample_inventory_event());
        let value: Value = serde_json::to_value(&event).expect("serialize");

        assert_eq!(value["event"], "inventory_updated");
        assert_eq!(value["data"]["product_code"], "BG001");
        assert_eq!(value["data"]["action"], "Order Placed");
        assert_eq!(value["data"]["category"], "Bracelet");

        let status = StoreEvent::OrderStatus {
            order_id: 3,
            status: OrderStatus::PendingPayment,
        };
        assert_eq!(
            serde_json::to_value(&status).expect("serialize"),
            json!({"event": "order_status", "data": {"order_id": 3, "status": "Pending Payment"}})
        );
    }

    #[test]
    fn test_new_order_wire_shape() {
        let event = StoreEvent::NewOrder {
            order_id: 4,
            order_number: "ORD17000000000004".into(),
            total: 8550.0,
        };

        assert_eq!(
            serde_json::to_value(&event).expect("serialize"),
            json!({
                "event": "new_order",
                "data": {"order_id": 4, "order_number": "ORD17000000000004", "total": 8550.0}
            })
        );
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let hub = EventHub::new(1);
        let mut rx = hub.subscribe();

        for order_id in 1..=3 {
            hub.publish(StoreEvent::OrderStatus {
                order_id,
                status: OrderStatus::Paid,
            });
        }
        assert!(matches!(
            next_event(&mut rx).await,
            Some(StoreEvent::OrderStatus { order_id: 3, .. })
        ));

        hub.publish(StoreEvent::OrderStatus {
            order_id: 4,
            status: OrderStatus::Completed,
        });
        assert!(matches!(
            next_event(&mut rx).await,
            Some(StoreEvent::OrderStatus { order_id: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_hub_ends_stream() {
        let hub = EventHub::new(4);
        let mut rx = hub.subscribe();
        drop(hub);

        assert!(next_event(&mut rx).await.is_none());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = EventHub::new(4);

        hub.publish(StoreEvent::OrderStatus {
            order_id: 1,
            status: OrderStatus::Paid,
        });
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let hub = EventHub::new(8);
        let mut rx = hub.subscribe();

        hub.publish_all([
            StoreEvent::InventoryUpdated(sample_inventory_event()),
            StoreEvent::NewOrder {
                order_id: 1,
                order_number: "ORD17000000000001".into(),
                total: 7850.0,
            },
        ]);

        assert!(matches!(
            rx.recv().await.expect("first"),
            StoreEvent::InventoryUpdated(_)
        ));
        assert!(matches!(
            rx.recv().await.expect("second"),
            StoreEvent::NewOrder { order_id: 1, .. }
        ));
    }
}
