use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the services after their transaction commits. Delivery
/// is best effort; dropping an event never fails the operation that raised
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order lifecycle
    OrderPlaced {
        order_id: Uuid,
        order_number: String,
        total_amount: Decimal,
    },
    OrderApproved(Uuid),
    OrderRejected {
        order_id: Uuid,
        reason: Option<String>,
    },
    OrderFulfilled(Uuid),
    OrderShipped {
        order_id: Uuid,
        awb_number: Option<String>,
    },
    OrderDelivered(Uuid),

    // Cart events
    CartItemAdded {
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartCleared(Uuid),

    // Logistics events
    PickupRequested {
        order_id: Uuid,
        awb_number: String,
    },

    // Inventory events
    StockAlert {
        color_id: Uuid,
        product_name: String,
        stock_quantity: i32,
        reorder_threshold: i32,
    },
    DeviceRecorded {
        device_srno: String,
        direction: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Creates a bounded event channel pair.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

// Drains the event channel and logs each event. Side-effectful consumers
// (mail, webhooks) subscribe here rather than inside the services.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced {
                order_id,
                order_number,
                total_amount,
            } => {
                info!(%order_id, %order_number, %total_amount, "order placed");
            }
            Event::OrderRejected { order_id, reason } => {
                info!(%order_id, ?reason, "order rejected");
            }
            Event::StockAlert {
                color_id,
                product_name,
                stock_quantity,
                reorder_threshold,
            } => {
                warn!(
                    %color_id,
                    product_name,
                    stock_quantity,
                    reorder_threshold,
                    "stock below reorder threshold"
                );
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (sender, rx) = event_channel(1);
        drop(rx);
        // Must not panic or error out.
        sender.send_or_log(Event::OrderApproved(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (sender, mut rx) = event_channel(4);
        let id = Uuid::new_v4();
        sender.send(Event::OrderFulfilled(id)).await.unwrap();
        match rx.recv().await {
            Some(Event::OrderFulfilled(got)) => assert_eq!(got, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
