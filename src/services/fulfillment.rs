use crate::{
    carrier::{CarrierGateway, PaymentMode, PickupShipment, TrackingUpdate},
    entities::{
        address, customer, device_transaction, offline_customer, order, order_detail, order_item,
        order_status_history, product, DeliveryStatus, DeviceDirection, OrderCustomer, OrderModel,
        OrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{self, Mailer, OutboundMail},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Fulfillment and delivery lifecycle for placed orders.
///
/// `order_status` (PENDING/APPROVED/REJECTED) and the fulfillment chain
/// (`fulfillment_status` + `delivery_status`) move independently. Every
/// actual transition appends one audit row; idempotent re-invocations are
/// accepted without touching state or history.
#[derive(Clone)]
pub struct FulfillmentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    mailer: Arc<dyn Mailer>,
    carrier: Arc<dyn CarrierGateway>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialAssignment {
    pub detail_id: Uuid,
    pub sr_no: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackResult {
    pub delivery_status: DeliveryStatus,
    pub updates: Vec<TrackingUpdate>,
}

impl FulfillmentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        mailer: Arc<dyn Mailer>,
        carrier: Arc<dyn CarrierGateway>,
    ) -> Self {
        Self {
            db,
            event_sender,
            mailer,
            carrier,
        }
    }

    /// PENDING -> APPROVED. Re-approving an approved order is accepted
    /// without error and without a duplicate audit row.
    #[instrument(skip(self))]
    pub async fn approve(
        &self,
        order_id: Uuid,
        actor: &str,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;
        let order = load_order(&txn, order_id).await?;

        if order.order_status == OrderStatus::Approved {
            txn.commit().await?;
            return Ok(order);
        }
        if order.order_status == OrderStatus::Rejected {
            return Err(ServiceError::PreconditionFailed(
                "Rejected orders cannot be approved".to_string(),
            ));
        }

        let from = order.state_label();
        let mut active: order::ActiveModel = order.into();
        active.order_status = Set(OrderStatus::Approved);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        append_history(&txn, &order, &from, actor, None).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderApproved(order.id)).await;
        self.notify_customer(
            &order,
            format!("Order {} confirmed", order.order_number),
            format!(
                "Your order {} has been confirmed and is being prepared.",
                order.order_number
            ),
        )
        .await;

        Ok(order)
    }

    /// Any state -> REJECTED. The row is kept for audit; default listings
    /// filter it out.
    #[instrument(skip(self))]
    pub async fn reject(
        &self,
        order_id: Uuid,
        actor: &str,
        reason: Option<String>,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;
        let order = load_order(&txn, order_id).await?;

        if order.order_status == OrderStatus::Rejected {
            txn.commit().await?;
            return Ok(order);
        }

        let from = order.state_label();
        let mut active: order::ActiveModel = order.into();
        active.order_status = Set(OrderStatus::Rejected);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        append_history(&txn, &order, &from, actor, reason.clone()).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderRejected {
                order_id: order.id,
                reason,
            })
            .await;

        Ok(order)
    }

    /// First delivery workflow step: marks the order fulfilled and moves
    /// delivery to Processing. A second call is an idempotent no-op.
    #[instrument(skip(self))]
    pub async fn fulfill(
        &self,
        order_id: Uuid,
        actor: &str,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;
        let order = load_order(&txn, order_id).await?;

        if order.fulfillment_status {
            txn.commit().await?;
            return Ok(order);
        }

        let from = order.state_label();
        let mut active: order::ActiveModel = order.into();
        active.fulfillment_status = Set(true);
        active.delivery_status = Set(DeliveryStatus::Processing);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        append_history(&txn, &order, &from, actor, None).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderFulfilled(order.id)).await;
        Ok(order)
    }

    /// Requires a fulfilled order; re-shipping a shipped order is a no-op.
    #[instrument(skip(self))]
    pub async fn ship(&self, order_id: Uuid, actor: &str) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;
        let order = load_order(&txn, order_id).await?;

        if order.delivery_status == DeliveryStatus::Shipped {
            txn.commit().await?;
            return Ok(order);
        }
        if !order.fulfillment_status {
            return Err(ServiceError::PreconditionFailed(
                "Order must be fulfilled before it can be shipped".to_string(),
            ));
        }

        let from = order.state_label();
        let mut active: order::ActiveModel = order.into();
        active.delivery_status = Set(DeliveryStatus::Shipped);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        append_history(&txn, &order, &from, actor, None).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderShipped {
                order_id: order.id,
                awb_number: order.awb_number.clone(),
            })
            .await;
        Ok(order)
    }

    /// Requires a shipped order.
    #[instrument(skip(self))]
    pub async fn deliver(&self, order_id: Uuid, actor: &str) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;
        let order = load_order(&txn, order_id).await?;

        if order.delivery_status == DeliveryStatus::Delivered {
            txn.commit().await?;
            return Ok(order);
        }
        if order.delivery_status != DeliveryStatus::Shipped {
            return Err(ServiceError::PreconditionFailed(
                "Order must be shipped before it can be delivered".to_string(),
            ));
        }

        let from = order.state_label();
        let mut active: order::ActiveModel = order.into();
        active.delivery_status = Set(DeliveryStatus::Delivered);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        append_history(&txn, &order, &from, actor, None).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderDelivered(order.id)).await;
        Ok(order)
    }

    /// Books a carrier pickup for the order. On success the waybill is
    /// stored and the order moves to fulfilled/Processing; on carrier
    /// failure the order is untouched.
    #[instrument(skip(self))]
    pub async fn request_pickup(
        &self,
        order_id: Uuid,
        actor: &str,
    ) -> Result<OrderModel, ServiceError> {
        let order = load_order(&*self.db, order_id).await?;
        let address = address::Entity::find_by_id(order.address_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidAddress(format!(
                    "Address {} for order {} not found",
                    order.address_id, order.order_number
                ))
            })?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;

        let mut total_weight = 0.0;
        let mut products_desc = Vec::with_capacity(items.len());
        for item in &items {
            let product = product::Entity::find_by_id(item.product_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
            total_weight += product.weight_kg * item.quantity as f64;
            products_desc.push(format!("{} x{}", product.name, item.quantity));
        }

        let payment_mode = if order.payment_status == "paid" {
            PaymentMode::Prepaid
        } else {
            PaymentMode::Cod
        };

        let shipment = PickupShipment {
            order_number: order.order_number.clone(),
            recipient_name: address.name.clone(),
            address_line: format!("{}, {}", address.address_line, address.locality),
            city: address.city.clone(),
            state: address.state.clone(),
            pincode: address.pincode.clone(),
            phone: address.mobile.clone(),
            payment_mode,
            total_amount: order.total_amount,
            weight_kg: total_weight,
            products_desc: products_desc.join(", "),
        };

        // The carrier call happens before any write; a CarrierError leaves
        // the order exactly as it was.
        let receipt = self.carrier.create_pickup(shipment).await?;

        let txn = self.db.begin().await?;
        let order = load_order(&txn, order_id).await?;
        let from = order.state_label();

        let mut active: order::ActiveModel = order.into();
        active.awb_number = Set(Some(receipt.waybill.clone()));
        active.fulfillment_status = Set(true);
        active.delivery_status = Set(DeliveryStatus::Processing);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        append_history(
            &txn,
            &order,
            &from,
            actor,
            Some(format!("pickup booked, waybill {}", receipt.waybill)),
        )
        .await?;
        txn.commit().await?;

        info!(order_number = %order.order_number, waybill = %receipt.waybill, "pickup booked");
        self.event_sender
            .send_or_log(Event::PickupRequested {
                order_id: order.id,
                awb_number: receipt.waybill,
            })
            .await;

        Ok(order)
    }

    /// Stamps serial numbers onto the order's per-unit detail rows and
    /// appends a matching OUT ledger transaction per device, permanently
    /// linking each physical unit to the order.
    #[instrument(skip(self, assignments))]
    pub async fn save_serial_numbers(
        &self,
        order_id: Uuid,
        assignments: Vec<SerialAssignment>,
    ) -> Result<(), ServiceError> {
        if assignments.is_empty() {
            return Err(ServiceError::ValidationError(
                "No serial numbers supplied".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let order = load_order(&txn, order_id).await?;

        for assignment in &assignments {
            let detail = order_detail::Entity::find_by_id(assignment.detail_id)
                .one(&txn)
                .await?
                .filter(|d| d.order_id == order.id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Detail {} does not belong to order {}",
                        assignment.detail_id, order.order_number
                    ))
                })?;

            let item = order_item::Entity::find_by_id(detail.order_item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Order item {} not found", detail.order_item_id))
                })?;

            let product = product::Entity::find_by_id(detail.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", detail.product_id))
                })?;

            let mut detail: order_detail::ActiveModel = detail.into();
            detail.sr_no = Set(Some(assignment.sr_no.clone()));
            detail.update(&txn).await?;

            device_transaction::ActiveModel {
                id: Set(Uuid::new_v4()),
                device_srno: Set(assignment.sr_no.clone()),
                device_name: Set(product.name.clone()),
                sku: Set(product.sku.clone()),
                order_id: Set(Some(order.id)),
                direction: Set(DeviceDirection::Out),
                price: Set(Some(item.unit_price)),
                remarks: Set(Some(format!("sold via order {}", order.order_number))),
                created_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Syncs delivery status from the carrier's scan history. Statuses the
    /// mapping does not recognize leave the order unchanged.
    #[instrument(skip(self))]
    pub async fn track_order(&self, order_id: Uuid) -> Result<TrackResult, ServiceError> {
        let order = load_order(&*self.db, order_id).await?;
        let waybill = order.awb_number.clone().ok_or_else(|| {
            ServiceError::PreconditionFailed(format!(
                "Order {} has no waybill; request a pickup first",
                order.order_number
            ))
        })?;

        let updates = self.carrier.track(&waybill).await?;

        let mapped = updates
            .first()
            .and_then(|update| map_carrier_status(&update.status));

        let delivery_status = match mapped {
            Some(status) if status != order.delivery_status => {
                let txn = self.db.begin().await?;
                let order = load_order(&txn, order_id).await?;
                let from = order.state_label();

                let mut active: order::ActiveModel = order.into();
                active.delivery_status = Set(status);
                active.updated_at = Set(Utc::now());
                let order = active.update(&txn).await?;

                append_history(&txn, &order, &from, "carrier-sync", None).await?;
                txn.commit().await?;
                status
            }
            Some(status) => status,
            None => order.delivery_status,
        };

        Ok(TrackResult {
            delivery_status,
            updates,
        })
    }

    async fn notify_customer(&self, order: &OrderModel, subject: String, body: String) {
        let email = match order.customer() {
            Some(OrderCustomer::Online(id)) => customer::Entity::find_by_id(id)
                .one(&*self.db)
                .await
                .ok()
                .flatten()
                .map(|c| c.email),
            Some(OrderCustomer::Offline(id)) => offline_customer::Entity::find_by_id(id)
                .one(&*self.db)
                .await
                .ok()
                .flatten()
                .and_then(|c| c.email),
            None => None,
        };

        if let Some(to) = email {
            notifications::send_or_log(self.mailer.as_ref(), OutboundMail::new(to, subject, body))
                .await;
        }
    }
}

async fn load_order<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> Result<OrderModel, ServiceError> {
    order::Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

async fn append_history<C: ConnectionTrait>(
    conn: &C,
    order: &OrderModel,
    from: &str,
    actor: &str,
    reason: Option<String>,
) -> Result<(), ServiceError> {
    order_status_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        from_state: Set(from.to_string()),
        to_state: Set(order.state_label()),
        actor: Set(actor.to_string()),
        reason: Set(reason),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Maps carrier scan status strings onto the delivery status chain.
pub fn map_carrier_status(status: &str) -> Option<DeliveryStatus> {
    let status = status.to_ascii_lowercase();
    if status.contains("delivered") {
        Some(DeliveryStatus::Delivered)
    } else if status.contains("in transit") || status.contains("in-transit") {
        Some(DeliveryStatus::InTransit)
    } else if status.contains("dispatched") || status.contains("shipped") {
        Some(DeliveryStatus::Shipped)
    } else if status.contains("manifested") || status.contains("picked up") {
        Some(DeliveryStatus::Processing)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carrier_status_mapping() {
        assert_eq!(map_carrier_status("Delivered"), Some(DeliveryStatus::Delivered));
        assert_eq!(map_carrier_status("In Transit"), Some(DeliveryStatus::InTransit));
        assert_eq!(map_carrier_status("Dispatched"), Some(DeliveryStatus::Shipped));
        assert_eq!(
            map_carrier_status("Manifested"),
            Some(DeliveryStatus::Processing)
        );
        assert_eq!(map_carrier_status("Lost In Space"), None);
    }
}
