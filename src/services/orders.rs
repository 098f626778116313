use crate::{
    entities::{
        address, cart, cart_item, order, order_detail, order_item, order_sequence, product,
        product_color, Channel, DeliveryStatus, OrderCustomer, OrderDetailModel, OrderItemModel,
        OrderModel, OrderStatus, OrderStatusHistoryModel, SEQUENCE_ROW_ID,
    },
    entities::order_status_history,
    entities::offline_customer,
    errors::ServiceError,
    events::{Event, EventSender},
    notifications::{self, Mailer, OutboundMail},
    services::delivery::DeliveryChargeCalculator,
    services::pricing::resolve_price,
};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Divisor for backing GST out of a tax-inclusive subtotal (18% GST).
const GST_DIVISOR: Decimal = dec!(1.18);

/// Order placement and read side.
///
/// All three placement entries (cart checkout, direct purchase, admin
/// offline order) run the same core inside one transaction: upfront stock
/// check, price snapshot, order number allocation, conditional stock
/// decrement, detail expansion. Either everything commits or nothing does.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    mailer: Arc<dyn Mailer>,
    delivery: DeliveryChargeCalculator,
    alert_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlaceOrderInput {
    pub address_id: Uuid,
    pub payment_status: String,
    pub delivery_method: String,
    #[validate(custom = "validate_discount")]
    pub discount_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DirectPurchaseInput {
    pub product_id: Uuid,
    pub model_id: Option<Uuid>,
    pub color_id: Option<Uuid>,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
    pub address_id: Uuid,
    pub payment_status: String,
    pub delivery_method: String,
    #[validate(custom = "validate_discount")]
    pub discount_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OfflineOrderInput {
    pub offline_customer_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<OfflineOrderItemInput>,
    pub payment_status: String,
    pub delivery_method: String,
    #[validate(custom = "validate_discount")]
    pub discount_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineOrderItemInput {
    pub product_id: Uuid,
    pub model_id: Option<Uuid>,
    pub color_id: Option<Uuid>,
    pub quantity: i32,
    pub discount_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilters {
    pub order_status: Option<OrderStatus>,
    pub delivery_status: Option<DeliveryStatus>,
    pub channel: Option<Channel>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Rejected orders are kept but hidden from listings unless asked for.
    #[serde(default)]
    pub include_rejected: bool,
}

/// An order expanded with its items, per-unit details, and audit history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemView>,
    pub history: Vec<OrderStatusHistoryModel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: OrderItemModel,
    pub details: Vec<OrderDetailModel>,
}

/// A validated, price-snapshotted order line ready for persistence.
struct OrderLine {
    product_id: Uuid,
    model_id: Option<Uuid>,
    color_id: Option<Uuid>,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    discount_percent: Decimal,
}

impl OrderLine {
    fn line_total(&self) -> Decimal {
        let gross = self.unit_price * Decimal::from(self.quantity);
        (gross - gross * self.discount_percent / dec!(100)).round_dp(2)
    }
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        mailer: Arc<dyn Mailer>,
        delivery: DeliveryChargeCalculator,
        alert_email: Option<String>,
    ) -> Self {
        Self {
            db,
            event_sender,
            mailer,
            delivery,
            alert_email,
        }
    }

    /// Checks out the customer's cart into an order. The whole sequence,
    /// including the stock decrements and the cart drain, is one
    /// transaction.
    #[instrument(skip(self, input))]
    pub async fn place_order(
        &self,
        customer_id: Uuid,
        input: PlaceOrderInput,
    ) -> Result<OrderView, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let cart = cart::Entity::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&txn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;

        let cart_lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&txn)
            .await?;
        if cart_lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        verify_address_owner(&txn, input.address_id, OrderCustomer::Online(customer_id)).await?;

        let mut lines = Vec::with_capacity(cart_lines.len());
        for cart_line in &cart_lines {
            lines.push(
                self.snapshot_line(
                    &txn,
                    cart_line.product_id,
                    cart_line.model_id,
                    cart_line.color_id,
                    cart_line.quantity,
                    Decimal::ZERO,
                )
                .await?,
            );
        }

        let order = create_order_core(
            &txn,
            OrderCustomer::Online(customer_id),
            input.address_id,
            lines,
            Channel::Online,
            &input.payment_status,
            &input.delivery_method,
            input.discount_percent.unwrap_or(Decimal::ZERO),
            &self.delivery,
        )
        .await?;

        // Drain the cart inside the same transaction so a rollback also
        // restores the cart.
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        let mut cart: cart::ActiveModel = cart.into();
        cart.total_price = Set(Decimal::ZERO);
        cart.updated_at = Set(Utc::now());
        cart.update(&txn).await?;

        txn.commit().await?;

        self.after_placement(&order).await;
        self.get_order(order.id).await
    }

    /// "Buy now": a single selection placed without a cart, through the same
    /// core sequence.
    #[instrument(skip(self, input))]
    pub async fn direct_purchase(
        &self,
        customer_id: Uuid,
        input: DirectPurchaseInput,
    ) -> Result<OrderView, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        verify_address_owner(&txn, input.address_id, OrderCustomer::Online(customer_id)).await?;

        let line = self
            .snapshot_line(
                &txn,
                input.product_id,
                input.model_id,
                input.color_id,
                input.quantity,
                Decimal::ZERO,
            )
            .await?;

        let order = create_order_core(
            &txn,
            OrderCustomer::Online(customer_id),
            input.address_id,
            vec![line],
            Channel::Online,
            &input.payment_status,
            &input.delivery_method,
            input.discount_percent.unwrap_or(Decimal::ZERO),
            &self.delivery,
        )
        .await?;

        txn.commit().await?;

        self.after_placement(&order).await;
        self.get_order(order.id).await
    }

    /// Admin-recorded in-store sale. The offline customer's default address
    /// is used and per-line discounts are honored.
    #[instrument(skip(self, input))]
    pub async fn create_offline_order(
        &self,
        input: OfflineOrderInput,
    ) -> Result<OrderView, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let customer = offline_customer::Entity::find_by_id(input.offline_customer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Offline customer {} not found",
                    input.offline_customer_id
                ))
            })?;

        let address = address::Entity::find()
            .filter(address::Column::OfflineCustomerId.eq(customer.id))
            .order_by_asc(address::Column::CreatedAt)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidAddress(format!(
                    "Offline customer {} has no address on file",
                    customer.id
                ))
            })?;

        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            if item.quantity < 1 {
                return Err(ServiceError::ValidationError(
                    "Quantity must be at least 1".to_string(),
                ));
            }
            if let Some(discount) = item.discount_percent {
                validate_discount(&discount)
                    .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
            }
            lines.push(
                self.snapshot_line(
                    &txn,
                    item.product_id,
                    item.model_id,
                    item.color_id,
                    item.quantity,
                    item.discount_percent.unwrap_or(Decimal::ZERO),
                )
                .await?,
            );
        }

        let order = create_order_core(
            &txn,
            OrderCustomer::Offline(customer.id),
            address.id,
            lines,
            Channel::Offline,
            &input.payment_status,
            &input.delivery_method,
            input.discount_percent.unwrap_or(Decimal::ZERO),
            &self.delivery,
        )
        .await?;

        txn.commit().await?;

        self.after_placement(&order).await;
        self.get_order(order.id).await
    }

    /// Fetches one order with items, per-unit details, and history.
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderView, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let details = order_detail::Entity::find()
            .filter(order_detail::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;

        let history = order_status_history::Entity::find()
            .filter(order_status_history::Column::OrderId.eq(order.id))
            .order_by_asc(order_status_history::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let items = items
            .into_iter()
            .map(|item| {
                let details = details
                    .iter()
                    .filter(|d| d.order_item_id == item.id)
                    .cloned()
                    .collect();
                OrderItemView { item, details }
            })
            .collect();

        Ok(OrderView {
            order,
            items,
            history,
        })
    }

    /// Lists orders newest first. Rejected orders are excluded unless
    /// `include_rejected` is set.
    pub async fn list_orders(
        &self,
        filters: OrderFilters,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        let mut query = order::Entity::find();

        if let Some(status) = filters.order_status {
            query = query.filter(order::Column::OrderStatus.eq(status));
        } else if !filters.include_rejected {
            query = query.filter(order::Column::OrderStatus.ne(OrderStatus::Rejected));
        }
        if let Some(delivery_status) = filters.delivery_status {
            query = query.filter(order::Column::DeliveryStatus.eq(delivery_status));
        }
        if let Some(channel) = filters.channel {
            query = query.filter(order::Column::Channel.eq(channel));
        }
        if let Some(from) = filters.from {
            query = query.filter(order::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filters.to {
            query = query.filter(order::Column::CreatedAt.lte(to));
        }

        Ok(query
            .order_by_desc(order::Column::OrderIndex)
            .all(&*self.db)
            .await?)
    }

    async fn snapshot_line(
        &self,
        txn: &DatabaseTransaction,
        product_id: Uuid,
        model_id: Option<Uuid>,
        color_id: Option<Uuid>,
        quantity: i32,
        discount_percent: Decimal,
    ) -> Result<OrderLine, ServiceError> {
        let quote = resolve_price(txn, product_id, model_id, color_id).await?;
        let product = product::Entity::find_by_id(product_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if let Some(stock) = quote.available_stock {
            if quantity > stock {
                return Err(ServiceError::InsufficientStock(format!(
                    "Only {} of '{}' available",
                    stock, product.name
                )));
            }
        }

        Ok(OrderLine {
            product_id,
            model_id,
            color_id: quote.color_id,
            product_name: product.name,
            quantity,
            unit_price: quote.unit_price,
            discount_percent,
        })
    }

    /// Post-commit side effects. Both are best effort; the order is already
    /// durable.
    async fn after_placement(&self, order: &OrderModel) {
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_amount,
            "order placed"
        );

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                order_number: order.order_number.clone(),
                total_amount: order.total_amount,
            })
            .await;

        if let Some(to) = &self.alert_email {
            let mail = OutboundMail::new(
                to.clone(),
                format!("New order {}", order.order_number),
                format!(
                    "Order {} placed for {} ({} items).",
                    order.order_number, order.total_amount, order.total_items
                ),
            );
            notifications::send_or_log(self.mailer.as_ref(), mail).await;
        }
    }
}

/// Formats the human-facing order number for a given fiscal-year stamp and
/// allocated index, e.g. index 1 in 2025 becomes `202526#1`.
pub fn format_order_number(now: DateTime<Utc>, index: i64) -> String {
    let year = now.year();
    format!("{}{:02}#{}", year, (year + 1) % 100, index)
}

/// Claims the next order index by atomically incrementing the counter row
/// inside the placement transaction, then rereading it. The row UPDATE
/// serializes concurrent placements; no two transactions observe the same
/// index.
pub async fn allocate_order_number(
    txn: &DatabaseTransaction,
    now: DateTime<Utc>,
) -> Result<(i64, String), ServiceError> {
    let claimed = order_sequence::Entity::update_many()
        .col_expr(
            order_sequence::Column::LastIndex,
            Expr::col(order_sequence::Column::LastIndex).add(1),
        )
        .filter(order_sequence::Column::Id.eq(SEQUENCE_ROW_ID))
        .exec(txn)
        .await?;

    if claimed.rows_affected == 0 {
        return Err(ServiceError::InternalError(
            "order sequence counter row is missing".to_string(),
        ));
    }

    let row = order_sequence::Entity::find_by_id(SEQUENCE_ROW_ID)
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError("order sequence counter row is missing".to_string())
        })?;

    Ok((row.last_index, format_order_number(now, row.last_index)))
}

async fn verify_address_owner(
    txn: &DatabaseTransaction,
    address_id: Uuid,
    customer: OrderCustomer,
) -> Result<(), ServiceError> {
    let address = address::Entity::find_by_id(address_id)
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::InvalidAddress(format!("Address {} not found", address_id))
        })?;

    let owned = match customer {
        OrderCustomer::Online(id) => address.customer_id == Some(id),
        OrderCustomer::Offline(id) => address.offline_customer_id == Some(id),
    };
    if !owned {
        return Err(ServiceError::InvalidAddress(format!(
            "Address {} does not belong to the requesting customer",
            address_id
        )));
    }
    Ok(())
}

/// The shared placement core. Runs entirely inside the caller's transaction:
/// totals, order number allocation, order row, conditional stock decrement
/// per color line, item snapshots, and quantity-expanded detail rows.
#[allow(clippy::too_many_arguments)]
async fn create_order_core(
    txn: &DatabaseTransaction,
    customer: OrderCustomer,
    address_id: Uuid,
    lines: Vec<OrderLine>,
    channel: Channel,
    payment_status: &str,
    delivery_method: &str,
    discount_percent: Decimal,
    delivery: &DeliveryChargeCalculator,
) -> Result<OrderModel, ServiceError> {
    let now = Utc::now();

    let subtotal: Decimal = lines.iter().map(OrderLine::line_total).sum();
    let discount_amount = (subtotal * discount_percent / dec!(100)).round_dp(2);
    let delivery_charge = delivery.calculate(subtotal);
    // GST is backed out of the tax-inclusive subtotal, not added on top.
    let gst_amount = (subtotal - subtotal / GST_DIVISOR).round_dp(2);
    let total_amount = (subtotal - discount_amount) + delivery_charge;
    let total_items: i32 = lines.iter().map(|line| line.quantity).sum();

    let (order_index, order_number) = allocate_order_number(txn, now).await?;

    let (customer_id, offline_customer_id) = customer.into_columns();
    let order = order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_index: Set(order_index),
        order_number: Set(order_number),
        customer_id: Set(customer_id),
        offline_customer_id: Set(offline_customer_id),
        address_id: Set(address_id),
        total_items: Set(total_items),
        subtotal: Set(subtotal),
        gst_amount: Set(gst_amount),
        discount_percent: Set(discount_percent),
        discount_amount: Set(discount_amount),
        delivery_charge: Set(delivery_charge),
        total_amount: Set(total_amount),
        channel: Set(channel),
        payment_status: Set(payment_status.to_string()),
        delivery_method: Set(delivery_method.to_string()),
        order_status: Set(OrderStatus::Pending),
        fulfillment_status: Set(false),
        delivery_status: Set(DeliveryStatus::Pending),
        awb_number: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(txn)
    .await?;

    for line in &lines {
        // Conditional decrement: the WHERE clause re-validates availability
        // at write time, so a racing checkout loses cleanly instead of
        // driving stock negative.
        if let Some(color_id) = line.color_id {
            let decremented = product_color::Entity::update_many()
                .col_expr(
                    product_color::Column::StockQuantity,
                    Expr::col(product_color::Column::StockQuantity).sub(line.quantity),
                )
                .col_expr(
                    product_color::Column::UpdatedAt,
                    Expr::value(now),
                )
                .filter(product_color::Column::Id.eq(color_id))
                .filter(product_color::Column::StockQuantity.gte(line.quantity))
                .exec(txn)
                .await?;

            if decremented.rows_affected == 0 {
                warn!(%color_id, quantity = line.quantity, "stock decrement lost the race");
                return Err(ServiceError::InsufficientStock(format!(
                    "'{}' is no longer available in the requested quantity",
                    line.product_name
                )));
            }
        }

        let item = order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            model_id: Set(line.model_id),
            color_id: Set(line.color_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            total_price: Set(line.line_total()),
            discount_percent: Set(line.discount_percent),
            created_at: Set(now),
        }
        .insert(txn)
        .await?;

        // One detail row per physical unit, individually serial-numbered
        // after dispatch.
        for _ in 0..line.quantity {
            order_detail::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_item_id: Set(item.id),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                sr_no: Set(None),
            }
            .insert(txn)
            .await?;
        }
    }

    Ok(order)
}

fn validate_discount(discount: &Decimal) -> Result<(), validator::ValidationError> {
    if *discount < Decimal::ZERO || *discount > dec!(100) {
        let mut err = validator::ValidationError::new("discount_percent");
        err.message = Some("discount_percent must be between 0 and 100".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_spans_fiscal_year() {
        let now = "2025-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(format_order_number(now, 1), "202526#1");
        assert_eq!(format_order_number(now, 482), "202526#482");
    }

    #[test]
    fn order_number_pads_century_rollover() {
        let now = "2099-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(format_order_number(now, 7), "209900#7");
    }

    #[test]
    fn gst_is_extracted_not_added() {
        let subtotal = dec!(200.00);
        let gst = (subtotal - subtotal / GST_DIVISOR).round_dp(2);
        assert_eq!(gst, dec!(30.51));
        // Net subtotal plus the extracted tax reconstructs the gross figure.
        assert_eq!((subtotal - gst) + gst, subtotal);
    }

    #[test]
    fn line_total_applies_per_line_discount() {
        let line = OrderLine {
            product_id: Uuid::new_v4(),
            model_id: None,
            color_id: None,
            product_name: "x".into(),
            quantity: 2,
            unit_price: dec!(100),
            discount_percent: dec!(25),
        };
        assert_eq!(line.line_total(), dec!(150.00));
    }

    #[test]
    fn checkout_totals_match_reference_scenario() {
        // 100.00 x 2, 10% discount, delivery 20 => total 200.00
        let subtotal = dec!(200.00);
        let discount = (subtotal * dec!(10) / dec!(100)).round_dp(2);
        let total = (subtotal - discount) + dec!(20);
        assert_eq!(discount, dec!(20.00));
        assert_eq!(total, dec!(200.00));
    }

    #[test]
    fn discount_validator_bounds() {
        assert!(validate_discount(&dec!(0)).is_ok());
        assert!(validate_discount(&dec!(100)).is_ok());
        assert!(validate_discount(&dec!(-1)).is_err());
        assert!(validate_discount(&dec!(100.01)).is_err());
    }
}
