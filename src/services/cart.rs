use crate::{
    entities::{cart, cart_item, CartItemModel, CartModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing::resolve_price,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Shopping cart service.
///
/// Carts are created lazily on the first add; lines are merged by the
/// (product, model, color) key; and after every mutation the cart's cached
/// total is recomputed as a full sum over the remaining lines. Stock is
/// checked against the live color row on every quantity change but is only
/// decremented at order placement.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub model_id: Option<Uuid>,
    pub color_id: Option<Uuid>,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

/// Cart with its lines, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: CartModel,
    pub items: Vec<CartItemModel>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a selection to the customer's cart, creating the cart if the
    /// customer has none and merging into an existing line when the same
    /// (product, model, color) key is already present.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        input: AddItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let quote = resolve_price(&txn, input.product_id, input.model_id, input.color_id).await?;

        let cart = match cart::Entity::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&txn)
            .await?
        {
            Some(cart) => cart,
            None => {
                cart::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    customer_id: Set(customer_id),
                    total_price: Set(Decimal::ZERO),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?
            }
        };

        let mut merge_key = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id));
        merge_key = match input.model_id {
            Some(model_id) => merge_key.filter(cart_item::Column::ModelId.eq(model_id)),
            None => merge_key.filter(cart_item::Column::ModelId.is_null()),
        };
        merge_key = match quote.color_id {
            Some(color_id) => merge_key.filter(cart_item::Column::ColorId.eq(color_id)),
            None => merge_key.filter(cart_item::Column::ColorId.is_null()),
        };
        let existing = merge_key.one(&txn).await?;

        let new_quantity = existing.as_ref().map_or(0, |line| line.quantity) + input.quantity;
        ensure_stock(quote.available_stock, new_quantity)?;

        match existing {
            Some(line) => {
                let mut line: cart_item::ActiveModel = line.into();
                line.quantity = Set(new_quantity);
                line.unit_price = Set(quote.unit_price);
                line.total_item_price = Set(quote.unit_price * Decimal::from(new_quantity));
                line.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(input.product_id),
                    model_id: Set(input.model_id),
                    color_id: Set(quote.color_id),
                    quantity: Set(input.quantity),
                    unit_price: Set(quote.unit_price),
                    total_item_price: Set(quote.unit_price * Decimal::from(input.quantity)),
                    added_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?;
            }
        }

        let cart = recompute_total(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: input.product_id,
                quantity: input.quantity,
            })
            .await;

        self.view(cart).await
    }

    /// Sets a line's quantity outright. Checks stock against the live color
    /// row but reserves nothing.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let (cart, line) = self.line_for_customer(&txn, customer_id, item_id).await?;

        let quote = resolve_price(&txn, line.product_id, line.model_id, line.color_id).await?;
        ensure_stock(quote.available_stock, quantity)?;

        let mut line: cart_item::ActiveModel = line.into();
        line.quantity = Set(quantity);
        line.unit_price = Set(quote.unit_price);
        line.total_item_price = Set(quote.unit_price * Decimal::from(quantity));
        line.update(&txn).await?;

        let cart = recompute_total(&txn, cart).await?;
        txn.commit().await?;

        self.view(cart).await
    }

    /// Removes `quantity` units from a line, or the whole line when
    /// `quantity` is absent or at least the line's current quantity.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: Option<i32>,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let (cart, line) = self.line_for_customer(&txn, customer_id, item_id).await?;

        match quantity {
            Some(qty) if qty > 0 && qty < line.quantity => {
                let remaining = line.quantity - qty;
                let unit_price = line.unit_price;
                let mut line: cart_item::ActiveModel = line.into();
                line.quantity = Set(remaining);
                line.total_item_price = Set(unit_price * Decimal::from(remaining));
                line.update(&txn).await?;
            }
            _ => {
                line.delete(&txn).await?;
            }
        }

        let cart = recompute_total(&txn, cart).await?;
        txn.commit().await?;

        self.view(cart).await
    }

    /// Drops every line and resets the cached total.
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.cart_for_customer(&txn, customer_id).await?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let cart = recompute_total(&txn, cart).await?;
        txn.commit().await?;

        info!(cart_id = %cart.id, "cart cleared");
        self.event_sender.send_or_log(Event::CartCleared(cart.id)).await;

        self.view(cart).await
    }

    /// Fetches the customer's cart with its lines. A customer who never
    /// added anything gets `NotFound`.
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.cart_for_customer(&*self.db, customer_id).await?;
        self.view(cart).await
    }

    async fn cart_for_customer<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        cart::Entity::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No cart found for customer {}", customer_id))
            })
    }

    async fn line_for_customer<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<(CartModel, CartItemModel), ServiceError> {
        let cart = self.cart_for_customer(conn, customer_id).await?;
        let line = cart_item::Entity::find_by_id(item_id)
            .one(conn)
            .await?
            .filter(|line| line.cart_id == cart.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;
        Ok((cart, line))
    }

    async fn view(&self, cart: CartModel) -> Result<CartView, ServiceError> {
        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::AddedAt)
            .all(&*self.db)
            .await?;
        Ok(CartView { cart, items })
    }
}

fn ensure_stock(available: Option<i32>, requested: i32) -> Result<(), ServiceError> {
    match available {
        Some(stock) if requested > stock => Err(ServiceError::InsufficientStock(format!(
            "Only {} available",
            stock
        ))),
        _ => Ok(()),
    }
}

/// Recomputes the cart's cached total as a full sum over its lines, never
/// incrementally.
async fn recompute_total<C: ConnectionTrait>(
    conn: &C,
    cart: CartModel,
) -> Result<CartModel, ServiceError> {
    let lines = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .all(conn)
        .await?;

    let total: Decimal = lines.iter().map(|line| line.total_item_price).sum();

    let mut cart: cart::ActiveModel = cart.into();
    cart.total_price = Set(total);
    cart.updated_at = Set(Utc::now());
    Ok(cart.update(conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_guard_reports_available_count() {
        let err = ensure_stock(Some(3), 5).unwrap_err();
        match err {
            ServiceError::InsufficientStock(msg) => assert!(msg.contains('3')),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn untracked_stock_never_blocks() {
        assert!(ensure_stock(None, 10_000).is_ok());
        assert!(ensure_stock(Some(5), 5).is_ok());
    }
}
