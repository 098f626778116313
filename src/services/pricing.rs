use crate::entities::{product, product_color, product_model, ProductType};
use crate::errors::ServiceError;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

/// Price and availability of a concrete catalog selection, as read from the
/// database at the moment of resolution. Client-supplied prices are never
/// consulted; every cart mutation and every order placement re-resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    pub unit_price: Decimal,
    /// `None` means stock is untracked (a single product with no color rows).
    pub available_stock: Option<i32>,
    /// The color row the quote came from, when one exists.
    pub color_id: Option<Uuid>,
}

/// Resolves the unit price and available stock for a product selection.
///
/// Generic over [`ConnectionTrait`] so it runs both on the pool and inside
/// the order placement transaction.
///
/// Variable products require both a model and a color; the color must belong
/// to the stated model, and the model to the stated product. Single products
/// may omit both, in which case the default (oldest) color row is used, or
/// the product's base price when no color row exists.
pub async fn resolve_price<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    model_id: Option<Uuid>,
    color_id: Option<Uuid>,
) -> Result<PriceQuote, ServiceError> {
    let product = product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

    match product.product_type {
        ProductType::Variable => {
            let (Some(model_id), Some(color_id)) = (model_id, color_id) else {
                return Err(ServiceError::ValidationError(format!(
                    "Product '{}' requires a model and color selection",
                    product.name
                )));
            };

            let model = product_model::Entity::find_by_id(model_id)
                .one(conn)
                .await?
                .filter(|m| m.product_id == product_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Model {} not found for product '{}'",
                        model_id, product.name
                    ))
                })?;

            let color = product_color::Entity::find_by_id(color_id)
                .one(conn)
                .await?
                .filter(|c| c.product_id == product_id && c.model_id == Some(model.id))
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Color {} not found for model '{}'",
                        color_id, model.name
                    ))
                })?;

            Ok(PriceQuote {
                unit_price: color.price,
                available_stock: Some(color.stock_quantity),
                color_id: Some(color.id),
            })
        }
        ProductType::Single => {
            let color = match color_id {
                Some(color_id) => Some(
                    product_color::Entity::find_by_id(color_id)
                        .one(conn)
                        .await?
                        .filter(|c| c.product_id == product_id)
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Color {} not found for product '{}'",
                                color_id, product.name
                            ))
                        })?,
                ),
                // Single products normally carry one default color created
                // with the product; fall back to it when none was named.
                None => {
                    product_color::Entity::find()
                        .filter(product_color::Column::ProductId.eq(product_id))
                        .order_by_asc(product_color::Column::CreatedAt)
                        .one(conn)
                        .await?
                }
            };

            match color {
                Some(color) => Ok(PriceQuote {
                    unit_price: color.price,
                    available_stock: Some(color.stock_quantity),
                    color_id: Some(color.id),
                }),
                None => Ok(PriceQuote {
                    unit_price: product.base_price,
                    available_stock: None,
                    color_id: None,
                }),
            }
        }
    }
}
