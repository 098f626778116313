use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The purchasable SKU-level variant. Despite the name it is the unit of both
/// pricing and inventory; every stock debit lands on this row.
///
/// Invariant: `stock_quantity >= 0`. Debits go through a conditional UPDATE
/// that re-checks availability at write time, so racing checkouts cannot
/// drive it negative.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_colors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    #[sea_orm(nullable)]
    pub model_id: Option<Uuid>,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    /// Strikethrough display price, when discounted.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub original_price: Option<Decimal>,
    pub stock_quantity: i32,
    pub reorder_threshold: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::product_model::Entity",
        from = "Column::ModelId",
        to = "super::product_model::Column::Id"
    )]
    ProductModel,
    #[sea_orm(has_many = "super::stock_notification::Entity")]
    StockNotifications,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::product_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductModel.def()
    }
}

impl Related<super::stock_notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockNotifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
