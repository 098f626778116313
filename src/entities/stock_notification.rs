use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// De-duplication record for the stock threshold monitor: one row per color
/// already alerted inside the suppression window.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub color_id: Uuid,
    pub product_name: String,
    pub notified_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_color::Entity",
        from = "Column::ColorId",
        to = "super::product_color::Column::Id"
    )]
    ProductColor,
}

impl Related<super::product_color::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductColor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
