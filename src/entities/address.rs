use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery address. Belongs to exactly one of an online or offline
/// customer; address creation is gated by the carrier serviceability check.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(nullable)]
    pub customer_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub offline_customer_id: Option<Uuid>,
    pub name: String,
    pub mobile: String,
    pub pincode: String,
    pub locality: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    #[sea_orm(nullable)]
    pub landmark: Option<String>,
    #[sea_orm(nullable)]
    pub alternate_phone: Option<String>,
    pub address_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::offline_customer::Entity",
        from = "Column::OfflineCustomerId",
        to = "super::offline_customer::Column::Id"
    )]
    OfflineCustomer,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::offline_customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OfflineCustomer.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
