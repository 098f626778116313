use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only ledger of physical device movement keyed by serial number.
/// A device's lifecycle is reconstructed by scanning all transactions for
/// its serial.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub device_srno: String,
    pub device_name: String,
    pub sku: String,
    #[sea_orm(nullable)]
    pub order_id: Option<Uuid>,
    pub direction: Direction,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub price: Option<Decimal>,
    #[sea_orm(nullable)]
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Movement direction. Stored as the original ledger's integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[sea_orm(num_value = 1)]
    In,
    #[sea_orm(num_value = 2)]
    Out,
    #[sea_orm(num_value = 3)]
    Return,
}
