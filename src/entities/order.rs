use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A placed order. Immutable after creation except for the status fields,
/// which only the fulfillment service touches. Rejection is a status flag;
/// order rows are never deleted.
///
/// `order_index` is globally monotonic and unique; `order_number` is the
/// human-facing form `"{year}{(year+1)%100:02}#{order_index}"` derived from
/// it at allocation time.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_index: i64,
    #[sea_orm(unique)]
    pub order_number: String,
    /// Exactly one of these is set; read through [`Model::customer`].
    #[sea_orm(nullable)]
    pub customer_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub offline_customer_id: Option<Uuid>,
    pub address_id: Uuid,
    pub total_items: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub subtotal: Decimal,
    /// Tax extracted from the tax-inclusive subtotal, not added on top.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub gst_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub discount_percent: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub delivery_charge: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_amount: Decimal,
    pub channel: Channel,
    pub payment_status: String,
    pub delivery_method: String,
    pub order_status: OrderStatus,
    pub fulfillment_status: bool,
    pub delivery_status: DeliveryStatus,
    /// Carrier waybill, present once a pickup request succeeded.
    #[sea_orm(nullable)]
    pub awb_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::order_detail::Entity")]
    OrderDetails,
    #[sea_orm(has_many = "super::order_status_history::Entity")]
    StatusHistory,
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::AddressId",
        to = "super::address::Column::Id"
    )]
    Address,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderDetails.def()
    }
}

impl Related<super::order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Address.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Who placed the order, as a tagged union instead of two nullable columns.
/// Services only ever handle this type, so "forgot to check both" bugs cannot
/// occur past the entity boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum OrderCustomer {
    Online(Uuid),
    Offline(Uuid),
}

impl OrderCustomer {
    /// Splits into the (customer_id, offline_customer_id) column pair.
    pub fn into_columns(self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            OrderCustomer::Online(id) => (Some(id), None),
            OrderCustomer::Offline(id) => (None, Some(id)),
        }
    }
}

impl Model {
    /// Reconstructs the customer tag from the column pair. `None` means the
    /// row violates the one-of-two check constraint.
    pub fn customer(&self) -> Option<OrderCustomer> {
        match (self.customer_id, self.offline_customer_id) {
            (Some(id), None) => Some(OrderCustomer::Online(id)),
            (None, Some(id)) => Some(OrderCustomer::Offline(id)),
            _ => None,
        }
    }

    /// Combined state label recorded in the status history audit rows.
    pub fn state_label(&self) -> String {
        format!(
            "{}/{}{}",
            self.order_status.as_str(),
            self.delivery_status.as_str(),
            if self.fulfillment_status {
                "/fulfilled"
            } else {
                ""
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "intransit")]
    InTransit,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Processing => "processing",
            DeliveryStatus::Shipped => "shipped",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::InTransit => "intransit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[sea_orm(string_value = "online")]
    Online,
    #[sea_orm(string_value = "offline")]
    Offline,
}
