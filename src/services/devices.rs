use crate::{
    entities::{device_transaction, DeviceDirection, DeviceTransactionModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Serialized-inventory ledger. Append-only: a device's status is never
/// stored, it is reconstructed from the transaction sequence for its serial.
#[derive(Clone)]
pub struct DeviceService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordInboundInput {
    #[validate(length(min = 1))]
    pub device_srno: String,
    #[validate(length(min = 1))]
    pub device_name: String,
    pub sku: String,
    pub price: Option<Decimal>,
    pub remarks: Option<String>,
}

/// Device status reconstructed from its transactions.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    /// A return transaction exists; it wins over everything else.
    Return {
        returned_at: DateTime<Utc>,
        remarks: Option<String>,
    },
    /// Both IN and OUT seen; margin is out price minus in price.
    Sold {
        in_price: Option<Decimal>,
        out_price: Option<Decimal>,
        profit: Option<Decimal>,
        sold_at: DateTime<Utc>,
    },
    /// IN without OUT.
    InStock {
        in_price: Option<Decimal>,
        received_at: DateTime<Utc>,
    },
    /// OUT with no matching IN; flags a bookkeeping gap.
    SoldWithoutIn {
        out_price: Option<Decimal>,
        sold_at: DateTime<Utc>,
    },
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceLookup {
    pub device_srno: String,
    pub device_name: String,
    pub sku: String,
    #[serde(flatten)]
    pub status: DeviceStatus,
}

impl DeviceService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Records a device arriving into stock (an IN transaction).
    #[instrument(skip(self, input))]
    pub async fn record_inbound(
        &self,
        input: RecordInboundInput,
    ) -> Result<DeviceTransactionModel, ServiceError> {
        input.validate()?;

        let row = device_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            device_srno: Set(input.device_srno.clone()),
            device_name: Set(input.device_name),
            sku: Set(input.sku),
            order_id: Set(None),
            direction: Set(DeviceDirection::In),
            price: Set(input.price),
            remarks: Set(input.remarks),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::DeviceRecorded {
                device_srno: row.device_srno.clone(),
                direction: "in".to_string(),
            })
            .await;

        Ok(row)
    }

    /// Reconstructs a device's status from its transactions, matched by
    /// serial number or SKU.
    pub async fn lookup(&self, search_term: &str) -> Result<DeviceLookup, ServiceError> {
        if search_term.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Search term required".to_string(),
            ));
        }

        let transactions = device_transaction::Entity::find()
            .filter(
                Condition::any()
                    .add(device_transaction::Column::DeviceSrno.eq(search_term))
                    .add(device_transaction::Column::Sku.eq(search_term)),
            )
            .order_by_asc(device_transaction::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let Some(first) = transactions.first() else {
            return Err(ServiceError::NotFound(format!(
                "No transactions found for '{}'",
                search_term
            )));
        };

        Ok(DeviceLookup {
            device_srno: first.device_srno.clone(),
            device_name: first.device_name.clone(),
            sku: first.sku.clone(),
            status: reconstruct_status(&transactions),
        })
    }

    /// Lists ledger transactions, newest first, optionally narrowed to one
    /// serial number.
    pub async fn list_transactions(
        &self,
        device_srno: Option<&str>,
    ) -> Result<Vec<DeviceTransactionModel>, ServiceError> {
        let mut query = device_transaction::Entity::find();
        if let Some(srno) = device_srno {
            query = query.filter(device_transaction::Column::DeviceSrno.eq(srno));
        }
        Ok(query
            .order_by_desc(device_transaction::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

fn reconstruct_status(transactions: &[DeviceTransactionModel]) -> DeviceStatus {
    let first_in = transactions
        .iter()
        .find(|t| t.direction == DeviceDirection::In);
    let first_out = transactions
        .iter()
        .find(|t| t.direction == DeviceDirection::Out);
    let first_return = transactions
        .iter()
        .find(|t| t.direction == DeviceDirection::Return);

    if let Some(ret) = first_return {
        return DeviceStatus::Return {
            returned_at: ret.created_at,
            remarks: ret.remarks.clone(),
        };
    }

    match (first_in, first_out) {
        (Some(inbound), Some(outbound)) => DeviceStatus::Sold {
            in_price: inbound.price,
            out_price: outbound.price,
            profit: match (inbound.price, outbound.price) {
                (Some(bought), Some(sold)) => Some(sold - bought),
                _ => None,
            },
            sold_at: outbound.created_at,
        },
        (Some(inbound), None) => DeviceStatus::InStock {
            in_price: inbound.price,
            received_at: inbound.created_at,
        },
        (None, Some(outbound)) => DeviceStatus::SoldWithoutIn {
            out_price: outbound.price,
            sold_at: outbound.created_at,
        },
        (None, None) => DeviceStatus::Unknown,
    }
}
