use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Single-row counter backing order index allocation. The index is claimed
/// with an atomic `UPDATE last_index = last_index + 1` inside the placement
/// transaction; the row lock serializes concurrent placements so no two
/// orders ever observe the same index.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_sequence")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub last_index: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// The id of the only row in the table.
pub const SEQUENCE_ROW_ID: i32 = 1;
