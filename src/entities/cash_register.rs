use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One drawer session. At most one OPEN register per location at any time.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cash_registers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub location_id: Uuid,
    pub status: CashRegisterStatus,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub opening_amount: Decimal,
    /// Counted amount entered at closing time
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub closing_amount: Option<Decimal>,
    /// opening + incoming - outgoing, computed at closing time
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub expected_amount: Option<Decimal>,
    /// counted - expected
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub difference: Option<Decimal>,
    pub opened_by: Uuid,
    pub opened_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub closed_by: Option<Uuid>,
    #[sea_orm(nullable)]
    pub closed_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cash_movement::Entity")]
    Movements,
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<super::cash_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashRegisterStatus {
    #[sea_orm(string_value = "OPEN")]
    Open,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}
