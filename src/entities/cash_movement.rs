use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::invoice::PaymentMethod;

/// Append-only record of one cash-affecting event against a register.
///
/// Amounts are signed by convention: MANUAL_EXIT rows are stored negative,
/// every other type positive.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cash_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cash_register_id: Uuid,
    pub movement_type: CashMovementType,
    pub concept: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[sea_orm(nullable)]
    pub invoice_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub payment_id: Option<Uuid>,
    pub created_by: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cash_register::Entity",
        from = "Column::CashRegisterId",
        to = "super::cash_register::Column::Id"
    )]
    CashRegister,
}

impl Related<super::cash_register::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashRegister.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashMovementType {
    #[sea_orm(string_value = "OPENING")]
    Opening,
    #[sea_orm(string_value = "SALE")]
    Sale,
    #[sea_orm(string_value = "PAYMENT")]
    Payment,
    #[sea_orm(string_value = "MANUAL_ENTRY")]
    ManualEntry,
    #[sea_orm(string_value = "MANUAL_EXIT")]
    ManualExit,
    #[sea_orm(string_value = "CLOSING")]
    Closing,
}

impl CashMovementType {
    /// Whether this movement participates in the running balance.
    /// OPENING and CLOSING are bookkeeping markers; the opening amount is
    /// carried on the register row itself.
    pub fn affects_balance(&self) -> bool {
        !matches!(self, CashMovementType::Opening | CashMovementType::Closing)
    }
}
