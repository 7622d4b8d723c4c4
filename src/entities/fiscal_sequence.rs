use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A bounded fiscal numbering range with a validity window.
///
/// `current_number` starts at `start_range - 1` so the first allocated number
/// is `start_range`; it only ever moves forward and never exceeds
/// `end_range`. For a given (prefix, location) at most one active,
/// non-expired sequence may cover any number.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fiscal_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub prefix: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    pub start_range: i64,
    pub end_range: i64,
    pub current_number: i64,
    /// Scope to one location; a NULL scope serves every location
    #[sea_orm(nullable)]
    pub location_id: Option<Uuid>,
    pub valid_from: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn remaining(&self) -> i64 {
        self.end_range - self.current_number
    }

    /// Formats the fiscal number for a cursor position, e.g. FACE-00000042.
    pub fn format_number(&self, number: i64) -> String {
        format!("{}-{:08}", self.prefix, number)
    }
}
