use crate::{
    db::DbPool,
    entities::{
        inventory_movement::{self, Entity as InventoryMovement, InventoryMovementType},
        product::Entity as Product,
        stock_level::{self, Entity as StockLevel},
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentKind {
    Entry,
    Exit,
}

#[derive(Debug, Clone)]
pub struct AdjustmentItem {
    pub product_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Clone)]
pub struct AdjustmentInput {
    pub location_id: Uuid,
    pub kind: AdjustmentKind,
    pub reason: Option<String>,
    pub items: Vec<AdjustmentItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentResult {
    pub product_id: Uuid,
    pub previous_quantity: Decimal,
    pub quantity_adjusted: Decimal,
    pub new_quantity: Decimal,
}

/// The stock ledger: current quantity per (product, location) plus the
/// append-only movement log explaining every change.
pub struct StockService {
    db: Arc<DbPool>,
}

impl StockService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn get_level(
        &self,
        product_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<stock_level::Model>, ServiceError> {
        find_level(&*self.db, product_id, location_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_levels(
        &self,
        location_id: Uuid,
    ) -> Result<Vec<stock_level::Model>, ServiceError> {
        Ok(StockLevel::find()
            .filter(stock_level::Column::LocationId.eq(location_id))
            .all(&*self.db)
            .await?)
    }

    /// Levels at or below their minimum threshold.
    #[instrument(skip(self))]
    pub async fn low_stock(
        &self,
        location_id: Uuid,
    ) -> Result<Vec<stock_level::Model>, ServiceError> {
        Ok(StockLevel::find()
            .filter(stock_level::Column::LocationId.eq(location_id))
            .filter(
                Expr::col(stock_level::Column::Quantity)
                    .lte(Expr::col(stock_level::Column::MinStock)),
            )
            .all(&*self.db)
            .await?)
    }

    pub async fn movements(
        &self,
        product_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<inventory_movement::Model>, ServiceError> {
        Ok(InventoryMovement::find()
            .filter(inventory_movement::Column::ProductId.eq(product_id))
            .filter(inventory_movement::Column::LocationId.eq(location_id))
            .order_by_desc(inventory_movement::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Applies a batch of manual entry/exit adjustments in one atomic unit.
    /// Every quantity change gets its paired movement row.
    #[instrument(skip(self, input), fields(location = %input.location_id, items = input.items.len()))]
    pub async fn adjust(
        &self,
        input: AdjustmentInput,
        actor: Uuid,
    ) -> Result<Vec<AdjustmentResult>, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "adjustment requires at least one item".into(),
            ));
        }
        for item in &input.items {
            if item.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "adjustment quantities must be positive".into(),
                ));
            }
        }

        let results = self
            .db
            .transaction::<_, Vec<AdjustmentResult>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut results = Vec::with_capacity(input.items.len());

                    for item in &input.items {
                        let product = Product::find_by_id(item.product_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Product {} not found",
                                    item.product_id
                                ))
                            })?;
                        if !product.tracks_stock {
                            return Err(ServiceError::InvalidOperation(format!(
                                "product {} does not track stock",
                                product.code
                            )));
                        }

                        let (delta, movement_type) = match input.kind {
                            AdjustmentKind::Entry => {
                                (item.quantity, InventoryMovementType::AdjustmentEntry)
                            }
                            AdjustmentKind::Exit => {
                                (-item.quantity, InventoryMovementType::AdjustmentExit)
                            }
                        };

                        let previous = available_on(txn, item.product_id, input.location_id).await?;
                        let new_quantity = apply_delta_on(
                            txn,
                            item.product_id,
                            input.location_id,
                            delta,
                            movement_type,
                            None,
                            actor,
                            input.reason.clone(),
                            product.min_stock,
                        )
                        .await?;

                        results.push(AdjustmentResult {
                            product_id: item.product_id,
                            previous_quantity: previous,
                            quantity_adjusted: delta,
                            new_quantity,
                        });
                    }

                    Ok(results)
                })
            })
            .await
            .map_err(super::txn_err)?;

        info!(adjusted = results.len(), "stock adjustment applied");
        Ok(results)
    }
}

pub(crate) async fn find_level<C: ConnectionTrait>(
    db: &C,
    product_id: Uuid,
    location_id: Uuid,
) -> Result<Option<stock_level::Model>, ServiceError> {
    Ok(StockLevel::find()
        .filter(stock_level::Column::ProductId.eq(product_id))
        .filter(stock_level::Column::LocationId.eq(location_id))
        .one(db)
        .await?)
}

/// On-hand quantity; zero when no level row exists yet.
pub(crate) async fn available_on<C: ConnectionTrait>(
    db: &C,
    product_id: Uuid,
    location_id: Uuid,
) -> Result<Decimal, ServiceError> {
    Ok(find_level(db, product_id, location_id)
        .await?
        .map(|level| level.quantity)
        .unwrap_or(Decimal::ZERO))
}

/// Applies a signed quantity delta and records the paired movement row.
/// Creates the level row on first touch. Returns the resulting balance.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn apply_delta_on<C: ConnectionTrait>(
    db: &C,
    product_id: Uuid,
    location_id: Uuid,
    delta: Decimal,
    movement_type: InventoryMovementType,
    document_id: Option<Uuid>,
    actor: Uuid,
    note: Option<String>,
    min_stock: Decimal,
) -> Result<Decimal, ServiceError> {
    let now = Utc::now();

    let new_quantity = match find_level(db, product_id, location_id).await? {
        Some(level) => {
            let new_quantity = level.quantity + delta;
            let mut active: stock_level::ActiveModel = level.into();
            active.quantity = Set(new_quantity);
            active.updated_at = Set(now);
            active.update(db).await?;
            new_quantity
        }
        None => {
            let new_quantity = delta;
            let level = stock_level::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                location_id: Set(location_id),
                quantity: Set(new_quantity),
                min_stock: Set(min_stock),
                updated_at: Set(now),
            };
            level.insert(db).await?;
            new_quantity
        }
    };

    let movement = inventory_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        location_id: Set(location_id),
        movement_type: Set(movement_type),
        quantity: Set(delta),
        balance: Set(new_quantity),
        document_id: Set(document_id),
        note: Set(note),
        created_by: Set(actor),
        created_at: Set(now),
    };
    movement.insert(db).await?;

    Ok(new_quantity)
}
