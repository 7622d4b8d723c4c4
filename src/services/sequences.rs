use crate::{
    db::DbPool,
    entities::fiscal_sequence::{self, Entity as FiscalSequence},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Bounded retries for the cursor compare-and-swap before reporting a
/// conflict to the caller.
const MAX_ALLOCATE_RETRIES: u32 = 5;

/// A fiscal number drawn from a sequence.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentNumber {
    pub sequence_id: Uuid,
    pub number: i64,
    pub formatted: String,
}

#[derive(Debug, Clone)]
pub struct CreateSequenceInput {
    pub prefix: String,
    pub description: Option<String>,
    pub start_range: i64,
    pub end_range: i64,
    pub location_id: Option<Uuid>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSequenceInput {
    pub description: Option<String>,
    pub start_range: Option<i64>,
    pub end_range: Option<i64>,
    pub current_number: Option<i64>,
    pub is_active: Option<bool>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Sequence row enriched with usage figures for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SequenceView {
    #[serde(flatten)]
    pub sequence: fiscal_sequence::Model,
    pub remaining: i64,
    pub percentage_used: i64,
}

impl From<fiscal_sequence::Model> for SequenceView {
    fn from(sequence: fiscal_sequence::Model) -> Self {
        let remaining = sequence.remaining();
        let percentage_used = if sequence.end_range > 0 {
            (sequence.current_number * 100) / sequence.end_range
        } else {
            0
        };
        Self {
            sequence,
            remaining,
            percentage_used,
        }
    }
}

pub struct SequenceService {
    db: Arc<DbPool>,
}

impl SequenceService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        prefix: Option<String>,
        active: Option<bool>,
    ) -> Result<Vec<SequenceView>, ServiceError> {
        let mut query = FiscalSequence::find();
        if let Some(prefix) = prefix {
            query = query.filter(fiscal_sequence::Column::Prefix.eq(prefix));
        }
        if let Some(active) = active {
            query = query.filter(fiscal_sequence::Column::IsActive.eq(active));
        }
        let sequences = query
            .order_by_desc(fiscal_sequence::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(sequences.into_iter().map(SequenceView::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<SequenceView, ServiceError> {
        let sequence = FiscalSequence::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sequence {id} not found")))?;
        Ok(sequence.into())
    }

    /// Creates a numbering range. The cursor starts one below `start_range`
    /// so the first allocation returns `start_range`.
    #[instrument(skip(self, input), fields(prefix = %input.prefix))]
    pub async fn create(&self, input: CreateSequenceInput) -> Result<SequenceView, ServiceError> {
        if input.start_range >= input.end_range {
            return Err(ServiceError::ValidationError(
                "start_range must be less than end_range".into(),
            ));
        }
        if input.start_range <= 0 {
            return Err(ServiceError::ValidationError(
                "start_range must be positive".into(),
            ));
        }

        let overlapping = find_overlapping(
            &*self.db,
            &input.prefix,
            input.location_id,
            input.start_range,
            input.end_range,
            None,
        )
        .await?;
        if overlapping.is_some() {
            return Err(ServiceError::InvalidOperation(
                "range overlaps an existing active sequence for this prefix".into(),
            ));
        }

        let now = Utc::now();
        let model = fiscal_sequence::ActiveModel {
            id: Set(Uuid::new_v4()),
            prefix: Set(input.prefix),
            description: Set(input.description),
            start_range: Set(input.start_range),
            end_range: Set(input.end_range),
            current_number: Set(input.start_range - 1),
            location_id: Set(input.location_id),
            valid_from: Set(input.valid_from.unwrap_or(now)),
            valid_until: Set(input.valid_until),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;
        info!(sequence_id = %created.id, "fiscal sequence created");
        Ok(created.into())
    }

    /// Updates bounds/validity. Bounds are re-validated against overlapping
    /// active ranges, and the cursor may never be placed beyond the end.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateSequenceInput,
    ) -> Result<SequenceView, ServiceError> {
        let existing = FiscalSequence::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sequence {id} not found")))?;

        let start_range = input.start_range.unwrap_or(existing.start_range);
        let end_range = input.end_range.unwrap_or(existing.end_range);
        if start_range >= end_range {
            return Err(ServiceError::ValidationError(
                "start_range must be less than end_range".into(),
            ));
        }

        let current_number = input.current_number.unwrap_or(existing.current_number);
        if current_number > end_range {
            return Err(ServiceError::ValidationError(
                "current_number cannot exceed end_range".into(),
            ));
        }
        if current_number < existing.current_number {
            return Err(ServiceError::ValidationError(
                "current_number only moves forward".into(),
            ));
        }

        let is_active = input.is_active.unwrap_or(existing.is_active);
        if is_active {
            let overlapping = find_overlapping(
                &*self.db,
                &existing.prefix,
                existing.location_id,
                start_range,
                end_range,
                Some(id),
            )
            .await?;
            if overlapping.is_some() {
                return Err(ServiceError::InvalidOperation(
                    "range overlaps an existing active sequence for this prefix".into(),
                ));
            }
        }

        let mut model: fiscal_sequence::ActiveModel = existing.into();
        if let Some(description) = input.description {
            model.description = Set(Some(description));
        }
        model.start_range = Set(start_range);
        model.end_range = Set(end_range);
        model.current_number = Set(current_number);
        model.is_active = Set(is_active);
        if let Some(valid_from) = input.valid_from {
            model.valid_from = Set(valid_from);
        }
        if let Some(valid_until) = input.valid_until {
            model.valid_until = Set(Some(valid_until));
        }
        model.updated_at = Set(Utc::now());

        let updated = model.update(&*self.db).await?;
        Ok(updated.into())
    }

    /// Soft-deletes a sequence: issued numbers stay attributable to it.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = FiscalSequence::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sequence {id} not found")))?;

        let mut model: fiscal_sequence::ActiveModel = existing.into();
        model.is_active = Set(false);
        model.updated_at = Set(Utc::now());
        model.update(&*self.db).await?;
        Ok(())
    }

    /// Hands out the next fiscal number for `prefix`, scoped to `location_id`
    /// when a location-specific sequence exists.
    #[instrument(skip(self))]
    pub async fn allocate(
        &self,
        prefix: &str,
        location_id: Option<Uuid>,
    ) -> Result<DocumentNumber, ServiceError> {
        allocate_on(&*self.db, prefix, location_id).await
    }
}

/// Race-free allocation usable both standalone and inside a caller's
/// transaction.
///
/// The cursor advance is an optimistic compare-and-swap: the UPDATE is
/// guarded on the previously observed `current_number`, so two concurrent
/// callers can never be handed the same number. A matched sequence whose
/// cursor reached `end_range` is a typed exhaustion failure; there is no
/// fallback to another sequence.
pub(crate) async fn allocate_on<C: ConnectionTrait>(
    db: &C,
    prefix: &str,
    location_id: Option<Uuid>,
) -> Result<DocumentNumber, ServiceError> {
    for _ in 0..MAX_ALLOCATE_RETRIES {
        let sequence = select_active(db, prefix, location_id)
            .await?
            .ok_or_else(|| ServiceError::NoActiveSequence(prefix.to_string()))?;

        if sequence.current_number >= sequence.end_range {
            return Err(ServiceError::SequenceExhausted(prefix.to_string()));
        }

        let next = sequence.current_number + 1;
        let result = FiscalSequence::update_many()
            .col_expr(fiscal_sequence::Column::CurrentNumber, Expr::value(next))
            .col_expr(fiscal_sequence::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(fiscal_sequence::Column::Id.eq(sequence.id))
            .filter(fiscal_sequence::Column::CurrentNumber.eq(sequence.current_number))
            .exec(db)
            .await?;

        if result.rows_affected == 1 {
            return Ok(DocumentNumber {
                sequence_id: sequence.id,
                number: next,
                formatted: sequence.format_number(next),
            });
        }
        // Another caller advanced the cursor between our read and write.
    }

    Err(ServiceError::Conflict(format!(
        "sequence cursor for prefix {prefix} is contended"
    )))
}

/// Selects the active sequence whose validity window contains now. A
/// location-scoped sequence takes precedence over a location-less one.
async fn select_active<C: ConnectionTrait>(
    db: &C,
    prefix: &str,
    location_id: Option<Uuid>,
) -> Result<Option<fiscal_sequence::Model>, ServiceError> {
    let now = Utc::now();

    let scope = match location_id {
        Some(location) => Condition::any()
            .add(fiscal_sequence::Column::LocationId.eq(location))
            .add(fiscal_sequence::Column::LocationId.is_null()),
        None => Condition::any().add(fiscal_sequence::Column::LocationId.is_null()),
    };

    let mut candidates = FiscalSequence::find()
        .filter(fiscal_sequence::Column::Prefix.eq(prefix))
        .filter(fiscal_sequence::Column::IsActive.eq(true))
        .filter(fiscal_sequence::Column::ValidFrom.lte(now))
        .filter(
            Condition::any()
                .add(fiscal_sequence::Column::ValidUntil.is_null())
                .add(fiscal_sequence::Column::ValidUntil.gte(now)),
        )
        .filter(scope)
        .all(db)
        .await?;

    candidates.sort_by_key(|s| (s.location_id.is_none(), std::cmp::Reverse(s.created_at)));
    Ok(candidates.into_iter().next())
}

/// Finds an active sequence on the same (prefix, location) whose range
/// overlaps [start, end]: either bound falls inside it, or it is contained.
async fn find_overlapping<C: ConnectionTrait>(
    db: &C,
    prefix: &str,
    location_id: Option<Uuid>,
    start: i64,
    end: i64,
    exclude: Option<Uuid>,
) -> Result<Option<fiscal_sequence::Model>, ServiceError> {
    let scope = match location_id {
        Some(location) => Condition::all().add(fiscal_sequence::Column::LocationId.eq(location)),
        None => Condition::all().add(fiscal_sequence::Column::LocationId.is_null()),
    };

    let overlap = Condition::any()
        .add(
            Condition::all()
                .add(fiscal_sequence::Column::StartRange.lte(start))
                .add(fiscal_sequence::Column::EndRange.gte(start)),
        )
        .add(
            Condition::all()
                .add(fiscal_sequence::Column::StartRange.lte(end))
                .add(fiscal_sequence::Column::EndRange.gte(end)),
        )
        .add(
            Condition::all()
                .add(fiscal_sequence::Column::StartRange.gte(start))
                .add(fiscal_sequence::Column::EndRange.lte(end)),
        );

    let mut query = FiscalSequence::find()
        .filter(fiscal_sequence::Column::Prefix.eq(prefix))
        .filter(fiscal_sequence::Column::IsActive.eq(true))
        .filter(scope)
        .filter(overlap);
    if let Some(exclude) = exclude {
        query = query.filter(fiscal_sequence::Column::Id.ne(exclude));
    }

    Ok(query.one(db).await?)
}
