use crate::{
    db::DbPool,
    entities::{
        cash_movement::{self, CashMovementType, Entity as CashMovement},
        cash_register::{self, CashRegisterStatus, Entity as CashRegister},
        invoice::PaymentMethod,
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct RegisterView {
    #[serde(flatten)]
    pub register: cash_register::Model,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub current_balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManualMovementKind {
    ManualEntry,
    ManualExit,
}

/// The cash ledger: one open drawer session per location, plus the
/// append-only movement log the balance is computed from.
pub struct CashService {
    db: Arc<DbPool>,
}

impl CashService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Opens a drawer session at a location. Rejected while another session
    /// is still open there.
    #[instrument(skip(self))]
    pub async fn open(
        &self,
        location_id: Uuid,
        opening_amount: Decimal,
        actor: Uuid,
        notes: Option<String>,
    ) -> Result<cash_register::Model, ServiceError> {
        if opening_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "opening amount cannot be negative".into(),
            ));
        }

        let register = self
            .db
            .transaction::<_, cash_register::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    if open_register_on(txn, location_id).await?.is_some() {
                        return Err(ServiceError::InvalidOperation(format!(
                            "a cash register is already open at location {location_id}"
                        )));
                    }

                    let now = Utc::now();
                    let register = cash_register::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        location_id: Set(location_id),
                        status: Set(CashRegisterStatus::Open),
                        opening_amount: Set(opening_amount),
                        closing_amount: Set(None),
                        expected_amount: Set(None),
                        difference: Set(None),
                        opened_by: Set(actor),
                        opened_at: Set(now),
                        closed_by: Set(None),
                        closed_at: Set(None),
                        notes: Set(notes),
                    };
                    let register = register.insert(txn).await?;

                    record_movement_on(
                        txn,
                        register.id,
                        CashMovementType::Opening,
                        "Register opening".to_string(),
                        opening_amount,
                        PaymentMethod::Cash,
                        None,
                        None,
                        actor,
                    )
                    .await?;

                    Ok(register)
                })
            })
            .await
            .map_err(super::txn_err)?;

        info!(register_id = %register.id, "cash register opened");
        Ok(register)
    }

    /// Closes a drawer session: persists the counted amount, the expected
    /// amount (opening + incoming - outgoing) and their difference.
    #[instrument(skip(self))]
    pub async fn close(
        &self,
        register_id: Uuid,
        counted_amount: Decimal,
        actor: Uuid,
        notes: Option<String>,
    ) -> Result<cash_register::Model, ServiceError> {
        if counted_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "counted amount cannot be negative".into(),
            ));
        }

        let closed = self
            .db
            .transaction::<_, cash_register::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let register = CashRegister::find_by_id(register_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Cash register {register_id} not found"))
                        })?;

                    if register.status == CashRegisterStatus::Closed {
                        return Err(ServiceError::InvalidStatus(
                            "cash register is already closed".into(),
                        ));
                    }

                    let movements = CashMovement::find()
                        .filter(cash_movement::Column::CashRegisterId.eq(register_id))
                        .all(txn)
                        .await?;
                    let expected = running_balance(register.opening_amount, &movements);
                    let difference = counted_amount - expected;

                    let now = Utc::now();
                    let mut active: cash_register::ActiveModel = register.into();
                    active.status = Set(CashRegisterStatus::Closed);
                    active.closing_amount = Set(Some(counted_amount));
                    active.expected_amount = Set(Some(expected));
                    active.difference = Set(Some(difference));
                    active.closed_by = Set(Some(actor));
                    active.closed_at = Set(Some(now));
                    if notes.is_some() {
                        active.notes = Set(notes);
                    }
                    let closed = active.update(txn).await?;

                    record_movement_on(
                        txn,
                        register_id,
                        CashMovementType::Closing,
                        "Register closing".to_string(),
                        counted_amount,
                        PaymentMethod::Cash,
                        None,
                        None,
                        actor,
                    )
                    .await?;

                    Ok(closed)
                })
            })
            .await
            .map_err(super::txn_err)?;

        info!(register_id = %closed.id, difference = %closed.difference.unwrap_or_default(), "cash register closed");
        Ok(closed)
    }

    /// The open session at a location with its running balance, if any.
    pub async fn current(&self, location_id: Uuid) -> Result<Option<RegisterView>, ServiceError> {
        let Some(register) = open_register_on(&*self.db, location_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.view_of(register).await?))
    }

    /// Running balance of the open register at a location.
    pub async fn current_balance(&self, location_id: Uuid) -> Result<Decimal, ServiceError> {
        let register = open_register_on(&*self.db, location_id)
            .await?
            .ok_or_else(|| ServiceError::CashRegisterClosed(location_id.to_string()))?;
        let movements = self.movements(register.id).await?;
        Ok(running_balance(register.opening_amount, &movements))
    }

    /// Records a manual cash entry or exit against the open register.
    /// Exits are stored negative.
    #[instrument(skip(self))]
    pub async fn add_movement(
        &self,
        location_id: Uuid,
        kind: ManualMovementKind,
        concept: String,
        amount: Decimal,
        method: PaymentMethod,
        actor: Uuid,
    ) -> Result<cash_movement::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "movement amount must be positive".into(),
            ));
        }
        if !matches!(method, PaymentMethod::Cash | PaymentMethod::Transfer) {
            return Err(ServiceError::ValidationError(
                "manual movements accept cash or transfer only".into(),
            ));
        }

        let register = open_register_on(&*self.db, location_id)
            .await?
            .ok_or_else(|| ServiceError::CashRegisterClosed(location_id.to_string()))?;

        let (movement_type, signed_amount) = match kind {
            ManualMovementKind::ManualEntry => (CashMovementType::ManualEntry, amount),
            ManualMovementKind::ManualExit => (CashMovementType::ManualExit, -amount),
        };

        record_movement_on(
            &*self.db,
            register.id,
            movement_type,
            concept,
            signed_amount,
            method,
            None,
            None,
            actor,
        )
        .await
    }

    pub async fn movements(
        &self,
        register_id: Uuid,
    ) -> Result<Vec<cash_movement::Model>, ServiceError> {
        Ok(CashMovement::find()
            .filter(cash_movement::Column::CashRegisterId.eq(register_id))
            .order_by_asc(cash_movement::Column::OccurredAt)
            .all(&*self.db)
            .await?)
    }

    /// Past and present sessions, newest first, each with its totals.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        location_id: Option<Uuid>,
    ) -> Result<Vec<RegisterView>, ServiceError> {
        let mut query = CashRegister::find();
        if let Some(location_id) = location_id {
            query = query.filter(cash_register::Column::LocationId.eq(location_id));
        }
        let registers = query
            .order_by_desc(cash_register::Column::OpenedAt)
            .all(&*self.db)
            .await?;

        let mut views = Vec::with_capacity(registers.len());
        for register in registers {
            views.push(self.view_of(register).await?);
        }
        Ok(views)
    }

    async fn view_of(&self, register: cash_register::Model) -> Result<RegisterView, ServiceError> {
        let movements = self.movements(register.id).await?;
        let (total_in, total_out) = movement_totals(&movements);
        let current_balance = running_balance(register.opening_amount, &movements);
        Ok(RegisterView {
            register,
            total_in,
            total_out,
            current_balance,
        })
    }
}

/// The single OPEN register at a location, if one exists.
pub(crate) async fn open_register_on<C: ConnectionTrait>(
    db: &C,
    location_id: Uuid,
) -> Result<Option<cash_register::Model>, ServiceError> {
    Ok(CashRegister::find()
        .filter(cash_register::Column::LocationId.eq(location_id))
        .filter(cash_register::Column::Status.eq(CashRegisterStatus::Open))
        .one(db)
        .await?)
}

/// Appends one movement row. Amount is taken as already signed.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn record_movement_on<C: ConnectionTrait>(
    db: &C,
    cash_register_id: Uuid,
    movement_type: CashMovementType,
    concept: String,
    amount: Decimal,
    method: PaymentMethod,
    invoice_id: Option<Uuid>,
    payment_id: Option<Uuid>,
    actor: Uuid,
) -> Result<cash_movement::Model, ServiceError> {
    let movement = cash_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        cash_register_id: Set(cash_register_id),
        movement_type: Set(movement_type),
        concept: Set(concept),
        amount: Set(amount),
        method: Set(method),
        invoice_id: Set(invoice_id),
        payment_id: Set(payment_id),
        created_by: Set(actor),
        occurred_at: Set(Utc::now()),
    };
    Ok(movement.insert(db).await?)
}

/// opening + signed sum of balance-affecting movements. Manual exits are
/// stored negative, so the sum is a plain fold.
pub(crate) fn running_balance(opening: Decimal, movements: &[cash_movement::Model]) -> Decimal {
    opening
        + movements
            .iter()
            .filter(|m| m.movement_type.affects_balance())
            .map(|m| m.amount)
            .sum::<Decimal>()
}

/// (incoming, outgoing) totals; outgoing reported as a positive figure.
pub(crate) fn movement_totals(movements: &[cash_movement::Model]) -> (Decimal, Decimal) {
    let mut total_in = Decimal::ZERO;
    let mut total_out = Decimal::ZERO;
    for movement in movements {
        match movement.movement_type {
            CashMovementType::Sale | CashMovementType::Payment | CashMovementType::ManualEntry => {
                total_in += movement.amount
            }
            CashMovementType::ManualExit => total_out += -movement.amount,
            CashMovementType::Opening | CashMovementType::Closing => {}
        }
    }
    (total_in, total_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn movement(movement_type: CashMovementType, amount: Decimal) -> cash_movement::Model {
        cash_movement::Model {
            id: Uuid::new_v4(),
            cash_register_id: Uuid::new_v4(),
            movement_type,
            concept: "test".into(),
            amount,
            method: PaymentMethod::Cash,
            invoice_id: None,
            payment_id: None,
            created_by: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn balance_is_opening_plus_signed_movements() {
        let movements = vec![
            movement(CashMovementType::Opening, dec!(500)),
            movement(CashMovementType::Sale, dec!(1180)),
            movement(CashMovementType::Payment, dec!(700)),
            movement(CashMovementType::ManualEntry, dec!(50)),
            movement(CashMovementType::ManualExit, dec!(-200)),
        ];
        // 500 + 1180 + 700 + 50 - 200; the OPENING row itself is not re-added
        assert_eq!(running_balance(dec!(500), &movements), dec!(2230));
    }

    #[test]
    fn totals_report_outgoing_as_positive() {
        let movements = vec![
            movement(CashMovementType::Sale, dec!(100)),
            movement(CashMovementType::ManualExit, dec!(-40)),
        ];
        let (total_in, total_out) = movement_totals(&movements);
        assert_eq!(total_in, dec!(100));
        assert_eq!(total_out, dec!(40));
    }

    #[test]
    fn closing_rows_do_not_affect_balance() {
        let movements = vec![
            movement(CashMovementType::Sale, dec!(100)),
            movement(CashMovementType::Closing, dec!(600)),
        ];
        assert_eq!(running_balance(dec!(500), &movements), dec!(600));
    }
}
