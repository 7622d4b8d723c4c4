use crate::{
    db::DbPool,
    entities::{
        cash_movement::CashMovementType,
        customer::{self, Entity as Customer},
        invoice::{self, Entity as Invoice, InvoiceStatus, PaymentMethod},
        payment::{self, Entity as Payment},
    },
    errors::ServiceError,
    services::{cash, invoices},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// How an incoming amount is spread across invoices.
#[derive(Debug, Clone)]
pub enum PaymentAllocation {
    /// Caller fixes the amount applied to each invoice
    Explicit(Vec<AllocationItem>),
    /// Caller picks the invoices; amounts are applied oldest-due-first
    Selected(Vec<Uuid>),
    /// Every open invoice of the customer, oldest-due-first
    AllOpen,
}

#[derive(Debug, Clone)]
pub struct AllocationItem {
    pub invoice_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub allocation: PaymentAllocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedPayment {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementLine {
    pub invoice_id: Uuid,
    pub number: String,
    pub fiscal_number: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub total: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
    pub days_overdue: i64,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerStatement {
    pub customer: customer::Model,
    pub total_receivable: Decimal,
    pub total_overdue: Decimal,
    pub open_invoices: usize,
    pub invoices: Vec<StatementLine>,
}

/// Applies customer payments across open invoices and keeps the receivables
/// ledger consistent with the cash ledger.
pub struct ReceivablesService {
    db: Arc<DbPool>,
}

impl ReceivablesService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Applies one incoming payment. Every per-invoice balance update and
    /// Payment insert happens in one atomic unit; when the method is cash,
    /// exactly one PAYMENT movement is recorded for the whole call (a
    /// missing open register is tolerated here, unlike invoice creation).
    #[instrument(skip(self, input), fields(customer = %input.customer_id, amount = %input.amount))]
    pub async fn create_payment(
        &self,
        input: PaymentInput,
        actor: Uuid,
    ) -> Result<Vec<AppliedPayment>, ServiceError> {
        if input.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "payment amount must be positive".into(),
            ));
        }
        if !matches!(
            input.method,
            PaymentMethod::Cash | PaymentMethod::Transfer | PaymentMethod::Card
        ) {
            return Err(ServiceError::ValidationError(
                "payments accept cash, transfer or card".into(),
            ));
        }
        if let PaymentAllocation::Explicit(items) = &input.allocation {
            if items.is_empty() {
                return Err(ServiceError::ValidationError(
                    "explicit allocation requires at least one item".into(),
                ));
            }
            for item in items {
                if item.amount <= Decimal::ZERO {
                    return Err(ServiceError::ValidationError(
                        "allocation amounts must be positive".into(),
                    ));
                }
            }
            let allocated: Decimal = items.iter().map(|i| i.amount).sum();
            if (allocated - input.amount).abs() > dec!(0.01) {
                return Err(ServiceError::ValidationError(format!(
                    "allocations sum to {allocated} but the payment amount is {}",
                    input.amount
                )));
            }
        }

        let applied = self
            .db
            .transaction::<_, Vec<AppliedPayment>, ServiceError>(move |txn| {
                Box::pin(async move {
                    Customer::find_by_id(input.customer_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Customer {} not found",
                                input.customer_id
                            ))
                        })?;

                    let paid_at = input.paid_at.unwrap_or_else(Utc::now);
                    let now = Utc::now();

                    let plan: Vec<(invoice::Model, Decimal)> = match &input.allocation {
                        PaymentAllocation::Explicit(items) => {
                            let ids: Vec<Uuid> = items.iter().map(|i| i.invoice_id).collect();
                            let invoices =
                                load_open_invoices(txn, input.customer_id, Some(&ids)).await?;
                            if invoices.len() != ids.len() {
                                return Err(ServiceError::NotFound(
                                    "some invoices do not exist, are not open, or do not belong to the customer".into(),
                                ));
                            }
                            let mut plan = Vec::with_capacity(items.len());
                            for item in items {
                                let inv = invoices
                                    .iter()
                                    .find(|inv| inv.id == item.invoice_id)
                                    .cloned()
                                    .ok_or_else(|| {
                                        ServiceError::NotFound(format!(
                                            "Invoice {} not found",
                                            item.invoice_id
                                        ))
                                    })?;
                                if item.amount > inv.balance {
                                    return Err(ServiceError::InvalidOperation(format!(
                                        "allocation {} exceeds balance {} of invoice {}",
                                        item.amount, inv.balance, inv.number
                                    )));
                                }
                                plan.push((inv, item.amount));
                            }
                            plan
                        }
                        PaymentAllocation::Selected(ids) => {
                            let invoices =
                                load_open_invoices(txn, input.customer_id, Some(ids)).await?;
                            if invoices.len() != ids.len() {
                                return Err(ServiceError::NotFound(
                                    "some invoices do not exist, are not open, or do not belong to the customer".into(),
                                ));
                            }
                            plan_oldest_first(invoices, input.amount)?
                        }
                        PaymentAllocation::AllOpen => {
                            let invoices =
                                load_open_invoices(txn, input.customer_id, None).await?;
                            plan_oldest_first(invoices, input.amount)?
                        }
                    };

                    let mut applied = Vec::with_capacity(plan.len());
                    let mut first_invoice_location = None;

                    for (inv, amount) in plan {
                        if amount <= Decimal::ZERO {
                            continue;
                        }
                        let new_balance = inv.balance - amount;
                        let new_status = invoices::derive_status(
                            inv.status,
                            new_balance,
                            inv.due_date,
                            now,
                        );
                        first_invoice_location.get_or_insert(inv.location_id);

                        let invoice_id = inv.id;
                        let mut active: invoice::ActiveModel = inv.into();
                        active.balance = Set(new_balance);
                        active.status = Set(new_status);
                        active.updated_at = Set(now);
                        active.update(txn).await?;

                        let row = payment::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            customer_id: Set(input.customer_id),
                            invoice_id: Set(invoice_id),
                            amount: Set(amount),
                            method: Set(input.method),
                            reference: Set(input.reference.clone()),
                            paid_at: Set(paid_at),
                            created_by: Set(actor),
                            created_at: Set(now),
                        };
                        let row = row.insert(txn).await?;

                        applied.push(AppliedPayment {
                            payment_id: row.id,
                            invoice_id,
                            amount,
                            method: input.method,
                            paid_at,
                        });
                    }

                    // One movement for the whole payment, against the register
                    // of the paid invoices' location. No open register is not
                    // fatal: the payment stands, it just leaves no drawer trace.
                    if input.method == PaymentMethod::Cash && !applied.is_empty() {
                        if let Some(location_id) = first_invoice_location {
                            if let Some(register) =
                                cash::open_register_on(txn, location_id).await?
                            {
                                cash::record_movement_on(
                                    txn,
                                    register.id,
                                    CashMovementType::Payment,
                                    format!(
                                        "Receivables payment ({} invoice{})",
                                        applied.len(),
                                        if applied.len() > 1 { "s" } else { "" }
                                    ),
                                    input.amount,
                                    PaymentMethod::Cash,
                                    None,
                                    Some(applied[0].payment_id),
                                    actor,
                                )
                                .await?;
                            }
                        }
                    }

                    Ok(applied)
                })
            })
            .await
            .map_err(super::txn_err)?;

        info!(applications = applied.len(), "payment applied");
        Ok(applied)
    }

    pub async fn list_payments(
        &self,
        customer_id: Option<Uuid>,
        invoice_id: Option<Uuid>,
    ) -> Result<Vec<payment::Model>, ServiceError> {
        let mut query = Payment::find();
        if let Some(customer_id) = customer_id {
            query = query.filter(payment::Column::CustomerId.eq(customer_id));
        }
        if let Some(invoice_id) = invoice_id {
            query = query.filter(payment::Column::InvoiceId.eq(invoice_id));
        }
        Ok(query
            .order_by_desc(payment::Column::PaidAt)
            .all(&*self.db)
            .await?)
    }

    /// Account statement: every posted invoice with its paid/outstanding
    /// figures and aging, plus receivable totals.
    #[instrument(skip(self))]
    pub async fn statement(&self, customer_id: Uuid) -> Result<CustomerStatement, ServiceError> {
        let customer = Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {customer_id} not found")))?;

        let rows = Invoice::find()
            .filter(invoice::Column::CustomerId.eq(customer_id))
            .filter(invoice::Column::Status.is_in([
                InvoiceStatus::Issued,
                InvoiceStatus::Overdue,
                InvoiceStatus::Paid,
            ]))
            .order_by_desc(invoice::Column::IssueDate)
            .all(&*self.db)
            .await?;

        let now = Utc::now();
        let mut total_receivable = Decimal::ZERO;
        let mut total_overdue = Decimal::ZERO;
        let mut open_invoices = 0;

        let invoices = rows
            .into_iter()
            .map(|inv| {
                let days_overdue = inv
                    .due_date
                    .filter(|due| *due < now && inv.balance > Decimal::ZERO)
                    .map(|due| (now - due).num_days())
                    .unwrap_or(0);
                if inv.balance > Decimal::ZERO {
                    total_receivable += inv.balance;
                    open_invoices += 1;
                    if days_overdue > 0 {
                        total_overdue += inv.balance;
                    }
                }
                StatementLine {
                    invoice_id: inv.id,
                    number: inv.number,
                    fiscal_number: inv.fiscal_number,
                    issue_date: inv.issue_date,
                    due_date: inv.due_date,
                    total: inv.total,
                    paid: inv.total - inv.balance,
                    balance: inv.balance,
                    days_overdue,
                    status: invoices::derive_status(inv.status, inv.balance, inv.due_date, now),
                }
            })
            .collect();

        Ok(CustomerStatement {
            customer,
            total_receivable,
            total_overdue,
            open_invoices,
            invoices,
        })
    }
}

/// Open (ISSUED/OVERDUE) invoices of a customer, oldest due first. With
/// `ids`, restricts to those invoices.
async fn load_open_invoices<C: ConnectionTrait>(
    db: &C,
    customer_id: Uuid,
    ids: Option<&[Uuid]>,
) -> Result<Vec<invoice::Model>, ServiceError> {
    let mut query = Invoice::find()
        .filter(invoice::Column::CustomerId.eq(customer_id))
        .filter(
            invoice::Column::Status.is_in([InvoiceStatus::Issued, InvoiceStatus::Overdue]),
        );
    if let Some(ids) = ids {
        query = query.filter(invoice::Column::Id.is_in(ids.iter().copied()));
    } else {
        query = query.filter(invoice::Column::Balance.gt(Decimal::ZERO));
    }
    Ok(query
        .order_by_asc(invoice::Column::DueDate)
        .all(db)
        .await?)
}

/// Walks invoices oldest-due-first applying `min(remaining, balance)` until
/// the amount is exhausted. Rejected up front when the amount exceeds the
/// candidates' combined balance.
fn plan_oldest_first(
    invoices: Vec<invoice::Model>,
    amount: Decimal,
) -> Result<Vec<(invoice::Model, Decimal)>, ServiceError> {
    let total_balance: Decimal = invoices.iter().map(|inv| inv.balance).sum();
    if amount > total_balance {
        return Err(ServiceError::InvalidOperation(format!(
            "payment amount {amount} exceeds the combined balance {total_balance}"
        )));
    }

    let mut remaining = amount;
    let mut plan = Vec::with_capacity(invoices.len());
    for inv in invoices {
        if remaining <= Decimal::ZERO {
            break;
        }
        let applied = remaining.min(inv.balance);
        remaining -= applied;
        plan.push((inv, applied));
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn open_invoice(balance: Decimal, due_in_days: i64) -> invoice::Model {
        let now = Utc::now();
        invoice::Model {
            id: Uuid::new_v4(),
            number: "FA-000001".into(),
            fiscal_number: None,
            doc_type: crate::entities::invoice::InvoiceDocType::NonFiscal,
            status: InvoiceStatus::Issued,
            payment_method: PaymentMethod::Credit,
            subtotal: balance,
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: balance,
            balance,
            issue_date: now,
            due_date: Some(now + Duration::days(due_in_days)),
            customer_id: Some(Uuid::new_v4()),
            location_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            notes: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn oldest_first_walk_consumes_in_order() {
        let a = open_invoice(dec!(300), 1);
        let b = open_invoice(dec!(200), 2);
        let plan = plan_oldest_first(vec![a, b], dec!(400)).expect("plan");
        assert_eq!(plan[0].1, dec!(300));
        assert_eq!(plan[1].1, dec!(100));
    }

    #[test]
    fn over_allocation_is_rejected_before_any_mutation() {
        let a = open_invoice(dec!(100), 1);
        let err = plan_oldest_first(vec![a], dec!(150)).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOperation(_)));
    }

    #[test]
    fn exact_allocation_consumes_everything() {
        let a = open_invoice(dec!(480), 1);
        let b = open_invoice(dec!(700), 2);
        let plan = plan_oldest_first(vec![a, b], dec!(1180)).expect("plan");
        let applied: Decimal = plan.iter().map(|(_, amount)| *amount).sum();
        assert_eq!(applied, dec!(1180));
    }
}
