use crate::{
    db::DbPool,
    entities::{
        cash_movement::{self, CashMovementType, Entity as CashMovement},
        customer::Entity as Customer,
        inventory_movement::InventoryMovementType,
        invoice::{self, Entity as Invoice, InvoiceDocType, InvoiceStatus, PaymentMethod},
        invoice_line::{self, Entity as InvoiceLine},
        payment::{self, Entity as Payment},
        product::Entity as Product,
    },
    errors::ServiceError,
    services::{cash, sequences, stock},
    tax_id::validate_tax_id,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Prefix of the fiscal sequence sales invoices draw from.
const FISCAL_PREFIX: &str = "FACE";
/// Prefix of the sequential display number.
const DISPLAY_PREFIX: &str = "FA-";

#[derive(Debug, Clone)]
pub struct LineInput {
    pub product_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
}

impl LineInput {
    pub fn subtotal(&self) -> Decimal {
        self.quantity * self.unit_price - self.discount
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceInput {
    pub customer_id: Option<Uuid>,
    pub doc_type: InvoiceDocType,
    pub payment_method: PaymentMethod,
    pub location_id: Uuid,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub lines: Vec<LineInput>,
    pub discount: Decimal,
    /// Defaults to true for fiscal documents, false otherwise
    pub include_tax: Option<bool>,
    pub draft: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    pub id: Uuid,
    pub number: String,
    pub fiscal_number: Option<String>,
    pub total: Decimal,
    pub balance: Decimal,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetails {
    #[serde(flatten)]
    pub invoice: invoice::Model,
    pub lines: Vec<invoice_line::Model>,
    pub payments: Vec<payment::Model>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub doc_type: Option<InvoiceDocType>,
    pub payment_method: Option<PaymentMethod>,
    pub customer_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

/// The invoice engine. Orchestrates the sequence allocator, stock ledger and
/// cash ledger; every multi-step mutation runs in one transaction.
pub struct InvoiceService {
    db: Arc<DbPool>,
    tax_rate: Decimal,
}

impl InvoiceService {
    pub fn new(db: Arc<DbPool>, tax_rate: Decimal) -> Self {
        Self { db, tax_rate }
    }

    /// Issues a sales document (or persists a draft).
    ///
    /// Drafts skip fiscal-number acquisition, stock mutation and cash-register
    /// mutation entirely, but still persist lines and totals.
    #[instrument(skip(self, input), fields(location = %input.location_id, draft = input.draft))]
    pub async fn create(
        &self,
        input: InvoiceInput,
        actor: Uuid,
    ) -> Result<InvoiceSummary, ServiceError> {
        validate_input(&input)?;
        let tax_rate = self.tax_rate;

        let created = self
            .db
            .transaction::<_, invoice::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let is_fiscal = input.doc_type == InvoiceDocType::Fiscal;

                    if let Some(customer_id) = input.customer_id {
                        let customer = Customer::find_by_id(customer_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!("Customer {customer_id} not found"))
                            })?;
                        if is_fiscal && !input.draft {
                            require_valid_tax_id(&customer.name, customer.identification.as_deref())?;
                        }
                    }

                    let totals = compute_totals(
                        &input.lines,
                        input.discount,
                        input.include_tax,
                        input.doc_type,
                        tax_rate,
                    );
                    let balance = if !input.draft && input.payment_method == PaymentMethod::Credit {
                        totals.total
                    } else {
                        Decimal::ZERO
                    };

                    let fiscal_number = if is_fiscal && !input.draft {
                        let allocated =
                            sequences::allocate_on(txn, FISCAL_PREFIX, Some(input.location_id))
                                .await?;
                        Some(allocated.formatted)
                    } else {
                        None
                    };

                    if !input.draft {
                        check_stock_availability(txn, &input.lines, input.location_id, &HashMap::new())
                            .await?;
                    }

                    let open_register = if !input.draft
                        && input.payment_method == PaymentMethod::Cash
                    {
                        let register = cash::open_register_on(txn, input.location_id)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::CashRegisterClosed(input.location_id.to_string())
                            })?;
                        Some(register)
                    } else {
                        None
                    };

                    let now = Utc::now();
                    let number = next_display_number(txn).await?;
                    let status = if input.draft {
                        InvoiceStatus::Draft
                    } else {
                        InvoiceStatus::Issued
                    };

                    let model = invoice::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        number: Set(number.clone()),
                        fiscal_number: Set(fiscal_number),
                        doc_type: Set(input.doc_type),
                        status: Set(status),
                        payment_method: Set(input.payment_method),
                        subtotal: Set(totals.subtotal),
                        discount: Set(input.discount),
                        tax: Set(totals.tax),
                        total: Set(totals.total),
                        balance: Set(balance),
                        issue_date: Set(input.issue_date.unwrap_or(now)),
                        due_date: Set(input.due_date),
                        customer_id: Set(input.customer_id),
                        location_id: Set(input.location_id),
                        created_by: Set(actor),
                        notes: Set(input.notes.clone()),
                        cancelled_at: Set(None),
                        cancelled_by: Set(None),
                        cancellation_reason: Set(None),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };
                    let created = model.insert(txn).await?;

                    insert_lines(txn, created.id, &input.lines).await?;

                    if !input.draft {
                        apply_sale_to_stock(txn, &input.lines, input.location_id, created.id, actor, None)
                            .await?;
                    }

                    if let Some(register) = open_register {
                        cash::record_movement_on(
                            txn,
                            register.id,
                            CashMovementType::Sale,
                            format!("Invoice {number}"),
                            totals.total,
                            PaymentMethod::Cash,
                            Some(created.id),
                            None,
                            actor,
                        )
                        .await?;
                    }

                    Ok(created)
                })
            })
            .await
            .map_err(super::txn_err)?;

        info!(invoice_id = %created.id, number = %created.number, "invoice created");
        Ok(summary_of(&created))
    }

    /// Rewrites an invoice that has no applied payments.
    ///
    /// Availability is validated against the baseline with the previous
    /// lines' quantities notionally returned, so shrinking a line never
    /// spuriously fails and growing one is checked against real headroom.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: InvoiceInput,
        actor: Uuid,
    ) -> Result<InvoiceSummary, ServiceError> {
        validate_input(&input)?;
        let tax_rate = self.tax_rate;

        let updated = self
            .db
            .transaction::<_, invoice::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = Invoice::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("Invoice {id} not found")))?;

                    if !matches!(existing.status, InvoiceStatus::Draft | InvoiceStatus::Issued) {
                        return Err(ServiceError::InvalidStatus(
                            "only draft or issued invoices can be edited".into(),
                        ));
                    }
                    let payment_count = Payment::find()
                        .filter(payment::Column::InvoiceId.eq(id))
                        .count(txn)
                        .await?;
                    if payment_count > 0 {
                        return Err(ServiceError::InvalidOperation(
                            "invoice has payments; reverse it with a credit note instead".into(),
                        ));
                    }

                    if input.doc_type == InvoiceDocType::Fiscal {
                        if let Some(customer_id) = input.customer_id {
                            let customer = Customer::find_by_id(customer_id)
                                .one(txn)
                                .await?
                                .ok_or_else(|| {
                                    ServiceError::NotFound(format!(
                                        "Customer {customer_id} not found"
                                    ))
                                })?;
                            require_valid_tax_id(&customer.name, customer.identification.as_deref())?;
                        }
                    }

                    let totals = compute_totals(
                        &input.lines,
                        input.discount,
                        input.include_tax,
                        input.doc_type,
                        tax_rate,
                    );
                    let was_issued = existing.status == InvoiceStatus::Issued;
                    let balance = if was_issued && input.payment_method == PaymentMethod::Credit {
                        totals.total
                    } else {
                        Decimal::ZERO
                    };

                    let old_lines = InvoiceLine::find()
                        .filter(invoice_line::Column::InvoiceId.eq(id))
                        .all(txn)
                        .await?;

                    if was_issued {
                        // Quantities already taken by this invoice count as available again.
                        let mut returned: HashMap<Uuid, Decimal> = HashMap::new();
                        for line in &old_lines {
                            if let Some(product_id) = line.product_id {
                                *returned.entry(product_id).or_default() += line.quantity;
                            }
                        }
                        check_stock_availability(txn, &input.lines, existing.location_id, &returned)
                            .await?;

                        if input.payment_method == PaymentMethod::Cash
                            && cash::open_register_on(txn, existing.location_id)
                                .await?
                                .is_none()
                        {
                            return Err(ServiceError::CashRegisterClosed(
                                existing.location_id.to_string(),
                            ));
                        }
                    }

                    // Replace the line set.
                    InvoiceLine::delete_many()
                        .filter(invoice_line::Column::InvoiceId.eq(id))
                        .exec(txn)
                        .await?;
                    insert_lines(txn, id, &input.lines).await?;

                    if was_issued {
                        // Reverse the previous sale decrements, then apply the new ones.
                        for line in &old_lines {
                            if let Some(product_id) = line.product_id {
                                stock::apply_delta_on(
                                    txn,
                                    product_id,
                                    existing.location_id,
                                    line.quantity,
                                    InventoryMovementType::AdjustmentEntry,
                                    Some(id),
                                    actor,
                                    Some("Invoice updated".to_string()),
                                    Decimal::ZERO,
                                )
                                .await?;
                            }
                        }
                        apply_sale_to_stock(
                            txn,
                            &input.lines,
                            existing.location_id,
                            id,
                            actor,
                            Some("Invoice updated".to_string()),
                        )
                        .await?;

                        sync_cash_movement(txn, &existing, input.payment_method, totals.total, actor)
                            .await?;
                    }

                    let mut active: invoice::ActiveModel = existing.into();
                    active.doc_type = Set(input.doc_type);
                    active.payment_method = Set(input.payment_method);
                    active.subtotal = Set(totals.subtotal);
                    active.discount = Set(input.discount);
                    active.tax = Set(totals.tax);
                    active.total = Set(totals.total);
                    active.balance = Set(balance);
                    if let Some(issue_date) = input.issue_date {
                        active.issue_date = Set(issue_date);
                    }
                    active.due_date = Set(input.due_date);
                    active.customer_id = Set(input.customer_id);
                    active.notes = Set(input.notes.clone());
                    active.updated_at = Set(Utc::now());

                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(super::txn_err)?;

        info!(invoice_id = %updated.id, "invoice updated");
        Ok(summary_of(&updated))
    }

    /// Cancels an issued document, returning every line's quantity to stock.
    /// An invoice with any applied payment must be reversed via a credit
    /// note; it can never be cancelled outright.
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        id: Uuid,
        reason: String,
        actor: Uuid,
    ) -> Result<InvoiceSummary, ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "cancellation reason is required".into(),
            ));
        }

        let cancelled = self
            .db
            .transaction::<_, invoice::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = Invoice::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("Invoice {id} not found")))?;

                    if existing.status == InvoiceStatus::Cancelled {
                        return Err(ServiceError::InvalidStatus(
                            "invoice is already cancelled".into(),
                        ));
                    }

                    let payments = Payment::find()
                        .filter(payment::Column::InvoiceId.eq(id))
                        .all(txn)
                        .await?;
                    let total_paid: Decimal = payments.iter().map(|p| p.amount).sum();
                    if total_paid > Decimal::ZERO {
                        return Err(ServiceError::InvalidOperation(format!(
                            "invoice has {total_paid} in applied payments; reverse it with a credit note"
                        )));
                    }

                    let lines = InvoiceLine::find()
                        .filter(invoice_line::Column::InvoiceId.eq(id))
                        .all(txn)
                        .await?;

                    // Drafts never touched stock, so there is nothing to return.
                    if existing.status != InvoiceStatus::Draft {
                        for line in &lines {
                            if let Some(product_id) = line.product_id {
                                stock::apply_delta_on(
                                    txn,
                                    product_id,
                                    existing.location_id,
                                    line.quantity,
                                    InventoryMovementType::CancellationRestore,
                                    Some(id),
                                    actor,
                                    Some(format!("Cancelled: {reason}")),
                                    Decimal::ZERO,
                                )
                                .await?;
                            }
                        }
                    }

                    let mut active: invoice::ActiveModel = existing.into();
                    active.status = Set(InvoiceStatus::Cancelled);
                    active.cancelled_at = Set(Some(Utc::now()));
                    active.cancelled_by = Set(Some(actor));
                    active.cancellation_reason = Set(Some(reason));
                    active.updated_at = Set(Utc::now());
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(super::txn_err)?;

        info!(invoice_id = %cancelled.id, "invoice cancelled");
        Ok(summary_of(&cancelled))
    }

    /// Hard-deletes a draft. Issued documents are never deleted, only
    /// cancelled, preserving the fiscal-number audit trail.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = Invoice::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("Invoice {id} not found")))?;

                    if existing.status != InvoiceStatus::Draft {
                        return Err(ServiceError::InvalidOperation(
                            "only draft invoices can be deleted; cancel issued documents instead"
                                .into(),
                        ));
                    }

                    InvoiceLine::delete_many()
                        .filter(invoice_line::Column::InvoiceId.eq(id))
                        .exec(txn)
                        .await?;
                    Invoice::delete_by_id(id).exec(txn).await?;
                    Ok(())
                })
            })
            .await
            .map_err(super::txn_err)?;

        info!(invoice_id = %id, "draft invoice deleted");
        Ok(())
    }

    /// Loads one invoice with lines and payments. The returned status is
    /// re-derived from balance and due date; the stored one is advisory.
    pub async fn get(&self, id: Uuid) -> Result<InvoiceDetails, ServiceError> {
        let mut invoice = Invoice::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Invoice {id} not found")))?;
        invoice.status = derive_status(
            invoice.status,
            invoice.balance,
            invoice.due_date,
            Utc::now(),
        );

        let lines = InvoiceLine::find()
            .filter(invoice_line::Column::InvoiceId.eq(id))
            .all(&*self.db)
            .await?;
        let payments = Payment::find()
            .filter(payment::Column::InvoiceId.eq(id))
            .order_by_desc(payment::Column::PaidAt)
            .all(&*self.db)
            .await?;

        Ok(InvoiceDetails {
            invoice,
            lines,
            payments,
        })
    }

    /// Lists invoices newest first, with derived status applied to each row.
    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        filter: InvoiceFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<invoice::Model>, u64), ServiceError> {
        let now = Utc::now();
        let mut query = Invoice::find();

        // OVERDUE is never stored reliably; resolve it from due date and balance.
        match filter.status {
            Some(InvoiceStatus::Overdue) => {
                query = query
                    .filter(invoice::Column::Status.eq(InvoiceStatus::Issued))
                    .filter(invoice::Column::DueDate.lt(now))
                    .filter(invoice::Column::Balance.gt(Decimal::ZERO));
            }
            Some(status) => {
                query = query.filter(invoice::Column::Status.eq(status));
            }
            None => {}
        }
        if let Some(doc_type) = filter.doc_type {
            query = query.filter(invoice::Column::DocType.eq(doc_type));
        }
        if let Some(payment_method) = filter.payment_method {
            query = query.filter(invoice::Column::PaymentMethod.eq(payment_method));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(invoice::Column::CustomerId.eq(customer_id));
        }
        if let Some(location_id) = filter.location_id {
            query = query.filter(invoice::Column::LocationId.eq(location_id));
        }

        let paginator = query
            .order_by_desc(invoice::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let mut rows = paginator.fetch_page(page.saturating_sub(1)).await?;

        for row in &mut rows {
            row.status = derive_status(row.status, row.balance, row.due_date, now);
        }
        Ok((rows, total))
    }
}

/// Authoritative read-time status.
///
/// The stored status is advisory: a zero balance always reads as PAID, an
/// issued document past its due date with an outstanding balance reads as
/// OVERDUE, and a stale PAID with balance outstanding falls back to
/// ISSUED/OVERDUE. Terminal states (DRAFT, CANCELLED) are never rewritten.
pub fn derive_status(
    stored: InvoiceStatus,
    balance: Decimal,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> InvoiceStatus {
    if matches!(stored, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
        return stored;
    }
    let past_due = due_date.map(|due| due < now).unwrap_or(false);

    if balance == Decimal::ZERO {
        InvoiceStatus::Paid
    } else if stored == InvoiceStatus::Issued && past_due {
        InvoiceStatus::Overdue
    } else if stored == InvoiceStatus::Paid {
        if past_due {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Issued
        }
    } else {
        stored
    }
}

/// subtotal = sum(qty * price - line discount) - document discount;
/// tax applies on request (default: fiscal documents only).
pub fn compute_totals(
    lines: &[LineInput],
    discount: Decimal,
    include_tax: Option<bool>,
    doc_type: InvoiceDocType,
    tax_rate: Decimal,
) -> Totals {
    let subtotal: Decimal = lines.iter().map(LineInput::subtotal).sum::<Decimal>() - discount;
    let taxed = include_tax.unwrap_or(doc_type == InvoiceDocType::Fiscal);
    let tax = if taxed {
        subtotal * tax_rate
    } else {
        Decimal::ZERO
    };
    Totals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

fn validate_input(input: &InvoiceInput) -> Result<(), ServiceError> {
    if input.lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "invoice requires at least one line".into(),
        ));
    }
    if input.discount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "discount cannot be negative".into(),
        ));
    }
    for line in &input.lines {
        if line.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "line quantities must be positive".into(),
            ));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "line prices cannot be negative".into(),
            ));
        }
        if line.discount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "line discounts cannot be negative".into(),
            ));
        }
    }
    Ok(())
}

fn require_valid_tax_id(name: &str, identification: Option<&str>) -> Result<(), ServiceError> {
    let identification = identification.ok_or_else(|| {
        ServiceError::InvalidOperation(format!(
            "customer {name} has no tax identification; fiscal invoices require one"
        ))
    })?;
    validate_tax_id(identification).map_err(|e| {
        ServiceError::InvalidOperation(format!("customer {name} has an invalid tax id: {e}"))
    })?;
    Ok(())
}

/// Next FA-NNNNNN display number, derived from the latest issued one.
async fn next_display_number<C: ConnectionTrait>(db: &C) -> Result<String, ServiceError> {
    let last = Invoice::find()
        .order_by_desc(invoice::Column::CreatedAt)
        .limit(1)
        .one(db)
        .await?;

    let next = last
        .and_then(|inv| {
            inv.number
                .strip_prefix(DISPLAY_PREFIX)
                .and_then(|digits| digits.parse::<i64>().ok())
        })
        .unwrap_or(0)
        + 1;

    Ok(format!("{DISPLAY_PREFIX}{next:06}"))
}

/// Validates availability for every stock-tracked line, counting `returned`
/// quantities (from the lines being replaced) as available again. A product
/// with zero or negative recorded stock is treated as untracked for this
/// check, which permits first-time stocking via sale.
async fn check_stock_availability<C: ConnectionTrait>(
    db: &C,
    lines: &[LineInput],
    location_id: Uuid,
    returned: &HashMap<Uuid, Decimal>,
) -> Result<(), ServiceError> {
    for line in lines {
        let Some(product_id) = line.product_id else {
            continue;
        };
        let product = Product::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;
        if !product.tracks_stock {
            continue;
        }

        let on_hand = stock::available_on(db, product_id, location_id).await?;
        let available = on_hand + returned.get(&product_id).copied().unwrap_or(Decimal::ZERO);

        if available > Decimal::ZERO && available < line.quantity {
            return Err(ServiceError::InsufficientStock {
                product: format!("{} ({})", product.name, product.code),
                available,
                requested: line.quantity,
            });
        }
    }
    Ok(())
}

async fn insert_lines<C: ConnectionTrait>(
    db: &C,
    invoice_id: Uuid,
    lines: &[LineInput],
) -> Result<(), ServiceError> {
    for line in lines {
        let model = invoice_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_id: Set(invoice_id),
            product_id: Set(line.product_id),
            description: Set(line.description.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            discount: Set(line.discount),
            subtotal: Set(line.subtotal()),
        };
        model.insert(db).await?;
    }
    Ok(())
}

/// Decrements stock for every product line, writing the paired SALE movement.
async fn apply_sale_to_stock<C: ConnectionTrait>(
    db: &C,
    lines: &[LineInput],
    location_id: Uuid,
    invoice_id: Uuid,
    actor: Uuid,
    note: Option<String>,
) -> Result<(), ServiceError> {
    for line in lines {
        if let Some(product_id) = line.product_id {
            stock::apply_delta_on(
                db,
                product_id,
                location_id,
                -line.quantity,
                InventoryMovementType::Sale,
                Some(invoice_id),
                actor,
                note.clone(),
                Decimal::ZERO,
            )
            .await?;
        }
    }
    Ok(())
}

/// Keeps the invoice's SALE cash movement in step with an edit: deleted when
/// the method moved away from cash, updated when the amount changed, created
/// when the method moved into cash.
async fn sync_cash_movement<C: ConnectionTrait>(
    db: &C,
    existing: &invoice::Model,
    new_method: PaymentMethod,
    new_total: Decimal,
    actor: Uuid,
) -> Result<(), ServiceError> {
    let movement = CashMovement::find()
        .filter(cash_movement::Column::InvoiceId.eq(existing.id))
        .filter(cash_movement::Column::MovementType.eq(CashMovementType::Sale))
        .one(db)
        .await?;

    match movement {
        Some(movement) => {
            if new_method != PaymentMethod::Cash {
                CashMovement::delete_by_id(movement.id).exec(db).await?;
            } else if movement.amount != new_total {
                let mut active: cash_movement::ActiveModel = movement.into();
                active.amount = Set(new_total);
                active.update(db).await?;
            }
        }
        None => {
            if new_method == PaymentMethod::Cash {
                if let Some(register) = cash::open_register_on(db, existing.location_id).await? {
                    cash::record_movement_on(
                        db,
                        register.id,
                        CashMovementType::Sale,
                        format!("Invoice {}", existing.number),
                        new_total,
                        PaymentMethod::Cash,
                        Some(existing.id),
                        None,
                        actor,
                    )
                    .await?;
                }
            }
        }
    }
    Ok(())
}

fn summary_of(invoice: &invoice::Model) -> InvoiceSummary {
    InvoiceSummary {
        id: invoice.id,
        number: invoice.number.clone(),
        fiscal_number: invoice.fiscal_number.clone(),
        total: invoice.total,
        balance: invoice.balance,
        status: invoice.status,
    }
}
