mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use factura_api::entities::cash_movement::{self, CashMovementType, Entity as CashMovement};
use factura_api::entities::inventory_movement::{
    self, Entity as InventoryMovement, InventoryMovementType,
};
use factura_api::entities::invoice::{InvoiceDocType, InvoiceStatus, PaymentMethod};
use factura_api::errors::ServiceError;
use factura_api::services::cash::CashService;
use factura_api::services::invoices::{InvoiceInput, InvoiceService, LineInput};
use factura_api::services::receivables::{PaymentAllocation, PaymentInput, ReceivablesService};
use factura_api::services::stock::StockService;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

const TAX_RATE: Decimal = dec!(0.18);

fn line(product_id: Option<Uuid>, quantity: Decimal, price: Decimal) -> LineInput {
    LineInput {
        product_id,
        description: "test item".into(),
        quantity,
        unit_price: price,
        discount: Decimal::ZERO,
    }
}

fn input(location_id: Uuid, lines: Vec<LineInput>) -> InvoiceInput {
    InvoiceInput {
        customer_id: None,
        doc_type: InvoiceDocType::NonFiscal,
        payment_method: PaymentMethod::Transfer,
        location_id,
        issue_date: None,
        due_date: None,
        lines,
        discount: Decimal::ZERO,
        include_tax: None,
        draft: false,
        notes: None,
    }
}

#[tokio::test]
async fn fiscal_cash_invoice_touches_all_four_ledgers() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let customer = common::seed_customer(&db, "Acme", Some("131246789")).await;
    let product = common::seed_product(&db, "SKU-1", dec!(100), true).await;
    common::seed_stock(&db, product.id, location.id, dec!(10)).await;
    common::seed_sequence(&db, "FACE", 1, 1000, None).await;

    let cash = CashService::new(db.clone());
    cash.open(location.id, dec!(500), actor, None)
        .await
        .expect("open register");

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let mut request = input(location.id, vec![line(Some(product.id), dec!(2), dec!(100))]);
    request.customer_id = Some(customer.id);
    request.doc_type = InvoiceDocType::Fiscal;
    request.payment_method = PaymentMethod::Cash;

    let summary = service.create(request, actor).await.expect("create invoice");

    assert_eq!(summary.status, InvoiceStatus::Issued);
    assert_eq!(summary.total, dec!(236));
    assert_eq!(summary.balance, dec!(0));
    assert_eq!(summary.fiscal_number.as_deref(), Some("FACE-00000001"));
    assert!(summary.number.starts_with("FA-"));

    // Stock ledger: decremented with a paired SALE movement.
    let stock = StockService::new(db.clone());
    let level = stock
        .get_level(product.id, location.id)
        .await
        .expect("level query")
        .expect("level exists");
    assert_eq!(level.quantity, dec!(8));

    let movements = InventoryMovement::find()
        .filter(inventory_movement::Column::DocumentId.eq(summary.id))
        .all(&*db)
        .await
        .expect("movements");
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, InventoryMovementType::Sale);
    assert_eq!(movements[0].quantity, dec!(-2));
    assert_eq!(movements[0].balance, dec!(8));

    // Cash ledger: one SALE movement for the invoice total.
    let cash_movements = CashMovement::find()
        .filter(cash_movement::Column::InvoiceId.eq(summary.id))
        .all(&*db)
        .await
        .expect("cash movements");
    assert_eq!(cash_movements.len(), 1);
    assert_eq!(cash_movements[0].movement_type, CashMovementType::Sale);
    assert_eq!(cash_movements[0].amount, dec!(236));
}

#[tokio::test]
async fn draft_skips_fiscal_number_stock_and_cash() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let product = common::seed_product(&db, "SKU-1", dec!(100), true).await;
    common::seed_stock(&db, product.id, location.id, dec!(10)).await;
    common::seed_sequence(&db, "FACE", 1, 1000, None).await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let mut request = input(location.id, vec![line(Some(product.id), dec!(2), dec!(100))]);
    request.doc_type = InvoiceDocType::Fiscal;
    request.payment_method = PaymentMethod::Cash; // no open register needed for drafts
    request.draft = true;

    let summary = service.create(request, actor).await.expect("create draft");
    assert_eq!(summary.status, InvoiceStatus::Draft);
    assert_eq!(summary.fiscal_number, None);
    assert_eq!(summary.balance, dec!(0));
    assert_eq!(summary.total, dec!(236));

    let stock = StockService::new(db.clone());
    let level = stock
        .get_level(product.id, location.id)
        .await
        .expect("level query")
        .expect("level exists");
    assert_eq!(level.quantity, dec!(10));
}

#[tokio::test]
async fn insufficient_stock_is_rejected_with_amounts() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let product = common::seed_product(&db, "SKU-1", dec!(100), true).await;
    common::seed_stock(&db, product.id, location.id, dec!(5)).await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let request = input(location.id, vec![line(Some(product.id), dec!(8), dec!(100))]);

    let err = service.create(request, actor).await.unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock { available, requested, .. } => {
            assert_eq!(available, dec!(5));
            assert_eq!(requested, dec!(8));
        }
    );
}

#[tokio::test]
async fn zero_recorded_stock_permits_first_time_stocking_via_sale() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let product = common::seed_product(&db, "SKU-1", dec!(100), true).await;
    // no stock level row at all

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let request = input(location.id, vec![line(Some(product.id), dec!(3), dec!(100))]);
    service.create(request, actor).await.expect("create");

    let stock = StockService::new(db.clone());
    let level = stock
        .get_level(product.id, location.id)
        .await
        .expect("level query")
        .expect("level created");
    assert_eq!(level.quantity, dec!(-3));
}

#[tokio::test]
async fn cash_invoice_requires_an_open_register() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let mut request = input(location.id, vec![line(None, dec!(1), dec!(50))]);
    request.payment_method = PaymentMethod::Cash;

    let err = service.create(request, actor).await.unwrap_err();
    assert_matches!(err, ServiceError::CashRegisterClosed(_));
}

#[tokio::test]
async fn fiscal_invoice_without_sequence_is_rejected() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let customer = common::seed_customer(&db, "Acme", Some("131246789")).await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let mut request = input(location.id, vec![line(None, dec!(1), dec!(50))]);
    request.doc_type = InvoiceDocType::Fiscal;
    request.customer_id = Some(customer.id);

    let err = service.create(request, actor).await.unwrap_err();
    assert_matches!(err, ServiceError::NoActiveSequence(_));
}

#[tokio::test]
async fn fiscal_invoice_requires_a_valid_customer_tax_id() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    common::seed_sequence(&db, "FACE", 1, 1000, None).await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);

    let missing = common::seed_customer(&db, "NoId", None).await;
    let mut request = input(location.id, vec![line(None, dec!(1), dec!(50))]);
    request.doc_type = InvoiceDocType::Fiscal;
    request.customer_id = Some(missing.id);
    assert_matches!(
        service.create(request, actor).await.unwrap_err(),
        ServiceError::InvalidOperation(_)
    );

    let invalid = common::seed_customer(&db, "BadId", Some("12345")).await;
    let mut request = input(location.id, vec![line(None, dec!(1), dec!(50))]);
    request.doc_type = InvoiceDocType::Fiscal;
    request.customer_id = Some(invalid.id);
    assert_matches!(
        service.create(request, actor).await.unwrap_err(),
        ServiceError::InvalidOperation(_)
    );
}

#[tokio::test]
async fn credit_invoices_carry_their_total_as_balance() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let mut request = input(location.id, vec![line(None, dec!(10), dec!(100))]);
    request.payment_method = PaymentMethod::Credit;
    request.include_tax = Some(true);

    let summary = service.create(request, actor).await.expect("create");
    assert_eq!(summary.total, dec!(1180));
    assert_eq!(summary.balance, dec!(1180));
}

#[tokio::test]
async fn edit_applies_only_the_net_stock_delta() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let product = common::seed_product(&db, "SKU-1", dec!(100), true).await;
    common::seed_stock(&db, product.id, location.id, dec!(10)).await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let request = input(location.id, vec![line(Some(product.id), dec!(2), dec!(100))]);
    let summary = service.create(request, actor).await.expect("create");

    let stock = StockService::new(db.clone());
    assert_eq!(
        stock
            .get_level(product.id, location.id)
            .await
            .unwrap()
            .unwrap()
            .quantity,
        dec!(8)
    );

    // Grow the line from 2 to 5: validated against the restored baseline of 10.
    let request = input(location.id, vec![line(Some(product.id), dec!(5), dec!(100))]);
    let updated = service.update(summary.id, request, actor).await.expect("update");
    assert_eq!(updated.total, dec!(500));

    assert_eq!(
        stock
            .get_level(product.id, location.id)
            .await
            .unwrap()
            .unwrap()
            .quantity,
        dec!(5)
    );

    // Growing beyond the restored baseline fails with real headroom figures.
    let request = input(location.id, vec![line(Some(product.id), dec!(11), dec!(100))]);
    let err = service.update(summary.id, request, actor).await.unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock { available, requested, .. } => {
            assert_eq!(available, dec!(10));
            assert_eq!(requested, dec!(11));
        }
    );
}

#[tokio::test]
async fn edit_moves_the_cash_movement_with_the_payment_method() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;

    let cash = CashService::new(db.clone());
    cash.open(location.id, dec!(100), actor, None)
        .await
        .expect("open register");

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let mut request = input(location.id, vec![line(None, dec!(1), dec!(200))]);
    request.payment_method = PaymentMethod::Cash;
    let summary = service.create(request, actor).await.expect("create");

    // Away from cash: the SALE movement disappears.
    let request = input(location.id, vec![line(None, dec!(1), dec!(200))]);
    service.update(summary.id, request, actor).await.expect("update");
    let remaining = CashMovement::find()
        .filter(cash_movement::Column::InvoiceId.eq(summary.id))
        .all(&*db)
        .await
        .expect("query");
    assert!(remaining.is_empty());

    // Back into cash with a new amount: recreated at the new total.
    let mut request = input(location.id, vec![line(None, dec!(1), dec!(350))]);
    request.payment_method = PaymentMethod::Cash;
    service.update(summary.id, request, actor).await.expect("update");
    let recreated = CashMovement::find()
        .filter(cash_movement::Column::InvoiceId.eq(summary.id))
        .all(&*db)
        .await
        .expect("query");
    assert_eq!(recreated.len(), 1);
    assert_eq!(recreated[0].amount, dec!(350));
}

#[tokio::test]
async fn edit_is_rejected_once_payments_exist() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let customer = common::seed_customer(&db, "Acme", Some("131246789")).await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let mut request = input(location.id, vec![line(None, dec!(1), dec!(500))]);
    request.payment_method = PaymentMethod::Credit;
    request.customer_id = Some(customer.id);
    let summary = service.create(request, actor).await.expect("create");

    let receivables = ReceivablesService::new(db.clone());
    receivables
        .create_payment(
            PaymentInput {
                customer_id: customer.id,
                amount: dec!(100),
                method: PaymentMethod::Transfer,
                reference: None,
                paid_at: None,
                allocation: PaymentAllocation::Selected(vec![summary.id]),
            },
            actor,
        )
        .await
        .expect("apply payment");

    let request = input(location.id, vec![line(None, dec!(1), dec!(500))]);
    let err = service.update(summary.id, request, actor).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn cancel_restores_stock_exactly_once() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let product = common::seed_product(&db, "SKU-1", dec!(100), true).await;
    common::seed_stock(&db, product.id, location.id, dec!(10)).await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let request = input(location.id, vec![line(Some(product.id), dec!(4), dec!(100))]);
    let summary = service.create(request, actor).await.expect("create");

    let stock = StockService::new(db.clone());
    assert_eq!(
        stock
            .get_level(product.id, location.id)
            .await
            .unwrap()
            .unwrap()
            .quantity,
        dec!(6)
    );

    let cancelled = service
        .cancel(summary.id, "customer returned".into(), actor)
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

    // stockAfterCancel == stockBeforeSale
    assert_eq!(
        stock
            .get_level(product.id, location.id)
            .await
            .unwrap()
            .unwrap()
            .quantity,
        dec!(10)
    );

    let restores = InventoryMovement::find()
        .filter(inventory_movement::Column::DocumentId.eq(summary.id))
        .filter(
            inventory_movement::Column::MovementType
                .eq(InventoryMovementType::CancellationRestore),
        )
        .all(&*db)
        .await
        .expect("movements");
    assert_eq!(restores.len(), 1);
    assert_eq!(restores[0].quantity, dec!(4));

    // Cancelling twice is rejected.
    let err = service
        .cancel(summary.id, "again".into(), actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}

#[tokio::test]
async fn cancel_is_rejected_when_payments_exist() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let customer = common::seed_customer(&db, "Acme", Some("131246789")).await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let mut request = input(location.id, vec![line(None, dec!(1), dec!(300))]);
    request.payment_method = PaymentMethod::Credit;
    request.customer_id = Some(customer.id);
    let summary = service.create(request, actor).await.expect("create");

    let receivables = ReceivablesService::new(db.clone());
    receivables
        .create_payment(
            PaymentInput {
                customer_id: customer.id,
                amount: dec!(50),
                method: PaymentMethod::Transfer,
                reference: None,
                paid_at: None,
                allocation: PaymentAllocation::AllOpen,
            },
            actor,
        )
        .await
        .expect("apply payment");

    let err = service
        .cancel(summary.id, "mistake".into(), actor)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn only_drafts_can_be_deleted() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);

    let mut request = input(location.id, vec![line(None, dec!(1), dec!(50))]);
    request.draft = true;
    let draft = service.create(request, actor).await.expect("create draft");
    service.delete(draft.id).await.expect("delete draft");
    assert_matches!(
        service.get(draft.id).await.unwrap_err(),
        ServiceError::NotFound(_)
    );

    let request = input(location.id, vec![line(None, dec!(1), dec!(50))]);
    let issued = service.create(request, actor).await.expect("create issued");
    assert_matches!(
        service.delete(issued.id).await.unwrap_err(),
        ServiceError::InvalidOperation(_)
    );
}

#[tokio::test]
async fn read_path_derives_overdue_status() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let customer = common::seed_customer(&db, "Acme", Some("131246789")).await;

    let service = InvoiceService::new(db.clone(), TAX_RATE);
    let mut request = input(location.id, vec![line(None, dec!(1), dec!(400))]);
    request.payment_method = PaymentMethod::Credit;
    request.customer_id = Some(customer.id);
    request.due_date = Some(Utc::now() - Duration::days(5));
    let summary = service.create(request, actor).await.expect("create");
    assert_eq!(summary.status, InvoiceStatus::Issued);

    let details = service.get(summary.id).await.expect("get");
    assert_eq!(details.invoice.status, InvoiceStatus::Overdue);
}
