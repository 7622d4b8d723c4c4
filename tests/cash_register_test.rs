mod common;

use assert_matches::assert_matches;
use factura_api::entities::cash_movement::CashMovementType;
use factura_api::entities::cash_register::CashRegisterStatus;
use factura_api::entities::invoice::PaymentMethod;
use factura_api::errors::ServiceError;
use factura_api::services::cash::{CashService, ManualMovementKind};
use rust_decimal_macros::dec;

#[tokio::test]
async fn open_close_cycle_computes_expected_and_difference() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let service = CashService::new(db.clone());

    let register = service
        .open(location.id, dec!(500), actor, None)
        .await
        .expect("open");
    assert_eq!(register.status, CashRegisterStatus::Open);
    assert_eq!(register.opening_amount, dec!(500));

    service
        .add_movement(
            location.id,
            ManualMovementKind::ManualEntry,
            "change fund top-up".into(),
            dec!(50),
            PaymentMethod::Cash,
            actor,
        )
        .await
        .expect("entry");
    service
        .add_movement(
            location.id,
            ManualMovementKind::ManualExit,
            "courier".into(),
            dec!(200),
            PaymentMethod::Cash,
            actor,
        )
        .await
        .expect("exit");

    assert_eq!(service.current_balance(location.id).await.unwrap(), dec!(350));

    // difference = counted - (opening + incoming - outgoing)
    let closed = service
        .close(register.id, dec!(340), actor, None)
        .await
        .expect("close");
    assert_eq!(closed.status, CashRegisterStatus::Closed);
    assert_eq!(closed.expected_amount, Some(dec!(350)));
    assert_eq!(closed.closing_amount, Some(dec!(340)));
    assert_eq!(closed.difference, Some(dec!(-10)));

    let movements = service.movements(register.id).await.expect("movements");
    let types: Vec<CashMovementType> = movements.iter().map(|m| m.movement_type).collect();
    assert!(types.contains(&CashMovementType::Opening));
    assert!(types.contains(&CashMovementType::Closing));
}

#[tokio::test]
async fn second_open_at_the_same_location_is_rejected() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let other = common::seed_location(&db, "Annex").await;
    let service = CashService::new(db.clone());

    let register = service
        .open(location.id, dec!(100), actor, None)
        .await
        .expect("open");

    let err = service
        .open(location.id, dec!(100), actor, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    // A different location is independent.
    service
        .open(other.id, dec!(100), actor, None)
        .await
        .expect("open at other location");

    // After closing, the location can open again.
    service
        .close(register.id, dec!(100), actor, None)
        .await
        .expect("close");
    service
        .open(location.id, dec!(250), actor, None)
        .await
        .expect("reopen");
}

#[tokio::test]
async fn closing_twice_is_rejected() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let service = CashService::new(db.clone());

    let register = service
        .open(location.id, dec!(100), actor, None)
        .await
        .expect("open");
    service
        .close(register.id, dec!(100), actor, None)
        .await
        .expect("close");

    let err = service
        .close(register.id, dec!(100), actor, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}

#[tokio::test]
async fn manual_movement_requires_an_open_register() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let service = CashService::new(db.clone());

    let err = service
        .add_movement(
            location.id,
            ManualMovementKind::ManualEntry,
            "late deposit".into(),
            dec!(10),
            PaymentMethod::Cash,
            actor,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::CashRegisterClosed(_));
}

#[tokio::test]
async fn exits_are_stored_negative() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let service = CashService::new(db.clone());

    service
        .open(location.id, dec!(100), actor, None)
        .await
        .expect("open");
    let movement = service
        .add_movement(
            location.id,
            ManualMovementKind::ManualExit,
            "supplies".into(),
            dec!(30),
            PaymentMethod::Cash,
            actor,
        )
        .await
        .expect("exit");
    assert_eq!(movement.amount, dec!(-30));
    assert_eq!(movement.movement_type, CashMovementType::ManualExit);

    let view = service
        .current(location.id)
        .await
        .expect("current")
        .expect("open register");
    assert_eq!(view.total_out, dec!(30));
    assert_eq!(view.current_balance, dec!(70));
}

#[tokio::test]
async fn history_reports_both_sessions_with_totals() {
    let db = common::setup_db().await;
    let actor = common::actor();
    let location = common::seed_location(&db, "Main").await;
    let service = CashService::new(db.clone());

    let first = service
        .open(location.id, dec!(100), actor, None)
        .await
        .expect("open");
    service
        .close(first.id, dec!(100), actor, None)
        .await
        .expect("close");
    service
        .open(location.id, dec!(200), actor, None)
        .await
        .expect("reopen");

    let history = service.history(Some(location.id)).await.expect("history");
    assert_eq!(history.len(), 2);
    // Newest first.
    assert_eq!(history[0].register.opening_amount, dec!(200));
    assert_eq!(history[0].register.status, CashRegisterStatus::Open);
    assert_eq!(history[1].register.status, CashRegisterStatus::Closed);
}
