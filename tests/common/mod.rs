#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use factura_api::db::{self, DbConfig, DbPool};
use factura_api::entities::{customer, fiscal_sequence, location, product, stock_level};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

/// Fresh in-memory database with the full schema.
///
/// A single pooled connection keeps the in-memory database shared; SQLite
/// opens a separate database per connection otherwise.
pub async fn setup_db() -> Arc<DbPool> {
    let config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout: StdDuration::from_secs(5),
        acquire_timeout: StdDuration::from_secs(5),
        idle_timeout: StdDuration::from_secs(600),
    };
    let db = db::establish_connection_with_config(&config)
        .await
        .expect("connect to in-memory database");
    db::create_schema(&db).await.expect("create schema");
    Arc::new(db)
}

pub fn actor() -> Uuid {
    Uuid::new_v4()
}

pub async fn seed_location(db: &DbPool, name: &str) -> location::Model {
    let now = Utc::now();
    location::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed location")
}

pub async fn seed_customer(db: &DbPool, name: &str, identification: Option<&str>) -> customer::Model {
    let now = Utc::now();
    customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        identification: Set(identification.map(str::to_string)),
        email: Set(None),
        phone: Set(None),
        credit_days: Set(30),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed customer")
}

pub async fn seed_product(
    db: &DbPool,
    code: &str,
    sale_price: Decimal,
    tracks_stock: bool,
) -> product::Model {
    let now = Utc::now();
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        name: Set(format!("Product {code}")),
        sale_price: Set(sale_price),
        tracks_stock: Set(tracks_stock),
        min_stock: Set(Decimal::ZERO),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed product")
}

pub async fn seed_stock(
    db: &DbPool,
    product_id: Uuid,
    location_id: Uuid,
    quantity: Decimal,
) -> stock_level::Model {
    stock_level::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        location_id: Set(location_id),
        quantity: Set(quantity),
        min_stock: Set(Decimal::ZERO),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed stock level")
}

pub async fn seed_sequence(
    db: &DbPool,
    prefix: &str,
    start: i64,
    end: i64,
    location_id: Option<Uuid>,
) -> fiscal_sequence::Model {
    seed_sequence_with_window(db, prefix, start, end, location_id, None).await
}

pub async fn seed_sequence_with_window(
    db: &DbPool,
    prefix: &str,
    start: i64,
    end: i64,
    location_id: Option<Uuid>,
    valid_until: Option<DateTime<Utc>>,
) -> fiscal_sequence::Model {
    let now = Utc::now();
    fiscal_sequence::ActiveModel {
        id: Set(Uuid::new_v4()),
        prefix: Set(prefix.to_string()),
        description: Set(None),
        start_range: Set(start),
        end_range: Set(end),
        current_number: Set(start - 1),
        location_id: Set(location_id),
        valid_from: Set(now - Duration::days(1)),
        valid_until: Set(valid_until),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed fiscal sequence")
}
