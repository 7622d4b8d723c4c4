use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a tenant-scoped database connection pool.
pub type DbPool = DatabaseConnection;

/// Configuration for a database connection.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(8),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl DbConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            url: config.database_url.clone(),
            max_connections: config.pool.max_connections,
            min_connections: config.pool.min_connections,
            connect_timeout: Duration::from_secs(config.pool.connect_timeout_secs),
            acquire_timeout: Duration::from_secs(config.pool.acquire_timeout_secs),
            idle_timeout: Duration::from_secs(config.pool.idle_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

/// Establishes a connection pool with explicit pool settings.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(max_connections = config.max_connections, "configuring database connection");

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(opt).await?;
    info!(max_connections = config.max_connections, "database connection established");
    Ok(pool)
}

pub async fn establish_connection_from_app_config(
    config: &AppConfig,
) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(&DbConfig::from_app_config(config)).await
}

/// Creates every table for this core's entities on a fresh database.
///
/// Production deployments run versioned migrations instead; this bootstrap
/// serves embedded/test databases where the schema is derived from the
/// entities themselves.
pub async fn create_schema(db: &DbPool) -> Result<(), ServiceError> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    db.execute(backend.build(&schema.create_table_from_entity(crate::entities::customer::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(crate::entities::product::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(crate::entities::location::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(crate::entities::invoice::Entity)))
        .await?;
    db.execute(
        backend.build(&schema.create_table_from_entity(crate::entities::invoice_line::Entity)),
    )
    .await?;
    db.execute(backend.build(&schema.create_table_from_entity(crate::entities::payment::Entity)))
        .await?;
    db.execute(
        backend.build(&schema.create_table_from_entity(crate::entities::stock_level::Entity)),
    )
    .await?;
    db.execute(
        backend
            .build(&schema.create_table_from_entity(crate::entities::inventory_movement::Entity)),
    )
    .await?;
    db.execute(
        backend.build(&schema.create_table_from_entity(crate::entities::cash_register::Entity)),
    )
    .await?;
    db.execute(
        backend.build(&schema.create_table_from_entity(crate::entities::cash_movement::Entity)),
    )
    .await?;
    db.execute(
        backend.build(&schema.create_table_from_entity(crate::entities::fiscal_sequence::Entity)),
    )
    .await?;

    Ok(())
}
