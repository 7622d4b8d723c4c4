use crate::db::{self, DbConfig, DbPool};
use crate::errors::ServiceError;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Registry of tenant-scoped database connections.
///
/// Every operation in this core receives a connection resolved through this
/// registry; there is no process-wide database singleton. Tenant provisioning
/// (creating the databases themselves) happens outside this core; the
/// registry only connects to databases that already exist.
pub struct TenantRegistry {
    pools: DashMap<String, Arc<DbPool>>,
    urls: DashMap<String, String>,
    pool_template: DbConfig,
}

impl TenantRegistry {
    pub fn new(pool_template: DbConfig) -> Self {
        Self {
            pools: DashMap::new(),
            urls: DashMap::new(),
            pool_template,
        }
    }

    /// Registers a tenant's database URL. Connections are opened lazily.
    pub fn register(&self, tenant: impl Into<String>, database_url: impl Into<String>) {
        self.urls.insert(tenant.into(), database_url.into());
    }

    /// Registers a tenant with an already-open connection (used by tests and
    /// embedded setups).
    pub fn register_pool(&self, tenant: impl Into<String>, pool: Arc<DbPool>) {
        self.pools.insert(tenant.into(), pool);
    }

    /// Resolves the connection for a tenant, connecting on first use.
    pub async fn resolve(&self, tenant: &str) -> Result<Arc<DbPool>, ServiceError> {
        if let Some(pool) = self.pools.get(tenant) {
            return Ok(pool.clone());
        }

        let url = self
            .urls
            .get(tenant)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Unknown tenant {tenant}")))?;

        let config = DbConfig {
            url,
            ..self.pool_template.clone()
        };
        let pool = Arc::new(db::establish_connection_with_config(&config).await?);
        info!(%tenant, "tenant connection established");
        self.pools.insert(tenant.to_string(), pool.clone());
        Ok(pool)
    }

    pub fn known_tenants(&self) -> Vec<String> {
        self.urls
            .iter()
            .map(|e| e.key().clone())
            .chain(self.pools.iter().map(|e| e.key().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_tenant_is_not_found() {
        let registry = TenantRegistry::new(DbConfig::default());
        let err = registry.resolve("nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn registered_pool_is_resolved() {
        let registry = TenantRegistry::new(DbConfig::default());
        let pool = Arc::new(
            db::establish_connection("sqlite::memory:")
                .await
                .expect("connect"),
        );
        registry.register_pool("acme", pool.clone());
        let resolved = registry.resolve("acme").await.expect("resolve");
        assert!(Arc::ptr_eq(&pool, &resolved));
    }
}
