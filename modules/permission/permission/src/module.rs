use std::sync::Arc;

use anyhow::Context;
use permission_sdk::PermissionClient;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tx_context::sea::SeaTransactionManager;
use tx_context::{ServiceContext, TransactionManager};

use crate::config::{DatabaseConfig, PermissionConfig};
use crate::domain::local_client::PermissionLocalClient;
use crate::domain::repos::Repositories;
use crate::domain::service::{PermissionContext, Services, ServicesBuilder};
use crate::infra::storage::migrations::Migrator;
use crate::infra::storage::{InMemoryStore, SeaRepositories};

/// Wired permission module: storage backend, services and client.
pub struct PermissionModule {
    services: Arc<Services>,
    client: Arc<dyn PermissionClient>,
}

impl PermissionModule {
    /// Builds the module with default collaborators.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be reached or migrated.
    pub async fn init(config: &PermissionConfig) -> anyhow::Result<Self> {
        Self::init_with(config, |builder| builder).await
    }

    /// Builds the module, letting `customize` replace collaborators such as the
    /// notification port before the services are created.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be reached or migrated.
    pub async fn init_with<F>(config: &PermissionConfig, customize: F) -> anyhow::Result<Self>
    where
        F: FnOnce(ServicesBuilder) -> ServicesBuilder,
    {
        info!("Initializing permission module");

        let (repositories, transactions) = match &config.database {
            Some(db) => {
                let conn = connect(db).await?;
                let manager = SeaTransactionManager::new(conn, |runner| -> Arc<dyn Repositories> {
                    Arc::new(SeaRepositories::new(runner))
                });
                let repositories = manager.repositories();
                let transactions: Arc<dyn TransactionManager<dyn Repositories>> = Arc::new(manager);
                (repositories, transactions)
            }
            None => {
                info!("No database configured, using in-memory storage");
                let store = InMemoryStore::new();
                let repositories = store.repositories();
                let transactions: Arc<dyn TransactionManager<dyn Repositories>> = Arc::new(store);
                (repositories, transactions)
            }
        };

        let context = Arc::new(ServiceContext::new(
            repositories,
            transactions,
            config.tx_config(),
        ));
        let builder = Services::builder(context).traversal_limits(config.traversal_limits());
        let services = Arc::new(customize(builder).build());
        let client: Arc<dyn PermissionClient> =
            Arc::new(PermissionLocalClient::new(Arc::clone(&services)));

        info!(
            timeout_ms = u64::try_from(config.transaction_timeout.as_millis()).unwrap_or(u64::MAX),
            max_membership_depth = config.max_membership_depth,
            max_hierarchy_depth = config.max_hierarchy_depth,
            "Permission module initialized"
        );
        Ok(Self { services, client })
    }

    #[must_use]
    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    #[must_use]
    pub fn context(&self) -> &PermissionContext {
        self.services.context()
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn PermissionClient> {
        Arc::clone(&self.client)
    }
}

async fn connect(db: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(db.url.clone());
    opts.max_connections(db.max_connections).sqlx_logging(false);

    let conn = Database::connect(opts)
        .await
        .context("failed to connect to permission database")?;
    Migrator::up(&conn, None)
        .await
        .context("failed to run permission migrations")?;

    info!(backend = ?conn.get_database_backend(), "Permission database ready");
    Ok(conn)
}
