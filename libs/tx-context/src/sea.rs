//! `sea_orm` adapter.
//!
//! [`SeaTransactionManager`] begins a `DatabaseTransaction` and parks it in a
//! [`SharedTx`] slot. Repositories execute statements through a [`SeaRunner`],
//! which implements [`ConnectionTrait`] for both the pooled connection and the
//! parked transaction, so one repository implementation serves both handles.
//! Commit and rollback take the transaction out of the slot; statements issued
//! afterwards fail instead of silently running outside the transaction.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, ExecResult,
    QueryResult, Statement, TransactionTrait,
};
use tokio::sync::Mutex;

use crate::error::InfraError;
use crate::manager::{Transaction, TransactionManager};

const TRANSACTION_CLOSED: &str = "transaction is already committed or rolled back";

/// An open `DatabaseTransaction` shared between the transaction owner and the
/// repositories issued for it.
#[derive(Clone)]
pub struct SharedTx {
    slot: Arc<Mutex<Option<DatabaseTransaction>>>,
}

impl SharedTx {
    #[must_use]
    pub fn new(txn: DatabaseTransaction) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(txn))),
        }
    }

    async fn take(&self) -> Option<DatabaseTransaction> {
        self.slot.lock().await.take()
    }
}

/// Statement executor used by repositories.
#[derive(Clone)]
pub enum SeaRunner {
    Conn(DatabaseConnection),
    Tx { backend: DbBackend, tx: SharedTx },
}

fn closed() -> DbErr {
    DbErr::Custom(TRANSACTION_CLOSED.to_owned())
}

#[async_trait]
impl ConnectionTrait for SeaRunner {
    fn get_database_backend(&self) -> DbBackend {
        match self {
            Self::Conn(conn) => conn.get_database_backend(),
            Self::Tx { backend, .. } => *backend,
        }
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        match self {
            Self::Conn(conn) => conn.execute(stmt).await,
            Self::Tx { tx, .. } => match tx.slot.lock().await.as_ref() {
                Some(txn) => txn.execute(stmt).await,
                None => Err(closed()),
            },
        }
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        match self {
            Self::Conn(conn) => conn.execute_unprepared(sql).await,
            Self::Tx { tx, .. } => match tx.slot.lock().await.as_ref() {
                Some(txn) => txn.execute_unprepared(sql).await,
                None => Err(closed()),
            },
        }
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        match self {
            Self::Conn(conn) => conn.query_one(stmt).await,
            Self::Tx { tx, .. } => match tx.slot.lock().await.as_ref() {
                Some(txn) => txn.query_one(stmt).await,
                None => Err(closed()),
            },
        }
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        match self {
            Self::Conn(conn) => conn.query_all(stmt).await,
            Self::Tx { tx, .. } => match tx.slot.lock().await.as_ref() {
                Some(txn) => txn.query_all(stmt).await,
                None => Err(closed()),
            },
        }
    }
}

type RepositoryFactory<R> = dyn Fn(SeaRunner) -> Arc<R> + Send + Sync;

/// [`TransactionManager`] over a `sea_orm` connection.
///
/// `factory` builds the repository surface `R` for a runner; it is invoked
/// once for the ordinary handle and once per transaction.
pub struct SeaTransactionManager<R: ?Sized> {
    conn: DatabaseConnection,
    factory: Arc<RepositoryFactory<R>>,
}

impl<R: ?Sized + Send + Sync + 'static> SeaTransactionManager<R> {
    pub fn new<F>(conn: DatabaseConnection, factory: F) -> Self
    where
        F: Fn(SeaRunner) -> Arc<R> + Send + Sync + 'static,
    {
        Self {
            conn,
            factory: Arc::new(factory),
        }
    }

    /// Repositories bound to the ordinary (non-transactional) connection.
    #[must_use]
    pub fn repositories(&self) -> Arc<R> {
        (self.factory)(SeaRunner::Conn(self.conn.clone()))
    }
}

#[async_trait]
impl<R: ?Sized + Send + Sync + 'static> TransactionManager<R> for SeaTransactionManager<R> {
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction<R>>, InfraError> {
        let txn = self.conn.begin().await?;
        let tx = SharedTx::new(txn);
        let runner = SeaRunner::Tx {
            backend: self.conn.get_database_backend(),
            tx: tx.clone(),
        };
        Ok(Box::new(SeaTransaction {
            tx,
            repositories: (self.factory)(runner),
        }))
    }
}

struct SeaTransaction<R: ?Sized> {
    tx: SharedTx,
    repositories: Arc<R>,
}

#[async_trait]
impl<R: ?Sized + Send + Sync + 'static> Transaction<R> for SeaTransaction<R> {
    fn repositories(&self) -> Arc<R> {
        Arc::clone(&self.repositories)
    }

    async fn commit(self: Box<Self>) -> Result<(), InfraError> {
        let txn = self
            .tx
            .take()
            .await
            .ok_or_else(|| InfraError::new(TRANSACTION_CLOSED))?;
        txn.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), InfraError> {
        let txn = self
            .tx
            .take()
            .await
            .ok_or_else(|| InfraError::new(TRANSACTION_CLOSED))?;
        txn.rollback().await?;
        Ok(())
    }
}
