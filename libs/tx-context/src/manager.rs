use std::sync::Arc;

use async_trait::async_trait;

use crate::error::InfraError;

/// An open unit of work.
///
/// `R` is the repository surface the transaction exposes. Everything read or
/// written through [`Transaction::repositories`] becomes visible to others only
/// after [`Transaction::commit`]. Once committed or rolled back, the surface
/// must reject further use.
#[async_trait]
pub trait Transaction<R: ?Sized + Send + Sync>: Send + Sync {
    /// Transactional view of the repositories.
    fn repositories(&self) -> Arc<R>;

    async fn commit(self: Box<Self>) -> Result<(), InfraError>;

    async fn rollback(self: Box<Self>) -> Result<(), InfraError>;
}

/// Opens transactions over a repository surface `R`.
#[async_trait]
pub trait TransactionManager<R: ?Sized + Send + Sync>: Send + Sync {
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction<R>>, InfraError>;
}
