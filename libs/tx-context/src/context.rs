use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::TxConfig;
use crate::error::TxError;
use crate::manager::{Transaction, TransactionManager};

/// Long-lived wiring shared by every execution context of a service graph:
/// the ordinary repository handle, the transaction manager and its configuration.
pub struct ServiceContext<R: ?Sized + Send + Sync> {
    repositories: Arc<R>,
    transactions: Arc<dyn TransactionManager<R>>,
    config: TxConfig,
}

impl<R: ?Sized + Send + Sync> ServiceContext<R> {
    pub fn new(
        repositories: Arc<R>,
        transactions: Arc<dyn TransactionManager<R>>,
        config: TxConfig,
    ) -> Self {
        Self {
            repositories,
            transactions,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TxConfig {
        &self.config
    }
}

/// Effects queued by a unit of work, released by the outermost commit.
#[derive(Clone, Default)]
struct TxScope {
    effects: Arc<Mutex<Vec<BoxFuture<'static, ()>>>>,
}

impl TxScope {
    /// A panicking effect is logged and skipped; the commit already happened.
    async fn run_effects(self) {
        let effects = std::mem::take(&mut *self.effects.lock());
        for effect in effects {
            if let Err(payload) = AssertUnwindSafe(effect).catch_unwind().await {
                tracing::warn!(
                    error = %panic_message(payload.as_ref()),
                    "post-commit effect panicked"
                );
            }
        }
    }
}

/// Immutable per-call view of a [`ServiceContext`].
///
/// A root context reads through the ordinary repository handle. A context handed
/// to a unit of work reads and writes through the transactional handle and reports
/// [`in_transaction`](Self::in_transaction). Cloning is cheap; clones share the
/// same handle.
pub struct ExecutionContext<R: ?Sized + Send + Sync> {
    service: Arc<ServiceContext<R>>,
    repositories: Arc<R>,
    scope: Option<TxScope>,
}

impl<R: ?Sized + Send + Sync> Clone for ExecutionContext<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            repositories: Arc::clone(&self.repositories),
            scope: self.scope.clone(),
        }
    }
}

impl<R: ?Sized + Send + Sync> fmt::Debug for ExecutionContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("in_transaction", &self.in_transaction())
            .field("config", &self.service.config)
            .finish_non_exhaustive()
    }
}

impl<R: ?Sized + Send + Sync> ExecutionContext<R> {
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.scope.is_some()
    }

    #[must_use]
    pub fn config(&self) -> &TxConfig {
        self.service.config()
    }
}

impl<R: ?Sized + Send + Sync + 'static> ExecutionContext<R> {
    /// Root context: outside any transaction.
    #[must_use]
    pub fn new(service: Arc<ServiceContext<R>>) -> Self {
        let repositories = Arc::clone(&service.repositories);
        Self {
            service,
            repositories,
            scope: None,
        }
    }

    /// The repository handle this context routes to: transactional inside a unit
    /// of work, ordinary otherwise.
    #[must_use]
    pub fn repositories(&self) -> Arc<R> {
        Arc::clone(&self.repositories)
    }

    /// Runs `work` atomically.
    ///
    /// Outside a transaction this begins one, hands `work` a transactional
    /// context and runs it on a spawned task. The deadline starts once the
    /// transaction has begun. Whichever comes first, completion or deadline,
    /// decides the outcome: success commits, anything else rolls back. On
    /// timeout the task is detached and its eventual result ignored.
    ///
    /// The race and the commit or rollback run on their own supervising task,
    /// so dropping the returned future does not leave the transaction open.
    ///
    /// Inside a transaction `work` runs inline on the current context. The
    /// enclosing call owns commit, rollback and the deadline.
    ///
    /// # Errors
    ///
    /// - [`TxError::Domain`] when `work` returns an error
    /// - [`TxError::Begin`] / [`TxError::Commit`] on transaction infrastructure failure
    /// - [`TxError::Timeout`] when the deadline elapses first
    /// - [`TxError::Panicked`] / [`TxError::Cancelled`] when the task does not finish normally
    pub async fn execute_in_transaction<T, E, F, Fut>(&self, work: F) -> Result<T, TxError<E>>
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        F: FnOnce(ExecutionContext<R>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if self.in_transaction() {
            tracing::trace!("joining enclosing transaction");
            return work(self.clone()).await.map_err(TxError::Domain);
        }

        let tx = self
            .service
            .transactions
            .begin_transaction()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "database BeginTransaction failed");
                TxError::Begin(e)
            })?;

        let timeout = self.service.config.timeout;
        let deadline = Instant::now() + timeout;
        let scope = TxScope::default();
        let scoped = Self {
            service: Arc::clone(&self.service),
            repositories: tx.repositories(),
            scope: Some(scope.clone()),
        };

        // The supervisor owns the transaction, so commit or rollback still
        // happens if the caller stops waiting.
        let supervisor = tokio::spawn(
            supervise(tx, scope, scoped, work, deadline, timeout).in_current_span(),
        );
        match supervisor.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(task_failure(join_error)),
        }
    }

    /// Defers `effect` until the outermost transaction commits.
    ///
    /// Queued effects are dropped if the transaction rolls back, times out or
    /// panics. Outside a transaction the effect runs immediately.
    pub async fn after_commit<Fut>(&self, effect: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        match &self.scope {
            Some(scope) => scope.effects.lock().push(effect.boxed()),
            None => effect.await,
        }
    }
}

/// Races `work` against `deadline` and finishes the transaction accordingly.
async fn supervise<R, T, E, F, Fut>(
    tx: Box<dyn Transaction<R>>,
    scope: TxScope,
    scoped: ExecutionContext<R>,
    work: F,
    deadline: Instant,
    timeout: Duration,
) -> Result<T, TxError<E>>
where
    R: ?Sized + Send + Sync + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: FnOnce(ExecutionContext<R>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let handle = tokio::spawn(async move { work(scoped).await }.in_current_span());

    match tokio::time::timeout_at(deadline, handle).await {
        Ok(Ok(Ok(value))) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, "database transaction commit failed");
                TxError::Commit(e)
            })?;
            tracing::debug!("transaction committed");
            scope.run_effects().await;
            Ok(value)
        }
        Ok(Ok(Err(e))) => {
            tracing::error!(error = %e, "database transaction failed");
            rollback(tx).await;
            Err(TxError::Domain(e))
        }
        Ok(Err(join_error)) => {
            let err = task_failure(join_error);
            tracing::error!(error = %err, "database transaction aborted");
            rollback(tx).await;
            Err(err)
        }
        Err(_) => {
            tracing::error!(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "database transaction timeout"
            );
            rollback(tx).await;
            Err(TxError::Timeout(timeout))
        }
    }
}

async fn rollback<R: ?Sized + Send + Sync>(tx: Box<dyn Transaction<R>>) {
    tracing::debug!("Rolling back the transaction");
    if let Err(e) = tx.rollback().await {
        tracing::error!(error = %e, "database transaction rollback failed");
    }
}

fn task_failure<E>(join_error: JoinError) -> TxError<E> {
    if join_error.is_panic() {
        TxError::Panicked(panic_message(join_error.into_panic().as_ref()))
    } else {
        TxError::Cancelled
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unit of work panicked".to_owned()
    }
}
