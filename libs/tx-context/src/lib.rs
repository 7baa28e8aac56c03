//! Transactional execution context.
//!
//! Units of work run through [`ExecutionContext::execute_in_transaction`]. The
//! outermost call opens a transaction through a [`TransactionManager`], runs the
//! work on its own task under a deadline, and then commits or rolls back:
//!
//! - `Ok` from the work commits; [`ExecutionContext::after_commit`] effects run afterwards
//! - `Err` from the work rolls back and returns [`TxError::Domain`]
//! - a panic in the work rolls back and returns [`TxError::Panicked`]
//! - an expired deadline rolls back and returns [`TxError::Timeout`]; the task is abandoned
//!
//! Nested calls join the enclosing unit of work. Whether a context is inside a
//! transaction is a property of the context value itself, never of shared state,
//! so concurrent requests cannot observe each other's transactions.
//!
//! The [`sea`] module adapts a `sea_orm::DatabaseConnection` into a
//! [`TransactionManager`].

mod config;
mod context;
mod error;
mod manager;
pub mod sea;

pub use config::TxConfig;
pub use context::{ExecutionContext, ServiceContext};
pub use error::{InfraError, TxError};
pub use manager::{Transaction, TransactionManager};
