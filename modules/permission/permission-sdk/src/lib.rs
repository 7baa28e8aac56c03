#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Permission SDK
//!
//! Public API of the `permission` module:
//!
//! - [`PermissionClient`] - scope checks and role assignment for consumers
//! - [`Resource`], [`Role`], [`IdentityRole`], [`RoleMapping`], [`Membership`] - authorization data model
//! - [`PermissionError`] - error type; [`PermissionError::Forbidden`] is the denial outcome
//!
//! ## Usage
//!
//! ```ignore
//! use permission_sdk::PermissionClient;
//!
//! // Enforcement point: every mutating operation checks first.
//! permissions.require_scope(identity_id, &space_id, "manage").await?;
//!
//! // Plain question, no error on denial.
//! if permissions.has_scope(identity_id, &space_id, "view").await? {
//!     // ...
//! }
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::PermissionClient;
pub use error::PermissionError;
pub use models::{
    IdentityRole, MANAGE_SCOPE, Membership, NewRoleAssignment, Resource, Role, RoleMapping,
};
