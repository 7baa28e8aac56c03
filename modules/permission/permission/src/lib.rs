//! Permission Module
//!
//! Decides whether an identity holds a scope on a resource. A scope can be held
//! directly, through (nested) group membership, or inherited from an ancestor
//! resource via role mappings. Every decision reads through an
//! [`ExecutionContext`](tx_context::ExecutionContext), so it observes either the
//! committed state or the caller's open transaction, never a mix.
//!
//! ## Architecture
//!
//! ### Contract Layer (`permission-sdk`)
//! - **Location:** `modules/permission/permission-sdk/`
//! - **Contains:** `PermissionClient` trait, data model (`Resource`, `Role`,
//!   `IdentityRole`, `RoleMapping`, `Membership`), `PermissionError`
//!
//! ### Domain Layer (`permission::domain`)
//! - `repos.rs` - repository traits and the `Repositories` access surface
//! - `resolver.rs` - scope resolution over memberships and the resource hierarchy
//! - `service/` - `PermissionService`, `RoleManagementService` and the `Services` container
//! - `ports.rs` - notification port for role changes
//! - `local_client.rs` - in-process `PermissionClient`
//! - **Rule:** MUST NOT import `infra::*`
//!
//! ### Infrastructure Layer (`permission::infra`)
//! - `storage/memory.rs` - in-memory store with snapshot transactions
//! - `storage/entity/`, `storage/migrations/`, `storage/sea_orm_repo.rs` - `SeaORM` backend
//!
//! ## Public API
//!
//! The public API lives in `permission-sdk` and is re-exported here. Build the
//! module with [`PermissionModule::init`] and use [`PermissionModule::client`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

// === PUBLIC API (from SDK) ===
pub use permission_sdk::{
    IdentityRole, Membership, NewRoleAssignment, PermissionClient, PermissionError, Resource,
    Role, RoleMapping,
};

// === MODULE DEFINITION ===
pub mod module;
pub use module::PermissionModule;

pub mod config;
pub use config::PermissionConfig;

// === INTERNAL MODULES ===
// Exposed for integration tests and alternative wiring; prefer the SDK types.
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;

#[cfg(test)]
mod test_support;
