pub mod identity_role;
pub mod membership;
pub mod resource;
pub mod role;
pub mod role_mapping;
pub mod role_scope;
