//! In-memory storage.
//!
//! A transaction starts from a snapshot of the committed state, applies its
//! own writes to that snapshot, and records them. Commit replays the record
//! onto the current committed state, all or nothing; rollback drops it. A
//! finished transaction's repositories reject every call.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use permission_sdk::{IdentityRole, Membership, Resource, Role, RoleMapping};
use tx_context::{InfraError, Transaction, TransactionManager};
use uuid::Uuid;

use crate::domain::repos::{
    IdentityRoleRepository, MembershipRepository, Repositories, RepositoryError,
    ResourceRepository, RoleMappingRepository, RoleRepository,
};

#[derive(Debug, Clone, Default)]
struct State {
    resources: HashMap<String, Resource>,
    roles: HashMap<Uuid, Role>,
    identity_roles: BTreeMap<Uuid, IdentityRole>,
    role_mappings: BTreeMap<Uuid, RoleMapping>,
    memberships: BTreeSet<Membership>,
}

#[derive(Debug, Clone)]
enum Mutation {
    CreateResource(Resource),
    CreateRole(Role),
    CreateIdentityRole(IdentityRole),
    DeleteIdentityRole(Uuid),
    CreateRoleMapping(RoleMapping),
    AddMembership(Membership),
    RemoveMembership(Membership),
}

impl State {
    fn check(&self, mutation: &Mutation) -> Result<(), RepositoryError> {
        match mutation {
            Mutation::CreateResource(resource) if self.resources.contains_key(&resource.id) => {
                Err(RepositoryError::conflict("resource", &resource.id))
            }
            Mutation::CreateRole(role)
                if self.roles.contains_key(&role.id)
                    || self.roles.values().any(|r| {
                        r.name == role.name && r.resource_type == role.resource_type
                    }) =>
            {
                Err(RepositoryError::conflict(
                    "role",
                    format!("{}@{}", role.name, role.resource_type),
                ))
            }
            Mutation::CreateIdentityRole(grant) if self.identity_roles.contains_key(&grant.id) => {
                Err(RepositoryError::conflict("identity role", grant.id.to_string()))
            }
            Mutation::CreateRoleMapping(mapping) if self.role_mappings.contains_key(&mapping.id) => {
                Err(RepositoryError::conflict("role mapping", mapping.id.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Returns whether the state changed.
    fn apply(&mut self, mutation: &Mutation) -> bool {
        match mutation {
            Mutation::CreateResource(resource) => self
                .resources
                .insert(resource.id.clone(), resource.clone())
                .is_none(),
            Mutation::CreateRole(role) => self.roles.insert(role.id, role.clone()).is_none(),
            Mutation::CreateIdentityRole(grant) => {
                self.identity_roles.insert(grant.id, grant.clone()).is_none()
            }
            Mutation::DeleteIdentityRole(id) => self.identity_roles.remove(id).is_some(),
            Mutation::CreateRoleMapping(mapping) => self
                .role_mappings
                .insert(mapping.id, mapping.clone())
                .is_none(),
            Mutation::AddMembership(membership) => self.memberships.insert(*membership),
            Mutation::RemoveMembership(membership) => self.memberships.remove(membership),
        }
    }
}

struct Pending {
    working: State,
    log: Vec<Mutation>,
}

/// Open transaction state; `None` once committed or rolled back.
struct TxSlot {
    pending: Mutex<Option<Pending>>,
}

enum View {
    Committed(Arc<RwLock<State>>),
    Transaction(Arc<TxSlot>),
}

/// Repositories over the in-memory store, bound to committed state or to one
/// transaction.
pub struct InMemoryRepositories {
    view: View,
}

impl InMemoryRepositories {
    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> Result<T, RepositoryError> {
        match &self.view {
            View::Committed(state) => Ok(f(&state.read())),
            View::Transaction(slot) => slot
                .pending
                .lock()
                .as_ref()
                .map(|pending| f(&pending.working))
                .ok_or(RepositoryError::TransactionClosed),
        }
    }

    fn write(&self, mutation: Mutation) -> Result<bool, RepositoryError> {
        match &self.view {
            View::Committed(state) => {
                let mut state = state.write();
                state.check(&mutation)?;
                Ok(state.apply(&mutation))
            }
            View::Transaction(slot) => {
                let mut guard = slot.pending.lock();
                let pending = guard.as_mut().ok_or(RepositoryError::TransactionClosed)?;
                pending.working.check(&mutation)?;
                let changed = pending.working.apply(&mutation);
                if changed {
                    pending.log.push(mutation);
                }
                Ok(changed)
            }
        }
    }
}

#[async_trait]
impl ResourceRepository for InMemoryRepositories {
    async fn create(&self, resource: &Resource) -> Result<(), RepositoryError> {
        self.write(Mutation::CreateResource(resource.clone()))?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Resource>, RepositoryError> {
        self.read(|s| s.resources.get(id).cloned())
    }
}

#[async_trait]
impl RoleRepository for InMemoryRepositories {
    async fn create(&self, role: &Role) -> Result<(), RepositoryError> {
        self.write(Mutation::CreateRole(role.clone()))?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Role>, RepositoryError> {
        self.read(|s| s.roles.get(&id).cloned())
    }

    async fn find_by_name(
        &self,
        name: &str,
        resource_type: &str,
    ) -> Result<Option<Role>, RepositoryError> {
        self.read(|s| {
            s.roles
                .values()
                .find(|r| r.name == name && r.resource_type == resource_type)
                .cloned()
        })
    }
}

#[async_trait]
impl IdentityRoleRepository for InMemoryRepositories {
    async fn create(&self, grant: &IdentityRole) -> Result<(), RepositoryError> {
        self.write(Mutation::CreateIdentityRole(grant.clone()))?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        self.write(Mutation::DeleteIdentityRole(id))
    }

    async fn find_for_principals(
        &self,
        identity_ids: &[Uuid],
        resource_ids: &[String],
    ) -> Result<Vec<IdentityRole>, RepositoryError> {
        self.read(|s| {
            s.identity_roles
                .values()
                .filter(|g| identity_ids.contains(&g.identity_id))
                .filter(|g| resource_ids.contains(&g.resource_id))
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl RoleMappingRepository for InMemoryRepositories {
    async fn create(&self, mapping: &RoleMapping) -> Result<(), RepositoryError> {
        self.write(Mutation::CreateRoleMapping(mapping.clone()))?;
        Ok(())
    }

    async fn find_by_source_role(
        &self,
        from_role_id: Uuid,
    ) -> Result<Vec<RoleMapping>, RepositoryError> {
        self.read(|s| {
            s.role_mappings
                .values()
                .filter(|m| m.from_role_id == from_role_id)
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl MembershipRepository for InMemoryRepositories {
    async fn add(&self, membership: Membership) -> Result<(), RepositoryError> {
        self.write(Mutation::AddMembership(membership))?;
        Ok(())
    }

    async fn remove(&self, membership: Membership) -> Result<bool, RepositoryError> {
        self.write(Mutation::RemoveMembership(membership))
    }

    async fn find_group_ids(&self, member_id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        self.read(|s| {
            s.memberships
                .iter()
                .filter(|m| m.member_id == member_id)
                .map(|m| m.group_id)
                .collect()
        })
    }
}

impl Repositories for InMemoryRepositories {
    fn resources(&self) -> &dyn ResourceRepository {
        self
    }

    fn roles(&self) -> &dyn RoleRepository {
        self
    }

    fn identity_roles(&self) -> &dyn IdentityRoleRepository {
        self
    }

    fn role_mappings(&self) -> &dyn RoleMappingRepository {
        self
    }

    fn memberships(&self) -> &dyn MembershipRepository {
        self
    }
}

/// In-memory store; doubles as its own [`TransactionManager`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repositories bound to committed state.
    #[must_use]
    pub fn repositories(&self) -> Arc<dyn Repositories> {
        Arc::new(InMemoryRepositories {
            view: View::Committed(Arc::clone(&self.state)),
        })
    }
}

#[async_trait]
impl TransactionManager<dyn Repositories> for InMemoryStore {
    async fn begin_transaction(
        &self,
    ) -> Result<Box<dyn Transaction<dyn Repositories>>, InfraError> {
        let slot = Arc::new(TxSlot {
            pending: Mutex::new(Some(Pending {
                working: self.state.read().clone(),
                log: Vec::new(),
            })),
        });
        let repositories: Arc<dyn Repositories> = Arc::new(InMemoryRepositories {
            view: View::Transaction(Arc::clone(&slot)),
        });
        Ok(Box::new(InMemoryTransaction {
            committed: Arc::clone(&self.state),
            slot,
            repositories,
        }))
    }
}

struct InMemoryTransaction {
    committed: Arc<RwLock<State>>,
    slot: Arc<TxSlot>,
    repositories: Arc<dyn Repositories>,
}

impl InMemoryTransaction {
    fn finish(&self) -> Result<Pending, InfraError> {
        self.slot
            .pending
            .lock()
            .take()
            .ok_or_else(|| InfraError::new("transaction is already committed or rolled back"))
    }
}

#[async_trait]
impl Transaction<dyn Repositories> for InMemoryTransaction {
    fn repositories(&self) -> Arc<dyn Repositories> {
        Arc::clone(&self.repositories)
    }

    async fn commit(self: Box<Self>) -> Result<(), InfraError> {
        let pending = self.finish()?;
        let mut committed = self.committed.write();
        let mut next = committed.clone();
        for mutation in &pending.log {
            next.check(mutation)
                .map_err(|e| InfraError::new(format!("commit conflict: {e}")))?;
            next.apply(mutation);
        }
        *committed = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), InfraError> {
        self.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn resource(id: &str) -> Resource {
        Resource::root(id, "folder")
    }

    #[tokio::test]
    async fn transaction_writes_are_isolated_until_commit() {
        let store = InMemoryStore::new();
        let committed = store.repositories();
        let tx = store.begin_transaction().await.unwrap();

        tx.repositories()
            .resources()
            .create(&resource("f-1"))
            .await
            .unwrap();

        assert!(tx.repositories().resources().load("f-1").await.unwrap().is_some());
        assert!(committed.resources().load("f-1").await.unwrap().is_none());

        tx.commit().await.unwrap();
        assert!(committed.resources().load("f-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = InMemoryStore::new();
        let tx = store.begin_transaction().await.unwrap();
        tx.repositories()
            .resources()
            .create(&resource("f-1"))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(
            store
                .repositories()
                .resources()
                .load("f-1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn finished_transaction_rejects_access() {
        let store = InMemoryStore::new();
        let tx = store.begin_transaction().await.unwrap();
        let repos = tx.repositories();
        tx.rollback().await.unwrap();

        let err = repos.resources().create(&resource("late")).await.unwrap_err();
        assert_eq!(err, RepositoryError::TransactionClosed);
        let err = repos.resources().load("late").await.unwrap_err();
        assert_eq!(err, RepositoryError::TransactionClosed);
    }

    #[tokio::test]
    async fn concurrent_duplicate_create_fails_second_commit() {
        let store = InMemoryStore::new();
        let first = store.begin_transaction().await.unwrap();
        let second = store.begin_transaction().await.unwrap();

        first
            .repositories()
            .resources()
            .create(&resource("f-1"))
            .await
            .unwrap();
        second
            .repositories()
            .resources()
            .create(&resource("f-1"))
            .await
            .unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(err.message().contains("commit conflict"), "{err}");
    }

    #[tokio::test]
    async fn role_names_are_unique_per_resource_type() {
        let store = InMemoryStore::new();
        let repos = store.repositories();
        let role = |resource_type: &str| Role {
            id: Uuid::new_v4(),
            name: "admin".to_owned(),
            resource_type: resource_type.to_owned(),
            scopes: BTreeSet::new(),
        };

        repos.roles().create(&role("team")).await.unwrap();
        repos.roles().create(&role("project")).await.unwrap();
        let err = repos.roles().create(&role("team")).await.unwrap_err();
        assert_eq!(err, RepositoryError::conflict("role", "admin@team"));
    }

    #[tokio::test]
    async fn membership_add_is_idempotent() {
        let store = InMemoryStore::new();
        let repos = store.repositories();
        let membership = Membership {
            member_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
        };

        repos.memberships().add(membership).await.unwrap();
        repos.memberships().add(membership).await.unwrap();
        assert_eq!(
            repos
                .memberships()
                .find_group_ids(membership.member_id)
                .await
                .unwrap(),
            vec![membership.group_id]
        );
        assert!(repos.memberships().remove(membership).await.unwrap());
        assert!(!repos.memberships().remove(membership).await.unwrap());
    }
}
