#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use permission_sdk::{IdentityRole, Membership, Resource, Role, RoleMapping};
use tx_context::{InfraError, ServiceContext, Transaction, TransactionManager, TxConfig};
use uuid::Uuid;

use crate::domain::ports::{NotificationPort, RoleChange};
use crate::domain::repos::{
    IdentityRoleRepository, MembershipRepository, Repositories, RepositoryError,
    ResourceRepository, RoleMappingRepository, RoleRepository,
};
use crate::domain::service::{PermissionContext, Services, ServicesBuilder};
use crate::infra::storage::InMemoryStore;

/// In-memory store plus a service graph over it, with seeding helpers that
/// write committed state directly.
pub struct Fixture {
    pub services: Services,
    pub repos: Arc<dyn Repositories>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    pub fn with(customize: impl FnOnce(ServicesBuilder) -> ServicesBuilder) -> Self {
        let store = InMemoryStore::new();
        let repos = store.repositories();
        let context = Arc::new(ServiceContext::new(
            Arc::clone(&repos),
            Arc::new(store) as Arc<dyn TransactionManager<dyn Repositories>>,
            TxConfig::with_timeout(Duration::from_secs(5)),
        ));
        let services = customize(Services::builder(context)).build();
        Self { services, repos }
    }

    pub fn ctx(&self) -> &PermissionContext {
        self.services.context()
    }

    pub async fn resource(&self, id: &str, resource_type: &str, parent: Option<&str>) -> Resource {
        let resource = Resource {
            id: id.to_owned(),
            resource_type: resource_type.to_owned(),
            parent_id: parent.map(ToOwned::to_owned),
        };
        self.repos.resources().create(&resource).await.unwrap();
        resource
    }

    pub async fn role(&self, name: &str, resource_type: &str, scopes: &[&str]) -> Role {
        let role = Role {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            resource_type: resource_type.to_owned(),
            scopes: scopes.iter().map(|s| (*s).to_owned()).collect::<BTreeSet<_>>(),
        };
        self.repos.roles().create(&role).await.unwrap();
        role
    }

    pub async fn grant(&self, identity_id: Uuid, role: &Role, resource_id: &str) -> IdentityRole {
        let grant = IdentityRole {
            id: Uuid::new_v4(),
            identity_id,
            role_id: role.id,
            resource_id: resource_id.to_owned(),
        };
        self.repos.identity_roles().create(&grant).await.unwrap();
        grant
    }

    pub async fn map_role(&self, from: &Role, to: &Role) {
        let mapping = RoleMapping {
            id: Uuid::new_v4(),
            from_role_id: from.id,
            to_role_id: to.id,
        };
        self.repos.role_mappings().create(&mapping).await.unwrap();
    }

    pub async fn join(&self, member_id: Uuid, group_id: Uuid) {
        self.repos
            .memberships()
            .add(Membership {
                member_id,
                group_id,
            })
            .await
            .unwrap();
    }

    pub async fn has_scope(&self, identity_id: Uuid, resource_id: &str, scope: &str) -> bool {
        self.services
            .permissions()
            .has_scope(self.ctx(), identity_id, resource_id, scope)
            .await
            .unwrap()
    }
}

/// Notification port that records every change it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    pub changes: Mutex<Vec<RoleChange>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            changes: Mutex::default(),
            fail: true,
        }
    }

    pub fn recorded(&self) -> Vec<RoleChange> {
        self.changes.lock().clone()
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn role_changed(&self, change: &RoleChange) -> anyhow::Result<()> {
        self.changes.lock().push(change.clone());
        if self.fail {
            anyhow::bail!("mail relay unavailable");
        }
        Ok(())
    }
}

/// Repositories whose every lookup fails with a storage error.
pub struct BrokenRepositories;

fn broken() -> RepositoryError {
    RepositoryError::storage("connection reset")
}

#[async_trait]
impl ResourceRepository for BrokenRepositories {
    async fn create(&self, _: &Resource) -> Result<(), RepositoryError> {
        Err(broken())
    }

    async fn load(&self, _: &str) -> Result<Option<Resource>, RepositoryError> {
        Err(broken())
    }
}

#[async_trait]
impl RoleRepository for BrokenRepositories {
    async fn create(&self, _: &Role) -> Result<(), RepositoryError> {
        Err(broken())
    }

    async fn load(&self, _: Uuid) -> Result<Option<Role>, RepositoryError> {
        Err(broken())
    }

    async fn find_by_name(&self, _: &str, _: &str) -> Result<Option<Role>, RepositoryError> {
        Err(broken())
    }
}

#[async_trait]
impl IdentityRoleRepository for BrokenRepositories {
    async fn create(&self, _: &IdentityRole) -> Result<(), RepositoryError> {
        Err(broken())
    }

    async fn delete(&self, _: Uuid) -> Result<bool, RepositoryError> {
        Err(broken())
    }

    async fn find_for_principals(
        &self,
        _: &[Uuid],
        _: &[String],
    ) -> Result<Vec<IdentityRole>, RepositoryError> {
        Err(broken())
    }
}

#[async_trait]
impl RoleMappingRepository for BrokenRepositories {
    async fn create(&self, _: &RoleMapping) -> Result<(), RepositoryError> {
        Err(broken())
    }

    async fn find_by_source_role(&self, _: Uuid) -> Result<Vec<RoleMapping>, RepositoryError> {
        Err(broken())
    }
}

#[async_trait]
impl MembershipRepository for BrokenRepositories {
    async fn add(&self, _: Membership) -> Result<(), RepositoryError> {
        Err(broken())
    }

    async fn remove(&self, _: Membership) -> Result<bool, RepositoryError> {
        Err(broken())
    }

    async fn find_group_ids(&self, _: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        Err(broken())
    }
}

impl Repositories for BrokenRepositories {
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

/// Transaction manager handing out [`BrokenRepositories`].
pub struct BrokenStore;

struct BrokenTransaction;

#[async_trait]
impl Transaction<dyn Repositories> for BrokenTransaction {
    fn repositories(&self) -> Arc<dyn Repositories> {
        Arc::new(BrokenRepositories)
    }

    async fn commit(self: Box<Self>) -> Result<(), InfraError> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), InfraError> {
        Ok(())
    }
}

#[async_trait]
impl TransactionManager<dyn Repositories> for BrokenStore {
    async fn begin_transaction(
        &self,
    ) -> Result<Box<dyn Transaction<dyn Repositories>>, InfraError> {
        Ok(Box::new(BrokenTransaction))
    }
}

pub fn broken_services() -> Services {
    let context = Arc::new(ServiceContext::new(
        Arc::new(BrokenRepositories) as Arc<dyn Repositories>,
        Arc::new(BrokenStore) as Arc<dyn TransactionManager<dyn Repositories>>,
        TxConfig::default(),
    ));
    Services::builder(context).build()
}
