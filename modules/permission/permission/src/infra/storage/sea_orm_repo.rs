//! `SeaORM` repositories over a [`SeaRunner`].
//!
//! The same type serves the ordinary connection and an open transaction; the
//! runner decides where statements go.

use std::collections::BTreeSet;

use async_trait::async_trait;
use permission_sdk::{IdentityRole, Membership, Resource, Role, RoleMapping};
use sea_orm::{
    ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tx_context::sea::SeaRunner;
use uuid::Uuid;

use crate::domain::repos::{
    IdentityRoleRepository, MembershipRepository, Repositories, RepositoryError,
    ResourceRepository, RoleMappingRepository, RoleRepository,
};
use crate::infra::storage::entity::{
    identity_role, membership, resource, role, role_mapping, role_scope,
};

impl From<DbErr> for RepositoryError {
    fn from(e: DbErr) -> Self {
        Self::Storage(e.to_string())
    }
}

pub struct SeaRepositories {
    runner: SeaRunner,
}

impl SeaRepositories {
    #[must_use]
    pub fn new(runner: SeaRunner) -> Self {
        Self { runner }
    }

    async fn role_with_scopes(&self, model: role::Model) -> Result<Role, RepositoryError> {
        let scopes: BTreeSet<String> = role_scope::Entity::find()
            .filter(role_scope::Column::RoleId.eq(model.id))
            .all(&self.runner)
            .await?
            .into_iter()
            .map(|s| s.scope)
            .collect();

        Ok(Role {
            id: model.id,
            name: model.name,
            resource_type: model.resource_type,
            scopes,
        })
    }
}

#[async_trait]
impl ResourceRepository for SeaRepositories {
    async fn create(&self, new_resource: &Resource) -> Result<(), RepositoryError> {
        let exists = resource::Entity::find_by_id(new_resource.id.clone())
            .count(&self.runner)
            .await?
            > 0;
        if exists {
            return Err(RepositoryError::conflict("resource", &new_resource.id));
        }

        let am = resource::ActiveModel {
            id: Set(new_resource.id.clone()),
            resource_type: Set(new_resource.resource_type.clone()),
            parent_id: Set(new_resource.parent_id.clone()),
        };
        resource::Entity::insert(am)
            .exec_without_returning(&self.runner)
            .await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Resource>, RepositoryError> {
        let found = resource::Entity::find_by_id(id.to_owned())
            .one(&self.runner)
            .await?;
        Ok(found.map(Into::into))
    }
}

#[async_trait]
impl RoleRepository for SeaRepositories {
    async fn create(&self, new_role: &Role) -> Result<(), RepositoryError> {
        let duplicate = role::Entity::find()
            .filter(role::Column::Name.eq(new_role.name.as_str()))
            .filter(role::Column::ResourceType.eq(new_role.resource_type.as_str()))
            .count(&self.runner)
            .await?
            > 0;
        if duplicate {
            return Err(RepositoryError::conflict(
                "role",
                format!("{}@{}", new_role.name, new_role.resource_type),
            ));
        }

        let am = role::ActiveModel {
            id: Set(new_role.id),
            name: Set(new_role.name.clone()),
            resource_type: Set(new_role.resource_type.clone()),
        };
        role::Entity::insert(am)
            .exec_without_returning(&self.runner)
            .await?;

        if !new_role.scopes.is_empty() {
            let scopes = new_role.scopes.iter().map(|scope| role_scope::ActiveModel {
                role_id: Set(new_role.id),
                scope: Set(scope.clone()),
            });
            role_scope::Entity::insert_many(scopes)
                .exec_without_returning(&self.runner)
                .await?;
        }
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<Role>, RepositoryError> {
        match role::Entity::find_by_id(id).one(&self.runner).await? {
            Some(model) => Ok(Some(self.role_with_scopes(model).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_name(
        &self,
        name: &str,
        resource_type: &str,
    ) -> Result<Option<Role>, RepositoryError> {
        let found = role::Entity::find()
            .filter(role::Column::Name.eq(name))
            .filter(role::Column::ResourceType.eq(resource_type))
            .one(&self.runner)
            .await?;
        match found {
            Some(model) => Ok(Some(self.role_with_scopes(model).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl IdentityRoleRepository for SeaRepositories {
    async fn create(&self, grant: &IdentityRole) -> Result<(), RepositoryError> {
        let am = identity_role::ActiveModel {
            id: Set(grant.id),
            identity_id: Set(grant.identity_id),
            role_id: Set(grant.role_id),
            resource_id: Set(grant.resource_id.clone()),
        };
        identity_role::Entity::insert(am)
            .exec_without_returning(&self.runner)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let res = identity_role::Entity::delete_by_id(id)
            .exec(&self.runner)
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn find_for_principals(
        &self,
        identity_ids: &[Uuid],
        resource_ids: &[String],
    ) -> Result<Vec<IdentityRole>, RepositoryError> {
        if identity_ids.is_empty() || resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = identity_role::Entity::find()
            .filter(identity_role::Column::IdentityId.is_in(identity_ids.iter().copied()))
            .filter(identity_role::Column::ResourceId.is_in(resource_ids.iter().cloned()))
            .order_by_asc(identity_role::Column::Id)
            .all(&self.runner)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl RoleMappingRepository for SeaRepositories {
    async fn create(&self, mapping: &RoleMapping) -> Result<(), RepositoryError> {
        let am = role_mapping::ActiveModel {
            id: Set(mapping.id),
            from_role_id: Set(mapping.from_role_id),
            to_role_id: Set(mapping.to_role_id),
        };
        role_mapping::Entity::insert(am)
            .exec_without_returning(&self.runner)
            .await?;
        Ok(())
    }

    async fn find_by_source_role(
        &self,
        from_role_id: Uuid,
    ) -> Result<Vec<RoleMapping>, RepositoryError> {
        let rows = role_mapping::Entity::find()
            .filter(role_mapping::Column::FromRoleId.eq(from_role_id))
            .all(&self.runner)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl MembershipRepository for SeaRepositories {
    async fn add(&self, m: Membership) -> Result<(), RepositoryError> {
        let exists = membership::Entity::find_by_id((m.member_id, m.group_id))
            .count(&self.runner)
            .await?
            > 0;
        if exists {
            return Ok(());
        }
        let am = membership::ActiveModel {
            member_id: Set(m.member_id),
            group_id: Set(m.group_id),
        };
        membership::Entity::insert(am)
            .exec_without_returning(&self.runner)
            .await?;
        Ok(())
    }

    async fn remove(&self, m: Membership) -> Result<bool, RepositoryError> {
        let res = membership::Entity::delete_by_id((m.member_id, m.group_id))
            .exec(&self.runner)
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn find_group_ids(&self, member_id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        let rows = membership::Entity::find()
            .filter(membership::Column::MemberId.eq(member_id))
            .all(&self.runner)
            .await?;
        Ok(rows.into_iter().map(|m| m.group_id).collect())
    }
}

impl Repositories for SeaRepositories {
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
