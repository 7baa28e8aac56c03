use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Resources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Resources::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(Resources::ResourceType))
                    .col(string_null(Resources::ParentId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_resources_parent_id")
                    .table(Resources::Table)
                    .col(Resources::ParentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Roles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Roles::Id).uuid().not_null().primary_key())
                    .col(string(Roles::Name))
                    .col(string(Roles::ResourceType))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_roles_name_resource_type")
                    .table(Roles::Table)
                    .col(Roles::Name)
                    .col(Roles::ResourceType)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleScopes::Table)
                    .if_not_exists()
                    .col(uuid(RoleScopes::RoleId))
                    .col(string(RoleScopes::Scope))
                    .primary_key(
                        Index::create()
                            .col(RoleScopes::RoleId)
                            .col(RoleScopes::Scope),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IdentityRoles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IdentityRoles::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(uuid(IdentityRoles::IdentityId))
                    .col(uuid(IdentityRoles::RoleId))
                    .col(string(IdentityRoles::ResourceId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_identity_roles_resource_identity")
                    .table(IdentityRoles::Table)
                    .col(IdentityRoles::ResourceId)
                    .col(IdentityRoles::IdentityId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoleMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoleMappings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(uuid(RoleMappings::FromRoleId))
                    .col(uuid(RoleMappings::ToRoleId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Memberships::Table)
                    .if_not_exists()
                    .col(uuid(Memberships::MemberId))
                    .col(uuid(Memberships::GroupId))
                    .primary_key(
                        Index::create()
                            .col(Memberships::MemberId)
                            .col(Memberships::GroupId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Memberships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoleMappings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IdentityRoles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoleScopes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Roles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Resources::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Resources {
    Table,
    Id,
    ResourceType,
    ParentId,
}

#[derive(DeriveIden)]
enum Roles {
    Table,
    Id,
    Name,
    ResourceType,
}

#[derive(DeriveIden)]
enum RoleScopes {
    Table,
    RoleId,
    Scope,
}

#[derive(DeriveIden)]
enum IdentityRoles {
    Table,
    Id,
    IdentityId,
    RoleId,
    ResourceId,
}

#[derive(DeriveIden)]
enum RoleMappings {
    Table,
    Id,
    FromRoleId,
    ToRoleId,
}

#[derive(DeriveIden)]
enum Memberships {
    Table,
    MemberId,
    GroupId,
}
