use permission_sdk::IdentityRole;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "identity_roles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub identity_id: Uuid,
    pub role_id: Uuid,
    pub resource_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for IdentityRole {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            identity_id: m.identity_id,
            role_id: m.role_id,
            resource_id: m.resource_id,
        }
    }
}
