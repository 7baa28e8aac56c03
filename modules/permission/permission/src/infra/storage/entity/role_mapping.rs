use permission_sdk::RoleMapping;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "role_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub from_role_id: Uuid,
    pub to_role_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for RoleMapping {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            from_role_id: m.from_role_id,
            to_role_id: m.to_role_id,
        }
    }
}
