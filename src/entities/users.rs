use sea_orm::entity::prelude::*;

use super::role::Role;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Login identity
    #[sea_orm(unique)]
    pub email: String,

    /// Public handle
    #[sea_orm(unique)]
    pub username: String,

    /// Credential material as handed over by the auth layer (already hashed)
    pub password: String,

    pub avatar: Option<String>,

    pub confirmed: bool,

    pub refresh_token: Option<String>,

    pub role: Role,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::photos::Entity")]
    Photos,
}

impl Related<super::photos::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Photos.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
