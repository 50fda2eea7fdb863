//! Session entity - One messaging-gateway identity.
//! Campaigns and their items reference a session to route sends.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Session database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Unique identifier for the session
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Session name as known to the gateway
    #[sea_orm(unique)]
    pub name: String,
    /// Phone number the session is logged in as
    pub phone_number: String,
}

/// Defines relationships between Session and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One session sends many campaigns
    #[sea_orm(has_many = "super::campaign::Entity")]
    Campaigns,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaigns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
