//! Campaign/member link - which members are expected to pay into a campaign.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Link table model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign_members")]
pub struct Model {
    /// Linked campaign
    #[sea_orm(primary_key, auto_increment = false)]
    pub campaign_id: i64,
    /// Linked member
    #[sea_orm(primary_key, auto_increment = false)]
    pub member_id: i64,
}

/// Both sides of the many-to-many link
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link belongs to one campaign
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id"
    )]
    Campaign,
    /// Link belongs to one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
}

impl ActiveModelBehavior for ActiveModel {}
