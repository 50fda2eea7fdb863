//! Reminder entity - Record of a payment reminder sent to a member for a campaign.
//!
//! At most one record exists per `(member_id, campaign_id, reminder_type)`; a unique
//! index enforces it. Records are never deleted, so their existence is the only
//! idempotence guard the reminder engine needs.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which reminder of the two-step sequence was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ReminderType {
    /// Sent right after the campaign completes
    #[sea_orm(string_value = "FIRST_REMINDER")]
    First,
    /// Sent once the first reminder is old enough and the member is still unpaid
    #[sea_orm(string_value = "FINAL_REMINDER")]
    Final,
}

/// Reminder database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reminders")]
pub struct Model {
    /// Unique identifier for the reminder
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Member who was reminded
    pub member_id: i64,
    /// Campaign the reminder is about
    pub campaign_id: i64,
    /// First or final reminder
    pub reminder_type: ReminderType,
    /// When the gateway accepted the reminder
    pub sent_at: DateTimeUtc,
}

/// Defines relationships between Reminder and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each reminder targets one member
    #[sea_orm(
        belongs_to = "super::member::Entity",
        from = "Column::MemberId",
        to = "super::member::Column::Id"
    )]
    Member,
    /// Each reminder concerns one campaign
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id"
    )]
    Campaign,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
