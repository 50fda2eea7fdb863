//! Campaign entity - A scheduled series of outbound messages or status updates.
//!
//! A campaign owns its dispatch items (materialized once at creation), names the
//! gateway session that sends them, and carries the receipt names used to scope
//! payment ledger rows when reminding unpaid members.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::dispatch_item::MediaType;

/// Whether a campaign sends chat messages or status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum CampaignKind {
    /// Chat message sent to the campaign's target chat
    #[sea_orm(string_value = "MESSAGE")]
    Message,
    /// Status update posted on the session's own status feed
    #[sea_orm(string_value = "STATUS")]
    Status,
}

/// Campaign lifecycle. Derived from item delivery except on hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum CampaignStatus {
    /// No item has been claimed yet
    #[sea_orm(string_value = "SCHEDULED")]
    Scheduled,
    /// At least one item has been claimed
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    /// Every non-deleted item has been sent
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    /// An item failed to send; needs operator attention
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

/// How often a campaign repeats inside its window
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recurrence {
    /// Every day
    #[sea_orm(string_value = "DAILY")]
    Daily,
    /// Every seven days
    #[sea_orm(string_value = "WEEKLY")]
    Weekly,
    /// Every fifteen days
    #[sea_orm(string_value = "SEMI_MONTHLY")]
    SemiMonthly,
    /// Every calendar month
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
    /// Every six calendar months
    #[sea_orm(string_value = "SEMI_ANNUALLY")]
    SemiAnnually,
    /// Every twelve calendar months
    #[sea_orm(string_value = "ANNUALLY")]
    Annually,
}

/// Receipt-name aliases, stored as a JSON array
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ReceiptNames(pub Vec<String>);

/// Campaign database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaigns")]
pub struct Model {
    /// Unique identifier for the campaign
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable title, used in reminder texts
    pub title: String,
    /// Message or status campaign
    pub kind: CampaignKind,
    /// Gateway session that sends this campaign's items
    pub session_id: i64,
    /// Group or contact chat id; `None` for status campaigns
    pub target_chat_id: Option<String>,
    /// Raw template; may hold a `*`-delimited sequence and `{days_left}`
    pub template: String,
    /// First day of the schedule window (campaign-local)
    pub start_date: Date,
    /// Last day of the schedule window (campaign-local)
    pub end_date: Date,
    /// Local time of day each occurrence is sent
    pub send_time: Time,
    /// IANA time zone name, e.g. `"America/New_York"`
    pub time_zone: String,
    /// Cadence, or `None` for a one-off send
    pub recurrence: Option<Recurrence>,
    /// Aliases used to scope ledger rows to this campaign
    #[sea_orm(column_type = "Json")]
    pub receipt_names: ReceiptNames,
    /// Media kind attached to every item, if any
    pub media_type: Option<MediaType>,
    /// Public URL of the attached media
    pub media_url: Option<String>,
    /// Media store handle of the attached media
    pub media_handle: Option<String>,
    /// Lifecycle status
    pub status: CampaignStatus,
    /// When `status` last changed
    pub status_updated_at: DateTimeUtc,
    /// When the campaign was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Campaign and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One campaign has many dispatch items
    #[sea_orm(has_many = "super::dispatch_item::Entity")]
    DispatchItems,
    /// Each campaign is sent through one session
    #[sea_orm(
        belongs_to = "super::session::Entity",
        from = "Column::SessionId",
        to = "super::session::Column::Id"
    )]
    Session,
}

impl Related<super::dispatch_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DispatchItems.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        super::campaign_member::Relation::Member.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::campaign_member::Relation::Campaign.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
