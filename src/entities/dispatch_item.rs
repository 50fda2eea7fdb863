//! Dispatch item entity - One concrete message or status occurrence of a campaign.
//!
//! Delivery progress is a forward-only `DeliveryState`. `PENDING` items are the only
//! ones a dispatch tick may claim; `CLAIMED`, `SENT` and `FAILED` are never reset.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery progress of a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum DeliveryState {
    /// Not yet claimed by any tick
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Claimed; a send attempt has started or is about to
    #[sea_orm(string_value = "CLAIMED")]
    Claimed,
    /// Gateway accepted the send
    #[sea_orm(string_value = "SENT")]
    Sent,
    /// Send attempt failed; never retried automatically
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

/// Kind of media attached to an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum MediaType {
    /// Still image
    #[sea_orm(string_value = "IMAGE")]
    Image,
    /// Video clip
    #[sea_orm(string_value = "VIDEO")]
    Video,
}

/// Dispatch item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dispatch_items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning campaign
    pub campaign_id: i64,
    /// Gateway session used to send this item
    pub session_id: i64,
    /// Rendered text (message body or media caption)
    pub content: String,
    /// When the item is due (UTC)
    pub scheduled_at: DateTimeUtc,
    /// Attached media kind, if any
    pub media_type: Option<MediaType>,
    /// Public URL of the attached media
    pub media_url: Option<String>,
    /// Media store handle, deleted after a successful send
    pub media_handle: Option<String>,
    /// Delivery progress
    pub state: DeliveryState,
    /// Token of the tick that claimed this item
    pub claim_token: Option<String>,
    /// When the item was claimed
    pub claimed_at: Option<DateTimeUtc>,
    /// When the gateway accepted the send
    pub sent_at: Option<DateTimeUtc>,
    /// Soft delete flag - deleted items are excluded from all processing
    pub is_deleted: bool,
}

/// Media attached to an item, borrowed from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Media<'a> {
    /// Image or video
    pub kind: MediaType,
    /// Public URL the gateway downloads from
    pub url: &'a str,
    /// Media store handle, if the object is deletable
    pub handle: Option<&'a str>,
}

impl Model {
    /// True once any tick has claimed the item.
    #[must_use]
    pub fn is_picked(&self) -> bool {
        self.state != DeliveryState::Pending
    }

    /// True once the gateway has accepted the item.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.state == DeliveryState::Sent
    }

    /// Attached media, present only when both the kind and URL are set.
    #[must_use]
    pub fn media(&self) -> Option<Media<'_>> {
        match (self.media_type, self.media_url.as_deref()) {
            (Some(kind), Some(url)) => Some(Media {
                kind,
                url,
                handle: self.media_handle.as_deref(),
            }),
            _ => None,
        }
    }
}

/// Defines relationships between `DispatchItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each item belongs to one campaign
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id"
    )]
    Campaign,
    /// Each item is sent through one session
    #[sea_orm(
        belongs_to = "super::session::Entity",
        from = "Column::SessionId",
        to = "super::session::Column::Id"
    )]
    Session,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
