//! Campaign business logic - creation, lookup and status transitions.
//!
//! Campaigns are created with all of their dispatch items materialized up front, in
//! one database transaction. After that, status only moves through the conditional
//! transitions below; each is a single `UPDATE … WHERE status IN (…)` so concurrent
//! writers can never move a campaign backwards.

use crate::{
    core::schedule::{Schedule, plan_occurrences},
    entities::{
        Campaign, CampaignKind, CampaignStatus, DeliveryState, DispatchItem, MediaType,
        ReceiptNames, Session, campaign, dispatch_item,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::info;

/// Media attached to every item of a new campaign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMedia {
    /// Image or video
    pub kind: MediaType,
    /// Public URL the gateway downloads from
    pub url: String,
    /// Media store handle for cleanup after sending
    pub handle: Option<String>,
}

/// Everything needed to create a campaign
#[derive(Debug, Clone)]
pub struct NewCampaign {
    /// Title shown to operators and in reminders
    pub title: String,
    /// Message or status campaign
    pub kind: CampaignKind,
    /// Sending session
    pub session_id: i64,
    /// Target chat, required for message campaigns
    pub target_chat_id: Option<String>,
    /// Raw template
    pub template: String,
    /// Window and cadence
    pub schedule: Schedule,
    /// Payment receipt aliases
    pub receipt_names: Vec<String>,
    /// Optional attachment
    pub media: Option<NewMedia>,
}

/// Validates a new campaign and stores it together with one item per occurrence.
pub async fn create_campaign(
    db: &DatabaseConnection,
    new: NewCampaign,
    now: DateTime<Utc>,
) -> Result<(campaign::Model, Vec<dispatch_item::Model>)> {
    if new.title.trim().is_empty() {
        return Err(Error::Config {
            message: "Campaign title cannot be empty".to_string(),
        });
    }
    if new.template.trim().is_empty() {
        return Err(Error::Config {
            message: "Campaign template cannot be empty".to_string(),
        });
    }
    let target_chat_id = new
        .target_chat_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    if new.kind == CampaignKind::Message && target_chat_id.is_none() {
        return Err(Error::Config {
            message: "Message campaigns need a target chat".to_string(),
        });
    }

    let occurrences = plan_occurrences(&new.schedule, &new.template)?;

    let txn = db.begin().await?;

    Session::find_by_id(new.session_id)
        .one(&txn)
        .await?
        .ok_or(Error::SessionNotFound { id: new.session_id })?;

    let (media_type, media_url, media_handle) = match new.media {
        Some(media) => (Some(media.kind), Some(media.url), media.handle),
        None => (None, None, None),
    };

    let campaign = campaign::ActiveModel {
        title: Set(new.title.trim().to_string()),
        kind: Set(new.kind),
        session_id: Set(new.session_id),
        target_chat_id: Set(target_chat_id),
        template: Set(new.template),
        start_date: Set(new.schedule.start_date),
        end_date: Set(new.schedule.end_date),
        send_time: Set(new.schedule.send_time),
        time_zone: Set(new.schedule.time_zone),
        recurrence: Set(new.schedule.recurrence),
        receipt_names: Set(ReceiptNames(
            new.receipt_names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        )),
        media_type: Set(media_type),
        media_url: Set(media_url.clone()),
        media_handle: Set(media_handle.clone()),
        status: Set(CampaignStatus::Scheduled),
        status_updated_at: Set(now),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(occurrences.len());
    for occurrence in occurrences {
        let item = dispatch_item::ActiveModel {
            campaign_id: Set(campaign.id),
            session_id: Set(campaign.session_id),
            content: Set(occurrence.content),
            scheduled_at: Set(occurrence.scheduled_at),
            media_type: Set(media_type),
            media_url: Set(media_url.clone()),
            media_handle: Set(media_handle.clone()),
            state: Set(DeliveryState::Pending),
            claim_token: Set(None),
            claimed_at: Set(None),
            sent_at: Set(None),
            is_deleted: Set(false),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        items.push(item);
    }

    txn.commit().await?;

    info!(
        campaign.id = campaign.id,
        items = items.len(),
        "Campaign created"
    );
    Ok((campaign, items))
}

/// Finds a campaign by its unique ID.
pub async fn get_campaign(
    db: &DatabaseConnection,
    campaign_id: i64,
) -> Result<Option<campaign::Model>> {
    Campaign::find_by_id(campaign_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Soft-deletes every item of the campaign that no tick has claimed yet.
///
/// Returns the number of items withdrawn.
pub async fn cancel_campaign(db: &DatabaseConnection, campaign_id: i64) -> Result<u64> {
    get_campaign(db, campaign_id)
        .await?
        .ok_or(Error::CampaignNotFound { id: campaign_id })?;

    let result = DispatchItem::update_many()
        .set(dispatch_item::ActiveModel {
            is_deleted: Set(true),
            ..Default::default()
        })
        .filter(dispatch_item::Column::CampaignId.eq(campaign_id))
        .filter(dispatch_item::Column::State.eq(DeliveryState::Pending))
        .filter(dispatch_item::Column::IsDeleted.eq(false))
        .exec(db)
        .await?;

    info!(
        campaign.id = campaign_id,
        withdrawn = result.rows_affected,
        "Campaign cancelled"
    );
    Ok(result.rows_affected)
}

/// Moves the campaigns in `campaign_ids` to `to`, but only those currently in one of
/// the `from` states. Returns how many campaigns changed.
pub async fn transition_campaigns<C>(
    db: &C,
    campaign_ids: &[i64],
    from: &[CampaignStatus],
    to: CampaignStatus,
    now: DateTime<Utc>,
) -> Result<u64>
where
    C: ConnectionTrait,
{
    if campaign_ids.is_empty() {
        return Ok(0);
    }

    let result = Campaign::update_many()
        .set(campaign::ActiveModel {
            status: Set(to),
            status_updated_at: Set(now),
            ..Default::default()
        })
        .filter(campaign::Column::Id.is_in(campaign_ids.iter().copied()))
        .filter(campaign::Column::Status.is_in(from.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// SCHEDULED → IN_PROGRESS for campaigns whose items were just claimed.
pub async fn mark_in_progress<C>(db: &C, campaign_ids: &[i64], now: DateTime<Utc>) -> Result<u64>
where
    C: ConnectionTrait,
{
    transition_campaigns(
        db,
        campaign_ids,
        &[CampaignStatus::Scheduled],
        CampaignStatus::InProgress,
        now,
    )
    .await
}

/// Marks a campaign COMPLETED unless it already FAILED.
pub async fn mark_completed<C>(db: &C, campaign_id: i64, now: DateTime<Utc>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let changed = transition_campaigns(
        db,
        &[campaign_id],
        &[CampaignStatus::Scheduled, CampaignStatus::InProgress],
        CampaignStatus::Completed,
        now,
    )
    .await?;
    Ok(changed == 1)
}

/// Marks a campaign FAILED. Completed campaigns are left alone.
pub async fn mark_failed<C>(db: &C, campaign_id: i64, now: DateTime<Utc>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let changed = transition_campaigns(
        db,
        &[campaign_id],
        &[CampaignStatus::Scheduled, CampaignStatus::InProgress],
        CampaignStatus::Failed,
        now,
    )
    .await?;
    Ok(changed == 1)
}

/// Campaigns that reached COMPLETED at or after `since`.
pub async fn recently_completed(
    db: &DatabaseConnection,
    since: DateTime<Utc>,
) -> Result<Vec<campaign::Model>> {
    Campaign::find()
        .filter(campaign::Column::Status.eq(CampaignStatus::Completed))
        .filter(campaign::Column::StatusUpdatedAt.gte(since))
        .all(db)
        .await
        .map_err(Into::into)
}
