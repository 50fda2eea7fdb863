//! Dispatch item claim and delivery-state primitives.
//!
//! The claim is the only mutual-exclusion primitive between dispatch ticks and
//! between redundant dispatcher processes: a single conditional `UPDATE` flips every
//! still-pending candidate to `CLAIMED` and stamps it with the tick's token. Only rows
//! carrying that token belong to the tick. Later transitions are conditional on
//! `CLAIMED`, so delivery state can only move forward.

use crate::{
    entities::{DeliveryState, DispatchItem, dispatch_item},
    errors::Result,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, Select, Set, prelude::*};
use uuid::Uuid;

/// Pending items relative to the claim window
#[derive(Debug, Clone, Default)]
pub struct DueItems {
    /// Scheduled inside `[now - window, now]`; eligible for claiming
    pub due: Vec<dispatch_item::Model>,
    /// Items that left the window during the last tick interval; skipped permanently
    pub missed: u64,
}

fn pending_items() -> Select<DispatchItem> {
    DispatchItem::find()
        .filter(dispatch_item::Column::State.eq(DeliveryState::Pending))
        .filter(dispatch_item::Column::IsDeleted.eq(false))
}

/// Finds unsent, undeleted, unclaimed items that are due at `now`.
///
/// Items scheduled before the window are never loaded. Only those that dropped out
/// during the last `tick_interval`, i.e. scheduled in
/// `[now - window - tick_interval, now - window)`, are counted as missed, so each
/// missed item is reported once.
pub async fn find_due_items(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    claim_window: Duration,
    tick_interval: Duration,
) -> Result<DueItems> {
    let window_start = now
        .checked_sub_signed(claim_window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let missed_start = window_start
        .checked_sub_signed(tick_interval)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let due = pending_items()
        .filter(dispatch_item::Column::ScheduledAt.gte(window_start))
        .filter(dispatch_item::Column::ScheduledAt.lte(now))
        .order_by_asc(dispatch_item::Column::ScheduledAt)
        .all(db)
        .await?;

    let missed = pending_items()
        .filter(dispatch_item::Column::ScheduledAt.gte(missed_start))
        .filter(dispatch_item::Column::ScheduledAt.lt(window_start))
        .count(db)
        .await?;

    Ok(DueItems { due, missed })
}

/// Claims the given items in one round trip and returns the ones this call won.
///
/// Items another tick claimed first, or that were deleted meanwhile, are left out.
pub async fn claim_items(
    db: &DatabaseConnection,
    item_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<Vec<dispatch_item::Model>> {
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }
    let token = Uuid::new_v4().to_string();

    DispatchItem::update_many()
        .set(dispatch_item::ActiveModel {
            state: Set(DeliveryState::Claimed),
            claim_token: Set(Some(token.clone())),
            claimed_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(dispatch_item::Column::Id.is_in(item_ids.iter().copied()))
        .filter(dispatch_item::Column::State.eq(DeliveryState::Pending))
        .filter(dispatch_item::Column::IsDeleted.eq(false))
        .exec(db)
        .await?;

    DispatchItem::find()
        .filter(dispatch_item::Column::ClaimToken.eq(token))
        .order_by_asc(dispatch_item::Column::ScheduledAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// CLAIMED → SENT. Returns false if the item was not in the claimed state.
pub async fn mark_sent<C>(db: &C, item_id: i64, now: DateTime<Utc>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = DispatchItem::update_many()
        .set(dispatch_item::ActiveModel {
            state: Set(DeliveryState::Sent),
            sent_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(dispatch_item::Column::Id.eq(item_id))
        .filter(dispatch_item::Column::State.eq(DeliveryState::Claimed))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// CLAIMED → FAILED. Returns false if the item was not in the claimed state.
pub async fn mark_failed<C>(db: &C, item_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = DispatchItem::update_many()
        .set(dispatch_item::ActiveModel {
            state: Set(DeliveryState::Failed),
            ..Default::default()
        })
        .filter(dispatch_item::Column::Id.eq(item_id))
        .filter(dispatch_item::Column::State.eq(DeliveryState::Claimed))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Number of non-deleted items of the campaign that are not yet sent.
pub async fn remaining_unsent<C>(db: &C, campaign_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    DispatchItem::find()
        .filter(dispatch_item::Column::CampaignId.eq(campaign_id))
        .filter(dispatch_item::Column::IsDeleted.eq(false))
        .filter(dispatch_item::Column::State.ne(DeliveryState::Sent))
        .count(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::CampaignKind;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_find_due_items_respects_claim_window() -> Result<()> {
        let db = setup_test_db().await?;
        let session = create_test_session(&db, "default").await?;
        let campaign = create_test_campaign(&db, session.id, CampaignKind::Message).await?;
        let now = fixed_now();
        let window = Duration::minutes(2);
        let tick = Duration::seconds(30);

        let recent =
            insert_test_item(&db, &campaign, now - Duration::seconds(30), DeliveryState::Pending)
                .await?;
        // just dropped out of the window
        insert_test_item(&db, &campaign, now - Duration::seconds(130), DeliveryState::Pending)
            .await?;
        // dropped out long ago, already reported by an earlier tick
        insert_test_item(&db, &campaign, now - Duration::minutes(10), DeliveryState::Pending)
            .await?;
        insert_test_item(&db, &campaign, now + Duration::minutes(1), DeliveryState::Pending)
            .await?;

        let found = find_due_items(&db, now, window, tick).await?;
        let due: Vec<i64> = found.due.iter().map(|i| i.id).collect();
        assert_eq!(due, vec![recent.id]);
        assert_eq!(found.missed, 1);

        // the next tick no longer reports the same item
        let next = find_due_items(&db, now + tick, window, tick).await?;
        assert_eq!(next.missed, 0);
        assert_eq!(next.due.len(), 1);

        // the unclaimed recent item is reported on the tick it leaves the window
        let expired = find_due_items(&db, now + window, window, tick).await?;
        assert_eq!(expired.missed, 1);
        assert!(expired.due.iter().all(|i| i.id != recent.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_find_due_items_excludes_deleted_and_claimed() -> Result<()> {
        let db = setup_test_db().await?;
        let session = create_test_session(&db, "default").await?;
        let campaign = create_test_campaign(&db, session.id, CampaignKind::Message).await?;
        let now = fixed_now();

        insert_test_item(&db, &campaign, now, DeliveryState::Claimed).await?;
        insert_test_item(&db, &campaign, now, DeliveryState::Sent).await?;
        let deleted = insert_test_item(&db, &campaign, now, DeliveryState::Pending).await?;
        let mut model: dispatch_item::ActiveModel = deleted.into();
        model.is_deleted = Set(true);
        model.update(&db).await?;

        let found = find_due_items(&db, now, Duration::minutes(2), Duration::seconds(30)).await?;
        assert!(found.due.is_empty());
        assert_eq!(found.missed, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() -> Result<()> {
        let db = setup_test_db().await?;
        let session = create_test_session(&db, "default").await?;
        let campaign = create_test_campaign(&db, session.id, CampaignKind::Message).await?;
        let now = fixed_now();
        let a = insert_test_item(&db, &campaign, now, DeliveryState::Pending).await?;
        let b = insert_test_item(&db, &campaign, now, DeliveryState::Pending).await?;

        let first = claim_items(&db, &[a.id, b.id], now).await?;
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|i| i.state == DeliveryState::Claimed));
        assert!(first.iter().all(|i| i.claimed_at == Some(now)));

        // an overlapping tick that selected the same rows wins nothing
        let second = claim_items(&db, &[a.id, b.id], now).await?;
        assert!(second.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_state_only_moves_forward() -> Result<()> {
        let db = setup_test_db().await?;
        let session = create_test_session(&db, "default").await?;
        let campaign = create_test_campaign(&db, session.id, CampaignKind::Message).await?;
        let now = fixed_now();
        let item = insert_test_item(&db, &campaign, now, DeliveryState::Pending).await?;

        // cannot send or fail an unclaimed item
        assert!(!mark_sent(&db, item.id, now).await?);
        assert!(!mark_failed(&db, item.id).await?);

        claim_items(&db, &[item.id], now).await?;
        assert!(mark_sent(&db, item.id, now).await?);
        // cannot fail or re-send a sent item
        assert!(!mark_failed(&db, item.id).await?);
        assert!(!mark_sent(&db, item.id, now).await?);

        let stored = DispatchItem::find_by_id(item.id).one(&db).await?.unwrap();
        assert!(stored.is_sent());
        assert_eq!(stored.sent_at, Some(now));
        Ok(())
    }

    #[tokio::test]
    async fn test_remaining_unsent_counts_failed_but_not_deleted() -> Result<()> {
        let db = setup_test_db().await?;
        let session = create_test_session(&db, "default").await?;
        let campaign = create_test_campaign(&db, session.id, CampaignKind::Message).await?;
        let now = fixed_now();

        insert_test_item(&db, &campaign, now, DeliveryState::Sent).await?;
        insert_test_item(&db, &campaign, now, DeliveryState::Failed).await?;
        let deleted = insert_test_item(&db, &campaign, now, DeliveryState::Pending).await?;
        let mut model: dispatch_item::ActiveModel = deleted.into();
        model.is_deleted = Set(true);
        model.update(&db).await?;

        assert_eq!(remaining_unsent(&db, campaign.id).await?, 1);
        Ok(())
    }
}
