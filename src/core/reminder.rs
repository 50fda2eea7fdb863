//! Reminder records - the idempotence guard of the reminder engine.
//!
//! A record exists for every reminder the gateway accepted and is never deleted.
//! Inserts go through `ON CONFLICT DO NOTHING` against the unique
//! `(member_id, campaign_id, reminder_type)` index, so repeated ticks cannot create
//! duplicates even if the existence check races.

use crate::{
    entities::{Reminder, ReminderType, reminder},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::OnConflict};
use std::collections::HashSet;

/// True if a reminder of this type was already sent for the pair.
pub async fn has_reminder(
    db: &DatabaseConnection,
    member_id: i64,
    campaign_id: i64,
    reminder_type: ReminderType,
) -> Result<bool> {
    let existing = Reminder::find()
        .filter(reminder::Column::MemberId.eq(member_id))
        .filter(reminder::Column::CampaignId.eq(campaign_id))
        .filter(reminder::Column::ReminderType.eq(reminder_type))
        .one(db)
        .await?;
    Ok(existing.is_some())
}

/// Records a sent reminder. Returns false if an identical record already existed.
pub async fn record_reminder(
    db: &DatabaseConnection,
    member_id: i64,
    campaign_id: i64,
    reminder_type: ReminderType,
    sent_at: DateTime<Utc>,
) -> Result<bool> {
    let record = reminder::ActiveModel {
        member_id: Set(member_id),
        campaign_id: Set(campaign_id),
        reminder_type: Set(reminder_type),
        sent_at: Set(sent_at),
        ..Default::default()
    };

    let inserted = Reminder::insert(record)
        .on_conflict(
            OnConflict::columns([
                reminder::Column::MemberId,
                reminder::Column::CampaignId,
                reminder::Column::ReminderType,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(inserted == 1)
}

/// First reminders sent at or before `cutoff` whose pair has no final reminder yet.
pub async fn due_final_reminders(
    db: &DatabaseConnection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<reminder::Model>> {
    let firsts = Reminder::find()
        .filter(reminder::Column::ReminderType.eq(ReminderType::First))
        .filter(reminder::Column::SentAt.lte(cutoff))
        .order_by_asc(reminder::Column::SentAt)
        .all(db)
        .await?;
    if firsts.is_empty() {
        return Ok(firsts);
    }

    let campaign_ids: HashSet<i64> = firsts.iter().map(|r| r.campaign_id).collect();
    let finals: HashSet<(i64, i64)> = Reminder::find()
        .filter(reminder::Column::ReminderType.eq(ReminderType::Final))
        .filter(reminder::Column::CampaignId.is_in(campaign_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.member_id, r.campaign_id))
        .collect();

    Ok(firsts
        .into_iter()
        .filter(|r| !finals.contains(&(r.member_id, r.campaign_id)))
        .collect())
}
