//! Dispatch engine - claims due items and delivers them through the gateway.

use crate::{
    config::settings::DispatchConfig,
    core::{campaign, dispatch, session::sessions_by_id},
    entities::{Campaign, CampaignKind, campaign as campaign_entity, dispatch_item, session},
    errors::{Error, Result},
    gateway::{GatewayResponse, MessagingGateway, OutboundContent},
    media::MediaStore,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use sea_orm::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Counts from one dispatch tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Items this tick claimed
    pub claimed: usize,
    /// Items the gateway accepted
    pub sent: usize,
    /// Items that failed and failed their campaign
    pub failed: usize,
    /// Pending items that fell out of the claim window since the previous tick
    pub missed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    Failed,
}

/// Polls for due items and delivers them
pub struct DispatchEngine {
    db: DatabaseConnection,
    gateway: Arc<dyn MessagingGateway>,
    media: Arc<dyn MediaStore>,
    settings: DispatchConfig,
}

impl DispatchEngine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn MessagingGateway>,
        media: Arc<dyn MediaStore>,
        settings: DispatchConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            media,
            settings,
        }
    }

    /// Runs one tick: claim what is due at `now` and deliver it.
    ///
    /// Claimed items are delivered concurrently. A failing item fails its campaign but
    /// never stops the other deliveries of the tick. Claimed items are not retried.
    /// Once a batch is claimed every item reaches SENT or FAILED, even when loading
    /// its campaign or session fails.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<DispatchReport> {
        let found = dispatch::find_due_items(
            &self.db,
            now,
            self.settings.claim_window(),
            self.settings.tick(),
        )
        .await?;
        let mut report = DispatchReport {
            missed: found.missed,
            ..DispatchReport::default()
        };
        if found.missed > 0 {
            debug!(
                count = found.missed,
                "Skipping items scheduled before the claim window"
            );
        }

        let due_ids: Vec<i64> = found.due.iter().map(|item| item.id).collect();
        let claimed = dispatch::claim_items(&self.db, &due_ids, now).await?;
        report.claimed = claimed.len();
        if claimed.is_empty() {
            return Ok(report);
        }

        let campaign_ids: Vec<i64> = claimed
            .iter()
            .map(|item| item.campaign_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if let Err(e) = campaign::mark_in_progress(&self.db, &campaign_ids, now).await {
            error!(error = %e, "Failed to mark campaigns in progress");
        }

        // Missing entries fail their items below.
        let campaigns = self.campaigns_by_id(&campaign_ids).await.unwrap_or_else(|e| {
            error!(error = %e, "Failed to load campaigns for claimed items");
            HashMap::new()
        });
        let session_ids: Vec<i64> = claimed.iter().map(|item| item.session_id).collect();
        let sessions = sessions_by_id(&self.db, &session_ids)
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to load sessions for claimed items");
                HashMap::new()
            });

        let outcomes = join_all(claimed.iter().map(|item| {
            self.deliver(
                item,
                campaigns.get(&item.campaign_id),
                sessions.get(&item.session_id),
                now,
            )
        }))
        .await;

        for outcome in outcomes {
            match outcome {
                Delivery::Sent => report.sent += 1,
                Delivery::Failed => report.failed += 1,
            }
        }
        info!(
            claimed = report.claimed,
            sent = report.sent,
            failed = report.failed,
            "Dispatch tick finished"
        );
        Ok(report)
    }

    async fn campaigns_by_id(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, campaign_entity::Model>> {
        Ok(Campaign::find()
            .filter(campaign_entity::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect())
    }

    async fn deliver(
        &self,
        item: &dispatch_item::Model,
        campaign: Option<&campaign_entity::Model>,
        session: Option<&session::Model>,
        now: DateTime<Utc>,
    ) -> Delivery {
        match self.send(item, campaign, session).await {
            Ok(response) if response.is_created() => {
                self.on_sent(item, now).await;
                Delivery::Sent
            }
            Ok(response) => {
                error!(
                    item.id = item.id,
                    campaign.id = item.campaign_id,
                    status = response.status,
                    body = %response.body,
                    "Gateway rejected item"
                );
                self.on_failed(item, now).await;
                Delivery::Failed
            }
            Err(e) => {
                error!(
                    item.id = item.id,
                    campaign.id = item.campaign_id,
                    error = %e,
                    "Failed to send item"
                );
                self.on_failed(item, now).await;
                Delivery::Failed
            }
        }
    }

    async fn send(
        &self,
        item: &dispatch_item::Model,
        campaign: Option<&campaign_entity::Model>,
        session: Option<&session::Model>,
    ) -> Result<GatewayResponse> {
        let campaign = campaign.ok_or(Error::CampaignNotFound {
            id: item.campaign_id,
        })?;
        let session = session.ok_or(Error::SessionNotFound {
            id: item.session_id,
        })?;
        let content = OutboundContent::for_item(item);
        debug!(
            item.id = item.id,
            kind = content.kind(),
            session = %session.name,
            "Sending item"
        );

        match campaign.kind {
            CampaignKind::Message => {
                let chat_id = campaign
                    .target_chat_id
                    .as_deref()
                    .ok_or_else(|| Error::Config {
                        message: format!("Campaign {} has no target chat", campaign.id),
                    })?;
                self.gateway
                    .send_message(&session.name, chat_id, &content)
                    .await
            }
            CampaignKind::Status => self.gateway.send_status(&session.name, &content).await,
        }
    }

    async fn on_sent(&self, item: &dispatch_item::Model, now: DateTime<Utc>) {
        if let Err(e) = self.complete_delivery(item, now).await {
            error!(
                item.id = item.id,
                campaign.id = item.campaign_id,
                error = %e,
                "Item was sent but its state could not be recorded"
            );
        }
    }

    async fn complete_delivery(
        &self,
        item: &dispatch_item::Model,
        now: DateTime<Utc>,
    ) -> Result<()> {
        dispatch::mark_sent(&self.db, item.id, now).await?;
        info!(item.id = item.id, campaign.id = item.campaign_id, "Item sent");

        if let Some(media) = item.media() {
            if let Some(handle) = media.handle {
                if let Err(e) = self.media.delete(handle, media.kind).await {
                    warn!(item.id = item.id, handle, error = %e, "Failed to delete sent media");
                }
            }
        }

        if dispatch::remaining_unsent(&self.db, item.campaign_id).await? == 0
            && campaign::mark_completed(&self.db, item.campaign_id, now).await?
        {
            info!(campaign.id = item.campaign_id, "Campaign completed");
        }
        Ok(())
    }

    async fn on_failed(&self, item: &dispatch_item::Model, now: DateTime<Utc>) {
        if let Err(e) = dispatch::mark_failed(&self.db, item.id).await {
            error!(item.id = item.id, error = %e, "Failed to record item failure");
        }
        match campaign::mark_failed(&self.db, item.campaign_id, now).await {
            Ok(true) => warn!(campaign.id = item.campaign_id, "Campaign failed"),
            Ok(false) => {}
            Err(e) => error!(
                campaign.id = item.campaign_id,
                error = %e,
                "Failed to record campaign failure"
            ),
        }
    }
}
