//! Reminder engine - nudges members who have not paid for a completed campaign.
//!
//! Reminder state per (member, campaign) is derived, never stored as an enum: the
//! presence of FIRST/FINAL reminder records plus a live check against the ledger.
//! A member is reminded first right after the campaign completes and, if still
//! unpaid once the delay has passed, a final time.

use crate::{
    config::settings::ReminderConfig,
    core::{
        campaign::{get_campaign, recently_completed},
        matching::{filter_for_campaign, is_member_paid},
        member::{chat_id_for_phone, get_member, members_for_campaign},
        reminder,
        schedule::payment_window,
        session::get_session,
    },
    entities::{CampaignModel, MemberModel, ReminderModel, ReminderType, SessionModel},
    errors::{Error, Result},
    gateway::MessagingGateway,
    ledger::{LedgerSource, SheetEntry, fetch_ledger},
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Counts from one reminder tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderReport {
    /// First reminders delivered and recorded
    pub first_sent: usize,
    /// Final reminders delivered and recorded
    pub final_sent: usize,
    /// Members found paid and left alone
    pub skipped_paid: usize,
    /// Reminders that could not be delivered or recorded
    pub failed: usize,
}

impl ReminderReport {
    fn tally(&mut self, reminder_type: ReminderType, outcome: &Result<bool>) {
        match (outcome, reminder_type) {
            (Ok(true), ReminderType::First) => self.first_sent += 1,
            (Ok(true), ReminderType::Final) => self.final_sent += 1,
            (Ok(false), _) => {}
            (Err(_), _) => self.failed += 1,
        }
    }
}

/// Text of a reminder quoting the member's memo id and the grace period.
#[must_use]
pub fn reminder_text(
    member: &MemberModel,
    campaign: &CampaignModel,
    reminder_type: ReminderType,
    grace_hours: i64,
) -> String {
    let opening = match reminder_type {
        ReminderType::First => "we have not yet received",
        ReminderType::Final => "this is a final reminder, we still have not received",
    };
    format!(
        "Hi {}, {opening} your payment for \"{}\". Please pay within the next {grace_hours} hours \
         and include your memo ID {} with the payment.",
        member.first_name.trim(),
        campaign.title,
        member.memo_id
    )
}

/// Reconciles the ledger and sends first and final reminders
pub struct ReminderEngine {
    db: DatabaseConnection,
    gateway: Arc<dyn MessagingGateway>,
    sources: Vec<Arc<dyn LedgerSource>>,
    settings: ReminderConfig,
}

impl ReminderEngine {
    /// Creates an engine over the given collaborators.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn MessagingGateway>,
        sources: Vec<Arc<dyn LedgerSource>>,
        settings: ReminderConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            sources,
            settings,
        }
    }

    /// Runs one tick at `now`.
    ///
    /// Campaigns completed within the first-pass horizon get a first pass. Members
    /// already reminded are skipped, so a first reminder that failed is retried on
    /// later ticks until the horizon passes. The ledger is only read when such a
    /// campaign exists or some first reminder has aged past the final delay. Errors
    /// for one campaign or member are logged and counted; they never stop the rest
    /// of the tick.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ReminderReport> {
        let mut report = ReminderReport::default();
        let completed_since = now
            .checked_sub_signed(self.settings.first_pass_horizon())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let completed = recently_completed(&self.db, completed_since).await?;
        let final_cutoff = now
            .checked_sub_signed(self.settings.final_delay())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let due_finals = reminder::due_final_reminders(&self.db, final_cutoff).await?;

        if completed.is_empty() && due_finals.is_empty() {
            debug!("No campaigns need reminders");
            return Ok(report);
        }

        let ledger = fetch_ledger(&self.sources).await;
        debug!(rows = ledger.len(), "Ledger loaded");

        for campaign in &completed {
            if let Err(e) = self.first_pass(campaign, &ledger, now, &mut report).await {
                error!(campaign.id = campaign.id, error = %e, "First reminder pass failed");
            }
        }

        for first in &due_finals {
            if let Err(e) = self.final_pass(first, &ledger, now, &mut report).await {
                error!(
                    campaign.id = first.campaign_id,
                    member.id = first.member_id,
                    error = %e,
                    "Final reminder pass failed"
                );
            }
        }

        info!(
            first_sent = report.first_sent,
            final_sent = report.final_sent,
            skipped_paid = report.skipped_paid,
            failed = report.failed,
            "Reminder tick finished"
        );
        Ok(report)
    }

    async fn first_pass(
        &self,
        campaign: &CampaignModel,
        ledger: &[SheetEntry],
        now: DateTime<Utc>,
        report: &mut ReminderReport,
    ) -> Result<()> {
        if campaign.receipt_names.0.is_empty() {
            debug!(campaign.id = campaign.id, "Campaign has no receipt names, skipping");
            return Ok(());
        }

        let (window_start, window_end) = payment_window(campaign)?;
        let rows = filter_for_campaign(
            ledger,
            &campaign.receipt_names.0,
            window_start,
            window_end,
        );
        let session = self.session_for(campaign).await?;

        for member in members_for_campaign(&self.db, campaign.id).await? {
            if is_member_paid(&member, &rows) {
                debug!(member.id = member.id, campaign.id = campaign.id, "Member paid");
                report.skipped_paid += 1;
                continue;
            }
            let outcome = self
                .remind(&member, campaign, &session, ReminderType::First, now)
                .await;
            log_failure(&outcome, &member, campaign);
            report.tally(ReminderType::First, &outcome);
        }
        Ok(())
    }

    async fn final_pass(
        &self,
        first: &ReminderModel,
        ledger: &[SheetEntry],
        now: DateTime<Utc>,
        report: &mut ReminderReport,
    ) -> Result<()> {
        let campaign = get_campaign(&self.db, first.campaign_id)
            .await?
            .ok_or(Error::CampaignNotFound {
                id: first.campaign_id,
            })?;
        let member = get_member(&self.db, first.member_id)
            .await?
            .ok_or(Error::MemberNotFound {
                id: first.member_id,
            })?;

        let (_, window_end) = payment_window(&campaign)?;
        let since = window_end.min(campaign.status_updated_at);
        let rows = filter_for_campaign(ledger, &campaign.receipt_names.0, since, now);
        if is_member_paid(&member, &rows) {
            debug!(
                member.id = member.id,
                campaign.id = campaign.id,
                "Member paid after first reminder"
            );
            report.skipped_paid += 1;
            return Ok(());
        }

        let session = self.session_for(&campaign).await?;
        let outcome = self
            .remind(&member, &campaign, &session, ReminderType::Final, now)
            .await;
        log_failure(&outcome, &member, &campaign);
        report.tally(ReminderType::Final, &outcome);
        Ok(())
    }

    async fn session_for(&self, campaign: &CampaignModel) -> Result<SessionModel> {
        get_session(&self.db, campaign.session_id)
            .await?
            .ok_or(Error::SessionNotFound {
                id: campaign.session_id,
            })
    }

    /// Sends and records one reminder. Returns false when it was already sent.
    async fn remind(
        &self,
        member: &MemberModel,
        campaign: &CampaignModel,
        session: &SessionModel,
        reminder_type: ReminderType,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if reminder::has_reminder(&self.db, member.id, campaign.id, reminder_type).await? {
            return Ok(false);
        }

        let grace_hours = match reminder_type {
            ReminderType::First => self.settings.first_grace_hours,
            ReminderType::Final => self.settings.final_grace_hours,
        };
        let text = reminder_text(member, campaign, reminder_type, grace_hours);
        let chat_id = chat_id_for_phone(&member.phone_number);

        let response = self
            .gateway
            .send_text(&session.name, &chat_id, &text)
            .await?;
        if !response.is_success() {
            return Err(Error::Gateway {
                message: format!(
                    "reminder rejected ({}): {}",
                    response.status, response.body
                ),
            });
        }

        reminder::record_reminder(&self.db, member.id, campaign.id, reminder_type, now).await?;
        info!(
            member.id = member.id,
            campaign.id = campaign.id,
            reminder = ?reminder_type,
            "Reminder sent"
        );
        Ok(true)
    }
}

fn log_failure(outcome: &Result<bool>, member: &MemberModel, campaign: &CampaignModel) {
    if let Err(e) = outcome {
        error!(
            member.id = member.id,
            campaign.id = campaign.id,
            error = %e,
            "Failed to send reminder"
        );
    }
}
