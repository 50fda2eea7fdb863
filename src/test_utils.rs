//! Shared test utilities for the campaign engines.
//!
//! Fixture builders with sensible defaults, plus in-process fakes for the messaging
//! gateway, media store and ledger sources.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{member, session},
    entities::{
        self, CampaignKind, CampaignStatus, DeliveryState, MediaType, ReceiptNames, campaign,
        dispatch_item,
    },
    errors::{Error, Result},
    gateway::{GatewayResponse, MessagingGateway, OutboundContent},
    ledger::{LedgerSource, SheetEntry},
    media::MediaStore,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::{
    Mutex,
    atomic::{AtomicU16, Ordering},
};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A whole-second instant used as "now" by deterministic tests: 2026-01-10 12:00 UTC.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap()
}

/// Creates a session with a fixed phone number.
pub async fn create_test_session(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::session::Model> {
    session::create_session(db, name, "+15550000").await
}

/// Creates a member with a fixed phone number.
pub async fn create_test_member(
    db: &DatabaseConnection,
    first_name: &str,
    last_name: &str,
    memo_id: &str,
) -> Result<entities::member::Model> {
    member::create_member(db, first_name, last_name, "+1 555 0100", memo_id).await
}

/// A member model that is never stored, for pure matching tests.
pub fn test_member(first_name: &str, last_name: &str, memo_id: &str) -> entities::member::Model {
    entities::member::Model {
        id: 1,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        phone_number: "+15550100".to_string(),
        memo_id: memo_id.to_string(),
    }
}

/// A campaign model that is never stored.
///
/// # Defaults
/// * kind: message, status: completed at [`fixed_now`]
/// * `receipt_names`: `["Club Treasurer"]`
pub fn test_campaign_model(start: NaiveDate, end: NaiveDate, time_zone: &str) -> campaign::Model {
    campaign::Model {
        id: 1,
        title: "Test Campaign".to_string(),
        kind: CampaignKind::Message,
        session_id: 1,
        target_chat_id: Some("12036302@g.us".to_string()),
        template: "Please pay your dues".to_string(),
        start_date: start,
        end_date: end,
        send_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        time_zone: time_zone.to_string(),
        recurrence: None,
        receipt_names: ReceiptNames(vec!["Club Treasurer".to_string()]),
        media_type: None,
        media_url: None,
        media_handle: None,
        status: CampaignStatus::Completed,
        status_updated_at: fixed_now(),
        created_at: fixed_now(),
    }
}

/// Stores a SCHEDULED campaign without materializing items.
///
/// # Defaults
/// * window: 2026-01-01 through 2026-01-07, UTC
/// * `receipt_names`: `["Club Treasurer"]`
/// * `target_chat_id`: a group chat for message campaigns, none for status ones
pub async fn create_test_campaign(
    db: &DatabaseConnection,
    session_id: i64,
    kind: CampaignKind,
) -> Result<campaign::Model> {
    let model = test_campaign_model(
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
        "UTC",
    );
    let target_chat_id = match kind {
        CampaignKind::Message => model.target_chat_id,
        CampaignKind::Status => None,
    };

    campaign::ActiveModel {
        title: Set(model.title),
        kind: Set(kind),
        session_id: Set(session_id),
        target_chat_id: Set(target_chat_id),
        template: Set(model.template),
        start_date: Set(model.start_date),
        end_date: Set(model.end_date),
        send_time: Set(model.send_time),
        time_zone: Set(model.time_zone),
        recurrence: Set(None),
        receipt_names: Set(model.receipt_names),
        media_type: Set(None),
        media_url: Set(None),
        media_handle: Set(None),
        status: Set(CampaignStatus::Scheduled),
        status_updated_at: Set(fixed_now()),
        created_at: Set(fixed_now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Stores a text item of `campaign` due at `scheduled_at` in the given state.
pub async fn insert_test_item(
    db: &DatabaseConnection,
    campaign: &campaign::Model,
    scheduled_at: DateTime<Utc>,
    state: DeliveryState,
) -> Result<dispatch_item::Model> {
    dispatch_item::ActiveModel {
        campaign_id: Set(campaign.id),
        session_id: Set(campaign.session_id),
        content: Set(campaign.template.clone()),
        scheduled_at: Set(scheduled_at),
        media_type: Set(None),
        media_url: Set(None),
        media_handle: Set(None),
        state: Set(state),
        claim_token: Set(None),
        claimed_at: Set(None),
        sent_at: Set(None),
        is_deleted: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// A ledger row with a zero amount and an empty date column.
pub fn ledger_entry(
    sender_name: &str,
    member_id: &str,
    recipient_name: &str,
    created_at: DateTime<Utc>,
) -> SheetEntry {
    SheetEntry {
        sender_name: sender_name.to_string(),
        amount: 0.0,
        member_id: member_id.to_string(),
        date: String::new(),
        recipient_name: recipient_name.to_string(),
        created_at,
    }
}

/// Ledger source serving rows from memory. Rows can be replaced between ticks.
#[derive(Debug)]
pub struct StaticLedger {
    name: String,
    rows: Mutex<Option<Vec<SheetEntry>>>,
}

impl StaticLedger {
    /// A source that returns `rows`.
    pub fn new(name: &str, rows: Vec<SheetEntry>) -> Self {
        Self {
            name: name.to_string(),
            rows: Mutex::new(Some(rows)),
        }
    }

    /// A source whose every read fails.
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: Mutex::new(None),
        }
    }

    /// Replaces the rows served by later reads.
    pub fn set_rows(&self, rows: Vec<SheetEntry>) {
        *self.rows.lock().unwrap() = Some(rows);
    }
}

#[async_trait]
impl LedgerSource for StaticLedger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_entries(&self) -> Result<Vec<SheetEntry>> {
        self.rows
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Ledger {
                source_name: self.name.clone(),
                message: "sheet unavailable".to_string(),
            })
    }
}

/// One call received by [`FakeGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    /// Session name
    pub session: String,
    /// Target chat, `None` for status posts
    pub chat_id: Option<String>,
    /// `text`, `image` or `video`
    pub kind: &'static str,
    /// Text or caption
    pub body: String,
}

/// Gateway that records calls and answers with a configurable status.
#[derive(Debug)]
pub struct FakeGateway {
    status: AtomicU16,
    fail_containing: Option<String>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::with_status(201)
    }
}

impl FakeGateway {
    /// Answers every call with `201 Created`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every call with `status`.
    pub fn with_status(status: u16) -> Self {
        Self {
            status: AtomicU16::new(status),
            fail_containing: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns a transport error for sends whose body contains `fragment`.
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_containing: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    /// Changes the status returned by later calls.
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(
        &self,
        session: &str,
        chat_id: Option<&str>,
        content: &OutboundContent<'_>,
    ) -> Result<GatewayResponse> {
        let body = match *content {
            OutboundContent::Text { text } => text,
            OutboundContent::Image { caption, .. } | OutboundContent::Video { caption, .. } => {
                caption
            }
        };
        if self
            .fail_containing
            .as_deref()
            .is_some_and(|fragment| body.contains(fragment))
        {
            return Err(Error::Gateway {
                message: "connection reset".to_string(),
            });
        }

        self.calls.lock().unwrap().push(GatewayCall {
            session: session.to_string(),
            chat_id: chat_id.map(str::to_string),
            kind: content.kind(),
            body: body.to_string(),
        });
        Ok(GatewayResponse {
            status: self.status.load(Ordering::SeqCst),
            body: String::new(),
        })
    }
}

#[async_trait]
impl MessagingGateway for FakeGateway {
    async fn send_message(
        &self,
        session: &str,
        chat_id: &str,
        content: &OutboundContent<'_>,
    ) -> Result<GatewayResponse> {
        self.record(session, Some(chat_id), content)
    }

    async fn send_status(
        &self,
        session: &str,
        content: &OutboundContent<'_>,
    ) -> Result<GatewayResponse> {
        self.record(session, None, content)
    }
}

/// Media store that records deleted handles, optionally failing every delete.
#[derive(Debug, Default)]
pub struct FakeMediaStore {
    fail: bool,
    deleted: Mutex<Vec<(String, MediaType)>>,
}

impl FakeMediaStore {
    /// A store whose every delete fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Handles deleted so far.
    pub fn deleted(&self) -> Vec<(String, MediaType)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn delete(&self, handle: &str, kind: MediaType) -> Result<()> {
        if self.fail {
            return Err(Error::Media {
                message: format!("cannot delete '{handle}'"),
            });
        }
        self.deleted.lock().unwrap().push((handle.to_string(), kind));
        Ok(())
    }
}
