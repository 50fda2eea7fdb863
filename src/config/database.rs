//! Database configuration module.
//!
//! This module handles the datastore connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, guarded by `IF NOT EXISTS` so both engines
//! can bootstrap the schema on every start.

use crate::entities::{
    Campaign, CampaignMember, DispatchItem, Member, Reminder, ReminderColumn, Session,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};

/// Default datastore used when neither the config file nor `DATABASE_URL` names one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/campaigns.sqlite?mode=rwc";

/// Establishes a connection to the datastore at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates all tables and the reminder uniqueness index if they do not exist yet.
///
/// Tables are created parents-first so foreign keys always point at an existing table.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Session).await?;
    create_table(db, &schema, Member).await?;
    create_table(db, &schema, Campaign).await?;
    create_table(db, &schema, DispatchItem).await?;
    create_table(db, &schema, CampaignMember).await?;
    create_table(db, &schema, Reminder).await?;

    let unique_reminder = Index::create()
        .name("idx_reminders_member_campaign_type")
        .table(Reminder)
        .col(ReminderColumn::MemberId)
        .col(ReminderColumn::CampaignId)
        .col(ReminderColumn::ReminderType)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&unique_reminder)).await?;

    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CampaignModel, DispatchItemModel, MemberModel, ReminderModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<CampaignModel> = Campaign::find().limit(1).all(&db).await?;
        let _: Vec<DispatchItemModel> = DispatchItem::find().limit(1).all(&db).await?;
        let _: Vec<MemberModel> = Member::find().limit(1).all(&db).await?;
        let _: Vec<ReminderModel> = Reminder::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
