//! Member business logic - members and their campaign memberships.

use crate::{
    entities::{Campaign, CampaignMember, Member, campaign_member, member},
    errors::{Error, Result},
};
use sea_orm::{ModelTrait, QueryOrder, Set, prelude::*, sea_query::OnConflict};

/// Creates a member after validating the name, phone number and memo id.
pub async fn create_member(
    db: &DatabaseConnection,
    first_name: &str,
    last_name: &str,
    phone_number: &str,
    memo_id: &str,
) -> Result<member::Model> {
    if first_name.trim().is_empty() {
        return Err(Error::Config {
            message: "Member first name cannot be empty".to_string(),
        });
    }
    if memo_id.trim().is_empty() {
        return Err(Error::Config {
            message: "Member memo id cannot be empty".to_string(),
        });
    }
    if phone_digits(phone_number).is_empty() {
        return Err(Error::Config {
            message: format!("Invalid phone number '{phone_number}'"),
        });
    }

    let member = member::ActiveModel {
        first_name: Set(first_name.trim().to_string()),
        last_name: Set(last_name.trim().to_string()),
        phone_number: Set(phone_number.trim().to_string()),
        memo_id: Set(memo_id.trim().to_string()),
        ..Default::default()
    };
    member.insert(db).await.map_err(Into::into)
}

/// Finds a member by its unique ID.
pub async fn get_member(db: &DatabaseConnection, member_id: i64) -> Result<Option<member::Model>> {
    Member::find_by_id(member_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Links a member to a campaign. Linking twice is a no-op.
pub async fn add_member_to_campaign(
    db: &DatabaseConnection,
    campaign_id: i64,
    member_id: i64,
) -> Result<()> {
    Campaign::find_by_id(campaign_id)
        .one(db)
        .await?
        .ok_or(Error::CampaignNotFound { id: campaign_id })?;
    get_member(db, member_id)
        .await?
        .ok_or(Error::MemberNotFound { id: member_id })?;

    let link = campaign_member::ActiveModel {
        campaign_id: Set(campaign_id),
        member_id: Set(member_id),
    };
    CampaignMember::insert(link)
        .on_conflict(
            OnConflict::columns([
                campaign_member::Column::CampaignId,
                campaign_member::Column::MemberId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Members expected to pay into the campaign, ordered by id.
pub async fn members_for_campaign(
    db: &DatabaseConnection,
    campaign_id: i64,
) -> Result<Vec<member::Model>> {
    let campaign = Campaign::find_by_id(campaign_id)
        .one(db)
        .await?
        .ok_or(Error::CampaignNotFound { id: campaign_id })?;

    campaign
        .find_related(Member)
        .order_by_asc(member::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

fn phone_digits(phone_number: &str) -> String {
    phone_number.chars().filter(char::is_ascii_digit).collect()
}

/// Gateway chat id for a member's phone number.
#[must_use]
pub fn chat_id_for_phone(phone_number: &str) -> String {
    format!("{}@c.us", phone_digits(phone_number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CampaignKind;
    use crate::test_utils::*;

    #[test]
    fn test_chat_id_for_phone() {
        assert_eq!(chat_id_for_phone("+1 (555) 010-2030"), "15550102030@c.us");
    }

    #[tokio::test]
    async fn test_create_member_validation() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(matches!(
            create_member(&db, "John", "Doe", "+15550100", "  ").await,
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            create_member(&db, "John", "Doe", "no digits", "M1").await,
            Err(Error::Config { .. })
        ));
        let member = create_member(&db, " John ", "Doe", "+15550100", " M1 ").await?;
        assert_eq!(member.first_name, "John");
        assert_eq!(member.memo_id, "M1");
        Ok(())
    }

    #[tokio::test]
    async fn test_campaign_membership() -> Result<()> {
        let db = setup_test_db().await?;
        let session = create_test_session(&db, "default").await?;
        let campaign = create_test_campaign(&db, session.id, CampaignKind::Message).await?;
        let other = create_test_campaign(&db, session.id, CampaignKind::Message).await?;
        let john = create_test_member(&db, "John", "Doe", "M1").await?;
        let jane = create_test_member(&db, "Jane", "Roe", "M2").await?;

        add_member_to_campaign(&db, campaign.id, john.id).await?;
        add_member_to_campaign(&db, campaign.id, john.id).await?;
        add_member_to_campaign(&db, campaign.id, jane.id).await?;
        add_member_to_campaign(&db, other.id, jane.id).await?;

        let members = members_for_campaign(&db, campaign.id).await?;
        assert_eq!(members, vec![john, jane.clone()]);
        assert_eq!(members_for_campaign(&db, other.id).await?, vec![jane]);

        assert!(matches!(
            add_member_to_campaign(&db, campaign.id, 999).await,
            Err(Error::MemberNotFound { id: 999 })
        ));
        Ok(())
    }
}
