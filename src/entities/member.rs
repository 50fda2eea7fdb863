//! Member entity - A person expected to pay into one or more campaigns.
//!
//! `memo_id` is the authoritative payment-matching key; display names only narrow
//! the candidate ledger rows.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Member database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "members")]
pub struct Model {
    /// Unique identifier for the member
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Phone number in international format, digits with optional `+`
    pub phone_number: String,
    /// Identifier the member quotes in payment memos
    pub memo_id: String,
}

impl Model {
    /// First and last name joined by a space.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Defines relationships between Member and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One member has many reminders
    #[sea_orm(has_many = "super::reminder::Entity")]
    Reminders,
}

impl Related<super::reminder::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reminders.def()
    }
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        super::campaign_member::Relation::Campaign.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::campaign_member::Relation::Member.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
