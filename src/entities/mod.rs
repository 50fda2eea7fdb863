//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the campaign, dispatch, membership and reminder tables.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod campaign;
pub mod campaign_member;
pub mod dispatch_item;
pub mod member;
pub mod reminder;
pub mod session;

// Re-export specific types to avoid conflicts
pub use campaign::{
    CampaignKind, CampaignStatus, Column as CampaignColumn, Entity as Campaign,
    Model as CampaignModel, ReceiptNames, Recurrence,
};
pub use campaign_member::{
    Column as CampaignMemberColumn, Entity as CampaignMember, Model as CampaignMemberModel,
};
pub use dispatch_item::{
    Column as DispatchItemColumn, DeliveryState, Entity as DispatchItem, MediaType,
    Model as DispatchItemModel,
};
pub use member::{Column as MemberColumn, Entity as Member, Model as MemberModel};
pub use reminder::{
    Column as ReminderColumn, Entity as Reminder, Model as ReminderModel, ReminderType,
};
pub use session::{Column as SessionColumn, Entity as Session, Model as SessionModel};
