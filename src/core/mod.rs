//! Core business logic - framework-agnostic campaign, dispatch and reminder operations.

/// Campaign creation, lookup and status transitions
pub mod campaign;
/// Dispatch item claim and delivery-state primitives
pub mod dispatch;
/// Payment reconciliation matching
pub mod matching;
/// Members and campaign memberships
pub mod member;
/// Reminder records
pub mod reminder;
/// Schedule materialization
pub mod schedule;
/// Gateway sessions
pub mod session;
