//! Background engines and the loop that drives them.

/// Dispatch of scheduled items
pub mod dispatcher;
/// Unpaid-member reminders
pub mod reminder;
/// Polling loop and shutdown handling
pub mod ticker;

pub use dispatcher::{DispatchEngine, DispatchReport};
pub use reminder::{ReminderEngine, ReminderReport};
pub use ticker::{run_every, shutdown_signal};
