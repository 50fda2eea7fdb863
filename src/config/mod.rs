/// Database connection and schema bootstrap
pub mod database;

/// Engine settings loaded from config.toml and the environment
pub mod settings;

pub use settings::{AppConfig, SheetSourceConfig, load_app_configuration};
