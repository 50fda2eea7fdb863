//! Unified error types for the dispatch and reminder engines.

use thiserror::Error;

/// Every failure the engines and their collaborators can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration
        message: String,
    },

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Campaign schedule could not be materialized
    #[error("Invalid schedule: {message}")]
    InvalidSchedule {
        /// Why the schedule was rejected
        message: String,
    },

    /// Campaign lookup failed
    #[error("Campaign not found: {id}")]
    CampaignNotFound {
        /// Campaign id that was looked up
        id: i64,
    },

    /// Session lookup failed
    #[error("Session not found: {id}")]
    SessionNotFound {
        /// Session id that was looked up
        id: i64,
    },

    /// Member lookup failed
    #[error("Member not found: {id}")]
    MemberNotFound {
        /// Member id that was looked up
        id: i64,
    },

    /// Messaging gateway rejected or could not process a request
    #[error("Gateway error: {message}")]
    Gateway {
        /// Gateway failure detail
        message: String,
    },

    /// A ledger source could not be read
    #[error("Ledger source '{source_name}' failed: {message}")]
    Ledger {
        /// Spreadsheet id of the failing source
        source_name: String,
        /// Failure detail
        message: String,
    },

    /// Media store rejected a request
    #[error("Media store error: {message}")]
    Media {
        /// Media store failure detail
        message: String,
    },

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Service-account token signing failure
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
