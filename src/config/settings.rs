//! Engine settings loading from config.toml and environment variables.
//!
//! Every section has defaults, so a missing config file is not an error. Secrets and
//! deployment-specific values (`DATABASE_URL`, gateway key, spreadsheet sources,
//! media credentials) are normally supplied through the environment, which overrides
//! whatever the file says.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_VAR: &str = "CAMPAIGN_ENGINE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Datastore connection URL
    pub database_url: String,
    /// Messaging gateway settings
    pub gateway: GatewayConfig,
    /// Dispatch engine timing
    pub dispatch: DispatchConfig,
    /// Reminder engine timing and grace periods
    pub reminder: ReminderConfig,
    /// Payment ledger spreadsheets
    pub sheets: SheetsConfig,
    /// Media store credentials
    pub media: MediaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: super::database::DEFAULT_DATABASE_URL.to_string(),
            gateway: GatewayConfig::default(),
            dispatch: DispatchConfig::default(),
            reminder: ReminderConfig::default(),
            sheets: SheetsConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

/// Messaging gateway endpoint and credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL, e.g. `http://localhost:3000`
    pub base_url: String,
    /// Value sent in the `X-Api-Key` header
    pub api_key: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: String::new(),
        }
    }
}

/// Dispatch engine timing
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Seconds between ticks
    pub interval_secs: u64,
    /// How far in the past an item may be scheduled and still be claimed
    pub claim_window_secs: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            claim_window_secs: 120,
        }
    }
}

impl DispatchConfig {
    /// Tick interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Claim window as a signed duration for timestamp arithmetic.
    #[must_use]
    pub fn claim_window(&self) -> chrono::Duration {
        signed_seconds(self.claim_window_secs)
    }

    /// Tick interval as a signed duration for timestamp arithmetic.
    #[must_use]
    pub fn tick(&self) -> chrono::Duration {
        signed_seconds(i64::try_from(self.interval_secs).unwrap_or(i64::MAX))
    }
}

fn signed_seconds(secs: i64) -> chrono::Duration {
    chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
}

/// Reminder engine timing and grace periods
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Seconds between ticks
    pub interval_secs: u64,
    /// How recently a campaign must have completed to get first reminders
    pub completion_lookback_secs: i64,
    /// Age a first reminder must reach before the final one is considered
    pub final_delay_hours: i64,
    /// How long after completion first reminders that could not be sent are retried
    pub first_retry_hours: i64,
    /// Grace period quoted in the first reminder
    pub first_grace_hours: i64,
    /// Grace period quoted in the final reminder
    pub final_grace_hours: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_secs: 50,
            completion_lookback_secs: 120,
            final_delay_hours: 6,
            first_retry_hours: 24,
            first_grace_hours: 6,
            final_grace_hours: 3,
        }
    }
}

impl ReminderConfig {
    /// Tick interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// How far back completed campaigns are considered for first reminders.
    ///
    /// The wider of the completion lookback and the retry horizon, so a first
    /// reminder that failed on one tick is attempted again on later ones.
    #[must_use]
    pub fn first_pass_horizon(&self) -> chrono::Duration {
        let lookback = signed_seconds(self.completion_lookback_secs);
        let retry = chrono::Duration::try_hours(self.first_retry_hours)
            .unwrap_or(chrono::Duration::MAX);
        lookback.max(retry)
    }

    /// Age a first reminder must reach before the final one is considered.
    #[must_use]
    pub fn final_delay(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.final_delay_hours).unwrap_or(chrono::Duration::MAX)
    }
}

/// Parallel comma-delimited lists describing the ledger spreadsheets
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Spreadsheet ids
    pub spreadsheet_ids: String,
    /// Sheet (tab) names, one per spreadsheet
    pub sheet_names: String,
    /// Service-account credential file paths, one per spreadsheet
    pub credential_files: String,
}

/// One configured ledger spreadsheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSourceConfig {
    /// Spreadsheet id
    pub spreadsheet_id: String,
    /// Sheet (tab) name
    pub sheet_name: String,
    /// Path to the service-account JSON credential
    pub credential_file: String,
}

impl SheetsConfig {
    /// Zips the three lists into per-source configs.
    ///
    /// Entries are matched by position, so an empty entry inside a list is kept
    /// for the length check and then rejected.
    ///
    /// # Errors
    /// Returns `Error::Config` when the lists have different lengths or an entry is blank.
    pub fn sources(&self) -> Result<Vec<SheetSourceConfig>> {
        let ids = split_list(&self.spreadsheet_ids);
        let names = split_list(&self.sheet_names);
        let credentials = split_list(&self.credential_files);

        if ids.len() != names.len() || ids.len() != credentials.len() {
            return Err(Error::Config {
                message: format!(
                    "Sheet source lists must have equal length (ids: {}, names: {}, credentials: {})",
                    ids.len(),
                    names.len(),
                    credentials.len()
                ),
            });
        }

        if let Some(position) = (0..ids.len())
            .find(|&i| ids[i].is_empty() || names[i].is_empty() || credentials[i].is_empty())
        {
            return Err(Error::Config {
                message: format!("Sheet source {} has a blank entry", position + 1),
            });
        }

        Ok(ids
            .into_iter()
            .zip(names)
            .zip(credentials)
            .map(|((spreadsheet_id, sheet_name), credential_file)| SheetSourceConfig {
                spreadsheet_id,
                sheet_name,
                credential_file,
            })
            .collect())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|s| s.trim().to_string()).collect()
}

/// Media store (Cloudinary) credentials
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Cloud name
    pub cloud_name: String,
    /// API key
    pub api_key: String,
    /// API secret used to sign requests
    pub api_secret: String,
}

impl MediaConfig {
    /// True when every credential is present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

/// Longest accepted claim window, one day
const MAX_CLAIM_WINDOW_SECS: i64 = 86_400;
/// Longest accepted tick interval, one day
const MAX_INTERVAL_SECS: u64 = 86_400;
/// Longest accepted reminder delay or grace period, one year
const MAX_REMINDER_HOURS: i64 = 24 * 366;

fn invalid(message: String) -> Error {
    Error::Config { message }
}

impl AppConfig {
    /// Checks that timing values are in range.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        let dispatch = &self.dispatch;
        if !(1..=MAX_CLAIM_WINDOW_SECS).contains(&dispatch.claim_window_secs) {
            return Err(invalid(format!(
                "dispatch.claim_window_secs must be between 1 and {MAX_CLAIM_WINDOW_SECS}, got {}",
                dispatch.claim_window_secs
            )));
        }

        for (name, secs) in [
            ("dispatch.interval_secs", dispatch.interval_secs),
            ("reminder.interval_secs", self.reminder.interval_secs),
        ] {
            if !(1..=MAX_INTERVAL_SECS).contains(&secs) {
                return Err(invalid(format!(
                    "{name} must be between 1 and {MAX_INTERVAL_SECS}, got {secs}"
                )));
            }
        }

        let reminder = &self.reminder;
        for (name, hours) in [
            ("reminder.final_delay_hours", reminder.final_delay_hours),
            ("reminder.first_retry_hours", reminder.first_retry_hours),
            ("reminder.first_grace_hours", reminder.first_grace_hours),
            ("reminder.final_grace_hours", reminder.final_grace_hours),
        ] {
            if !(0..=MAX_REMINDER_HOURS).contains(&hours) {
                return Err(invalid(format!(
                    "{name} must be between 0 and {MAX_REMINDER_HOURS}, got {hours}"
                )));
            }
        }

        // A completion must be seen by at least two ticks even when retries are off.
        let min_lookback =
            i64::try_from(reminder.interval_secs.saturating_mul(2)).unwrap_or(i64::MAX);
        if !(min_lookback..=MAX_CLAIM_WINDOW_SECS).contains(&reminder.completion_lookback_secs) {
            return Err(invalid(format!(
                "reminder.completion_lookback_secs must be between {min_lookback} (twice the interval) and {MAX_CLAIM_WINDOW_SECS}, got {}",
                reminder.completion_lookback_secs
            )));
        }
        Ok(())
    }

    /// Overrides file values with any variables `lookup` returns.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut String); 9] = [
            ("DATABASE_URL", &mut self.database_url),
            ("WAHA_BASE_URL", &mut self.gateway.base_url),
            ("WAHA_API_KEY", &mut self.gateway.api_key),
            ("GOOGLE_SHEET_IDS", &mut self.sheets.spreadsheet_ids),
            ("GOOGLE_SHEET_NAMES", &mut self.sheets.sheet_names),
            ("GOOGLE_CREDENTIALS_FILES", &mut self.sheets.credential_files),
            ("CLOUDINARY_CLOUD_NAME", &mut self.media.cloud_name),
            ("CLOUDINARY_API_KEY", &mut self.media.api_key),
            ("CLOUDINARY_API_SECRET", &mut self.media.api_secret),
        ];

        for (var, target) in targets {
            if let Some(value) = lookup(var) {
                debug!(var, "Overriding configuration from environment");
                *target = value;
            }
        }
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the config file (if any) and applies environment overrides.
///
/// The file path comes from `CAMPAIGN_ENGINE_CONFIG`, defaulting to `./config.toml`.
/// A missing default file yields the built-in defaults; a missing file that was
/// named explicitly is an error.
///
/// # Errors
/// Returns `Error::Config` when the file is unreadable or a value is out of range.
pub fn load_app_configuration() -> Result<AppConfig> {
    let explicit = std::env::var(CONFIG_PATH_VAR).ok();
    let path = explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

    let mut config = if explicit.is_some() || Path::new(path).exists() {
        info!(path, "Loading configuration file");
        load_config(path)?
    } else {
        info!("No configuration file found, using defaults");
        AppConfig::default()
    };

    config.apply_overrides(|var| std::env::var(var).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            database_url = "sqlite::memory:"

            [dispatch]
            claim_window_secs = 300

            [reminder]
            final_delay_hours = 12
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.dispatch.claim_window_secs, 300);
        assert_eq!(config.dispatch.interval_secs, 30);
        assert_eq!(config.reminder.final_delay_hours, 12);
        assert_eq!(config.reminder.interval_secs, 50);
        assert_eq!(config.reminder.first_grace_hours, 6);
        assert_eq!(config.reminder.final_grace_hours, 3);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "postgres://db/campaigns"),
            ("WAHA_API_KEY", "secret"),
            ("GOOGLE_SHEET_IDS", "a,b"),
        ]);

        config.apply_overrides(|var| env.get(var).map(|v| (*v).to_string()));

        assert_eq!(config.database_url, "postgres://db/campaigns");
        assert_eq!(config.gateway.api_key, "secret");
        assert_eq!(config.gateway.base_url, "http://localhost:3000");
        assert_eq!(config.sheets.spreadsheet_ids, "a,b");
    }

    #[test]
    fn test_sheet_sources_zip_lists() {
        let sheets = SheetsConfig {
            spreadsheet_ids: "id-1, id-2".to_string(),
            sheet_names: "Payments,Zelle".to_string(),
            credential_files: "/a.json,/b.json".to_string(),
        };

        let sources = sheets.sources().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].spreadsheet_id, "id-2");
        assert_eq!(sources[1].sheet_name, "Zelle");
        assert_eq!(sources[1].credential_file, "/b.json");
    }

    #[test]
    fn test_sheet_sources_length_mismatch() {
        let sheets = SheetsConfig {
            spreadsheet_ids: "id-1,id-2".to_string(),
            sheet_names: "Payments".to_string(),
            credential_files: "/a.json,/b.json".to_string(),
        };

        assert!(matches!(sheets.sources(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_empty_sheet_lists_mean_no_sources() {
        assert!(SheetsConfig::default().sources().unwrap().is_empty());
    }

    #[test]
    fn test_blank_sheet_entry_is_rejected_not_shifted() {
        let sheets = SheetsConfig {
            spreadsheet_ids: "a,,c".to_string(),
            sheet_names: ",2,3".to_string(),
            credential_files: "x,y,z".to_string(),
        };

        assert!(matches!(sheets.sources(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_trailing_comma_counts_as_an_entry() {
        let sheets = SheetsConfig {
            spreadsheet_ids: "id-1,".to_string(),
            sheet_names: "Payments".to_string(),
            credential_files: "/a.json".to_string(),
        };

        assert!(matches!(sheets.sources(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_claim_window() {
        for secs in [0, -60, i64::MAX] {
            let mut config = AppConfig::default();
            config.dispatch.claim_window_secs = secs;
            assert!(
                matches!(config.validate(), Err(Error::Config { .. })),
                "claim window {secs} accepted"
            );
        }
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.dispatch.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reminder.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_reminder_hours() {
        let mut config = AppConfig::default();
        config.reminder.final_delay_hours = -1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reminder.first_retry_hours = i64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_lookback_of_two_intervals() {
        let mut config = AppConfig::default();
        config.reminder.interval_secs = 50;
        config.reminder.completion_lookback_secs = 60;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));

        config.reminder.completion_lookback_secs = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_first_pass_horizon_covers_retries() {
        let mut reminder = ReminderConfig::default();
        assert_eq!(reminder.first_pass_horizon(), chrono::Duration::hours(24));

        reminder.first_retry_hours = 0;
        assert_eq!(reminder.first_pass_horizon(), chrono::Duration::seconds(120));
    }

    #[test]
    fn test_out_of_range_durations_do_not_panic() {
        let dispatch = DispatchConfig {
            interval_secs: u64::MAX,
            claim_window_secs: i64::MAX,
        };
        assert_eq!(dispatch.claim_window(), chrono::Duration::MAX);
        assert_eq!(dispatch.tick(), chrono::Duration::MAX);
    }
}
