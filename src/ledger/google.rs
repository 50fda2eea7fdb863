//! Google Sheets ledger source.
//!
//! Authenticates with a service-account credential file: an RS256-signed JWT is
//! exchanged at the credential's `token_uri` for a short-lived bearer token, which is
//! then used to read the configured sheet's values.

use super::{LedgerSource, SheetEntry, parse_row};
use crate::config::SheetSourceConfig;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account JSON key this source needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account e-mail, used as the JWT issuer
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    /// OAuth token endpoint
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Ledger rows from one tab of one spreadsheet
#[derive(Debug, Clone)]
pub struct GoogleSheetSource {
    config: SheetSourceConfig,
    client: reqwest::Client,
}

impl GoogleSheetSource {
    /// Creates a source for the given spreadsheet/tab/credential triple.
    #[must_use]
    pub fn new(config: SheetSourceConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn ledger_error(&self, message: impl Into<String>) -> Error {
        Error::Ledger {
            source_name: self.config.spreadsheet_id.clone(),
            message: message.into(),
        }
    }

    async fn load_key(&self) -> Result<ServiceAccountKey> {
        let raw = tokio::fs::read_to_string(&self.config.credential_file).await?;
        serde_json::from_str(&raw).map_err(Into::into)
    }

    async fn access_token(&self) -> Result<String> {
        let key = self.load_key().await?;
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &key.client_email,
            scope: SHEETS_READONLY_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(key.private_key.as_bytes())?,
        )?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.ledger_error(format!("token exchange failed ({status}): {body}")));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    fn values_url(&self) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(SHEETS_API_BASE)
            .map_err(|e| self.ledger_error(format!("invalid API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| self.ledger_error("API base cannot carry a path"))?
            .extend([
                self.config.spreadsheet_id.as_str(),
                "values",
                self.config.sheet_name.as_str(),
            ]);
        Ok(url)
    }
}

#[async_trait]
impl LedgerSource for GoogleSheetSource {
    fn name(&self) -> &str {
        &self.config.spreadsheet_id
    }

    async fn fetch_entries(&self) -> Result<Vec<SheetEntry>> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.values_url()?)
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.ledger_error(format!("values read failed ({status}): {body}")));
        }

        let range: ValueRange = response.json().await?;
        let entries = rows_to_entries(&range.values);
        debug!(
            sheet = %self.config.sheet_name,
            rows = range.values.len(),
            entries = entries.len(),
            "Read ledger sheet"
        );
        Ok(entries)
    }
}

/// Skips the header row and maps the rest, dropping rows that do not parse.
fn rows_to_entries(values: &[Vec<serde_json::Value>]) -> Vec<SheetEntry> {
    values
        .iter()
        .skip(1)
        .filter_map(|row| {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            parse_row(&cells)
        })
        .collect()
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
