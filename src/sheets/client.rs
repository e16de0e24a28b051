//! Google Sheets REST client — `values.get` and `values.update` over
//! reqwest.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::error::SheetError;
use crate::sheets::{SheetsApi, TokenProvider};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct ValueRange {
    /// Absent entirely when the range is empty.
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct UpdateBody {
    values: Vec<Vec<String>>,
}

/// Sheets API client. Auth is delegated to a [`TokenProvider`].
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    tokens: TokenProvider,
}

impl GoogleSheetsClient {
    pub fn new(tokens: TokenProvider) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
        }
    }

    fn values_url(spreadsheet_id: &str, range: &str) -> String {
        // Sheet names may contain spaces; reqwest's URL parser
        // percent-encodes them in the path.
        format!("{API_BASE}/{spreadsheet_id}/values/{range}")
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .get(Self::values_url(spreadsheet_id, range))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| SheetError::FetchFailed {
                source: spreadsheet_id.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SheetError::FetchFailed {
                source: spreadsheet_id.to_string(),
                reason: format!("values.get {range} failed ({status}): {body}"),
            });
        }

        let range_data: ValueRange =
            response.json().await.map_err(|e| SheetError::FetchFailed {
                source: spreadsheet_id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(range_data.values)
    }

    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .put(Self::values_url(spreadsheet_id, range))
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(token.expose_secret())
            .json(&UpdateBody { values: rows })
            .send()
            .await
            .map_err(|e| SheetError::UpdateFailed {
                source: spreadsheet_id.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SheetError::UpdateFailed {
                source: spreadsheet_id.to_string(),
                reason: format!("values.update {range} failed ({status}): {body}"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_url_shape() {
        assert_eq!(
            GoogleSheetsClient::values_url("abc", "Form Responses 1!A1:ZZ"),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/Form Responses 1!A1:ZZ"
        );
    }

    #[test]
    fn empty_value_range_deserializes() {
        let parsed: ValueRange = serde_json::from_str(r#"{"range":"S!A1:ZZ"}"#).unwrap();
        assert!(parsed.values.is_empty());
    }
}
