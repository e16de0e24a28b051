//! Tabular data source collaborator — trait seam plus the Google Sheets
//! REST implementation.

pub mod auth;
pub mod client;

pub use auth::{SheetsAuth, TokenProvider};
pub use client::GoogleSheetsClient;

use async_trait::async_trait;

use crate::error::SheetError;

/// The engine's view of a spreadsheet backend.
///
/// Rows are ordered, 1-based in range addressing, and cells are plain
/// strings. Updates interpret values as typed by a user, so the backend may
/// coerce date/number-like strings per its defaults.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Fetch a range as rows of cell strings. An empty range yields an
    /// empty vec, not an error.
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetError>;

    /// Overwrite a range with the given rows (user-entered interpretation).
    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetError>;
}
