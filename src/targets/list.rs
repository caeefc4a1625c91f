//! Explicit-list supplier and the external tabular source.
//!
//! Targets come as a pre-materialized ordered list of profile addresses,
//! typically a column of a published spreadsheet fetched as CSV. The
//! sequence is finite, restartable, and truncated to the caller's limit
//! before dispatch. Authenticating to the sheet host is out of scope here —
//! the document must be reachable by plain HTTP.

use super::{SupplyError, TargetSupplier};
use crate::core::{SourceHint, TargetProfile};
use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::info;

pub struct ExplicitListSupplier {
    queue: VecDeque<TargetProfile>,
}

impl ExplicitListSupplier {
    /// Build from an ordered address list, truncated to `limit`.
    pub fn new(addresses: Vec<String>, limit: usize) -> Self {
        let queue = addresses
            .into_iter()
            .filter(|a| !a.trim().is_empty())
            .take(limit)
            .map(|address| TargetProfile {
                address,
                display_name: None,
                source: SourceHint::ExplicitList,
                invite_anchor: None,
            })
            .collect();
        Self { queue }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[async_trait]
impl TargetSupplier for ExplicitListSupplier {
    async fn next_target(&mut self) -> Result<Option<TargetProfile>, SupplyError> {
        Ok(self.queue.pop_front())
    }
}

// ---------------------------------------------------------------------------
// External tabular source (published sheet → CSV)
// ---------------------------------------------------------------------------

/// Rewrite a sheet's share link into its CSV export endpoint. Links that
/// already point at a CSV resource pass through unchanged.
pub fn csv_export_url(sheet_ref: &str) -> String {
    if let Some(pos) = sheet_ref.find("/edit") {
        return format!("{}/export?format=csv", &sheet_ref[..pos]);
    }
    sheet_ref.to_string()
}

/// Fetch one named column from the tabular source, in row order, skipping
/// blank cells. Unreachable or malformed sources are fatal to the run.
pub async fn fetch_column(
    http: &reqwest::Client,
    sheet_ref: &str,
    column: &str,
) -> Result<Vec<String>, SupplyError> {
    let url = csv_export_url(sheet_ref);
    info!("fetching target column '{column}' from {url}");

    let body = http
        .get(&url)
        .send()
        .await
        .map_err(|e| SupplyError::Source(format!("fetch failed: {e}")))?
        .error_for_status()
        .map_err(|e| SupplyError::Source(format!("fetch failed: {e}")))?
        .text()
        .await
        .map_err(|e| SupplyError::Source(format!("read failed: {e}")))?;

    extract_column(&body, column)
}

/// Pull `column` out of CSV text by header name.
pub fn extract_column(csv_text: &str, column: &str) -> Result<Vec<String>, SupplyError> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| SupplyError::Source(format!("malformed header row: {e}")))?;

    let idx = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| SupplyError::Source(format!("column '{column}' not found")))?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SupplyError::Source(format!("malformed row: {e}")))?;
        if let Some(cell) = record.get(idx) {
            let cell = cell.trim();
            if !cell.is_empty() {
                values.push(cell.to_string());
            }
        }
    }
    Ok(values)
}
