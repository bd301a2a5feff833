//! Result extraction for tool responses.
//!
//! Tool output is loosely typed and expected to be messy, so extraction
//! degrades instead of failing in two documented places:
//! - text extraction falls back to the whole response as JSON
//! - a text body that is not a query payload yields no records (lenient policy)
//!
//! Conventions: the first `text` item wins, and only the first result set is
//! converted to records. Additional result sets are left for a future API.

use serde_json::Value;

use super::errors::GatewayError;
use super::types::{QueryPayload, Record, ToolResponse};

/// How `extract_records` treats text that does not parse as a query payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordPolicy {
    /// Unparseable text means "no records".
    #[default]
    Lenient,
    /// Unparseable text is a `MalformedResponse` error.
    Strict,
}

/// Text of the first `text` content item, or the compact JSON of the whole
/// response when there is none. Never fails.
pub fn extract_text(response: &ToolResponse) -> String {
    match response.first_text() {
        Some(text) => text.to_string(),
        None => response.raw().to_string(),
    }
}

/// Records of the first result set, using the lenient policy.
pub fn extract_records(response: &ToolResponse) -> Result<Vec<Record>, GatewayError> {
    extract_records_with(response, RecordPolicy::Lenient)
}

/// Records of the first result set.
///
/// Empty when there are no results, or when the first set has no columns or
/// no rows. A row whose width differs from the column list is an error.
pub fn extract_records_with(
    response: &ToolResponse,
    policy: RecordPolicy,
) -> Result<Vec<Record>, GatewayError> {
    let text = extract_text(response);

    let payload: QueryPayload = match serde_json::from_str(&text) {
        Ok(payload) => payload,
        Err(e) => {
            return match policy {
                RecordPolicy::Lenient => {
                    tracing::debug!(error = %e, "tool text is not a query payload");
                    Ok(Vec::new())
                }
                RecordPolicy::Strict => Err(GatewayError::MalformedResponse {
                    reason: format!("query payload did not parse: {e}"),
                }),
            };
        }
    };

    let Some(result_set) = payload.results.into_iter().next() else {
        return Ok(Vec::new());
    };
    if result_set.schema.is_empty() || result_set.rows.is_empty() {
        return Ok(Vec::new());
    }

    let columns: Vec<&str> = result_set
        .schema
        .iter()
        .map(|col| col.column_name.as_str())
        .collect();

    result_set
        .rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| zip_row(&columns, row, idx))
        .collect()
}

fn zip_row(columns: &[&str], row: Vec<Value>, idx: usize) -> Result<Record, GatewayError> {
    if row.len() != columns.len() {
        return Err(GatewayError::MalformedResponse {
            reason: format!(
                "row {idx} has {} values but the result set has {} columns",
                row.len(),
                columns.len()
            ),
        });
    }

    Ok(columns
        .iter()
        .map(|name| name.to_string())
        .zip(row)
        .collect())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
