//! WebAssembly module for the stock ledger
//!
//! Provides client-side computation for:
//! - Replaying a fetched ledger window with a caller-chosen starting balance
//! - Validating timeline date filters before a request is sent

use std::collections::HashMap;

use serde::Serialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::reconciliation::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Timeline and summary recomputed in the browser
#[derive(Debug, Serialize)]
struct ClientReplay {
    timeline: Vec<TimelineEntry>,
    summary: TimelineSummary,
}

fn replay_entries(entries_json: &str, prior_balance: i64) -> Result<String, String> {
    let prior_balance = validate_prior_balance(prior_balance).map_err(|e| e.to_string())?;
    let entries: Vec<LedgerEntry> =
        serde_json::from_str(entries_json).map_err(|e| format!("Invalid entries JSON: {}", e))?;
    for entry in &entries {
        entry.validate().map_err(|e| e.to_string())?;
    }

    let product_code = entries
        .first()
        .map(|e| e.product_code.clone())
        .unwrap_or_default();
    let view = build_timeline_view(
        &product_code,
        &WarehouseFilter::All,
        entries,
        prior_balance,
        &HashMap::new(),
        None,
    );

    serde_json::to_string(&ClientReplay {
        timeline: view.timeline,
        summary: view.summary,
    })
    .map_err(|e| format!("Serialization failed: {}", e))
}

/// Replay ledger entries (JSON array, any order) and return `{timeline, summary}` JSON
#[wasm_bindgen]
pub fn replay_ledger_json(entries_json: &str, prior_balance: i64) -> Result<String, JsValue> {
    replay_entries(entries_json, prior_balance).map_err(|e| JsValue::from_str(&e))
}

/// Whether `dateFrom`/`dateTo` would be accepted by the timeline endpoint
#[wasm_bindgen]
pub fn validate_date_range(date_from: Option<String>, date_to: Option<String>) -> bool {
    parse_day_range(date_from.as_deref(), date_to.as_deref()).is_ok()
}
