//! Current-stock snapshot models
//!
//! Snapshots are maintained by the write paths independently of the ledger
//! and are only ever read here as a cross-check.
//!
//! The server aggregates batches in SQL. [`StockBatchSnapshot`] and
//! [`aggregate_active_batches`] are the in-process reference for that query:
//! the in-memory snapshot store used by the server's service tests is built on
//! them, so the two must keep the same grouping and active-only filter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of a stock batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Active,
    Inactive,
}

/// One batch row of the stock snapshot table, as held by in-memory snapshot stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatchSnapshot {
    pub batch_id: i64,
    pub product_code: String,
    pub product_name: Option<String>,
    pub location_code: String,
    pub quantity_available: i64,
    pub status: BatchStatus,
}

/// Active stock held for one product in one warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentStock {
    pub barcode: String,
    pub product_name: Option<String>,
    pub warehouse: String,
    pub current_stock: i64,
    pub batch_count: i64,
}

/// Sum of the current stock across snapshot rows
pub fn total_current_stock(rows: &[CurrentStock]) -> i64 {
    rows.iter()
        .fold(0i64, |total, r| total.saturating_add(r.current_stock))
}

/// Group active batches by product and warehouse, ordered by both keys.
///
/// Mirrors the `stock_batches` aggregation query of the Postgres snapshot store.
pub fn aggregate_active_batches<'a>(
    batches: impl IntoIterator<Item = &'a StockBatchSnapshot>,
) -> Vec<CurrentStock> {
    let mut groups: BTreeMap<(&str, &str), CurrentStock> = BTreeMap::new();

    for batch in batches
        .into_iter()
        .filter(|b| b.status == BatchStatus::Active)
    {
        let row = groups
            .entry((batch.product_code.as_str(), batch.location_code.as_str()))
            .or_insert_with(|| CurrentStock {
                barcode: batch.product_code.clone(),
                product_name: batch.product_name.clone(),
                warehouse: batch.location_code.clone(),
                current_stock: 0,
                batch_count: 0,
            });
        row.current_stock += batch.quantity_available;
        row.batch_count += 1;
    }

    groups.into_values().collect()
}
