//! CSV export of timeline entries

use chrono::NaiveDateTime;
use serde::Serialize;

use shared::TimelineEntry;

use crate::error::{AppError, AppResult};

/// Flat CSV row; dispatch details are reduced to the fields operators search on
#[derive(Debug, Serialize)]
struct TimelineCsvRow<'a> {
    id: i64,
    timestamp: NaiveDateTime,
    #[serde(rename = "type")]
    movement_type: &'static str,
    barcode: &'a str,
    product_name: Option<&'a str>,
    warehouse: &'a str,
    direction: &'static str,
    quantity: i64,
    balance_after: i64,
    reference: Option<&'a str>,
    source: Option<&'a str>,
    description: &'a str,
    dispatch_customer: Option<&'a str>,
    dispatch_awb: Option<&'a str>,
}

impl<'a> From<&'a TimelineEntry> for TimelineCsvRow<'a> {
    fn from(entry: &'a TimelineEntry) -> Self {
        let dispatch = entry.dispatch_details.as_ref();
        Self {
            id: entry.id,
            timestamp: entry.timestamp,
            movement_type: entry.movement_type.as_str(),
            barcode: &entry.barcode,
            product_name: entry.product_name.as_deref(),
            warehouse: &entry.warehouse,
            direction: entry.direction.as_str(),
            quantity: entry.quantity,
            balance_after: entry.balance_after,
            reference: entry.reference.as_deref(),
            source: entry.source.as_deref(),
            description: &entry.description,
            dispatch_customer: dispatch.and_then(|d| d.customer.as_deref()),
            dispatch_awb: dispatch.and_then(|d| d.awb.as_deref()),
        }
    }
}

/// Export timeline entries as CSV, in the order given
pub fn timeline_to_csv(entries: &[TimelineEntry]) -> AppResult<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for entry in entries {
        wtr.serialize(TimelineCsvRow::from(entry))
            .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
}
