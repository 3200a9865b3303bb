//! Dispatch metadata models and the ledger reference-key convention

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Prefix dispatch write paths put in front of the dispatch id
pub const DISPATCH_REFERENCE_PREFIX: &str = "DISPATCH_";

/// Order-level record joined into DISPATCH ledger entries for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub dispatch_id: i64,
    pub customer: Option<String>,
    /// Air waybill number
    pub awb: Option<String>,
    pub order_ref: Option<String>,
    pub logistics: Option<String>,
    pub payment_mode: Option<String>,
    pub invoice_amount: Option<Decimal>,
    pub dimensions: PackageDimensions,
    pub status: String,
    pub dispatched_at: Option<NaiveDateTime>,
}

/// Package measurements recorded at dispatch time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDimensions {
    pub length_cm: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub height_cm: Option<Decimal>,
    pub weight_kg: Option<Decimal>,
}

/// Build the reference key a dispatch write path stores on its ledger rows
pub fn dispatch_reference(dispatch_id: i64, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{}{}_{}", DISPATCH_REFERENCE_PREFIX, dispatch_id, suffix),
        None => format!("{}{}", DISPATCH_REFERENCE_PREFIX, dispatch_id),
    }
}

/// Extract the dispatch id from a `DISPATCH_<id>...` reference.
///
/// The id must be followed by the end of the string or a non-alphanumeric
/// delimiter, so `DISPATCH_4_x` yields 4 and never matches dispatch 42, and
/// `DISPATCH_42abc` yields nothing.
pub fn parse_dispatch_reference(reference: &str) -> Option<i64> {
    let rest = reference.trim().strip_prefix(DISPATCH_REFERENCE_PREFIX)?;
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    let (digits, tail) = rest.split_at(digits_end);
    if tail.chars().next().is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }

    digits.parse().ok()
}
