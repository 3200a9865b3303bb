//! Validation of ledger query filters

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::DayRange;

/// Date format accepted for `dateFrom` / `dateTo`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Largest magnitude accepted for a caller-supplied starting balance
pub const PRIOR_BALANCE_LIMIT: i64 = 1_000_000_000_000_000;

/// A request filter that cannot be turned into a ledger query
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("productCode is required")]
    MissingProductCode,

    #[error("{field} must be a date in YYYY-MM-DD format, got '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error("dateFrom ({from}) must not be after dateTo ({to})")]
    InvertedRange { from: NaiveDate, to: NaiveDate },

    #[error("groupBy must be 'product' or 'warehouse', got '{0}'")]
    InvalidGroupBy(String),

    #[error("priorBalance and carryForward cannot be combined")]
    ConflictingBaseline,

    #[error("priorBalance must be between -{limit} and {limit}, got {0}", limit = PRIOR_BALANCE_LIMIT)]
    PriorBalanceOutOfRange(i64),
}

impl FilterError {
    /// Request parameter the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            FilterError::MissingProductCode => "productCode",
            FilterError::InvalidDate { field, .. } => *field,
            FilterError::InvertedRange { .. } => "dateFrom",
            FilterError::InvalidGroupBy(_) => "groupBy",
            FilterError::ConflictingBaseline => "carryForward",
            FilterError::PriorBalanceOutOfRange(_) => "priorBalance",
        }
    }
}

/// Trim the product code and reject blanks
pub fn validate_product_code(raw: Option<&str>) -> Result<String, FilterError> {
    match raw.map(str::trim) {
        Some(code) if !code.is_empty() => Ok(code.to_string()),
        _ => Err(FilterError::MissingProductCode),
    }
}

/// Reject starting balances outside `±PRIOR_BALANCE_LIMIT`
pub fn validate_prior_balance(balance: i64) -> Result<i64, FilterError> {
    if (-PRIOR_BALANCE_LIMIT..=PRIOR_BALANCE_LIMIT).contains(&balance) {
        Ok(balance)
    } else {
        Err(FilterError::PriorBalanceOutOfRange(balance))
    }
}

/// Parse an optional `YYYY-MM-DD` parameter; blank counts as absent
pub fn parse_day(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, FilterError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map(Some)
            .map_err(|_| FilterError::InvalidDate {
                field,
                value: value.to_string(),
            }),
    }
}

/// Parse both day parameters and check their order
pub fn parse_day_range(date_from: Option<&str>, date_to: Option<&str>) -> Result<DayRange, FilterError> {
    let from = parse_day("dateFrom", date_from)?;
    let to = parse_day("dateTo", date_to)?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(FilterError::InvertedRange { from, to });
        }
    }

    Ok(DayRange { from, to })
}
