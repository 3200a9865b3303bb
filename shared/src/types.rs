//! Common types used across the platform

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::validation::FilterError;

/// Sentinel a caller passes to ask for every warehouse
pub const ALL_WAREHOUSES: &str = "ALL";

/// Which locations a ledger or snapshot query covers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WarehouseFilter {
    /// Unscoped, aggregates across every location
    #[default]
    All,
    /// Exact match on the location code
    Location(String),
}

impl WarehouseFilter {
    /// Interpret the optional `warehouse` request parameter.
    ///
    /// Missing, blank and `ALL` (any case) are all unscoped.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            None | Some("") => WarehouseFilter::All,
            Some(code) if code.eq_ignore_ascii_case(ALL_WAREHOUSES) => WarehouseFilter::All,
            Some(code) => WarehouseFilter::Location(code.to_string()),
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            WarehouseFilter::All => None,
            WarehouseFilter::Location(code) => Some(code.as_str()),
        }
    }

    pub fn matches(&self, location_code: &str) -> bool {
        self.location().map_or(true, |code| code == location_code)
    }

    /// Value echoed back as `warehouse_filter`
    pub fn label(&self) -> &str {
        self.location().unwrap_or(ALL_WAREHOUSES)
    }
}

/// Inclusive calendar-day range for ledger queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DayRange {
    /// Midnight at the start of `from`
    pub fn start_bound(&self) -> Option<NaiveDateTime> {
        self.from.and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// Last representable instant of `to` (23:59:59.999999)
    pub fn end_bound(&self) -> Option<NaiveDateTime> {
        self.to.and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999))
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start_bound().map_or(true, |start| at >= start)
            && self.end_bound().map_or(true, |end| at <= end)
    }
}

/// Grouping key for the movement summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Product,
    Warehouse,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Product => "product",
            GroupBy::Warehouse => "warehouse",
        }
    }
}

impl FromStr for GroupBy {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(GroupBy::Product),
            "warehouse" => Ok(GroupBy::Warehouse),
            _ => Err(FilterError::InvalidGroupBy(s.to_string())),
        }
    }
}
