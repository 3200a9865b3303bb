//! Derived timeline and summary views
//!
//! None of these are persisted; they are rebuilt on every request.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Category, CurrentStock, Direction, DispatchRecord, MovementType};
use crate::types::GroupBy;

/// Ledger entry annotated with its running balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub product_name: Option<String>,
    pub barcode: String,
    pub warehouse: String,
    pub quantity: i64,
    pub direction: Direction,
    pub reference: Option<String>,
    pub source: Option<String>,
    /// Balance as of and including this entry
    pub balance_after: i64,
    pub description: String,
    pub dispatch_details: Option<DispatchRecord>,
}

/// Quantity per movement category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub bulk_upload: i64,
    pub dispatch: i64,
    pub damage: i64,
    pub recovery: i64,
    pub returns: i64,
    pub self_transfer_in: i64,
    pub self_transfer_out: i64,
}

impl Breakdown {
    pub fn add(&mut self, category: Category, quantity: i64) {
        let bucket = match category {
            Category::BulkUpload => &mut self.bulk_upload,
            Category::Dispatch => &mut self.dispatch,
            Category::Damage => &mut self.damage,
            Category::Recovery => &mut self.recovery,
            Category::Returns => &mut self.returns,
            Category::SelfTransferIn => &mut self.self_transfer_in,
            Category::SelfTransferOut => &mut self.self_transfer_out,
        };
        *bucket = bucket.saturating_add(quantity);
    }

    /// Categories that flow into stock by convention
    pub fn inbound(&self) -> i64 {
        self.bulk_upload + self.recovery + self.returns + self.self_transfer_in
    }

    /// Categories that flow out of stock by convention
    pub fn outbound(&self) -> i64 {
        self.dispatch + self.damage + self.self_transfer_out
    }
}

/// Totals for the entries in view plus the snapshot cross-check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSummary {
    pub total_entries: i64,
    /// Signed sum of BULK_UPLOAD and OPENING entries only
    pub opening_stock: i64,
    pub total_in: i64,
    pub total_out: i64,
    pub net_movement: i64,
    /// Sum of active snapshot batches, fetched independently of the ledger
    pub current_stock: i64,
    /// Balance the replay started from
    pub prior_balance: i64,
    pub closing_balance: i64,
    /// `current_stock - closing_balance`; zero when the snapshot is unavailable
    pub drift: i64,
    pub snapshot_available: bool,
    /// Entries whose direction contradicts their movement type
    pub direction_anomalies: i64,
    pub breakdown: Breakdown,
}

impl TimelineSummary {
    /// Whether the ledger replay and the snapshot disagree
    pub fn has_drift(&self) -> bool {
        self.snapshot_available && self.drift != 0
    }
}

/// Balance-annotated movement history for one product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineView {
    pub product_code: String,
    pub warehouse_filter: String,
    pub timeline: Vec<TimelineEntry>,
    pub current_stock: Vec<CurrentStock>,
    pub summary: TimelineSummary,
}

impl TimelineView {
    /// Well-formed view with no entries and zeroed totals
    pub fn empty(product_code: impl Into<String>, warehouse_filter: impl Into<String>) -> Self {
        Self {
            product_code: product_code.into(),
            warehouse_filter: warehouse_filter.into(),
            timeline: Vec::new(),
            current_stock: Vec::new(),
            summary: TimelineSummary::default(),
        }
    }
}

/// Movement totals for one product or warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementGroup {
    /// Barcode or warehouse code, depending on the grouping
    pub group_key: String,
    pub product_name: Option<String>,
    pub total_movements: i64,
    pub total_in: i64,
    pub total_out: i64,
    pub net_movement: i64,
    pub last_movement: NaiveDateTime,
}

/// Dashboard summary grouped by product or warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSummaryView {
    pub group_by: GroupBy,
    pub warehouse_filter: String,
    pub groups: Vec<MovementGroup>,
}

impl MovementSummaryView {
    pub fn empty(group_by: GroupBy, warehouse_filter: impl Into<String>) -> Self {
        Self {
            group_by,
            warehouse_filter: warehouse_filter.into(),
            groups: Vec::new(),
        }
    }
}
