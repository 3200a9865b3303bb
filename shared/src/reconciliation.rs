//! Ledger replay and snapshot reconciliation
//!
//! Ledger entries are fetched most-recent-first for display, but a running
//! balance only means something in chronological order. Entries are replayed
//! ascending by `(event_time, id)` from a baseline, annotated, and handed back
//! descending. The balance is relative to the entries in view: it starts from
//! `prior_balance` (zero unless the caller supplies or carries one forward), so
//! a window truncated by a row limit reports balances relative to its oldest
//! entry rather than to the true opening stock.
//!
//! The snapshot total is never derived from the replay. Both figures are
//! reported and their difference is exposed as `drift`.

use std::collections::HashMap;

use crate::models::{
    total_current_stock, Breakdown, CurrentStock, Direction, DispatchRecord, LedgerEntry,
    TimelineEntry, TimelineSummary, TimelineView,
};
use crate::types::WarehouseFilter;

/// Ledger entry with the balance after applying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancedEntry {
    pub entry: LedgerEntry,
    pub balance_after: i64,
}

/// Result of replaying a window of entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    /// Most recent first
    pub entries: Vec<BalancedEntry>,
    pub prior_balance: i64,
    pub closing_balance: i64,
}

/// Replay entries chronologically, whatever order they were fetched in.
///
/// Balances saturate at the `i64` bounds instead of wrapping; request inputs
/// are bounded by [`validate_prior_balance`](crate::validation::validate_prior_balance) well inside that range.
pub fn replay(entries: impl IntoIterator<Item = LedgerEntry>, prior_balance: i64) -> Replay {
    let mut ascending: Vec<LedgerEntry> = entries.into_iter().collect();
    ascending.sort_by_key(LedgerEntry::replay_key);

    let mut balance = prior_balance;
    let mut balanced: Vec<BalancedEntry> = ascending
        .into_iter()
        .map(|entry| {
            balance = balance.saturating_add(entry.signed_quantity());
            BalancedEntry {
                entry,
                balance_after: balance,
            }
        })
        .collect();
    balanced.reverse();

    Replay {
        entries: balanced,
        prior_balance,
        closing_balance: balance,
    }
}

/// Directional and per-category totals over a window of entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementTotals {
    pub total_entries: i64,
    pub opening_stock: i64,
    pub total_in: i64,
    pub total_out: i64,
    pub direction_anomalies: i64,
    pub breakdown: Breakdown,
}

impl MovementTotals {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        entries.into_iter().fold(Self::default(), |mut totals, entry| {
            totals.total_entries += 1;
            match entry.direction {
                Direction::In => totals.total_in = totals.total_in.saturating_add(entry.quantity),
                Direction::Out => totals.total_out = totals.total_out.saturating_add(entry.quantity),
            }
            if entry.movement_type.is_opening_stock() {
                totals.opening_stock = totals.opening_stock.saturating_add(entry.signed_quantity());
            }
            if !entry.movement_type.conforms(entry.direction) {
                totals.direction_anomalies += 1;
            }
            totals.breakdown.add(entry.category(), entry.quantity);
            totals
        })
    }

    pub fn net_movement(&self) -> i64 {
        self.total_in.saturating_sub(self.total_out)
    }
}

/// Combine window totals with the independently fetched snapshot.
///
/// `snapshot` is `None` when the snapshot store could not be read; drift is
/// then reported as zero and `snapshot_available` as false.
pub fn reconcile(
    totals: &MovementTotals,
    prior_balance: i64,
    snapshot: Option<&[CurrentStock]>,
) -> TimelineSummary {
    let closing_balance = prior_balance.saturating_add(totals.net_movement());
    let current_stock = snapshot.map(total_current_stock).unwrap_or(0);

    TimelineSummary {
        total_entries: totals.total_entries,
        opening_stock: totals.opening_stock,
        total_in: totals.total_in,
        total_out: totals.total_out,
        net_movement: totals.net_movement(),
        current_stock,
        prior_balance,
        closing_balance,
        drift: if snapshot.is_some() {
            current_stock.saturating_sub(closing_balance)
        } else {
            0
        },
        snapshot_available: snapshot.is_some(),
        direction_anomalies: totals.direction_anomalies,
        breakdown: totals.breakdown,
    }
}

/// Attach the balance and, for dispatches, the matching dispatch record.
///
/// A dispatch entry whose record is missing keeps `dispatch_details: None`.
pub fn annotate(balanced: BalancedEntry, dispatches: &HashMap<i64, DispatchRecord>) -> TimelineEntry {
    let BalancedEntry {
        entry,
        balance_after,
    } = balanced;
    let dispatch_details = entry
        .linked_dispatch_id()
        .and_then(|id| dispatches.get(&id))
        .cloned();
    let description = entry.description();

    TimelineEntry {
        id: entry.id,
        timestamp: entry.event_time,
        movement_type: entry.movement_type,
        product_name: entry.product_name,
        barcode: entry.product_code,
        warehouse: entry.location_code,
        quantity: entry.quantity,
        direction: entry.direction,
        reference: entry.reference,
        source: entry.source,
        balance_after,
        description,
        dispatch_details,
    }
}

/// Build the full timeline view for one product
pub fn build_timeline_view(
    product_code: &str,
    warehouse: &WarehouseFilter,
    entries: Vec<LedgerEntry>,
    prior_balance: i64,
    dispatches: &HashMap<i64, DispatchRecord>,
    snapshot: Option<Vec<CurrentStock>>,
) -> TimelineView {
    let totals = MovementTotals::from_entries(&entries);
    let summary = reconcile(&totals, prior_balance, snapshot.as_deref());
    let replay = replay(entries, prior_balance);

    TimelineView {
        product_code: product_code.to_string(),
        warehouse_filter: warehouse.label().to_string(),
        timeline: replay
            .entries
            .into_iter()
            .map(|balanced| annotate(balanced, dispatches))
            .collect(),
        current_stock: snapshot.unwrap_or_default(),
        summary,
    }
}
