//! Ledger timeline service
//!
//! Fetches one product's ledger window, joins dispatch metadata onto dispatch
//! entries, replays balances and cross-checks them against the stock snapshot.
//!
//! An unreachable ledger store yields an empty timeline with a message rather
//! than an error. An unreachable snapshot or dispatch store only drops the
//! data it would have contributed. Structural query failures are returned.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use shared::{
    build_timeline_view, CurrentStock, DayRange, DispatchRecord, LedgerEntry, TimelineView,
    WarehouseFilter,
};

use super::Served;
use crate::error::{AppError, AppResult};
use crate::stores::{
    with_timeout, BalanceCutoff, DispatchStore, LedgerQuery, LedgerStore, PgDispatchStore,
    PgLedgerStore, PgSnapshotStore, SnapshotStore, StoreError,
};

pub const LEDGER_UNAVAILABLE_MESSAGE: &str =
    "Ledger data is temporarily unavailable; showing an empty timeline";
pub const SNAPSHOT_UNAVAILABLE_MESSAGE: &str =
    "Current stock snapshot is temporarily unavailable; drift could not be checked";
pub const DISPATCH_UNAVAILABLE_MESSAGE: &str =
    "Dispatch details are temporarily unavailable";

/// Where the running balance starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Baseline {
    /// Zero, balances are relative to the oldest entry in view
    #[default]
    Zero,
    /// A balance supplied by the caller
    Explicit(i64),
    /// The signed total of all history before the window
    CarryForward,
}

/// Validated timeline request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRequest {
    pub product_code: String,
    pub warehouse: WarehouseFilter,
    pub days: DayRange,
    pub limit: i64,
    pub baseline: Baseline,
}

/// Timeline service over the ledger, snapshot and dispatch stores
#[derive(Clone)]
pub struct LedgerTimelineService {
    ledger: Arc<dyn LedgerStore>,
    snapshots: Arc<dyn SnapshotStore>,
    dispatches: Arc<dyn DispatchStore>,
    query_timeout: Duration,
}

impl LedgerTimelineService {
    /// Create a new LedgerTimelineService instance
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        snapshots: Arc<dyn SnapshotStore>,
        dispatches: Arc<dyn DispatchStore>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            snapshots,
            dispatches,
            query_timeout,
        }
    }

    /// Service backed by the PostgreSQL stores
    pub fn from_pool(db: PgPool, query_timeout: Duration) -> Self {
        Self::new(
            Arc::new(PgLedgerStore::new(db.clone())),
            Arc::new(PgSnapshotStore::new(db.clone())),
            Arc::new(PgDispatchStore::new(db)),
            query_timeout,
        )
    }

    /// Build the timeline for one product
    pub async fn get_timeline(&self, request: &TimelineRequest) -> AppResult<Served<TimelineView>> {
        match self.assemble(request).await {
            Err(AppError::StoreUnavailable(reason)) => {
                tracing::warn!(
                    product_code = %request.product_code,
                    warehouse = %request.warehouse.label(),
                    %reason,
                    "Ledger store unavailable, serving empty timeline"
                );
                Ok(Served::degraded(
                    TimelineView::empty(&request.product_code, request.warehouse.label()),
                    LEDGER_UNAVAILABLE_MESSAGE,
                ))
            }
            other => other,
        }
    }

    /// Current stock rows for one product, straight from the snapshot store
    pub async fn get_current_stock(
        &self,
        product_code: &str,
        warehouse: &WarehouseFilter,
    ) -> AppResult<Vec<CurrentStock>> {
        let rows = with_timeout(
            self.query_timeout,
            self.snapshots.current_stock(product_code, warehouse),
        )
        .await?;
        Ok(rows)
    }

    async fn assemble(&self, request: &TimelineRequest) -> AppResult<Served<TimelineView>> {
        let query = LedgerQuery {
            product_code: request.product_code.clone(),
            warehouse: request.warehouse.clone(),
            days: request.days,
            limit: request.limit,
        };

        let (entries, snapshot) = tokio::join!(
            with_timeout(self.query_timeout, self.ledger.recent_entries(&query)),
            with_timeout(
                self.query_timeout,
                self.snapshots
                    .current_stock(&request.product_code, &request.warehouse),
            ),
        );
        let entries = entries?;

        let mut notes = Vec::new();
        let snapshot = match snapshot {
            Ok(rows) => Some(rows),
            Err(err) if err.is_transient() => {
                tracing::warn!(product_code = %request.product_code, error = %err, "Stock snapshot unavailable");
                notes.push(SNAPSHOT_UNAVAILABLE_MESSAGE);
                None
            }
            Err(err) => return Err(err.into()),
        };

        let prior_balance = self.prior_balance(request, &entries).await?;

        let dispatches = match self.load_dispatches(&entries).await {
            Ok(records) => records,
            Err(err) if err.is_transient() => {
                tracing::warn!(product_code = %request.product_code, error = %err, "Dispatch store unavailable");
                notes.push(DISPATCH_UNAVAILABLE_MESSAGE);
                HashMap::new()
            }
            Err(err) => return Err(err.into()),
        };

        let view = build_timeline_view(
            &request.product_code,
            &request.warehouse,
            entries,
            prior_balance,
            &dispatches,
            snapshot,
        );

        if view.summary.has_drift() {
            tracing::info!(
                product_code = %view.product_code,
                warehouse = %view.warehouse_filter,
                closing_balance = view.summary.closing_balance,
                current_stock = view.summary.current_stock,
                drift = view.summary.drift,
                "Ledger replay disagrees with stock snapshot"
            );
        }

        let message = (!notes.is_empty()).then(|| notes.join("; "));
        Ok(Served {
            data: view,
            message,
            degraded: false,
        })
    }

    async fn prior_balance(&self, request: &TimelineRequest, entries: &[LedgerEntry]) -> AppResult<i64> {
        match request.baseline {
            Baseline::Zero => Ok(0),
            Baseline::Explicit(balance) => Ok(balance),
            Baseline::CarryForward => {
                let cutoff = carry_forward_cutoff(entries, &request.days);
                let balance = with_timeout(
                    self.query_timeout,
                    self.ledger
                        .balance_before(&request.product_code, &request.warehouse, cutoff),
                )
                .await?;
                Ok(balance)
            }
        }
    }

    async fn load_dispatches(
        &self,
        entries: &[LedgerEntry],
    ) -> Result<HashMap<i64, DispatchRecord>, StoreError> {
        let mut ids: Vec<i64> = entries.iter().filter_map(LedgerEntry::linked_dispatch_id).collect();
        ids.sort_unstable();
        ids.dedup();

        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        with_timeout(self.query_timeout, self.dispatches.find_by_ids(&ids)).await
    }
}

/// History to fold into the starting balance: everything before the oldest
/// entry in view, or up to the end of the date range when the window is empty
pub fn carry_forward_cutoff(entries: &[LedgerEntry], days: &DayRange) -> BalanceCutoff {
    match entries.iter().map(LedgerEntry::replay_key).min() {
        Some((event_time, id)) => BalanceCutoff::Before { event_time, id },
        None => days
            .end_bound()
            .map_or(BalanceCutoff::Unbounded, BalanceCutoff::UpTo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::{MemoryDispatchStore, MemoryLedgerStore, MemorySnapshotStore};
    use chrono::{NaiveDate, NaiveDateTime};
    use shared::{
        dispatch_reference, BatchStatus, Direction, MovementType, PackageDimensions,
        StockBatchSnapshot,
    };

    const PRODUCT: &str = "8850001";

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn entry(
        id: i64,
        event_time: NaiveDateTime,
        movement_type: MovementType,
        direction: Direction,
        quantity: i64,
        warehouse: &str,
    ) -> LedgerEntry {
        LedgerEntry {
            id,
            event_time,
            movement_type,
            product_code: PRODUCT.to_string(),
            product_name: Some("Widget".to_string()),
            location_code: warehouse.to_string(),
            quantity,
            direction,
            reference: None,
            source: Some("test".to_string()),
            dispatch_id: None,
        }
    }

    fn batch(id: i64, warehouse: &str, quantity: i64) -> StockBatchSnapshot {
        StockBatchSnapshot {
            batch_id: id,
            product_code: PRODUCT.to_string(),
            product_name: Some("Widget".to_string()),
            location_code: warehouse.to_string(),
            quantity_available: quantity,
            status: BatchStatus::Active,
        }
    }

    fn ledger() -> Vec<LedgerEntry> {
        let mut dispatch = entry(2, at(2, 10), MovementType::Dispatch, Direction::Out, 3, "WH001");
        dispatch.reference = Some(dispatch_reference(42, Some("xyz")));
        vec![
            entry(1, at(1, 9), MovementType::BulkUpload, Direction::In, 10, "WH001"),
            dispatch,
            entry(3, at(3, 11), MovementType::Return, Direction::In, 1, "WH001"),
            entry(4, at(1, 12), MovementType::BulkUpload, Direction::In, 20, "WH002"),
        ]
    }

    fn snapshot() -> MemorySnapshotStore {
        MemorySnapshotStore::new(vec![
            batch(1, "WH001", 5),
            batch(2, "WH001", 3),
            batch(3, "WH002", 20),
        ])
    }

    fn service(
        ledger: MemoryLedgerStore,
        snapshots: MemorySnapshotStore,
        dispatches: MemoryDispatchStore,
    ) -> LedgerTimelineService {
        LedgerTimelineService::new(
            Arc::new(ledger),
            Arc::new(snapshots),
            Arc::new(dispatches),
            Duration::from_millis(200),
        )
    }

    fn request(warehouse: &str) -> TimelineRequest {
        TimelineRequest {
            product_code: PRODUCT.to_string(),
            warehouse: WarehouseFilter::from_param(Some(warehouse)),
            days: DayRange::default(),
            limit: 50,
            baseline: Baseline::Zero,
        }
    }

    #[tokio::test]
    async fn test_timeline_is_replayed_and_reconciled() {
        let svc = service(MemoryLedgerStore::new(ledger()), snapshot(), MemoryDispatchStore::default());

        let served = svc.get_timeline(&request("WH001")).await.unwrap();
        let view = served.data;

        assert!(!served.degraded);
        assert_eq!(served.message, None);
        let balances: Vec<i64> = view.timeline.iter().map(|e| e.balance_after).collect();
        assert_eq!(balances, vec![8, 7, 10]);
        assert_eq!(view.summary.total_in, 11);
        assert_eq!(view.summary.total_out, 3);
        assert_eq!(view.summary.net_movement, 8);
        assert_eq!(view.summary.opening_stock, 10);
        assert_eq!(view.summary.current_stock, 8);
        assert_eq!(view.summary.drift, 0);
        assert_eq!(view.warehouse_filter, "WH001");
    }

    #[tokio::test]
    async fn test_dispatch_without_record_is_not_dropped() {
        let svc = service(MemoryLedgerStore::new(ledger()), snapshot(), MemoryDispatchStore::default());

        let view = svc.get_timeline(&request("WH001")).await.unwrap().data;
        let dispatch = view.timeline.iter().find(|e| e.id == 2).unwrap();

        assert_eq!(dispatch.reference.as_deref(), Some("DISPATCH_42_xyz"));
        assert_eq!(dispatch.dispatch_details, None);
    }

    #[tokio::test]
    async fn test_dispatch_with_record_is_enriched() {
        let record = DispatchRecord {
            dispatch_id: 42,
            customer: Some("Acme".to_string()),
            awb: Some("AWB-1".to_string()),
            order_ref: Some("SO-9".to_string()),
            logistics: None,
            payment_mode: Some("prepaid".to_string()),
            invoice_amount: None,
            dimensions: PackageDimensions::default(),
            status: "shipped".to_string(),
            dispatched_at: None,
        };
        let unrelated = DispatchRecord {
            dispatch_id: 4,
            ..record.clone()
        };
        let svc = service(
            MemoryLedgerStore::new(ledger()),
            snapshot(),
            MemoryDispatchStore::new(vec![record.clone(), unrelated]),
        );

        let view = svc.get_timeline(&request("WH001")).await.unwrap().data;
        let dispatch = view.timeline.iter().find(|e| e.id == 2).unwrap();

        assert_eq!(dispatch.dispatch_details, Some(record));
    }

    #[tokio::test]
    async fn test_all_warehouses_includes_other_locations() {
        let svc = service(MemoryLedgerStore::new(ledger()), snapshot(), MemoryDispatchStore::default());

        let scoped = svc.get_timeline(&request("WH001")).await.unwrap().data;
        let global = svc.get_timeline(&request("ALL")).await.unwrap().data;

        assert_eq!(global.warehouse_filter, "ALL");
        assert_eq!(global.timeline.len(), 4);
        assert_eq!(global.summary.current_stock - scoped.summary.current_stock, 20);
        assert_eq!(global.current_stock.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_ledger_degrades_to_empty_timeline() {
        let svc = service(
            MemoryLedgerStore::failing(StoreError::Unavailable("connection refused".into())),
            snapshot(),
            MemoryDispatchStore::default(),
        );

        let served = svc.get_timeline(&request("WH001")).await.unwrap();

        assert!(served.degraded);
        assert_eq!(served.message.as_deref(), Some(LEDGER_UNAVAILABLE_MESSAGE));
        assert!(served.data.timeline.is_empty());
        assert!(served.data.current_stock.is_empty());
        assert_eq!(served.data.summary, shared::TimelineSummary::default());
    }

    #[tokio::test]
    async fn test_slow_ledger_degrades_after_timeout() {
        let svc = service(
            MemoryLedgerStore::slow(ledger(), Duration::from_secs(5)),
            snapshot(),
            MemoryDispatchStore::default(),
        );

        let served = svc.get_timeline(&request("WH001")).await.unwrap();

        assert!(served.degraded);
        assert!(served.data.timeline.is_empty());
    }

    #[tokio::test]
    async fn test_query_errors_are_not_masked() {
        let svc = service(
            MemoryLedgerStore::failing(StoreError::Query("relation does not exist".into())),
            snapshot(),
            MemoryDispatchStore::default(),
        );

        let result = svc.get_timeline(&request("WH001")).await;

        assert!(matches!(result, Err(AppError::Query(_))));
    }

    #[tokio::test]
    async fn test_unreachable_snapshot_keeps_timeline() {
        let svc = service(
            MemoryLedgerStore::new(ledger()),
            MemorySnapshotStore::failing(StoreError::Unavailable("timeout".into())),
            MemoryDispatchStore::default(),
        );

        let served = svc.get_timeline(&request("WH001")).await.unwrap();

        assert!(!served.degraded);
        assert_eq!(served.data.timeline.len(), 3);
        assert!(!served.data.summary.snapshot_available);
        assert_eq!(served.data.summary.drift, 0);
        assert_eq!(served.message.as_deref(), Some(SNAPSHOT_UNAVAILABLE_MESSAGE));
    }

    #[tokio::test]
    async fn test_unreachable_dispatch_store_skips_enrichment() {
        let svc = service(
            MemoryLedgerStore::new(ledger()),
            snapshot(),
            MemoryDispatchStore::failing(StoreError::Unavailable("timeout".into())),
        );

        let served = svc.get_timeline(&request("WH001")).await.unwrap();

        assert_eq!(served.data.timeline.len(), 3);
        assert!(served.data.timeline.iter().all(|e| e.dispatch_details.is_none()));
        assert_eq!(served.message.as_deref(), Some(DISPATCH_UNAVAILABLE_MESSAGE));
    }

    #[tokio::test]
    async fn test_truncated_window_reports_drift() {
        let svc = service(MemoryLedgerStore::new(ledger()), snapshot(), MemoryDispatchStore::default());
        let mut req = request("WH001");
        req.limit = 2;

        let view = svc.get_timeline(&req).await.unwrap().data;

        // The bulk upload fell out of the window, so replay starts at zero
        assert_eq!(view.timeline.len(), 2);
        assert_eq!(view.summary.closing_balance, -2);
        assert_eq!(view.summary.drift, 10);
    }

    #[tokio::test]
    async fn test_carry_forward_restores_truncated_balance() {
        let svc = service(MemoryLedgerStore::new(ledger()), snapshot(), MemoryDispatchStore::default());
        let mut req = request("WH001");
        req.limit = 2;
        req.baseline = Baseline::CarryForward;

        let view = svc.get_timeline(&req).await.unwrap().data;

        assert_eq!(view.summary.prior_balance, 10);
        assert_eq!(view.timeline[0].balance_after, 8);
        assert_eq!(view.timeline[1].balance_after, 7);
        assert_eq!(view.summary.drift, 0);
    }

    #[tokio::test]
    async fn test_explicit_prior_balance_seeds_replay() {
        let svc = service(MemoryLedgerStore::new(ledger()), snapshot(), MemoryDispatchStore::default());
        let mut req = request("WH001");
        req.baseline = Baseline::Explicit(5);

        let view = svc.get_timeline(&req).await.unwrap().data;

        assert_eq!(view.timeline.last().unwrap().balance_after, 15);
        assert_eq!(view.summary.closing_balance, 13);
    }

    #[tokio::test]
    async fn test_date_range_is_inclusive_by_day() {
        let svc = service(MemoryLedgerStore::new(ledger()), snapshot(), MemoryDispatchStore::default());
        let mut req = request("WH001");
        req.days = DayRange {
            from: NaiveDate::from_ymd_opt(2024, 7, 2),
            to: NaiveDate::from_ymd_opt(2024, 7, 3),
        };

        let view = svc.get_timeline(&req).await.unwrap().data;
        let ids: Vec<i64> = view.timeline.iter().map(|e| e.id).collect();

        assert_eq!(ids, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let svc = service(MemoryLedgerStore::new(ledger()), snapshot(), MemoryDispatchStore::default());

        let first = svc.get_timeline(&request("ALL")).await.unwrap().data;
        let second = svc.get_timeline(&request("ALL")).await.unwrap().data;

        assert_eq!(
            serde_json::to_string(&first.timeline).unwrap(),
            serde_json::to_string(&second.timeline).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&first.summary).unwrap(),
            serde_json::to_string(&second.summary).unwrap()
        );
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(50))]

        /// Carry-forward makes the newest balance independent of the limit
        #[test]
        fn prop_carry_forward_matches_full_history(
            moves in proptest::collection::vec((proptest::bool::ANY, 0i64..100, 1u32..28), 1..30),
            limit in 1i64..40
        ) {
            let entries: Vec<LedgerEntry> = moves
                .iter()
                .enumerate()
                .map(|(i, (inbound, qty, day))| {
                    let (movement_type, direction) = if *inbound {
                        (MovementType::BulkUpload, Direction::In)
                    } else {
                        (MovementType::Dispatch, Direction::Out)
                    };
                    entry(i as i64 + 1, at(*day, 8), movement_type, direction, *qty, "WH001")
                })
                .collect();
            let full: i64 = entries.iter().map(LedgerEntry::signed_quantity).sum();
            let svc = service(MemoryLedgerStore::new(entries), snapshot(), MemoryDispatchStore::default());
            let mut req = request("WH001");
            req.limit = limit;
            req.baseline = Baseline::CarryForward;

            let view = tokio_test::block_on(svc.get_timeline(&req)).unwrap().data;

            proptest::prop_assert_eq!(view.timeline[0].balance_after, full);
            proptest::prop_assert_eq!(view.summary.closing_balance, full);
        }
    }

    #[test]
    fn test_carry_forward_cutoff_for_empty_window() {
        let days = DayRange {
            from: None,
            to: NaiveDate::from_ymd_opt(2024, 7, 1),
        };
        assert_eq!(
            carry_forward_cutoff(&[], &days),
            BalanceCutoff::UpTo(
                NaiveDate::from_ymd_opt(2024, 7, 1)
                    .unwrap()
                    .and_hms_micro_opt(23, 59, 59, 999_999)
                    .unwrap()
            )
        );
        assert_eq!(carry_forward_cutoff(&[], &DayRange::default()), BalanceCutoff::Unbounded);
    }
}
