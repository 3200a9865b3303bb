//! Grouped movement summary for the ledger dashboard

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use shared::{DayRange, GroupBy, MovementSummaryView, WarehouseFilter};

use super::Served;
use crate::error::{AppError, AppResult};
use crate::stores::{with_timeout, LedgerStore, PgLedgerStore, SummaryQuery};

pub const SUMMARY_UNAVAILABLE_MESSAGE: &str =
    "Ledger data is temporarily unavailable; showing an empty summary";

/// Per-product or per-warehouse movement totals
#[derive(Clone)]
pub struct MovementSummaryService {
    ledger: Arc<dyn LedgerStore>,
    query_timeout: Duration,
    group_limit: i64,
}

impl MovementSummaryService {
    pub fn new(ledger: Arc<dyn LedgerStore>, query_timeout: Duration, group_limit: i64) -> Self {
        Self {
            ledger,
            query_timeout,
            group_limit,
        }
    }

    pub fn from_pool(db: PgPool, query_timeout: Duration, group_limit: i64) -> Self {
        Self::new(Arc::new(PgLedgerStore::new(db)), query_timeout, group_limit)
    }

    /// Totals grouped by `group_by`, most recently active group first
    pub async fn get_summary(
        &self,
        warehouse: WarehouseFilter,
        days: DayRange,
        group_by: GroupBy,
    ) -> AppResult<Served<MovementSummaryView>> {
        let label = warehouse.label().to_string();
        let query = SummaryQuery {
            warehouse,
            days,
            group_by,
            limit: self.group_limit,
        };

        match with_timeout(self.query_timeout, self.ledger.movement_groups(&query)).await {
            Ok(groups) => Ok(Served::complete(MovementSummaryView {
                group_by,
                warehouse_filter: label,
                groups,
            })),
            Err(err) if err.is_transient() => {
                tracing::warn!(warehouse = %label, group_by = group_by.as_str(), error = %err, "Ledger store unavailable, serving empty summary");
                Ok(Served::degraded(
                    MovementSummaryView::empty(group_by, label),
                    SUMMARY_UNAVAILABLE_MESSAGE,
                ))
            }
            Err(err) => Err(AppError::from(err)),
        }
    }
}
