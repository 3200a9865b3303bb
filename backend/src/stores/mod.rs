//! Read-only access to the ledger, stock snapshot and dispatch stores
//!
//! The engine never writes to any of these tables. Services depend on the
//! traits below rather than on a pool so that store failures can be simulated.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::NaiveDateTime;
use shared::{
    CurrentStock, DayRange, DispatchRecord, GroupBy, LedgerEntry, LedgerError, MovementGroup,
    WarehouseFilter,
};
use thiserror::Error;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::{PgDispatchStore, PgLedgerStore, PgSnapshotStore};

/// Store failure, split by whether a later request could succeed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Timeout or connection-class failure
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Malformed query, constraint violation or schema mismatch
    #[error("query failed: {0}")]
    Query(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let transient = match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => true,
            // SQLSTATE class 08 is connection exception, 57P covers server shutdown
            sqlx::Error::Database(db) => db
                .code()
                .is_some_and(|code| code.starts_with("08") || code.starts_with("57P")),
            _ => false,
        };

        if transient {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Query(err.to_string())
        }
    }
}

impl From<LedgerError> for StoreError {
    fn from(err: LedgerError) -> Self {
        StoreError::Query(format!("unreadable ledger row: {}", err))
    }
}

/// Run a store call under the configured deadline; overrunning counts as unavailable
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call).await.map_err(|_| {
        StoreError::Unavailable(format!("query exceeded {}ms", limit.as_millis()))
    })?
}

/// Filter for one product's ledger window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerQuery {
    pub product_code: String,
    pub warehouse: WarehouseFilter,
    pub days: DayRange,
    pub limit: i64,
}

/// Where a carry-forward balance stops summing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceCutoff {
    /// Entries sorting strictly before this replay key
    Before { event_time: NaiveDateTime, id: i64 },
    /// Entries at or before this instant
    UpTo(NaiveDateTime),
    /// All history
    Unbounded,
}

impl BalanceCutoff {
    pub fn includes(&self, entry: &LedgerEntry) -> bool {
        match *self {
            BalanceCutoff::Before { event_time, id } => entry.replay_key() < (event_time, id),
            BalanceCutoff::UpTo(at) => entry.event_time <= at,
            BalanceCutoff::Unbounded => true,
        }
    }
}

/// Filter for the grouped movement summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryQuery {
    pub warehouse: WarehouseFilter,
    pub days: DayRange,
    pub group_by: GroupBy,
    pub limit: i64,
}

#[axum::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Matching entries, most recent first, at most `query.limit` of them
    async fn recent_entries(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Signed total of a product's entries covered by `cutoff`, ignoring date filters
    async fn balance_before(
        &self,
        product_code: &str,
        warehouse: &WarehouseFilter,
        cutoff: BalanceCutoff,
    ) -> Result<i64, StoreError>;

    /// Per-product or per-warehouse totals, most recently active first
    async fn movement_groups(&self, query: &SummaryQuery) -> Result<Vec<MovementGroup>, StoreError>;
}

#[axum::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Active stock per warehouse for the product
    async fn current_stock(
        &self,
        product_code: &str,
        warehouse: &WarehouseFilter,
    ) -> Result<Vec<CurrentStock>, StoreError>;
}

#[axum::async_trait]
pub trait DispatchStore: Send + Sync {
    /// Records for the given dispatch ids; unknown ids are simply absent
    async fn find_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, DispatchRecord>, StoreError>;
}
