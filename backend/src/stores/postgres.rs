//! PostgreSQL implementations of the read-only stores

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use shared::{
    CurrentStock, DispatchRecord, GroupBy, LedgerEntry, MovementGroup, PackageDimensions,
    WarehouseFilter,
};

use super::{
    BalanceCutoff, DispatchStore, LedgerQuery, LedgerStore, SnapshotStore, StoreError,
    SummaryQuery,
};

/// Ledger rows from `inventory_ledger`
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

/// Active batches from `stock_batches`
#[derive(Clone)]
pub struct PgSnapshotStore {
    db: PgPool,
}

/// Order records from `dispatches`
#[derive(Clone)]
pub struct PgDispatchStore {
    db: PgPool,
}

/// Raw ledger row; enum columns are text and parsed after fetching
#[derive(Debug, FromRow)]
struct LedgerRow {
    id: i64,
    event_time: NaiveDateTime,
    movement_type: String,
    barcode: String,
    product_name: Option<String>,
    location_code: String,
    qty: i64,
    direction: String,
    reference: Option<String>,
    source: Option<String>,
    dispatch_id: Option<i64>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let entry = LedgerEntry {
            id: row.id,
            event_time: row.event_time,
            movement_type: row.movement_type.parse()?,
            product_code: row.barcode,
            product_name: row.product_name,
            location_code: row.location_code,
            quantity: row.qty,
            direction: row.direction.parse()?,
            reference: row.reference,
            source: row.source,
            dispatch_id: row.dispatch_id,
        };
        entry.validate()?;
        Ok(entry)
    }
}

#[derive(Debug, FromRow)]
struct MovementGroupRow {
    group_key: String,
    product_name: Option<String>,
    total_movements: i64,
    total_in: i64,
    total_out: i64,
    last_movement: NaiveDateTime,
}

#[derive(Debug, FromRow)]
struct CurrentStockRow {
    barcode: String,
    product_name: Option<String>,
    warehouse: String,
    current_stock: i64,
    batch_count: i64,
}

#[derive(Debug, FromRow)]
struct DispatchRow {
    id: i64,
    customer: Option<String>,
    awb: Option<String>,
    order_ref: Option<String>,
    logistics: Option<String>,
    payment_mode: Option<String>,
    invoice_amount: Option<Decimal>,
    length_cm: Option<Decimal>,
    width_cm: Option<Decimal>,
    height_cm: Option<Decimal>,
    actual_weight_kg: Option<Decimal>,
    status: String,
    created_at: Option<NaiveDateTime>,
}

impl From<DispatchRow> for DispatchRecord {
    fn from(row: DispatchRow) -> Self {
        DispatchRecord {
            dispatch_id: row.id,
            customer: row.customer,
            awb: row.awb,
            order_ref: row.order_ref,
            logistics: row.logistics,
            payment_mode: row.payment_mode,
            invoice_amount: row.invoice_amount,
            dimensions: PackageDimensions {
                length_cm: row.length_cm,
                width_cm: row.width_cm,
                height_cm: row.height_cm,
                weight_kg: row.actual_weight_kg,
            },
            status: row.status,
            dispatched_at: row.created_at,
        }
    }
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

impl PgSnapshotStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

impl PgDispatchStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[axum::async_trait]
impl LedgerStore for PgLedgerStore {
    async fn recent_entries(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT id, event_time, movement_type, barcode, product_name, location_code,
                   qty, direction, reference, source, dispatch_id
            FROM inventory_ledger
            WHERE barcode = $1
              AND ($2::text IS NULL OR location_code = $2)
              AND ($3::timestamp IS NULL OR event_time >= $3)
              AND ($4::timestamp IS NULL OR event_time <= $4)
            ORDER BY event_time DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(&query.product_code)
        .bind(query.warehouse.location())
        .bind(query.days.start_bound())
        .bind(query.days.end_bound())
        .bind(query.limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn balance_before(
        &self,
        product_code: &str,
        warehouse: &WarehouseFilter,
        cutoff: BalanceCutoff,
    ) -> Result<i64, StoreError> {
        let (before_time, before_id, up_to) = match cutoff {
            BalanceCutoff::Before { event_time, id } => (Some(event_time), Some(id), None),
            BalanceCutoff::UpTo(at) => (None, None, Some(at)),
            BalanceCutoff::Unbounded => (None, None, None),
        };

        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN direction = 'IN' THEN qty ELSE -qty END), 0)::BIGINT
            FROM inventory_ledger
            WHERE barcode = $1
              AND ($2::text IS NULL OR location_code = $2)
              AND ($3::timestamp IS NULL OR (event_time, id) < ($3::timestamp, $4::bigint))
              AND ($5::timestamp IS NULL OR event_time <= $5)
            "#,
        )
        .bind(product_code)
        .bind(warehouse.location())
        .bind(before_time)
        .bind(before_id)
        .bind(up_to)
        .fetch_one(&self.db)
        .await?;

        Ok(balance)
    }

    async fn movement_groups(&self, query: &SummaryQuery) -> Result<Vec<MovementGroup>, StoreError> {
        // Column names come from the enum, never from the request
        let (key_column, name_column) = match query.group_by {
            GroupBy::Product => ("barcode", "MAX(product_name)"),
            GroupBy::Warehouse => ("location_code", "NULL::text"),
        };

        let sql = format!(
            r#"
            SELECT {key} AS group_key,
                   {name} AS product_name,
                   COUNT(*) AS total_movements,
                   COALESCE(SUM(CASE WHEN direction = 'IN' THEN qty ELSE 0 END), 0)::BIGINT AS total_in,
                   COALESCE(SUM(CASE WHEN direction = 'OUT' THEN qty ELSE 0 END), 0)::BIGINT AS total_out,
                   MAX(event_time) AS last_movement
            FROM inventory_ledger
            WHERE ($1::text IS NULL OR location_code = $1)
              AND ($2::timestamp IS NULL OR event_time >= $2)
              AND ($3::timestamp IS NULL OR event_time <= $3)
            GROUP BY {key}
            ORDER BY last_movement DESC, group_key ASC
            LIMIT $4
            "#,
            key = key_column,
            name = name_column,
        );

        let rows = sqlx::query_as::<_, MovementGroupRow>(&sql)
            .bind(query.warehouse.location())
            .bind(query.days.start_bound())
            .bind(query.days.end_bound())
            .bind(query.limit)
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| MovementGroup {
                group_key: r.group_key,
                product_name: r.product_name,
                total_movements: r.total_movements,
                total_in: r.total_in,
                total_out: r.total_out,
                net_movement: r.total_in - r.total_out,
                last_movement: r.last_movement,
            })
            .collect())
    }
}

#[axum::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn current_stock(
        &self,
        product_code: &str,
        warehouse: &WarehouseFilter,
    ) -> Result<Vec<CurrentStock>, StoreError> {
        let rows = sqlx::query_as::<_, CurrentStockRow>(
            r#"
            SELECT barcode,
                   MAX(product_name) AS product_name,
                   location_code AS warehouse,
                   COALESCE(SUM(qty_available), 0)::BIGINT AS current_stock,
                   COUNT(*) AS batch_count
            FROM stock_batches
            WHERE barcode = $1
              AND ($2::text IS NULL OR location_code = $2)
              AND status = 'active'
            GROUP BY barcode, location_code
            ORDER BY location_code
            "#,
        )
        .bind(product_code)
        .bind(warehouse.location())
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CurrentStock {
                barcode: r.barcode,
                product_name: r.product_name,
                warehouse: r.warehouse,
                current_stock: r.current_stock,
                batch_count: r.batch_count,
            })
            .collect())
    }
}

#[axum::async_trait]
impl DispatchStore for PgDispatchStore {
    async fn find_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, DispatchRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, DispatchRow>(
            r#"
            SELECT id, customer, awb, order_ref, logistics, payment_mode, invoice_amount,
                   length_cm, width_cm, height_cm, actual_weight_kg, status, created_at
            FROM dispatches
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.id, DispatchRecord::from(r)))
            .collect())
    }
}
