//! In-memory stores for service tests, with injectable failures and latency

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use shared::{
    aggregate_active_batches, CurrentStock, Direction, DispatchRecord, GroupBy, LedgerEntry,
    MovementGroup, StockBatchSnapshot, WarehouseFilter,
};

use super::{
    BalanceCutoff, DispatchStore, LedgerQuery, LedgerStore, SnapshotStore, StoreError,
    SummaryQuery,
};

/// Failure and latency applied before every call
#[derive(Debug, Clone, Default)]
struct Gate {
    failure: Option<StoreError>,
    delay: Option<Duration>,
}

impl Gate {
    async fn pass(&self) -> Result<(), StoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    entries: Vec<LedgerEntry>,
    gate: Gate,
}

impl MemoryLedgerStore {
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries,
            gate: Gate::default(),
        }
    }

    pub fn failing(err: StoreError) -> Self {
        Self {
            entries: Vec::new(),
            gate: Gate {
                failure: Some(err),
                delay: None,
            },
        }
    }

    pub fn slow(entries: Vec<LedgerEntry>, delay: Duration) -> Self {
        Self {
            entries,
            gate: Gate {
                failure: None,
                delay: Some(delay),
            },
        }
    }

    fn for_product<'a>(
        &'a self,
        product_code: &'a str,
        warehouse: &'a WarehouseFilter,
    ) -> impl Iterator<Item = &'a LedgerEntry> {
        self.entries
            .iter()
            .filter(move |e| e.product_code == product_code && warehouse.matches(&e.location_code))
    }
}

#[axum::async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn recent_entries(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>, StoreError> {
        self.gate.pass().await?;

        let mut matching: Vec<LedgerEntry> = self
            .for_product(&query.product_code, &query.warehouse)
            .filter(|e| query.days.contains(e.event_time))
            .cloned()
            .collect();
        matching.sort_by_key(|e| std::cmp::Reverse(e.replay_key()));
        matching.truncate(query.limit.max(0) as usize);
        Ok(matching)
    }

    async fn balance_before(
        &self,
        product_code: &str,
        warehouse: &WarehouseFilter,
        cutoff: BalanceCutoff,
    ) -> Result<i64, StoreError> {
        self.gate.pass().await?;

        Ok(self
            .for_product(product_code, warehouse)
            .filter(|e| cutoff.includes(e))
            .map(LedgerEntry::signed_quantity)
            .sum())
    }

    async fn movement_groups(&self, query: &SummaryQuery) -> Result<Vec<MovementGroup>, StoreError> {
        self.gate.pass().await?;

        let mut groups: BTreeMap<String, MovementGroup> = BTreeMap::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| query.warehouse.matches(&e.location_code) && query.days.contains(e.event_time))
        {
            let key = match query.group_by {
                GroupBy::Product => entry.product_code.clone(),
                GroupBy::Warehouse => entry.location_code.clone(),
            };
            let group = groups.entry(key.clone()).or_insert_with(|| MovementGroup {
                group_key: key,
                product_name: None,
                total_movements: 0,
                total_in: 0,
                total_out: 0,
                net_movement: 0,
                last_movement: entry.event_time,
            });
            if query.group_by == GroupBy::Product && group.product_name.is_none() {
                group.product_name = entry.product_name.clone();
            }
            group.total_movements += 1;
            match entry.direction {
                Direction::In => group.total_in += entry.quantity,
                Direction::Out => group.total_out += entry.quantity,
            }
            group.net_movement = group.total_in - group.total_out;
            group.last_movement = group.last_movement.max(entry.event_time);
        }

        let mut groups: Vec<MovementGroup> = groups.into_values().collect();
        groups.sort_by(|a, b| {
            b.last_movement
                .cmp(&a.last_movement)
                .then_with(|| a.group_key.cmp(&b.group_key))
        });
        groups.truncate(query.limit.max(0) as usize);
        Ok(groups)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    batches: Vec<StockBatchSnapshot>,
    gate: Gate,
}

impl MemorySnapshotStore {
    pub fn new(batches: Vec<StockBatchSnapshot>) -> Self {
        Self {
            batches,
            gate: Gate::default(),
        }
    }

    pub fn failing(err: StoreError) -> Self {
        Self {
            batches: Vec::new(),
            gate: Gate {
                failure: Some(err),
                delay: None,
            },
        }
    }
}

#[axum::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn current_stock(
        &self,
        product_code: &str,
        warehouse: &WarehouseFilter,
    ) -> Result<Vec<CurrentStock>, StoreError> {
        self.gate.pass().await?;

        Ok(aggregate_active_batches(self.batches.iter().filter(|b| {
            b.product_code == product_code && warehouse.matches(&b.location_code)
        })))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDispatchStore {
    records: HashMap<i64, DispatchRecord>,
    gate: Gate,
}

impl MemoryDispatchStore {
    pub fn new(records: Vec<DispatchRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.dispatch_id, r)).collect(),
            gate: Gate::default(),
        }
    }

    pub fn failing(err: StoreError) -> Self {
        Self {
            records: HashMap::new(),
            gate: Gate {
                failure: Some(err),
                delay: None,
            },
        }
    }
}

#[axum::async_trait]
impl DispatchStore for MemoryDispatchStore {
    async fn find_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, DispatchRecord>, StoreError> {
        self.gate.pass().await?;

        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| (*id, r.clone())))
            .collect())
    }
}
