//! Caller-facing facade. Owns the store handle, the configuration, the
//! sale log, the ledger and the fired-alert state; every mutation is
//! persisted before it returns. The computation itself stays in the
//! pure modules, so every operation has an `_at` variant taking an
//! explicit clock for deterministic callers and tests.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::alerts::evaluate;
use crate::cycle::current_period;
use crate::errors::EngineResult;
use crate::ledger::Ledger;
use crate::models::{
    AggregationResult, Alert, AlertState, Client, Comparison, EngineConfig, GoalStatus,
    HistoricalEntry, MetricsSnapshot, NewSale, Period, PeriodProgress, SaleRecord, Stage,
    WeeklyCheckpoint, UNKNOWN_ORIGIN,
};
use crate::store::{keys, Store};

pub struct CycleEngine {
    store: Store,
    config: EngineConfig,
    sales: Vec<SaleRecord>,
    ledger: Ledger,
    alert_state: AlertState,
}

impl CycleEngine {
    pub fn open(path: &Path) -> EngineResult<Self> {
        Self::with_store(Store::open(path)?)
    }

    pub fn in_memory() -> EngineResult<Self> {
        Self::with_store(Store::in_memory()?)
    }

    fn with_store(store: Store) -> EngineResult<Self> {
        let config: EngineConfig = store.get(keys::CONFIG)?.unwrap_or_default();
        config.validate()?;
        let sales: Vec<SaleRecord> = store.get(keys::SALES)?.unwrap_or_default();
        let entries: Vec<HistoricalEntry> = store.get(keys::HISTORY)?.unwrap_or_default();
        let alert_state: AlertState = store.get(keys::ALERT_STATE)?.unwrap_or_default();

        tracing::info!(
            sales = sales.len(),
            archived_periods = entries.len(),
            monthly_goal = config.monthly_goal,
            "engine state loaded"
        );

        Ok(Self {
            store,
            config,
            sales,
            ledger: Ledger::from_entries(entries),
            alert_state,
        })
    }

    // ── Configuration ──

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) -> EngineResult<()> {
        config.validate()?;
        self.store.set(keys::CONFIG, &config)?;
        self.config = config;
        Ok(())
    }

    pub fn set_goal(&mut self, monthly_goal: u32) -> EngineResult<()> {
        let previous = self.config.monthly_goal;
        let updated = EngineConfig {
            monthly_goal,
            ..self.config
        };
        self.set_config(updated)?;
        tracing::info!(previous, monthly_goal, "monthly goal changed");
        Ok(())
    }

    // ── Cycle ──

    pub fn current_period(&self) -> Period {
        self.current_period_at(Utc::now())
    }

    pub fn current_period_at(&self, now: DateTime<Utc>) -> Period {
        current_period(now)
    }

    pub fn progress(&self) -> PeriodProgress {
        self.progress_at(Utc::now())
    }

    pub fn progress_at(&self, now: DateTime<Utc>) -> PeriodProgress {
        let period = current_period(now);
        PeriodProgress::at(&period, now, self.config.lead_time_days)
    }

    // ── Collections ──

    /// The client/stage collections are owned by the capture side of the
    /// host application; the engine only round-trips them through its
    /// store so aggregation inputs survive restarts.
    pub fn load_clients(&self) -> EngineResult<BTreeMap<String, Client>> {
        Ok(self.store.get(keys::CLIENTS)?.unwrap_or_default())
    }

    pub fn save_clients(&self, clients: &BTreeMap<String, Client>) -> EngineResult<()> {
        self.store.set(keys::CLIENTS, clients)
    }

    pub fn load_stages(&self) -> EngineResult<Vec<Stage>> {
        Ok(self.store.get(keys::STAGES)?.unwrap_or_default())
    }

    pub fn save_stages(&self, stages: &[Stage]) -> EngineResult<()> {
        self.store.set(keys::STAGES, &stages)
    }

    // ── Metrics ──

    pub fn snapshot(
        &self,
        clients: &BTreeMap<String, Client>,
        stages: &[Stage],
    ) -> EngineResult<AggregationResult> {
        self.snapshot_at(clients, stages, Utc::now())
    }

    pub fn snapshot_at(
        &self,
        clients: &BTreeMap<String, Client>,
        stages: &[Stage],
        now: DateTime<Utc>,
    ) -> EngineResult<AggregationResult> {
        let period = current_period(now);
        aggregate(clients, stages, &period, &self.config)
    }

    /// Aggregates whatever collections are currently persisted.
    pub fn snapshot_from_store(&self) -> EngineResult<AggregationResult> {
        let clients = self.load_clients()?;
        let stages = self.load_stages()?;
        self.snapshot(&clients, &stages)
    }

    pub fn goal_status(&self, snapshot: &MetricsSnapshot) -> GoalStatus {
        GoalStatus::of(snapshot, self.config.monthly_goal)
    }

    pub fn weekly_checkpoint(&self, snapshot: &MetricsSnapshot) -> WeeklyCheckpoint {
        self.weekly_checkpoint_at(snapshot, Utc::now())
    }

    pub fn weekly_checkpoint_at(
        &self,
        snapshot: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> WeeklyCheckpoint {
        WeeklyCheckpoint::at(&self.progress_at(now), snapshot, self.config.monthly_goal)
    }

    // ── Sale log ──

    pub fn record_sale(&mut self, sale: NewSale) -> EngineResult<SaleRecord> {
        self.record_sale_at(sale, Utc::now())
    }

    /// Appends a sale to the log. The record is immutable from here on:
    /// total value and period id are fixed at creation.
    pub fn record_sale_at(&mut self, sale: NewSale, now: DateTime<Utc>) -> EngineResult<SaleRecord> {
        let period = current_period(now);
        let record = SaleRecord {
            id: Uuid::new_v4().to_string(),
            number: self.sales.len() as u32 + 1,
            client_id: sale.client_id,
            client_name: sale.client_name,
            phone: sale.phone,
            email: sale.email.unwrap_or_default(),
            base_value: sale.base_value,
            bonus_value: sale.bonus_value,
            total_value: sale.base_value + sale.bonus_value,
            origin: sale.origin.unwrap_or_else(|| UNKNOWN_ORIGIN.to_string()),
            notes: sale.notes.unwrap_or_default(),
            created_at: now,
            period_id: period.id,
        };

        self.sales.push(record.clone());
        self.store.set(keys::SALES, &self.sales)?;
        tracing::info!(
            number = record.number,
            period = %record.period_id,
            total = record.total_value,
            "sale recorded"
        );
        Ok(record)
    }

    pub fn sales(&self) -> &[SaleRecord] {
        &self.sales
    }

    pub fn sales_for_period(&self, period_id: &str) -> Vec<SaleRecord> {
        self.sales
            .iter()
            .filter(|sale| sale.period_id == period_id)
            .cloned()
            .collect()
    }

    pub fn sales_for_current_period(&self) -> Vec<SaleRecord> {
        self.sales_for_period(&self.current_period().id)
    }

    // ── Alerts ──

    pub fn check_alerts(&mut self, snapshot: &MetricsSnapshot) -> EngineResult<Vec<Alert>> {
        self.check_alerts_at(snapshot, Utc::now())
    }

    pub fn check_alerts_at(
        &mut self,
        snapshot: &MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Alert>> {
        let period = current_period(now);
        if self.alert_state.roll_over(&period.id) {
            tracing::info!(period = %period.id, "fired-alert set reset for new period");
        }
        let progress = PeriodProgress::at(&period, now, self.config.lead_time_days);
        let (alerts, fired) = evaluate(snapshot, &progress, &self.config, &self.alert_state.fired)?;
        self.alert_state.fired = fired;
        self.store.set(keys::ALERT_STATE, &self.alert_state)?;
        Ok(alerts)
    }

    // ── History ──

    pub fn archive_current(&mut self, snapshot: MetricsSnapshot) -> EngineResult<HistoricalEntry> {
        self.archive_at(snapshot, Utc::now())
    }

    pub fn archive_at(
        &mut self,
        snapshot: MetricsSnapshot,
        now: DateTime<Utc>,
    ) -> EngineResult<HistoricalEntry> {
        let period = current_period(now);
        let entry = self
            .ledger
            .archive(
                snapshot,
                period,
                self.config.monthly_goal,
                self.config.archive_mode,
                now,
            )
            .clone();
        self.store.set(keys::HISTORY, &self.ledger)?;
        tracing::info!(
            period = %entry.period.id,
            closed = entry.snapshot.closed_count,
            goal_reached = entry.goal_reached,
            "period archived"
        );
        Ok(entry)
    }

    pub fn history(&self) -> Vec<HistoricalEntry> {
        self.ledger.list()
    }

    pub fn compare_to_previous(&self, current: &MetricsSnapshot) -> Option<Comparison> {
        self.ledger.compare_to_previous(current)
    }

    // ── Backup ──

    pub fn export_data(&self) -> EngineResult<serde_json::Value> {
        self.store.export_all()
    }

    pub fn import_data(&mut self, dump: &serde_json::Value) -> EngineResult<u64> {
        // A dump carrying a bad config must be rejected before anything
        // is written: a half-imported store would fail validation on
        // every subsequent open.
        if let Some(raw) = dump.get(keys::CONFIG) {
            let config: EngineConfig = serde_json::from_value(raw.clone())?;
            config.validate()?;
        }
        let imported = self.store.import_all(dump)?;
        // Reload in-memory state so the import is visible immediately.
        self.config = self.store.get(keys::CONFIG)?.unwrap_or_default();
        self.config.validate()?;
        self.sales = self.store.get(keys::SALES)?.unwrap_or_default();
        let entries: Vec<HistoricalEntry> = self.store.get(keys::HISTORY)?.unwrap_or_default();
        self.ledger = Ledger::from_entries(entries);
        self.alert_state = self.store.get(keys::ALERT_STATE)?.unwrap_or_default();
        Ok(imported)
    }

    pub fn store_stats(&self) -> EngineResult<crate::models::StoreStats> {
        self.store.stats()
    }
}
