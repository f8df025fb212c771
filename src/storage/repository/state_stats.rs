// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-state, per-year fraud statistics.
//!
//! Rows are keyed `CODE:YEAR`. Case creation and resolution adjust them in
//! the same transaction as the case write; admins may also overwrite the
//! baseline figures.

use chrono::{DateTime, Utc};
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::super::database::{
    get_json, put_json, Database, Record, StorageError, StorageResult, STATE_STATS,
};
use crate::models::{lookup_state, validate_amount};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StateFraudStats {
    /// `CODE:YEAR`
    pub id: String,
    pub state_code: String,
    pub state_name: String,
    pub year: i32,
    pub total_cases: u64,
    pub total_amount_lost: f64,
    pub resolved_cases: u64,
    pub amount_recovered: f64,
    pub updated_at: DateTime<Utc>,
}

impl Record for StateFraudStats {
    fn id(&self) -> &str {
        &self.id
    }
}

impl StateFraudStats {
    fn empty(code: &'static str, name: &'static str, year: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: stats_key(code, year),
            state_code: code.to_string(),
            state_name: name.to_string(),
            year,
            total_cases: 0,
            total_amount_lost: 0.0,
            resolved_cases: 0,
            amount_recovered: 0.0,
            updated_at: now,
        }
    }

    /// Share of cases resolved, 0.0 when there are none.
    pub fn resolution_rate(&self) -> f64 {
        if self.total_cases == 0 {
            0.0
        } else {
            self.resolved_cases as f64 / self.total_cases as f64
        }
    }
}

/// Admin-supplied figures for one state and year.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatsBaseline {
    pub year: i32,
    pub total_cases: u64,
    pub total_amount_lost: f64,
    pub resolved_cases: u64,
    #[serde(default)]
    pub amount_recovered: f64,
}

impl StatsBaseline {
    fn validate(&self) -> Result<(), String> {
        if !(2000..=2100).contains(&self.year) {
            return Err("year must be between 2000 and 2100".to_string());
        }
        if self.resolved_cases > self.total_cases {
            return Err("resolved_cases cannot exceed total_cases".to_string());
        }
        validate_amount("total_amount_lost", self.total_amount_lost)?;
        validate_amount("amount_recovered", self.amount_recovered)
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct StatsFilter {
    pub year: Option<i32>,
}

/// National totals across states.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct NationalTotals {
    pub total_cases: u64,
    pub total_amount_lost: f64,
    pub resolved_cases: u64,
    pub amount_recovered: f64,
}

fn stats_key(code: &str, year: i32) -> String {
    format!("{code}:{year}")
}

fn resolve_state(code: &str) -> StorageResult<(&'static str, &'static str)> {
    lookup_state(code).ok_or_else(|| StorageError::Validation(format!("unknown state code {code}")))
}

fn load_or_empty(
    txn: &WriteTransaction,
    code: &str,
    year: i32,
    now: DateTime<Utc>,
) -> StorageResult<StateFraudStats> {
    let (code, name) = resolve_state(code)?;
    let table = txn.open_table(STATE_STATS)?;
    let row = get_json(&table, &stats_key(code, year))?;
    Ok(row.unwrap_or_else(|| StateFraudStats::empty(code, name, year, now)))
}

/// Count a newly opened case.
pub(crate) fn record_case(
    txn: &WriteTransaction,
    state_code: &str,
    year: i32,
    amount_lost: f64,
    now: DateTime<Utc>,
) -> StorageResult<()> {
    let mut stats = load_or_empty(txn, state_code, year, now)?;
    stats.total_cases += 1;
    stats.total_amount_lost += amount_lost;
    stats.updated_at = now;
    put_json(txn, STATE_STATS, &stats)
}

/// Count a case reaching `resolved` or `closed` for the first time.
pub(crate) fn record_resolution(
    txn: &WriteTransaction,
    state_code: &str,
    year: i32,
    now: DateTime<Utc>,
) -> StorageResult<()> {
    let mut stats = load_or_empty(txn, state_code, year, now)?;
    stats.resolved_cases += 1;
    stats.updated_at = now;
    put_json(txn, STATE_STATS, &stats)
}

pub struct StateStatsRepository<'a> {
    db: &'a Database,
}

impl<'a> StateStatsRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Sorted by total cases, highest first.
    pub fn list(&self, filter: &StatsFilter) -> StorageResult<Vec<StateFraudStats>> {
        let mut rows: Vec<StateFraudStats> = self.db.fetch_all(STATE_STATS)?;
        rows.retain(|s| filter.year.is_none_or(|y| s.year == y));
        rows.sort_by(|a, b| {
            b.total_cases
                .cmp(&a.total_cases)
                .then_with(|| a.state_code.cmp(&b.state_code))
                .then_with(|| b.year.cmp(&a.year))
        });
        Ok(rows)
    }

    /// All years for one state, newest first.
    pub fn for_state(&self, code: &str) -> StorageResult<Vec<StateFraudStats>> {
        let (code, _) = lookup_state(code)
            .ok_or_else(|| StorageError::NotFound(format!("state {code}")))?;
        let mut rows: Vec<StateFraudStats> = self.db.fetch_all(STATE_STATS)?;
        rows.retain(|s| s.state_code == code);
        rows.sort_by(|a, b| b.year.cmp(&a.year));
        Ok(rows)
    }

    pub fn totals(&self, filter: &StatsFilter) -> StorageResult<NationalTotals> {
        Ok(self
            .list(filter)?
            .iter()
            .fold(NationalTotals::default(), |mut acc, s| {
                acc.total_cases += s.total_cases;
                acc.total_amount_lost += s.total_amount_lost;
                acc.resolved_cases += s.resolved_cases;
                acc.amount_recovered += s.amount_recovered;
                acc
            }))
    }

    /// Overwrite the figures for one state and year.
    pub fn upsert_baseline(&self, code: &str, baseline: StatsBaseline) -> StorageResult<StateFraudStats> {
        let (code, name) = lookup_state(code)
            .ok_or_else(|| StorageError::NotFound(format!("state {code}")))?;
        baseline.validate().map_err(StorageError::Validation)?;
        let now = Utc::now();
        let stats = StateFraudStats {
            id: stats_key(code, baseline.year),
            state_code: code.to_string(),
            state_name: name.to_string(),
            year: baseline.year,
            total_cases: baseline.total_cases,
            total_amount_lost: baseline.total_amount_lost,
            resolved_cases: baseline.resolved_cases,
            amount_recovered: baseline.amount_recovered,
            updated_at: now,
        };
        self.db.write(|txn| put_json(txn, STATE_STATS, &stats))?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_state_and_year() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();
        db.write(|txn| {
            record_case(txn, "ka", 2025, 1000.0, now)?;
            record_case(txn, "KA", 2025, 500.0, now)?;
            record_case(txn, "KA", 2024, 10.0, now)?;
            record_resolution(txn, "KA", 2025, now)
        })
        .unwrap();

        let repo = StateStatsRepository::new(&db);
        let ka = repo.for_state("ka").unwrap();
        assert_eq!(ka.len(), 2);
        assert_eq!(ka[0].year, 2025);
        assert_eq!(ka[0].total_cases, 2);
        assert_eq!(ka[0].total_amount_lost, 1500.0);
        assert_eq!(ka[0].resolved_cases, 1);
        assert_eq!(ka[0].state_name, "Karnataka");
        assert_eq!(ka[0].resolution_rate(), 0.5);

        let totals = repo.totals(&StatsFilter { year: Some(2025) }).unwrap();
        assert_eq!(totals.total_cases, 2);
    }

    #[test]
    fn unknown_state_is_rejected() {
        let db = Database::in_memory().unwrap();
        let err = db
            .write(|txn| record_case(txn, "ZZ", 2025, 1.0, Utc::now()))
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
        assert!(matches!(
            StateStatsRepository::new(&db).for_state("ZZ"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn baseline_overwrites_and_validates() {
        let db = Database::in_memory().unwrap();
        let repo = StateStatsRepository::new(&db);
        let stats = repo
            .upsert_baseline(
                "MH",
                StatsBaseline {
                    year: 2024,
                    total_cases: 120,
                    total_amount_lost: 5_000_000.0,
                    resolved_cases: 30,
                    amount_recovered: 250_000.0,
                },
            )
            .unwrap();
        assert_eq!(stats.id, "MH:2024");

        let bad = StatsBaseline {
            year: 2024,
            total_cases: 1,
            total_amount_lost: 0.0,
            resolved_cases: 2,
            amount_recovered: 0.0,
        };
        assert!(matches!(
            repo.upsert_baseline("MH", bad),
            Err(StorageError::Validation(_))
        ));
    }
}
