//! In-memory health state, one record per target.
//!
//! The store is owned by the monitor and written only by the running tick.
//! Snapshots are owned copies in registration order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::probe::ProbeResult;

/// Last-known health of a single target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    /// Result of the most recent probe.
    pub healthy: bool,
    /// When the most recent probe completed.
    pub last_checked: DateTime<Utc>,
    /// Latency of the most recent successful probe.
    pub response_time_ms: Option<u64>,
    /// Failed probes since the last success.
    pub consecutive_failures: u32,
}

impl From<&ProbeResult> for HealthRecord {
    fn from(result: &ProbeResult) -> Self {
        Self {
            healthy: result.healthy,
            last_checked: result.checked_at,
            response_time_ms: result.response_time_ms,
            consecutive_failures: result.failure_count,
        }
    }
}

/// Map from target name to its [`HealthRecord`].
#[derive(Debug, Default)]
pub struct HealthStore {
    order: Vec<String>,
    records: HashMap<String, HealthRecord>,
}

impl HealthStore {
    /// Create a store whose snapshots follow the given name order.
    pub fn new(order: Vec<String>) -> Self {
        Self {
            order,
            records: HashMap::new(),
        }
    }

    /// Overwrite the records of every target present in `results`.
    ///
    /// Targets absent from `results` keep their previous record. Names not
    /// known at construction are appended to the snapshot order.
    pub fn update(&mut self, results: &[ProbeResult]) {
        for result in results {
            if !self.records.contains_key(&result.target) && !self.order.contains(&result.target)
            {
                self.order.push(result.target.clone());
            }
            self.records
                .insert(result.target.clone(), HealthRecord::from(result));
        }
    }

    /// Point-in-time copy of all records in registration order.
    pub fn snapshot(&self) -> Vec<(String, HealthRecord)> {
        self.order
            .iter()
            .filter_map(|name| {
                self.records
                    .get(name)
                    .map(|record| (name.clone(), record.clone()))
            })
            .collect()
    }

    /// Record for one target, if it has been probed.
    pub fn get(&self, name: &str) -> Option<&HealthRecord> {
        self.records.get(name)
    }

    /// Consecutive failures for a target (0 when never probed).
    pub fn failures(&self, name: &str) -> u32 {
        self.records
            .get(name)
            .map_or(0, |record| record.consecutive_failures)
    }

    /// Number of targets with a record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no target has been probed yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
