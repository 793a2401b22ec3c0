// crates/loom-core/src/runtime/metrics.rs
// ============================================================================
// Module: Loom Metrics Read Models
// Description: Aggregations over the append-only step event log.
// Purpose: Serve overview, per-step, timeline, and failure read APIs.
// Dependencies: crate::core, serde, time
// ============================================================================

//! ## Overview
//! Metrics are pure projections over step event scans; they never touch run
//! state. Aggregations consider terminal dispatch records only, so callback
//! duplicates and intermediate updates do not skew counts. Records carrying
//! logical timestamps are excluded from day bucketing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use time::Date;
use time::Duration;
use time::OffsetDateTime;

use crate::core::StepEventRecord;
use crate::core::StepEventType;
use crate::core::StepStatus;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Read Models
// ============================================================================

/// Aggregate telemetry overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsOverview {
    /// Terminal step executions observed.
    pub total_steps: u64,
    /// Executions that ended `succeeded`.
    pub succeeded: u64,
    /// Executions that ended `failed`.
    pub failed: u64,
    /// Executions that ended `merged`.
    pub merged: u64,
    /// Distinct candidates with at least one terminal execution.
    pub candidates_touched: u64,
    /// Mean dispatch-to-terminal duration over successful executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_duration_ms: Option<u64>,
}

/// Per-step aggregate metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetricsEntry {
    /// Step name the entry aggregates.
    pub step_name: String,
    /// Executions that ended successfully (`succeeded` or `merged`).
    pub succeeded: u64,
    /// Executions that ended `failed`.
    pub failed: u64,
    /// Mean dispatch-to-terminal duration over successful executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_duration_ms: Option<u64>,
}

/// One UTC-day bucket of terminal outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineBucket {
    /// ISO calendar date of the bucket.
    pub date: String,
    /// Successful executions on the day.
    pub succeeded: u64,
    /// Failed executions on the day.
    pub failed: u64,
}

// ============================================================================
// SECTION: Aggregations
// ============================================================================

/// Returns true for the records metrics aggregate over.
fn is_terminal_dispatch(record: &StepEventRecord) -> bool {
    record.event_type == StepEventType::Dispatch && record.status.is_terminal()
}

/// Builds the aggregate overview from an event scan.
#[must_use]
pub fn overview(records: &[StepEventRecord]) -> MetricsOverview {
    let mut totals = MetricsOverview {
        total_steps: 0,
        succeeded: 0,
        failed: 0,
        merged: 0,
        candidates_touched: 0,
        avg_duration_ms: None,
    };
    let mut candidates: BTreeSet<(String, String)> = BTreeSet::new();
    let mut duration_sum: u64 = 0;
    let mut duration_count: u64 = 0;

    for record in records.iter().filter(|record| is_terminal_dispatch(record)) {
        totals.total_steps += 1;
        match record.status {
            StepStatus::Succeeded => totals.succeeded += 1,
            StepStatus::Merged => totals.merged += 1,
            StepStatus::Failed => totals.failed += 1,
            StepStatus::Pending | StepStatus::InProgress => {}
        }
        if candidates.insert((
            record.migration_id.as_str().to_string(),
            record.candidate_id.as_str().to_string(),
        )) {
            totals.candidates_touched += 1;
        }
        if record.status.is_success()
            && let Some(duration) = record.duration_ms
        {
            duration_sum = duration_sum.saturating_add(duration);
            duration_count += 1;
        }
    }

    if duration_count > 0 {
        totals.avg_duration_ms = Some(duration_sum / duration_count);
    }
    totals
}

/// Per-step accumulator used while folding the scan.
#[derive(Default)]
struct StepAccumulator {
    /// Successful execution count.
    succeeded: u64,
    /// Failed execution count.
    failed: u64,
    /// Sum of successful durations.
    duration_sum: u64,
    /// Count of successful durations.
    duration_count: u64,
}

/// Builds per-step metrics from an event scan, sorted by step name.
#[must_use]
pub fn per_step(records: &[StepEventRecord]) -> Vec<StepMetricsEntry> {
    let mut accumulators: BTreeMap<String, StepAccumulator> = BTreeMap::new();
    for record in records.iter().filter(|record| is_terminal_dispatch(record)) {
        let entry = accumulators.entry(record.step_name.as_str().to_string()).or_default();
        if record.status.is_success() {
            entry.succeeded += 1;
            if let Some(duration) = record.duration_ms {
                entry.duration_sum = entry.duration_sum.saturating_add(duration);
                entry.duration_count += 1;
            }
        } else {
            entry.failed += 1;
        }
    }
    accumulators
        .into_iter()
        .map(|(step_name, entry)| StepMetricsEntry {
            step_name,
            succeeded: entry.succeeded,
            failed: entry.failed,
            avg_duration_ms: (entry.duration_count > 0)
                .then(|| entry.duration_sum / entry.duration_count),
        })
        .collect()
}

/// Returns the UTC calendar date of a timestamp, when it is wall-clock time.
fn record_date(timestamp: &Timestamp) -> Option<Date> {
    let millis = timestamp.as_unix_millis()?;
    OffsetDateTime::from_unix_timestamp(millis.div_euclid(1000))
        .ok()
        .map(OffsetDateTime::date)
}

/// Formats a calendar date as `YYYY-MM-DD`.
fn format_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

/// Buckets terminal outcomes per UTC day over the trailing window ending at
/// `now`. Returns an empty timeline when `now` is not wall-clock time.
#[must_use]
pub fn timeline(records: &[StepEventRecord], now: Timestamp, days: u16) -> Vec<TimelineBucket> {
    let Some(today) = record_date(&now) else {
        return Vec::new();
    };
    let days = days.clamp(1, 366);
    let mut buckets: Vec<(Date, u64, u64)> = Vec::with_capacity(usize::from(days));
    for offset in (0..days).rev() {
        if let Some(date) = today.checked_sub(Duration::days(i64::from(offset))) {
            buckets.push((date, 0, 0));
        }
    }

    for record in records.iter().filter(|record| is_terminal_dispatch(record)) {
        let Some(date) = record_date(&record.created_at) else {
            continue;
        };
        if let Some(bucket) = buckets.iter_mut().find(|(day, _, _)| *day == date) {
            if record.status.is_success() {
                bucket.1 += 1;
            } else {
                bucket.2 += 1;
            }
        }
    }

    buckets
        .into_iter()
        .map(|(date, succeeded, failed)| TimelineBucket {
            date: format_date(date),
            succeeded,
            failed,
        })
        .collect()
}

/// Returns the most recent failed records, newest first, bounded by `limit`.
#[must_use]
pub fn recent_failures(records: Vec<StepEventRecord>, limit: usize) -> Vec<StepEventRecord> {
    let mut failures: Vec<StepEventRecord> = records
        .into_iter()
        .filter(|record| is_terminal_dispatch(record) && record.status == StepStatus::Failed)
        .collect();
    failures.reverse();
    failures.truncate(limit);
    failures
}
