// src/pipeline/reconcile.rs

//! Record reconciliation.
//!
//! Matches local records to remote identifiers and decides, record by
//! record, whether to update or create. All three table variants share
//! the same update and create primitives; they differ in how local rows
//! are grouped and ordered.
//!
//! Mutations are issued one at a time in traversal order. The order is
//! part of the contract: it decides which local row lands on which
//! existing remote record.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{Action, Outcome, Record, RecordPatch, TableReport};
use crate::pipeline::index::{RemoteIndex, TimelineIndex};
use crate::storage::RecordStore;

/// Grade sent for courses still in progress.
pub const IN_PROGRESS_GRADE: f64 = -1.0;

/// Reconciles local records against one remote table.
pub struct Reconciler<'a> {
    store: &'a dyn RecordStore,
    priority: &'a [Outcome],
    semester_marker: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn RecordStore, priority: &'a [Outcome], semester_marker: &'a str) -> Self {
        Self {
            store,
            priority,
            semester_marker,
        }
    }

    /// Primary table: for every indexed code, pair the best local rows with
    /// the remote identifiers in order. Nothing is created; surplus remote
    /// identifiers are left untouched.
    pub async fn reconcile_primary(
        &self,
        records: &[Record],
        index: &mut RemoteIndex,
        report: &mut TableReport,
    ) {
        log::info!("Starting update for primary table {}", self.store.table());
        let keys: Vec<String> = index.keys().map(str::to_string).collect();

        for key in keys {
            let matching: Vec<&Record> = records.iter().filter(|r| r.code == key).collect();
            if matching.is_empty() {
                log::debug!("No data found for code {key}, skipping update");
                report.untouched.extend(index.ids(&key).iter().cloned());
                continue;
            }

            let local_count = matching.len();
            for record in sort_by_priority(matching, self.priority) {
                let Some(id) = index.claim(&key) else {
                    log::info!(
                        "{local_count} local rows for {key} but fewer remote records; extra rows ignored"
                    );
                    break;
                };
                self.update(&id, record, report).await;
            }

            for id in index.ids(&key) {
                log::warn!(
                    "No more data available to update for code {key} (id: {id}), leaving it untouched"
                );
                report.untouched.push(id.clone());
            }
        }
        log::info!("Finished updating primary table {}", self.store.table());
    }

    /// Pending re-examination table: every `RR` row is either matched to a
    /// remaining remote record of its code or created.
    pub async fn reconcile_rejected(
        &self,
        records: &[Record],
        index: &mut RemoteIndex,
        report: &mut TableReport,
    ) {
        log::info!("Starting update for pending-reexam table {}", self.store.table());
        let failed: Vec<&Record> = records
            .iter()
            .filter(|r| r.result == Outcome::Failed)
            .collect();
        let sorted = sort_by_priority(failed, &[Outcome::Failed]);
        log::info!("Filtered and sorted rows. Total rows available: {}", sorted.len());

        let mut groups: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
        for record in sorted {
            groups.entry(record.code.as_str()).or_default().push(record);
        }
        log::info!("Grouped rows by code. Found {} unique codes", groups.len());

        for (code, group) in groups {
            for record in group {
                self.create_or_update(code, record, index, rejected_patch(record), report)
                    .await;
            }
        }
        for key in index.keys() {
            report.untouched.extend(index.ids(key).iter().cloned());
        }
        log::info!("Finished processing pending-reexam table {}", self.store.table());
    }

    /// Timeline table: one period record per term, numbered in order of
    /// first appearance, with each course linked to its period.
    pub async fn reconcile_timeline(
        &self,
        records: &[Record],
        index: &mut TimelineIndex,
        report: &mut TableReport,
    ) {
        log::info!("Starting update for timeline table {}", self.store.table());

        for (ordinal, (period, rows)) in (1u32..).zip(group_by_period(records)) {
            let period_id = match index.periods.peek(period) {
                Some(id) => id.to_string(),
                None => {
                    let patch = period_patch(period, ordinal, self.semester_marker);
                    match self.create(period, &patch, report).await {
                        Some(id) => {
                            index.periods.insert(period, &id);
                            id
                        }
                        None => {
                            log::warn!(
                                "Skipping {} rows of period {period}: period record could not be created",
                                rows.len()
                            );
                            continue;
                        }
                    }
                }
            };

            let mut courses = index.take_courses(&period_id);
            for record in rows {
                let patch = course_patch(record, &period_id);
                self.create_or_update(&record.code, record, &mut courses, patch, report)
                    .await;
            }
            for key in courses.keys() {
                report.untouched.extend(courses.ids(key).iter().cloned());
            }
        }
        log::info!("Finished updating timeline table {}", self.store.table());
    }

    /// Update the next remote record for `key` if one remains, otherwise
    /// create a new one from `create_patch`.
    pub async fn create_or_update(
        &self,
        key: &str,
        record: &Record,
        index: &mut RemoteIndex,
        create_patch: RecordPatch,
        report: &mut TableReport,
    ) {
        match index.claim(key) {
            Some(id) => self.update(&id, record, report).await,
            None => {
                log::info!(
                    "No remaining remote records for {key}, creating one with grade {:?}",
                    record.grade
                );
                self.create(key, &create_patch, report).await;
            }
        }
    }

    async fn update(&self, id: &str, record: &Record, report: &mut TableReport) {
        let patch = update_patch(record);
        if patch.is_empty() {
            log::info!("No valid data to update for {} (id: {id}), skipping", record.code);
            return;
        }

        log::debug!(
            "Updating {id} with {} using row RES={} NOTA={:?} CH={:?} PERÍODO={}",
            record.code,
            record.result,
            record.grade,
            record.workload,
            record.period
        );
        match self.store.update(id, &patch).await {
            Ok(()) => {
                log::info!("Updated {} (id: {id})", record.code);
                report.record(&record.code, Action::Updated, Ok(()));
            }
            Err(e) => {
                log::error!(
                    "Failed to update {} (id: {id}). Status: {}: {e}",
                    record.code,
                    status_text(e.status())
                );
                report.record(&record.code, Action::Updated, Err(e.status()));
            }
        }
    }

    async fn create(&self, key: &str, patch: &RecordPatch, report: &mut TableReport) -> Option<String> {
        match self.store.create(patch).await {
            Ok(id) => {
                log::info!("Created record for {key} (id: {id})");
                report.record(key, Action::Created, Ok(()));
                Some(id)
            }
            Err(e) => {
                log::error!(
                    "Failed to create record for {key}. Status: {}: {e}",
                    status_text(e.status())
                );
                report.record(key, Action::Created, Err(e.status()));
                None
            }
        }
    }
}

fn status_text(status: Option<u16>) -> String {
    status.map_or_else(|| "n/a".to_string(), |s| s.to_string())
}

/// Order rows best outcome first, then highest grade first. Tags missing
/// from `priority` and missing grades sort last.
pub fn sort_by_priority<'r>(mut records: Vec<&'r Record>, priority: &[Outcome]) -> Vec<&'r Record> {
    let rank = |r: &Record| {
        priority
            .iter()
            .position(|p| *p == r.result)
            .unwrap_or(priority.len())
    };
    records.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| grade_desc(a.grade, b.grade)));
    records
}

fn grade_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Group rows by period in order of first appearance. Rows without a code
/// are dropped.
pub fn group_by_period(records: &[Record]) -> Vec<(&str, Vec<&Record>)> {
    let mut groups: Vec<(&str, Vec<&Record>)> = Vec::new();
    for record in records.iter().filter(|r| !r.code.trim().is_empty()) {
        match groups.iter_mut().find(|(period, _)| *period == record.period) {
            Some((_, rows)) => rows.push(record),
            None => groups.push((record.period.as_str(), vec![record])),
        }
    }
    groups
}

/// Fields written onto an existing record. In-progress courses only get
/// the no-grade sentinel; otherwise blank values are never sent.
pub fn update_patch(record: &Record) -> RecordPatch {
    if record.is_in_progress() {
        return RecordPatch {
            grade: Some(IN_PROGRESS_GRADE),
            ..RecordPatch::default()
        };
    }
    RecordPatch {
        grade: record.grade,
        workload: record.workload,
        period: non_blank(&record.period),
        ..RecordPatch::default()
    }
}

/// Fields of a new pending re-examination record.
pub fn rejected_patch(record: &Record) -> RecordPatch {
    RecordPatch {
        code: Some(record.code.clone()),
        grade: record.grade,
        workload: record.workload,
        ..RecordPatch::default()
    }
}

/// Fields of a new timeline course record.
pub fn course_patch(record: &Record, period_id: &str) -> RecordPatch {
    RecordPatch {
        parent: Some(period_id.to_string()),
        code: Some(record.code.clone()),
        subject: non_blank(&record.subject),
        workload: record.workload,
        grade: record.grade,
        ..RecordPatch::default()
    }
}

/// Fields of a new timeline period record.
pub fn period_patch(period: &str, ordinal: u32, marker: &str) -> RecordPatch {
    RecordPatch {
        code: Some(period.to_string()),
        subject: Some(marker.to_string()),
        ordinal: Some(ordinal),
        ..RecordPatch::default()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty() && value != "--").then(|| value.to_string())
}
