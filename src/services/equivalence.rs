// src/services/equivalence.rs

//! Equivalence resolver.
//!
//! Some new-curriculum courses are granted through a set of historical
//! courses. The portal lists the new course as a `DI` placeholder; its
//! grade is the workload-weighted average of the historical grades.

use crate::models::{Config, EquivalenceGroup, Outcome, Record};

/// Values derived for an equivalence target.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub grade: f64,
    pub workload: f64,
    pub result: Outcome,
}

/// Service applying equivalence groups to a record collection.
#[derive(Debug, Clone)]
pub struct EquivalenceResolver {
    groups: Vec<EquivalenceGroup>,
    pass_threshold: f64,
}

impl EquivalenceResolver {
    pub fn new(groups: Vec<EquivalenceGroup>, pass_threshold: f64) -> Self {
        Self {
            groups,
            pass_threshold,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.equivalences.clone(), config.reconcile.pass_threshold)
    }

    /// Apply every group in order.
    pub fn resolve(&self, mut records: Vec<Record>) -> Vec<Record> {
        for group in &self.groups {
            self.resolve_group(&mut records, group);
        }
        records
    }

    /// Apply one group, returning the derived values when a placeholder
    /// row was overwritten.
    pub fn resolve_group(&self, records: &mut [Record], group: &EquivalenceGroup) -> Option<Derived> {
        let sources: Vec<&Record> = records
            .iter()
            .filter(|r| group.sources.contains(&r.code))
            .collect();

        if sources.is_empty() {
            log::warn!("No data found for source codes: {:?}", group.sources);
            return None;
        }
        if sources.iter().all(|r| r.grade.is_none()) {
            log::warn!("All grades are missing for source codes: {:?}", group.sources);
            return None;
        }

        let (grade, workload) = weighted_average(&sources);
        let derived = Derived {
            grade,
            workload,
            result: Outcome::from_grade(grade, self.pass_threshold),
        };

        let mut overwritten = 0;
        for record in records
            .iter_mut()
            .filter(|r| r.code == group.target && r.result == Outcome::Dispensed)
        {
            record.grade = Some(derived.grade);
            record.workload = Some(derived.workload);
            record.result = derived.result.clone();
            overwritten += 1;
        }

        if overwritten == 0 {
            log::info!(
                "No DI placeholder for {}, equivalence not applied",
                group.target
            );
            return None;
        }

        log::info!(
            "Updated {} with weighted average grade {:.2} and result {}",
            group.target,
            derived.grade,
            derived.result
        );
        Some(derived)
    }
}

/// Workload-weighted grade average and total workload.
///
/// Rows without a workload add nothing; rows without a grade add their
/// workload to the total only. A zero total yields an average of 0.
pub fn weighted_average(sources: &[&Record]) -> (f64, f64) {
    let total: f64 = sources.iter().filter_map(|r| r.workload).sum();
    let weighted: f64 = sources
        .iter()
        .filter_map(|r| Some(r.workload? * r.grade?))
        .sum();

    let average = if total == 0.0 { 0.0 } else { weighted / total };
    (average, total)
}
