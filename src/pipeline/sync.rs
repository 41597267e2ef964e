// src/pipeline/sync.rs

//! Synchronization pipeline.
//!
//! raw grid → normalized records → equivalence-resolved records →
//! reconciled against each remote table in turn.

use chrono::Utc;

use crate::error::Result;
use crate::models::{Config, Record, SyncReport, TableReport, TableVariant};
use crate::pipeline::guard::RowGuard;
use crate::pipeline::index::{build_index, build_timeline_index};
use crate::pipeline::reconcile::Reconciler;
use crate::services::{EquivalenceResolver, TableNormalizer};
use crate::storage::RecordStore;

/// Store handles, one per table variant.
pub struct Stores<'a> {
    pub main: &'a dyn RecordStore,
    pub rejected: &'a dyn RecordStore,
    /// The timeline pass is skipped when absent
    pub timeline: Option<&'a dyn RecordStore>,
}

/// Normalize a raw grid and apply equivalences.
///
/// Fails with `NoUsableData` when the scrape is too short or empty; no
/// remote call has been made at that point.
pub fn prepare_records(config: &Config, grid: &[Vec<String>]) -> Result<Vec<Record>> {
    let normalizer = TableNormalizer::new(config.table.clone());
    let body_rows = normalizer.body(grid).len();
    let records = normalizer.normalize(grid);

    RowGuard::new(config.table.min_rows).validate(body_rows, records.len())?;

    Ok(EquivalenceResolver::from_config(config).resolve(records))
}

/// Run the full synchronization from a raw grid.
pub async fn run_sync(config: &Config, grid: &[Vec<String>], stores: &Stores<'_>) -> Result<SyncReport> {
    let started_at = Utc::now();
    let records = prepare_records(config, grid)?;

    let mut report = sync_records(config, &records, stores).await;
    report.started_at = started_at;
    Ok(report)
}

/// Reconcile prepared records with every configured table, in order.
/// A failing table does not stop the following ones.
pub async fn sync_records(config: &Config, records: &[Record], stores: &Stores<'_>) -> SyncReport {
    let started_at = Utc::now();

    let mut passes = vec![
        (TableVariant::Primary, stores.main),
        (TableVariant::Rejected, stores.rejected),
    ];
    if let Some(timeline) = stores.timeline {
        passes.push((TableVariant::Timeline, timeline));
    }

    let total = passes.len();
    let mut tables = Vec::with_capacity(total);
    for (step, (variant, store)) in passes.into_iter().enumerate() {
        log::info!("[STEP {}/{}] Reconciling {} table", step + 1, total, variant);
        tables.push(sync_table(config, variant, records, store).await);
    }

    let report = SyncReport {
        started_at,
        finished_at: Utc::now(),
        record_count: records.len(),
        tables,
    };
    report.log_summary();
    report
}

/// Build the remote index of one table and reconcile it.
pub async fn sync_table(
    config: &Config,
    variant: TableVariant,
    records: &[Record],
    store: &dyn RecordStore,
) -> TableReport {
    let priority = config.priority();
    let reconciler = Reconciler::new(store, &priority, &config.reconcile.semester_marker);
    let mut report = TableReport::new(variant, store.table());

    let indexed = match variant {
        TableVariant::Primary | TableVariant::Rejected => match build_index(store).await {
            Ok(mut index) => {
                if variant == TableVariant::Primary {
                    reconciler
                        .reconcile_primary(records, &mut index, &mut report)
                        .await;
                } else {
                    reconciler
                        .reconcile_rejected(records, &mut index, &mut report)
                        .await;
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        TableVariant::Timeline => match build_timeline_index(store).await {
            Ok(mut index) => {
                reconciler
                    .reconcile_timeline(records, &mut index, &mut report)
                    .await;
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = indexed {
        log::error!(
            "Could not fetch {} table {}: {}",
            variant,
            store.table(),
            e
        );
        return TableReport::failed(variant, store.table(), e);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{Outcome, RemoteRecord, TableConfig};
    use crate::storage::MemoryStore;

    fn config() -> Config {
        Config {
            table: TableConfig {
                header_rows: 1,
                footer_rows: 1,
                ..TableConfig::default()
            },
            ..Config::default()
        }
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn grid() -> Vec<Vec<String>> {
        vec![
            row(&["header"]),
            row(&["2021.1", "FISD34", "Física A", "60", "4", "7.0", "", "", "AP"]),
            row(&["", "FISD41", "Física B", "30", "2", "4.0", "", "", "RR"]),
            row(&["Subtotal:", "90", "6", ""]),
            row(&["2021.2", "FIS122", "Física", "--", "6", "--", "", "", "DI"]),
            row(&["", "MAT01", "Cálculo", "60", "4", "--", "", "", "--"]),
            row(&["footer"]),
        ]
    }

    #[test]
    fn test_prepare_applies_equivalences() {
        let records = prepare_records(&config(), &grid()).unwrap();
        assert_eq!(records.len(), 4);

        let target = records.iter().find(|r| r.code == "FIS122").unwrap();
        assert_eq!(target.grade, Some(6.0));
        assert_eq!(target.workload, Some(90.0));
        assert_eq!(target.result, Outcome::Approved);
        assert_eq!(target.period, "2021.2");
    }

    #[test]
    fn test_prepare_rejects_short_grid() {
        let mut config = config();
        config.table.min_rows = 10;
        assert!(matches!(
            prepare_records(&config, &grid()),
            Err(AppError::NoUsableData { .. })
        ));
    }

    #[tokio::test]
    async fn test_unusable_grid_makes_no_remote_calls() {
        let main = MemoryStore::with_records("main", vec![RemoteRecord::new("p1", "MAT01")]);
        let rejected = MemoryStore::new("rr");
        let stores = Stores {
            main: &main,
            rejected: &rejected,
            timeline: None,
        };

        let grid = vec![row(&["header"]), row(&[" "]), row(&["footer"])];
        assert!(run_sync(&config(), &grid, &stores).await.is_err());
        assert!(main.calls().is_empty());
        assert!(rejected.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_table_does_not_stop_others() {
        let main = MemoryStore::new("main").fail_fetch();
        let rejected = MemoryStore::new("rr");
        let stores = Stores {
            main: &main,
            rejected: &rejected,
            timeline: None,
        };

        let report = run_sync(&config(), &grid(), &stores).await.unwrap();
        assert_eq!(report.tables.len(), 2);
        assert!(report.tables[0].failure.is_some());
        assert!(report.tables[1].failure.is_none());
        // FISD41 is the only RR row
        assert_eq!(report.tables[1].created(), 1);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_second_run_creates_nothing() {
        let main = MemoryStore::with_records(
            "main",
            vec![
                RemoteRecord::new("p1", "MAT01"),
                RemoteRecord::new("p2", "FIS122"),
            ],
        );
        let rejected = MemoryStore::new("rr");
        let timeline = MemoryStore::new("tl");
        let stores = Stores {
            main: &main,
            rejected: &rejected,
            timeline: Some(&timeline),
        };

        let first = run_sync(&config(), &grid(), &stores).await.unwrap();
        assert!(first.is_clean());
        assert_eq!(first.tables.len(), 3);
        assert_eq!(main.create_count(), 0);
        assert_eq!(main.update_count(), 2);
        assert_eq!(rejected.create_count(), 1);
        // two periods and four courses
        assert_eq!(timeline.create_count(), 6);

        let second = run_sync(&config(), &grid(), &stores).await.unwrap();
        assert!(second.tables.iter().all(|t| t.created() == 0));
        assert_eq!(rejected.create_count(), 1);
        assert_eq!(timeline.create_count(), 6);
        assert_eq!(rejected.update_count(), 1);
        assert_eq!(timeline.update_count(), 4);
    }

    #[tokio::test]
    async fn test_timeline_courses_link_to_their_period() {
        let main = MemoryStore::new("main");
        let rejected = MemoryStore::new("rr");
        let timeline = MemoryStore::new("tl");
        let stores = Stores {
            main: &main,
            rejected: &rejected,
            timeline: Some(&timeline),
        };

        run_sync(&config(), &grid(), &stores).await.unwrap();

        let records = timeline.records();
        let period = |label: &str| {
            records
                .iter()
                .find(|r| r.parents.is_empty() && r.key.as_deref() == Some(label))
                .map(|r| r.id.clone())
                .unwrap()
        };
        let first = period("2021.1");
        let second = period("2021.2");
        assert_eq!(timeline.fields(&first).unwrap().ordinal, Some(1));
        assert_eq!(timeline.fields(&second).unwrap().ordinal, Some(2));

        let mat = records
            .iter()
            .find(|r| r.key.as_deref() == Some("MAT01"))
            .unwrap();
        assert_eq!(mat.parents, vec![second]);
    }
}
