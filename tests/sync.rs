use std::io::Write;

use tempfile::NamedTempFile;
use transcript_sync::{
    error::AppError,
    models::{Config, Outcome, RemoteRecord},
    pipeline::{Stores, run_sync},
    services::read_grid,
    storage::{MemoryStore, StoreCall},
};

const CONFIG: &str = r#"
[tables]
main = "main-db"
rejected = "rr-db"

[table]
header_rows = 2
footer_rows = 1
"#;

const PAGE: &str = r#"
<html><body><table>
  <tr><td>Histórico Escolar</td></tr>
  <tr><td>Período</td><td>Código</td></tr>
  <tr><td>2020.2</td><td>MAT01</td><td>Cálculo A</td><td>60</td><td>4</td><td>3.0</td><td></td><td></td><td>RR</td></tr>
  <tr><td></td></tr>
  <tr><td>2021.1</td><td>MAT01</td><td>Cálculo A</td><td>60</td><td>4</td><td>8.5</td><td></td><td></td><td>AP</td></tr>
  <tr><td></td><td>LET10</td><td>Leitura</td><td>30</td><td>2</td><td>--</td><td></td><td></td><td>--</td></tr>
  <tr><td>Total Geral</td></tr>
</table></body></html>
"#;

fn config() -> Config {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    Config::load(file.path()).unwrap()
}

fn grid(config: &Config) -> Vec<Vec<String>> {
    let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    file.write_all(PAGE.as_bytes()).unwrap();
    read_grid(file.path(), &config.table).unwrap()
}

#[tokio::test]
async fn test_page_to_tables() {
    let config = config();
    let main = MemoryStore::with_records(
        "main-db",
        vec![
            RemoteRecord::new("m1", "MAT01"),
            RemoteRecord::new("m2", "LET10"),
            RemoteRecord::new("m3", "LET10"),
            RemoteRecord::new("m4", "QUI01"),
        ],
    );
    let rejected = MemoryStore::with_records("rr-db", vec![RemoteRecord::new("r1", "MAT01")]);
    let stores = Stores {
        main: &main,
        rejected: &rejected,
        timeline: None,
    };

    let report = run_sync(&config, &grid(&config), &stores).await.unwrap();
    assert_eq!(report.record_count, 3);
    assert!(report.is_clean());

    // the approved attempt wins the single MAT01 record
    let mat = main.fields("m1").unwrap();
    assert_eq!(mat.grade, Some(8.5));
    assert_eq!(mat.period.as_deref(), Some("2021.1"));

    // in-progress course only gets the sentinel grade
    let let10 = main.fields("m2").unwrap();
    assert_eq!(let10.grade, Some(-1.0));
    assert_eq!(let10.workload, None);

    let primary = &report.tables[0];
    assert_eq!(primary.created(), 0);
    assert_eq!(primary.untouched, vec!["m3".to_string(), "m4".to_string()]);
    assert_eq!(main.records().len(), 4);

    // the failed attempt updates the existing pending record
    assert_eq!(
        rejected.calls(),
        vec![StoreCall::Update {
            id: "r1".into(),
            patch: rejected.fields("r1").unwrap(),
        }]
    );
    assert_eq!(rejected.fields("r1").unwrap().grade, Some(3.0));
}

#[tokio::test]
async fn test_rejected_write_failure_is_reported_not_fatal() {
    let config = config();
    let main = MemoryStore::with_records("main-db", vec![RemoteRecord::new("m1", "MAT01")])
        .fail_key("MAT01");
    let rejected = MemoryStore::new("rr-db");
    let stores = Stores {
        main: &main,
        rejected: &rejected,
        timeline: None,
    };

    let report = run_sync(&config, &grid(&config), &stores).await.unwrap();
    assert_eq!(report.tables[0].failures(), 1);
    assert_eq!(report.tables[0].outcomes[0].status, Some(400));
    assert_eq!(report.tables[1].created(), 1);
    assert!(!report.is_clean());
}

#[tokio::test]
async fn test_header_only_page_aborts() {
    let config = config();
    let main = MemoryStore::new("main-db");
    let rejected = MemoryStore::new("rr-db");
    let stores = Stores {
        main: &main,
        rejected: &rejected,
        timeline: None,
    };

    let grid: Vec<Vec<String>> = grid(&config).into_iter().take(3).collect();
    let err = run_sync(&config, &grid, &stores).await.unwrap_err();
    assert!(matches!(err, AppError::NoUsableData { .. }));
    assert!(main.calls().is_empty());
    assert!(rejected.calls().is_empty());
}

#[test]
fn test_default_priority_order() {
    assert_eq!(
        config().priority(),
        vec![
            Outcome::Approved,
            Outcome::Equivalence,
            Outcome::Dispensed,
            Outcome::Failed
        ]
    );
}
