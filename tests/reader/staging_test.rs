//! Staging tables built, read through, and dropped on SQLite.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use strata::config::Settings;
use strata::db::{QueryOptions, RetryPolicy, RetryableExecutor, SqliteDataSource};
use strata::generator::SqlGenerator;
use strata::model::{FilterSet, Order, PositionFilter, SchemaMapping, Side, UniqueId};
use strata::sql::{Dialect, QueryRequest, SqlOptions};
use strata::staging::{DataStager, StagingError};
use strata::PropositionReader;

const ENTITIES: &str = r#"
[[entities]]
name = "Encounter"
kind = "event"
prop_ids = ["Encounter"]
base_spec = { schema = "ehr", table = "encounters", column = "keyid" }
unique_id_specs = [{ schema = "ehr", table = "encounters", column = "encounter_id" }]
start_spec = { schema = "ehr", table = "encounters", column = "admitted_at" }
finish_spec = { schema = "ehr", table = "encounters", column = "discharged_at" }

[[entities]]
name = "Lab"
kind = "primitive_parameter"
prop_ids = ["Glucose", "Sodium"]
value_type = "number"
base_spec = { schema = "ehr", table = "labs", column = "keyid" }
unique_id_specs = [{ schema = "ehr", table = "labs", column = "lab_id" }]
start_spec = { schema = "ehr", table = "labs", column = "taken_at" }
value_spec = { schema = "ehr", table = "labs", column = "result" }

[entities.code_spec]
schema = "ehr"
table = "labs"
column = "test_code"
constraint = "equal_to"
codes = { "101" = "Glucose", "102" = "Sodium" }

[[entities.references]]
name = "encounter"
entity_name = "Encounter"
cardinality = "one"
unique_id_specs = [{ schema = "ehr", table = "labs", column = "encounter_id" }]
"#;

const LAB_STAGING: &str = r#"
[[staging]]
replaced = { schema = "ehr", table = "labs" }
area = { schema = "stage", table = "staged_labs" }
entities = ["Lab"]
columns = [
    { name = "lab_id", unique = true },
    { name = "keyid" },
    { name = "test_code" },
    { name = "taken_at" },
    { name = "result" },
    { name = "encounter_id" },
]
"#;

const ENCOUNTER_STAGING: &str = r#"
[[staging]]
replaced = { schema = "ehr", table = "encounters" }
area = { schema = "stage", table = "staged_encounters" }
entities = ["Encounter"]
columns = [
    { name = "encounter_id", unique = true },
    { name = "keyid" },
    { name = "admitted_at" },
    { name = "discharged_at" },
]
"#;

fn mapping(staging: &str) -> SchemaMapping {
    SchemaMapping::from_toml_str(&format!("{}{}", ENTITIES, staging)).unwrap()
}

const SEED: &str = "
CREATE TABLE encounters (keyid TEXT, encounter_id TEXT, admitted_at INTEGER, discharged_at INTEGER);
INSERT INTO encounters VALUES ('P1', 'E1', 1000, 5000), ('P2', 'E2', 2000, 6000);

CREATE TABLE labs (lab_id INTEGER, keyid TEXT, test_code TEXT, taken_at INTEGER, result REAL, encounter_id TEXT);
INSERT INTO labs VALUES
    (1, 'P1', '101', 1500, 5.4, 'E1'),
    (2, 'P1', '102', 1600, 140, 'E1'),
    (3, 'P2', '101', 2500, 7.0, 'E2');
";

fn seeded(extra: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(SEED).unwrap();
    conn.execute_batch(extra).unwrap();
    (dir, path)
}

fn staged_objects(path: &Path) -> Vec<String> {
    let conn = rusqlite::Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE name LIKE 'staged_%' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

fn settings(staging: bool) -> Settings {
    let mut settings = Settings::default();
    settings.execution.forced_dialect = Some("sqlite".into());
    settings.execution.staging = staging;
    settings.retry.delay_ms = 1;
    settings
}

fn reader(path: &Path, staging: bool) -> PropositionReader {
    reader_for(path, LAB_STAGING, staging)
}

fn reader_for(path: &Path, staging_toml: &str, staging: bool) -> PropositionReader {
    PropositionReader::new(
        mapping(staging_toml),
        Arc::new(SqliteDataSource::new(path)),
        settings(staging),
    )
    .unwrap()
}

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_staged_read_matches_direct_read() {
    let (_dir, path) = seeded("");
    let request = ids(&["Glucose", "Sodium", "Encounter"]);

    let direct = reader(&path, false)
        .read_propositions(&[], &request, &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();
    let staged = reader(&path, true)
        .read_propositions(&[], &request, &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();

    assert_eq!(direct["P1"].len(), 3);
    assert_eq!(staged, direct);
    assert!(staged_objects(&path).is_empty(), "staging objects left behind");
}

#[tokio::test]
async fn test_referrer_filter_leaves_staged_referent_unbounded() {
    let (_dir, path) = seeded("");
    let request = ids(&["Glucose", "Encounter"]);
    let filters = FilterSet::new().with(PositionFilter::new(["Glucose"]).from(2400, Side::Start));

    let direct = reader_for(&path, ENCOUNTER_STAGING, false)
        .read_propositions(&[], &request, &filters, Order::Ascending)
        .await
        .unwrap();
    let staged = reader_for(&path, ENCOUNTER_STAGING, true)
        .read_propositions(&[], &request, &filters, Order::Ascending)
        .await
        .unwrap();

    assert_eq!(staged, direct);
    // Both encounters start before 2400 and are still read.
    let encounters: Vec<_> = staged
        .values()
        .flatten()
        .filter(|p| p.id == "Encounter")
        .map(|p| p.unique_id.clone())
        .collect();
    assert_eq!(
        encounters,
        vec![
            UniqueId::new("Encounter", vec!["E1".into()]),
            UniqueId::new("Encounter", vec!["E2".into()]),
        ]
    );
    assert!(staged["P2"].iter().any(|p| p.id == "Glucose"));
    assert!(staged_objects(&path).is_empty(), "staging objects left behind");
}

#[tokio::test]
async fn test_plan_reads_through_view() {
    let (_dir, path) = seeded("");
    let plan = reader(&path, true)
        .plan(&[], &ids(&["Glucose"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();

    assert!(plan.staging[0].starts_with("CREATE TABLE staged_labs_1 AS SELECT DISTINCT a1.lab_id"));
    assert_eq!(plan.staging[1], "ANALYZE staged_labs_1");
    assert_eq!(
        plan.staging[2],
        "CREATE UNIQUE INDEX staged_labs_1_uk ON staged_labs_1 (lab_id)"
    );
    assert!(plan.staging.last().unwrap().starts_with("CREATE VIEW staged_labs AS SELECT lab_id"));
    assert!(plan.statements[0].sql.contains("FROM staged_labs a1"));

    // Planning runs nothing.
    assert!(staged_objects(&path).is_empty());
}

#[tokio::test]
async fn test_stage_then_drop() {
    let (_dir, path) = seeded("");
    let source = Arc::new(SqliteDataSource::new(&path));
    let executor = RetryableExecutor::new(source, RetryPolicy::default(), QueryOptions::default());
    let mapping = Arc::new(mapping(LAB_STAGING));
    let generator = SqlGenerator::new(Dialect::Sqlite, mapping, SqlOptions::default());
    let stager = DataStager::new(&generator);

    let prop_ids = ids(&["Glucose"]);
    let filters = FilterSet::new();
    let request = QueryRequest {
        key_ids: &[],
        prop_ids: &prop_ids,
        filters: &filters,
        order: Order::Ascending,
    };

    let staged = stager.stage(&executor, &request).await.unwrap();
    assert_eq!(staged.tables.len(), 1);
    assert_eq!(staged.views.len(), 1);
    assert!(staged_objects(&path).contains(&"staged_labs".to_string()));
    assert!(staged_objects(&path).contains(&"staged_labs_1".to_string()));

    // Every lab row was copied, Sodium included.
    let copied: i64 = rusqlite::Connection::open(&path)
        .unwrap()
        .query_row("SELECT count(*) FROM staged_labs", [], |row| row.get(0))
        .unwrap();
    assert_eq!(copied, 3);

    stager.drop_tables(&executor, &staged).await.unwrap();
    assert!(staged_objects(&path).is_empty());
}

#[tokio::test]
async fn test_failed_staging_cleans_up() {
    // A second row for lab 1 breaks the unique index.
    let (_dir, path) = seeded("INSERT INTO labs VALUES (1, 'P1', '101', 1700, 5.0, 'E1');");

    let err = reader(&path, true)
        .read_propositions(&[], &ids(&["Glucose"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap_err();

    match err {
        strata::ReadError::Staging(StagingError::Ddl { statement, .. }) => {
            assert!(statement.starts_with("CREATE UNIQUE INDEX"));
        }
        other => panic!("expected a staging failure, got {:?}", other),
    }
    assert!(staged_objects(&path).is_empty());
}
