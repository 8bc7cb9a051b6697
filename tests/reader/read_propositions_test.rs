//! End-to-end reads against an SQLite database.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use strata::config::Settings;
use strata::db::{Cancellation, SqliteDataSource};
use strata::model::{
    FilterSet, Order, PositionFilter, Proposition, SchemaMapping, Side, UniqueId, Value,
};
use strata::{PropositionReader, ReadError};

const MAPPING: &str = r#"
[[entities]]
name = "Patient"
kind = "constant"
prop_ids = ["Patient"]
base_spec = { schema = "ehr", table = "patients", column = "keyid" }
unique_id_specs = [{ schema = "ehr", table = "patients", column = "patient_id" }]

[[entities.properties]]
name = "sex"
value_type = "nominal"
spec = { schema = "ehr", table = "patients", column = "sex", codes = { M = "male", F = "female" } }

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

const SEED: &str = "
CREATE TABLE patients (keyid TEXT, patient_id INTEGER, sex TEXT);
INSERT INTO patients VALUES ('P1', 1, 'F'), ('P2', 2, 'M');

CREATE TABLE encounters (keyid TEXT, encounter_id TEXT, admitted_at INTEGER, discharged_at INTEGER);
INSERT INTO encounters VALUES ('P1', 'E1', 1000, 5000), ('P2', 'E2', 2000, 6000);

CREATE TABLE labs (lab_id INTEGER, keyid TEXT, test_code TEXT, taken_at INTEGER, result REAL, encounter_id TEXT);
INSERT INTO labs VALUES
    (1, 'P1', '101', 1500, 5.4, 'E1'),
    (2, 'P1', '102', 1600, 140, 'E1'),
    (3, 'P1', '101', 1200, 6.1, 'E1'),
    (4, 'P2', '101', 2500, 7.0, 'E2'),
    (5, NULL, '101', 100, 1.0, NULL);
";

fn seed(path: &Path) {
    rusqlite::Connection::open(path)
        .unwrap()
        .execute_batch(SEED)
        .unwrap();
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.delay_ms = 1;
    settings
}

fn reader(path: &Path, settings: Settings) -> PropositionReader {
    let mapping = SchemaMapping::from_toml_str(MAPPING).unwrap();
    PropositionReader::new(mapping, Arc::new(SqliteDataSource::new(path)), settings).unwrap()
}

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn shape(props: &[Proposition]) -> Vec<(&str, Option<i64>)> {
    props.iter().map(|p| (p.id.as_str(), p.interval.start)).collect()
}

#[tokio::test]
async fn test_reads_every_key_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    seed(&path);

    let result = reader(&path, settings())
        .read_propositions(&[], &ids(&["Glucose", "Encounter"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();

    assert_eq!(result.keys().collect::<Vec<_>>(), vec!["P1", "P2"]);
    assert_eq!(
        shape(&result["P1"]),
        vec![("Encounter", Some(1000)), ("Glucose", Some(1200)), ("Glucose", Some(1500))]
    );
    assert_eq!(shape(&result["P2"]), vec![("Encounter", Some(2000)), ("Glucose", Some(2500))]);

    let glucose = &result["P1"][2];
    assert_eq!(glucose.unique_id, UniqueId::new("Lab", vec!["1".into()]));
    assert_eq!(glucose.value, Some(Value::Number(5.4)));
    assert_eq!(glucose.entity_spec, "Lab");
    assert_eq!(
        glucose.references_named("encounter"),
        &[UniqueId::new("Encounter", vec!["E1".into()])][..]
    );

    let encounter = &result["P1"][0];
    assert_eq!(encounter.interval.finish, Some(5000));
}

#[tokio::test]
async fn test_key_filter_and_descending_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    seed(&path);
    let reader = reader(&path, settings());

    let keys = vec!["P1".to_string(), "P9".to_string()];
    let result = reader
        .read_propositions(&keys, &ids(&["Glucose", "Sodium"]), &FilterSet::new(), Order::Descending)
        .await
        .unwrap();

    // Keys without propositions are left out.
    assert_eq!(result.len(), 1);
    assert_eq!(
        shape(&result["P1"]),
        vec![("Sodium", Some(1600)), ("Glucose", Some(1500)), ("Glucose", Some(1200))]
    );
}

#[tokio::test]
async fn test_position_filter_bounds_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    seed(&path);

    let filters = FilterSet::new().with(PositionFilter::new(["Glucose"]).from(1300, Side::Start));
    let result = reader(&path, settings())
        .read_propositions(&[], &ids(&["Glucose"]), &filters, Order::Ascending)
        .await
        .unwrap();

    assert_eq!(shape(&result["P1"]), vec![("Glucose", Some(1500))]);
    assert_eq!(shape(&result["P2"]), vec![("Glucose", Some(2500))]);
}

#[tokio::test]
async fn test_constant_properties_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    seed(&path);

    let result = reader(&path, settings())
        .read_propositions(&[], &ids(&["Patient"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();

    let p1 = &result["P1"][0];
    assert_eq!(p1.interval.start, None);
    assert_eq!(p1.properties["sex"], Value::Nominal("female".into()));
    assert_eq!(result["P2"][0].properties["sex"], Value::Nominal("male".into()));
}

#[tokio::test]
async fn test_forced_dialect_matches_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    seed(&path);

    let mut forced = settings();
    forced.execution.forced_dialect = Some("sqlite".into());
    forced.execution.workers = 1;
    forced.cache.main_flush_rows = 1;
    forced.cache.reference_flush_rows = 1;

    let request = ids(&["Glucose", "Encounter", "Patient"]);
    let detected = reader(&path, settings())
        .read_propositions(&[], &request, &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();
    let forced = reader(&path, forced)
        .read_propositions(&[], &request, &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();
    assert_eq!(detected, forced);
}

#[tokio::test]
async fn test_concurrent_persistent_reads_keep_separate_stores() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    seed(&path);
    let scratch = tempfile::tempdir().unwrap();

    let mut persistent = settings();
    persistent.cache.persistent = true;
    persistent.cache.directory = Some(scratch.path().to_path_buf());
    let shared = reader(&path, persistent);

    let all = ids(&["Glucose", "Sodium", "Encounter", "Patient"]);
    let glucose = ids(&["Glucose"]);
    let no_filters_all = FilterSet::new();
    let no_filters_glucose = FilterSet::new();
    let (everything, only_glucose) = tokio::join!(
        shared.read_propositions(&[], &all, &no_filters_all, Order::Ascending),
        shared.read_propositions(&[], &glucose, &no_filters_glucose, Order::Ascending),
    );
    let everything = everything.unwrap();
    let only_glucose = only_glucose.unwrap();

    let in_memory = reader(&path, settings())
        .read_propositions(&[], &all, &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();
    assert_eq!(everything, in_memory);
    assert_eq!(shape(&only_glucose["P1"]), vec![("Glucose", Some(1200)), ("Glucose", Some(1500))]);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0, "scratch stores left behind");
}

const PATTERN_MAPPING: &str = r#"
[[entities]]
name = "Result"
kind = "primitive_parameter"
prop_ids = ["Glucose", "Sodium"]
value_type = "number"
base_spec = { schema = "ehr", table = "results", column = "keyid" }
unique_id_specs = [{ schema = "ehr", table = "results", column = "result_id" }]
start_spec = { schema = "ehr", table = "results", column = "taken_at" }
value_spec = { schema = "ehr", table = "results", column = "amount" }

[entities.code_spec]
schema = "ehr"
table = "results"
column = "test_code"
constraint = "like"
codes = { "GLU%" = "Glucose", "NA%" = "Sodium" }
"#;

#[tokio::test]
async fn test_pattern_codes_resolved_per_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TABLE results (result_id INTEGER, keyid TEXT, test_code TEXT, taken_at INTEGER, amount REAL);
             INSERT INTO results VALUES
                 (1, 'P1', 'GLU-FAST', 100, 5.0),
                 (2, 'P1', 'NA-SER', 150, 140),
                 (3, 'P1', 'GLU-RAND', 200, 6.0),
                 (4, 'P2', 'K-SER', 120, 4.1),
                 (5, 'P2', 'NA-URN', 300, 60);",
        )
        .unwrap();
    let mapping = SchemaMapping::from_toml_str(PATTERN_MAPPING).unwrap();
    let reader = PropositionReader::new(mapping, Arc::new(SqliteDataSource::new(&path)), settings()).unwrap();

    let plan = reader
        .plan(&[], &ids(&["Glucose"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();
    assert!(plan.statements[0].sql.contains("CASE WHEN a1.test_code LIKE 'GLU%' THEN 'Glucose'"));
    assert!(plan.statements[0].sql.contains("WHERE a1.test_code LIKE 'GLU%'"));

    let glucose = reader
        .read_propositions(&[], &ids(&["Glucose"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();
    assert_eq!(glucose.len(), 1);
    assert_eq!(shape(&glucose["P1"]), vec![("Glucose", Some(100)), ("Glucose", Some(200))]);

    // Both ids requested: no pattern predicate, and the unmatched K-SER row
    // yields nothing.
    let both = reader
        .read_propositions(&[], &ids(&["Glucose", "Sodium"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();
    assert_eq!(
        shape(&both["P1"]),
        vec![("Glucose", Some(100)), ("Sodium", Some(150)), ("Glucose", Some(200))]
    );
    assert_eq!(shape(&both["P2"]), vec![("Sodium", Some(300))]);
    assert_eq!(both["P2"][0].value, Some(Value::Number(60.0)));
}

#[tokio::test]
async fn test_skip_execution_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    seed(&path);

    let mut settings = settings();
    settings.execution.skip_execution = true;
    let result = reader(&path, settings)
        .read_propositions(&[], &ids(&["Glucose"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_plan_lists_statements() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    seed(&path);

    let plan = reader(&path, settings())
        .plan(&[], &ids(&["Glucose", "Encounter"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap();

    assert_eq!(plan.dialect, strata::Dialect::Sqlite);
    assert!(plan.staging.is_empty());
    assert_eq!(plan.statements.len(), 3);

    let reference: Vec<_> = plan.statements.iter().filter(|s| s.reference.is_some()).collect();
    assert_eq!(reference.len(), 1);
    assert_eq!(reference[0].entity, "Lab");
    assert!(reference[0].sql.contains("a1.encounter_id"));
    assert!(plan
        .statements
        .iter()
        .any(|s| s.sql.contains("FROM labs a1") && s.reference.is_none()));
}

#[tokio::test]
async fn test_missing_table_is_an_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.sqlite");
    rusqlite::Connection::open(&path).unwrap();

    let mut settings = settings();
    settings.retry.attempts = 2;
    let err = reader(&path, settings)
        .read_propositions(&[], &ids(&["Glucose"]), &FilterSet::new(), Order::Ascending)
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::Execution(_)));
    assert!(!err.is_cancellation());
}

#[tokio::test]
async fn test_cancelled_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    seed(&path);

    let cancel = Cancellation::new();
    cancel.cancel();
    let err = reader(&path, settings())
        .read_propositions_with_cancellation(
            &[],
            &ids(&["Glucose"]),
            &FilterSet::new(),
            Order::Ascending,
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(err.is_cancellation());
}

#[test]
fn test_invalid_settings_rejected() {
    let mapping = SchemaMapping::from_toml_str(MAPPING).unwrap();
    let mut settings = settings();
    settings.execution.workers = 0;
    let err = PropositionReader::new(mapping, Arc::new(SqliteDataSource::new(":memory:")), settings)
        .unwrap_err();
    assert!(matches!(err, ReadError::Settings(_)));
}
