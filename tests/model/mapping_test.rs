//! Loading and validating schema mappings.

use std::collections::BTreeSet;
use std::io::Write;

use strata::model::{
    Cardinality, EntityKind, JoinType, MappingError, Operator, PartitionUnit, SchemaMapping,
    TableRef, ValueType,
};

const EHR_MAPPING: &str = r#"
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
partition_by = "month"

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

[[entities.constraints]]
schema = "ehr"
table = "labs"
join = { join_type = "left_outer", from_key = "status_id", to_key = "status_id", next = { schema = "ehr", table = "statuses", column = "status", codes = { F = "final" } } }

[[staging]]
replaced = { schema = "ehr", table = "labs" }
area = { schema = "stage", table = "labs" }
entities = ["Lab"]
columns = [
    { name = "lab_id", unique = true },
    { name = "keyid" },
    { name = "taken_at" },
]
"#;

fn ehr() -> SchemaMapping {
    SchemaMapping::from_toml_str(EHR_MAPPING).unwrap()
}

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_toml_mapping_loads() {
    let mapping = ehr();
    mapping.validate().unwrap();
    assert_eq!(mapping.entities.len(), 3);

    let lab = mapping.entity_by_name("Lab").unwrap();
    assert_eq!(lab.kind, EntityKind::PrimitiveParameter);
    assert_eq!(lab.value_type, ValueType::Number);
    let code = lab.code_spec.as_ref().unwrap();
    assert_eq!(code.constraint, Some(Operator::EqualTo));
    assert_eq!(code.id_for_code("102"), Some("Sodium"));
    assert_eq!(lab.references[0].cardinality, Cardinality::One);

    let status = &lab.constraints[0];
    let join = status.join.as_ref().unwrap();
    assert_eq!(join.join_type, JoinType::LeftOuter);
    assert_eq!(status.terminal().column.as_deref(), Some("status"));

    let encounter = mapping.entity_by_name("Encounter").unwrap();
    assert_eq!(encounter.partition_by, Some(PartitionUnit::Month));

    assert_eq!(mapping.staging[0].area, TableRef::new("stage", "labs"));
    assert_eq!(mapping.staging[0].unique_column().unwrap().name, "lab_id");
}

#[test]
fn test_property_code_map_decodes() {
    let mapping = ehr();
    let sex = mapping.entity_by_name("Patient").unwrap().property("sex").unwrap();
    assert_eq!(
        sex.decode("F"),
        Some(strata::model::Value::Nominal("female".into()))
    );
}

#[test]
fn test_lookups() {
    let mapping = ehr();

    let order: Vec<&str> = mapping
        .entities_for_prop_ids(&ids(&["Glucose", "Encounter", "Patient"]))
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(order, vec!["Patient", "Encounter", "Lab"]);

    let referrers: Vec<&str> = mapping
        .inbound_references("Encounter")
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(referrers, vec!["Lab"]);

    assert!(mapping.staging_for("ehr", "labs").is_some());
    assert!(mapping.staging_for("ehr", "patients").is_none());

    let summary = mapping.summary();
    assert_eq!(summary[&EntityKind::Constant], vec!["Patient"]);
    assert_eq!(summary[&EntityKind::Event], vec!["Encounter"]);
}

#[test]
fn test_unknown_reference_target() {
    let mut mapping = ehr();
    mapping.entities.retain(|e| e.name != "Encounter");
    let err = mapping.validate().unwrap_err();
    assert!(matches!(err, MappingError::UnknownReference { ref target, .. } if target == "Encounter"));
}

#[test]
fn test_event_needs_both_bounds() {
    let mut mapping = ehr();
    for e in mapping.entities.iter_mut().filter(|e| e.name == "Encounter") {
        e.finish_spec = None;
    }
    let err = mapping.validate().unwrap_err();
    assert!(err.to_string().contains("events need start and finish paths"));
}

#[test]
fn test_staging_needs_one_unique_column() {
    let mut mapping = ehr();
    mapping.staging[0].columns[1].unique = true;
    let err = mapping.validate().unwrap_err();
    assert!(matches!(err, MappingError::InvalidStaging { .. }));
}

#[test]
fn test_staging_unknown_entity() {
    let mut mapping = ehr();
    mapping.staging[0].entities.push("Vital".into());
    let err = mapping.validate().unwrap_err();
    assert!(matches!(err, MappingError::UnknownStagedEntity { ref entity, .. } if entity == "Vital"));
}

#[test]
fn test_json_file_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.json");
    let json = serde_json::to_string_pretty(&ehr()).unwrap();
    std::fs::File::create(&path)
        .unwrap()
        .write_all(json.as_bytes())
        .unwrap();

    let loaded = SchemaMapping::from_file(&path).unwrap();
    assert_eq!(loaded, ehr());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = SchemaMapping::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, MappingError::FileNotFound { .. }));
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        r#"
[[entities]]
name = "Lab"
kind = "primitive_parameter"
prop_ids = ["Glucose"]
base_spec = { schema = "ehr", table = "labs", column = "keyid" }
unique_id_specs = []
"#,
    )
    .unwrap();
    let err = SchemaMapping::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("no unique id paths"));
}
