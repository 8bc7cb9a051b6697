//! Complete statements rendered per dialect.

use std::collections::BTreeSet;

use sqlparser::dialect::{MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use strata::model::{
    ColumnSpec, EntityKind, EntitySpec, FilterSet, Order, PositionFilter, ReferenceSpec, Side,
};
use strata::sql::clause::TableRewrites;
use strata::sql::{Dialect, PositionFormat, QueryRequest, SqlOptions, StatementFactory};

const MARCH_1_2024: i64 = 1_709_251_200_000;

fn parses(sql: &str, dialect: Dialect) -> bool {
    let parser: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        // No parser for these; treat as accepted.
        Dialect::Oracle | Dialect::H2 => return true,
    };
    Parser::parse_sql(&*parser, sql).is_ok()
}

fn lab() -> EntitySpec {
    EntitySpec::new(
        "Lab",
        EntityKind::PrimitiveParameter,
        ["Glucose", "Sodium"],
        ColumnSpec::column("ehr", "labs", "keyid"),
        vec![ColumnSpec::column("ehr", "labs", "lab_id")],
    )
    .with_code(
        ColumnSpec::column("ehr", "labs", "test_code")
            .with_code("101", "Glucose")
            .with_code("102", "Sodium"),
    )
    .with_start(ColumnSpec::column("ehr", "labs", "taken_at"))
    .with_reference(ReferenceSpec {
        name: "encounter".into(),
        entity_name: "Encounter".into(),
        unique_id_specs: vec![ColumnSpec::column("ehr", "labs", "encounter_id")],
        cardinality: Default::default(),
    })
}

fn glucose_sql(dialect: Dialect) -> String {
    let options = SqlOptions::default();
    let rewrites = TableRewrites::new();
    let factory = StatementFactory::new(dialect, &options, &rewrites);
    let keys = vec!["K1".to_string()];
    let props = BTreeSet::from(["Glucose".to_string()]);
    let filters = FilterSet::new();
    let request = QueryRequest {
        key_ids: &keys,
        prop_ids: &props,
        filters: &filters,
        order: Order::Ascending,
    };
    let spec = lab();
    factory.main_select(&[&spec], &[], &request).unwrap().sql
}

#[test]
fn test_oracle_main_select() {
    insta::assert_snapshot!(glucose_sql(Dialect::Oracle), @"SELECT a1.keyid, a1.lab_id, a1.test_code, a1.taken_at FROM ehr.labs a1 WHERE a1.test_code = '101' AND a1.keyid IN ('K1') ORDER BY a1.taken_at ASC");
}

#[test]
fn test_postgres_main_select() {
    insta::assert_snapshot!(glucose_sql(Dialect::Postgres), @"SELECT a1.keyid, a1.lab_id, a1.test_code, a1.taken_at FROM ehr.labs AS a1 WHERE a1.test_code = '101' AND a1.keyid IN ('K1') ORDER BY a1.taken_at ASC");
}

#[test]
fn test_h2_main_select() {
    insta::assert_snapshot!(glucose_sql(Dialect::H2), @"SELECT a1.keyid, a1.lab_id, a1.test_code, a1.taken_at FROM ehr.labs AS a1 WHERE a1.test_code = '101' AND a1.keyid IN ('K1') ORDER BY a1.taken_at ASC");
}

#[test]
fn test_sqlite_main_select() {
    insta::assert_snapshot!(glucose_sql(Dialect::Sqlite), @"SELECT a1.keyid, a1.lab_id, a1.test_code, a1.taken_at FROM labs a1 WHERE a1.test_code = '101' AND a1.keyid IN ('K1') ORDER BY a1.taken_at ASC");
}

#[test]
fn test_every_dialect_parses() {
    for dialect in Dialect::ALL {
        let sql = glucose_sql(dialect);
        assert!(parses(&sql, dialect), "{} rejected: {}", dialect, sql);
    }
}

#[test]
fn test_oracle_chunks_2500_keys() {
    let options = SqlOptions {
        in_list_chunk_size: 5000,
        ..SqlOptions::default()
    };
    let rewrites = TableRewrites::new();
    let spec = EntitySpec::new(
        "Patient",
        EntityKind::Constant,
        ["Patient"],
        ColumnSpec::column("ehr", "patients", "keyid"),
        vec![ColumnSpec::column("ehr", "patients", "patient_id")],
    );
    let keys: Vec<String> = (0..2500).map(|i| format!("K{:04}", i)).collect();
    let props = BTreeSet::from(["Patient".to_string()]);
    let filters = FilterSet::new();
    let request = QueryRequest {
        key_ids: &keys,
        prop_ids: &props,
        filters: &filters,
        order: Order::Ascending,
    };

    let oracle = StatementFactory::new(Dialect::Oracle, &options, &rewrites)
        .main_select(&[&spec], &[], &request)
        .unwrap()
        .sql;
    let where_clause = &oracle[oracle.find("WHERE ").unwrap() + 6..];
    assert_eq!(where_clause.matches("IN (").count(), 3);
    assert_eq!(where_clause.matches(" OR ").count(), 2);
    assert!(where_clause.starts_with("(a1.keyid IN ('K0000'"));
    assert!(where_clause.ends_with("'K2499'))"));
    for group in where_clause.split(" OR ") {
        let values = group.matches('\'').count() / 2;
        assert!(values > 0 && values <= 1000, "group of {} values", values);
    }

    // Without a dialect limit the configured chunk size applies.
    let postgres = StatementFactory::new(Dialect::Postgres, &options, &rewrites)
        .main_select(&[&spec], &[], &request)
        .unwrap()
        .sql;
    assert_eq!(postgres.matches("IN (").count(), 1);
}

#[test]
fn test_native_positions() {
    let options = SqlOptions {
        position_format: PositionFormat::Native,
        ..SqlOptions::default()
    };
    let rewrites = TableRewrites::new();
    let spec = lab();
    let props = BTreeSet::from(["Glucose".to_string()]);
    let filters = FilterSet::new().with(PositionFilter::new(["Glucose"]).from(MARCH_1_2024, Side::Start));
    let request = QueryRequest {
        key_ids: &[],
        prop_ids: &props,
        filters: &filters,
        order: Order::Descending,
    };

    let render = |dialect| {
        StatementFactory::new(dialect, &options, &rewrites)
            .main_select(&[&spec], &[], &request)
            .unwrap()
            .sql
    };

    assert!(render(Dialect::Oracle)
        .contains("a1.taken_at >= TO_TIMESTAMP('2024-03-01 00:00:00', 'YYYY-MM-DD HH24:MI:SS')"));
    assert!(render(Dialect::TSql).contains("a1.taken_at >= CAST('2024-03-01 00:00:00' AS DATETIME2)"));
    assert!(render(Dialect::Postgres).contains("a1.taken_at >= TIMESTAMP '2024-03-01 00:00:00'"));
    assert!(render(Dialect::Sqlite).contains("a1.taken_at >= '2024-03-01 00:00:00'"));
    assert!(render(Dialect::Postgres).ends_with("ORDER BY a1.taken_at DESC"));
}

#[test]
fn test_reference_select() {
    let options = SqlOptions::default();
    let rewrites = TableRewrites::new();
    let factory = StatementFactory::new(Dialect::Oracle, &options, &rewrites);
    let spec = lab();
    let keys = vec!["K1".to_string()];
    let props = BTreeSet::from(["Glucose".to_string()]);
    let filters = FilterSet::new();
    let request = QueryRequest {
        key_ids: &keys,
        prop_ids: &props,
        filters: &filters,
        order: Order::Ascending,
    };

    let stmt = factory.reference_select(&spec, "encounter", &request).unwrap();
    assert_eq!(stmt.entity, "Lab");
    assert_eq!(stmt.reference, "encounter");
    assert!(stmt.sql.starts_with("SELECT a1.keyid, a1.lab_id, a1.encounter_id FROM ehr.labs a1"));
    assert!(stmt.sql.contains("a1.keyid IN ('K1')"));
    assert!(!stmt.sql.contains("ORDER BY"));

    assert!(factory.reference_select(&spec, "visit", &request).is_err());
}
