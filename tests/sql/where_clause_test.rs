//! WHERE clause rendering: the code predicate thresholds, filter order, and
//! how alternates and participants combine.

use std::collections::BTreeSet;

use strata::model::{
    ColumnSpec, EntityKind, EntitySpec, FilterSet, Order, PositionFilter, PropertySpec,
    PropertyValueFilter, Side, Value, ValueComparator, ValueType,
};
use strata::sql::clause::TableRewrites;
use strata::sql::{needs_prop_id_in_clause, Dialect, QueryRequest, SqlOptions, StatementFactory};

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
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
}

/// An entity mapping `n` codes `c<i>` to ids `P<i>`.
fn coded(n: usize) -> EntitySpec {
    let mut code = ColumnSpec::column("ehr", "obs", "code");
    for i in 0..n {
        code = code.with_code(format!("c{}", i), format!("P{}", i));
    }
    EntitySpec::new(
        "Obs",
        EntityKind::PrimitiveParameter,
        (0..n).map(|i| format!("P{}", i)),
        ColumnSpec::column("ehr", "obs", "keyid"),
        vec![ColumnSpec::column("ehr", "obs", "obs_id")],
    )
    .with_code(code)
}

fn main_sql(
    spec: &EntitySpec,
    dialect: Dialect,
    keys: &[String],
    props: &BTreeSet<String>,
    filters: &FilterSet,
) -> String {
    let options = SqlOptions::default();
    let rewrites = TableRewrites::new();
    let factory = StatementFactory::new(dialect, &options, &rewrites);
    let request = QueryRequest {
        key_ids: keys,
        prop_ids: props,
        filters,
        order: Order::Ascending,
    };
    factory.main_select(&[spec], &[], &request).unwrap().sql
}

#[test]
fn test_lab_glucose_for_one_key() {
    let sql = main_sql(
        &lab(),
        Dialect::Oracle,
        &["K1".to_string()],
        &ids(&["Glucose"]),
        &FilterSet::new(),
    );
    assert_eq!(
        sql,
        "SELECT a1.keyid, a1.lab_id, a1.test_code FROM ehr.labs a1 \
         WHERE a1.test_code = '101' AND a1.keyid IN ('K1')"
    );
}

#[test]
fn test_coverage_threshold_boundary() {
    // 17 of 20 is exactly 85%: not below the threshold.
    assert!(!needs_prop_id_in_clause(17, 20, 0.85, 2000));
    assert!(needs_prop_id_in_clause(16, 20, 0.85, 2000));
    assert!(!needs_prop_id_in_clause(20, 20, 0.85, 2000));
}

#[test]
fn test_in_clause_size_boundary() {
    assert!(needs_prop_id_in_clause(2000, 10_000, 0.85, 2000));
    assert!(!needs_prop_id_in_clause(2001, 10_000, 0.85, 2000));
}

#[test]
fn test_code_predicate_dropped_at_coverage() {
    let spec = coded(20);
    let seventeen: BTreeSet<String> = (0..17).map(|i| format!("P{}", i)).collect();
    let sql = main_sql(&spec, Dialect::Postgres, &[], &seventeen, &FilterSet::new());
    assert!(!sql.contains("WHERE"), "unexpected predicate in {}", sql);

    let sixteen: BTreeSet<String> = (0..16).map(|i| format!("P{}", i)).collect();
    let sql = main_sql(&spec, Dialect::Postgres, &[], &sixteen, &FilterSet::new());
    assert!(sql.contains("WHERE a1.code IN ("), "missing predicate in {}", sql);
}

#[test]
fn test_code_predicate_dropped_past_max_codes() {
    let spec = coded(10_000);
    let many: BTreeSet<String> = (0..2001).map(|i| format!("P{}", i)).collect();
    let sql = main_sql(&spec, Dialect::Postgres, &[], &many, &FilterSet::new());
    assert!(!sql.contains("WHERE"));
}

#[test]
fn test_threshold_options_are_overridable() {
    let spec = coded(20);
    let options = SqlOptions {
        prop_id_coverage: 0.9,
        ..SqlOptions::default()
    };
    let rewrites = TableRewrites::new();
    let factory = StatementFactory::new(Dialect::Postgres, &options, &rewrites);
    let props: BTreeSet<String> = (0..17).map(|i| format!("P{}", i)).collect();
    let filters = FilterSet::new();
    let request = QueryRequest {
        key_ids: &[],
        prop_ids: &props,
        filters: &filters,
        order: Order::Ascending,
    };
    let sql = factory.main_select(&[&spec], &[], &request).unwrap().sql;
    assert!(sql.contains("WHERE a1.code IN ("));
}

#[test]
fn test_predicate_order() {
    let spec = lab()
        .with_start(ColumnSpec::column("ehr", "labs", "taken_at"))
        .with_finish(ColumnSpec::column("ehr", "labs", "resulted_at"))
        .with_property(PropertySpec::new(
            "unit",
            ColumnSpec::column("ehr", "labs", "unit"),
            ValueType::Nominal,
        ))
        .with_constraint(
            ColumnSpec::column("ehr", "labs", "status")
                .with_code("F", "final"),
        );
    let filters = FilterSet::new()
        .with(
            PositionFilter::new(["Glucose"])
                .from(100, Side::Start)
                .until(200, Side::Finish),
        )
        .with(PropertyValueFilter::new(
            ["Glucose"],
            "unit",
            ValueComparator::EqualTo,
            vec![Value::Nominal("mg/dL".into())],
        ));
    let sql = main_sql(
        &spec,
        Dialect::Postgres,
        &["K1".to_string(), "K2".to_string()],
        &ids(&["Glucose"]),
        &filters,
    );
    let where_clause = &sql[sql.find("WHERE").unwrap()..sql.find(" ORDER BY").unwrap()];
    assert_eq!(
        where_clause,
        "WHERE a1.taken_at >= 100 AND a1.resulted_at <= 200 AND a1.status = 'F' \
         AND a1.unit = 'mg/dL' AND a1.test_code = '101' AND a1.keyid IN ('K1', 'K2')"
    );
}

#[test]
fn test_filter_on_other_ids_ignored() {
    let spec = lab().with_start(ColumnSpec::column("ehr", "labs", "taken_at"));
    let filters = FilterSet::new().with(PositionFilter::new(["Heartbeat"]).from(100, Side::Start));
    let sql = main_sql(&spec, Dialect::Postgres, &[], &ids(&["Glucose"]), &filters);
    assert!(!sql.contains(">= 100"));
}

/// Second mapping of `Lab` reading another code system from the same column.
fn lab_local_codes() -> EntitySpec {
    EntitySpec::new(
        "Lab",
        EntityKind::PrimitiveParameter,
        ["Glucose", "Sodium"],
        ColumnSpec::column("ehr", "labs", "keyid"),
        vec![ColumnSpec::column("ehr", "labs", "lab_id")],
    )
    .with_code(
        ColumnSpec::column("ehr", "labs", "test_code")
            .with_code("201", "Glucose")
            .with_code("202", "Sodium"),
    )
}

/// Orders live on the lab rows.
fn order() -> EntitySpec {
    EntitySpec::new(
        "Order",
        EntityKind::Event,
        ["Order"],
        ColumnSpec::column("ehr", "labs", "keyid"),
        vec![ColumnSpec::column("ehr", "labs", "order_id")],
    )
    .with_start(ColumnSpec::column("ehr", "labs", "ordered_at"))
}

fn group_sql(
    targets: &[&EntitySpec],
    participants: &[&EntitySpec],
    keys: &[String],
    props: &BTreeSet<String>,
    filters: &FilterSet,
) -> String {
    let options = SqlOptions::default();
    let rewrites = TableRewrites::new();
    let factory = StatementFactory::new(Dialect::Postgres, &options, &rewrites);
    let request = QueryRequest {
        key_ids: keys,
        prop_ids: props,
        filters,
        order: Order::Ascending,
    };
    factory.main_select(targets, participants, &request).unwrap().sql
}

#[test]
fn test_alternates_or_participants_and() {
    let (a, b, order) = (lab(), lab_local_codes(), order());
    let filters = FilterSet::new().with(PositionFilter::new(["Order"]).from(50, Side::Start));
    let sql = group_sql(&[&a, &b], &[&order], &[], &ids(&["Glucose"]), &filters);
    insta::assert_snapshot!(sql, @"SELECT a1.keyid, a1.lab_id, a1.test_code FROM ehr.labs AS a1 WHERE (a1.test_code = '101' OR a1.test_code = '201') AND a1.ordered_at >= 50");
}

#[test]
fn test_alternate_with_several_predicates_parenthesized() {
    let a = lab().with_constraint(ColumnSpec::column("ehr", "labs", "status").with_code("F", "final"));
    let b = lab_local_codes();
    let sql = group_sql(&[&a, &b], &[], &["K1".to_string()], &ids(&["Sodium"]), &FilterSet::new());
    insta::assert_snapshot!(sql, @"SELECT a1.keyid, a1.lab_id, a1.test_code FROM ehr.labs AS a1 WHERE ((a1.status = 'F' AND a1.test_code = '102') OR a1.test_code = '202') AND a1.keyid IN ('K1')");
}

#[test]
fn test_unrestricted_alternate_drops_group() {
    // Every id of this mapping is requested, so it needs no code predicate
    // and admits every row of the shared table.
    let glucose_only = EntitySpec::new(
        "Lab",
        EntityKind::PrimitiveParameter,
        ["Glucose"],
        ColumnSpec::column("ehr", "labs", "keyid"),
        vec![ColumnSpec::column("ehr", "labs", "lab_id")],
    )
    .with_code(ColumnSpec::column("ehr", "labs", "test_code").with_code("301", "Glucose"));
    let a = lab();

    let sql = group_sql(&[&a, &glucose_only], &[], &[], &ids(&["Glucose"]), &FilterSet::new());
    assert!(!sql.contains("WHERE"), "unexpected predicate in {}", sql);

    let sql = group_sql(&[&a, &glucose_only], &[], &["K1".to_string()], &ids(&["Glucose"]), &FilterSet::new());
    assert!(sql.ends_with("WHERE a1.keyid IN ('K1')"));
}
