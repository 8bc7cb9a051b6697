//! Property tests for splitting position filters into sub-ranges.

use proptest::prelude::*;
use strata::model::{
    ColumnSpec, EntityKind, EntitySpec, FilterSet, PartitionUnit, PositionFilter,
    PropertyValueFilter, Side, Value, ValueComparator,
};
use strata::sql::partition;

const JAN_1_2020: i64 = 1_577_836_800_000;
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn vitals(unit: PartitionUnit) -> EntitySpec {
    EntitySpec::new(
        "Vital",
        EntityKind::PrimitiveParameter,
        ["HeartRate"],
        ColumnSpec::column("ehr", "vitals", "keyid"),
        vec![ColumnSpec::column("ehr", "vitals", "vital_id")],
    )
    .with_start(ColumnSpec::column("ehr", "vitals", "taken_at"))
    .partitioned_by(unit)
}

fn unit_strategy() -> impl Strategy<Value = PartitionUnit> {
    prop_oneof![
        Just(PartitionUnit::Hour),
        Just(PartitionUnit::Day),
        Just(PartitionUnit::Week),
        Just(PartitionUnit::Month),
        Just(PartitionUnit::Year),
    ]
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Start), Just(Side::Finish)]
}

fn ranges(sets: &[FilterSet]) -> Vec<(i64, i64, Side)> {
    sets.iter()
        .map(|set| {
            let p = set
                .iter()
                .find_map(|f| f.as_position())
                .expect("every set keeps a position filter");
            (p.start.unwrap(), p.finish.unwrap(), p.start_side)
        })
        .collect()
}

proptest! {
    #[test]
    fn sub_ranges_cover_bounds_exactly(
        unit in unit_strategy(),
        side in side_strategy(),
        offset in 0i64..(365 * DAY_MS),
        width in 1i64..(120 * DAY_MS),
    ) {
        let start = JAN_1_2020 + offset;
        let finish = start + width;
        let filters = FilterSet::new().with(
            PositionFilter::new(["HeartRate"]).from(start, side).until(finish, side),
        );

        let sets = partition(&vitals(unit), &filters);
        let ranges = ranges(&sets);

        prop_assert!(!ranges.is_empty());
        prop_assert_eq!(ranges[0].0, start);
        prop_assert_eq!(ranges[ranges.len() - 1].1, finish);
        for (lower, upper, s) in &ranges {
            prop_assert!(lower < upper);
            prop_assert_eq!(*s, side);
        }
        for pair in ranges.windows(2) {
            // Contiguous, sharing only the boundary.
            prop_assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn other_filters_survive_every_split(
        width in (2 * DAY_MS)..(30 * DAY_MS),
    ) {
        let unit_filter = PropertyValueFilter::new(
            ["HeartRate"],
            "unit",
            ValueComparator::EqualTo,
            vec![Value::Nominal("bpm".into())],
        );
        let filters = FilterSet::new()
            .with(unit_filter.clone())
            .with(PositionFilter::new(["HeartRate"]).from(JAN_1_2020, Side::Start).until(JAN_1_2020 + width, Side::Start));

        let sets = partition(&vitals(PartitionUnit::Day), &filters);
        prop_assert!(sets.len() >= 2);
        for set in &sets {
            prop_assert_eq!(set.len(), 2);
            prop_assert!(set.iter().any(|f| f.as_property_value() == Some(&unit_filter)));
        }
    }
}

#[test]
fn test_unpartitioned_entity_returns_filters_unchanged() {
    let spec = EntitySpec::new(
        "Vital",
        EntityKind::PrimitiveParameter,
        ["HeartRate"],
        ColumnSpec::column("ehr", "vitals", "keyid"),
        vec![ColumnSpec::column("ehr", "vitals", "vital_id")],
    );
    let filters = FilterSet::new().with(
        PositionFilter::new(["HeartRate"])
            .from(JAN_1_2020, Side::Start)
            .until(JAN_1_2020 + 10 * DAY_MS, Side::Start),
    );
    assert_eq!(partition(&spec, &filters), vec![filters]);
}

#[test]
fn test_open_ended_filter_not_split() {
    let filters = FilterSet::new().with(PositionFilter::new(["HeartRate"]).from(JAN_1_2020, Side::Start));
    assert_eq!(partition(&vitals(PartitionUnit::Day), &filters), vec![filters]);
}

#[test]
fn test_first_matching_filter_is_split() {
    let filters = FilterSet::new()
        .with(
            PositionFilter::new(["HeartRate"])
                .from(JAN_1_2020, Side::Start)
                .until(JAN_1_2020 + 2 * DAY_MS, Side::Start),
        )
        .with(
            PositionFilter::new(["HeartRate"])
                .from(JAN_1_2020, Side::Finish)
                .until(JAN_1_2020 + 5 * DAY_MS, Side::Finish),
        );
    let sets = partition(&vitals(PartitionUnit::Day), &filters);
    assert_eq!(sets.len(), 2);
    for set in &sets {
        let second = set.iter().nth(1).and_then(|f| f.as_position()).unwrap();
        assert_eq!(second.finish, Some(JAN_1_2020 + 5 * DAY_MS));
    }
}

#[test]
fn test_filter_for_other_entity_not_split() {
    let filters = FilterSet::new().with(
        PositionFilter::new(["Glucose"])
            .from(JAN_1_2020, Side::Start)
            .until(JAN_1_2020 + 10 * DAY_MS, Side::Start),
    );
    assert_eq!(partition(&vitals(PartitionUnit::Day), &filters).len(), 1);
}
