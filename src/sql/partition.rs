//! Splitting a position filter into per-unit sub-ranges.
//!
//! Entities with huge tables declare a [`PartitionUnit`]; their statement
//! is then issued once per sub-range so no single result set grows too big.

use chrono::{DateTime, Months, Utc};

use crate::model::{EntitySpec, Filter, FilterSet, PartitionUnit, PositionFilter};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// One filter set per sub-range of `entity`'s partition unit.
///
/// The first filter naming one of the entity's ids and bounding start and
/// finish on the same side is split; every other filter is kept as is.
/// Without a partition unit or such a filter, `filters` is returned alone.
pub fn partition(entity: &EntitySpec, filters: &FilterSet) -> Vec<FilterSet> {
    let Some(unit) = entity.partition_by else {
        return vec![filters.clone()];
    };

    let found = filters.iter().enumerate().find_map(|(i, f)| {
        let position = f.as_position()?;
        if !entity.overlaps(&position.prop_ids) {
            return None;
        }
        let (start, finish, side) = position.bounds_one_side()?;
        (start < finish).then_some((i, position, start, finish, side))
    });
    let Some((index, position, start, finish, side)) = found else {
        return vec![filters.clone()];
    };

    let mut sets = Vec::new();
    let mut lower = start;
    while lower < finish {
        // Past chrono's range the remainder becomes one final range.
        let next = step(lower, unit).unwrap_or(finish);
        // A step that does not advance would loop forever.
        if next <= lower {
            return vec![filters.clone()];
        }
        let upper = next.min(finish);
        let sub = PositionFilter {
            prop_ids: position.prop_ids.clone(),
            start: Some(lower),
            start_side: side,
            finish: Some(upper),
            finish_side: side,
        };
        sets.push(filters.replaced(index, Filter::Position(sub)));
        lower = upper;
    }

    if sets.is_empty() {
        vec![filters.clone()]
    } else {
        sets
    }
}

/// Position one unit after `from`, or `None` outside chrono's range.
fn step(from: i64, unit: PartitionUnit) -> Option<i64> {
    match unit {
        PartitionUnit::Hour => from.checked_add(HOUR_MS),
        PartitionUnit::Day => from.checked_add(DAY_MS),
        PartitionUnit::Week => from.checked_add(WEEK_MS),
        PartitionUnit::Month => add_months(from, 1),
        PartitionUnit::Year => add_months(from, 12),
    }
}

fn add_months(from: i64, months: u32) -> Option<i64> {
    let dt = DateTime::<Utc>::from_timestamp_millis(from)?;
    dt.checked_add_months(Months::new(months))
        .map(|d| d.timestamp_millis())
}
