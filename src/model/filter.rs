//! Request filters restricting which rows are read.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::column::Operator;
use super::value::Value;

/// Which end of an interval a position bound applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Start,
    Finish,
}

fn default_finish_side() -> Side {
    Side::Finish
}

/// Bounds a proposition's interval by positions (epoch milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionFilter {
    pub prop_ids: BTreeSet<String>,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub start_side: Side,
    #[serde(default)]
    pub finish: Option<i64>,
    #[serde(default = "default_finish_side")]
    pub finish_side: Side,
}

impl PositionFilter {
    pub fn new(prop_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prop_ids: prop_ids.into_iter().map(Into::into).collect(),
            start: None,
            start_side: Side::Start,
            finish: None,
            finish_side: Side::Finish,
        }
    }

    /// Lower bound applied to the interval side `side`.
    pub fn from(mut self, position: i64, side: Side) -> Self {
        self.start = Some(position);
        self.start_side = side;
        self
    }

    /// Upper bound applied to the interval side `side`.
    pub fn until(mut self, position: i64, side: Side) -> Self {
        self.finish = Some(position);
        self.finish_side = side;
        self
    }

    /// Both bounds present and applied to the same side.
    pub fn bounds_one_side(&self) -> Option<(i64, i64, Side)> {
        match (self.start, self.finish) {
            (Some(start), Some(finish)) if self.start_side == self.finish_side => {
                Some((start, finish, self.start_side))
            }
            _ => None,
        }
    }
}

/// Comparator used by property-value filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueComparator {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    In,
    NotIn,
}

impl ValueComparator {
    /// The column constraint this comparator renders as.
    pub fn to_operator(self) -> Operator {
        match self {
            ValueComparator::EqualTo | ValueComparator::In => Operator::EqualTo,
            ValueComparator::NotEqualTo | ValueComparator::NotIn => Operator::NotEqualTo,
            ValueComparator::LessThan => Operator::LessThan,
            ValueComparator::LessThanOrEqualTo => Operator::LessThanOrEqualTo,
            ValueComparator::GreaterThan => Operator::GreaterThan,
            ValueComparator::GreaterThanOrEqualTo => Operator::GreaterThanOrEqualTo,
        }
    }
}

/// Restricts rows by the value of a named property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValueFilter {
    pub prop_ids: BTreeSet<String>,
    pub property: String,
    pub comparator: ValueComparator,
    pub values: Vec<Value>,
}

impl PropertyValueFilter {
    pub fn new(
        prop_ids: impl IntoIterator<Item = impl Into<String>>,
        property: impl Into<String>,
        comparator: ValueComparator,
        values: Vec<Value>,
    ) -> Self {
        Self {
            prop_ids: prop_ids.into_iter().map(Into::into).collect(),
            property: property.into(),
            comparator,
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum Filter {
    Position(PositionFilter),
    PropertyValue(PropertyValueFilter),
}

impl Filter {
    pub fn prop_ids(&self) -> &BTreeSet<String> {
        match self {
            Filter::Position(f) => &f.prop_ids,
            Filter::PropertyValue(f) => &f.prop_ids,
        }
    }

    pub fn as_position(&self) -> Option<&PositionFilter> {
        match self {
            Filter::Position(f) => Some(f),
            Filter::PropertyValue(_) => None,
        }
    }

    pub fn as_property_value(&self) -> Option<&PropertyValueFilter> {
        match self {
            Filter::PropertyValue(f) => Some(f),
            Filter::Position(_) => None,
        }
    }
}

impl From<PositionFilter> for Filter {
    fn from(f: PositionFilter) -> Self {
        Filter::Position(f)
    }
}

impl From<PropertyValueFilter> for Filter {
    fn from(f: PropertyValueFilter) -> Self {
        Filter::PropertyValue(f)
    }
}

/// Ordered list of filters attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: impl Into<Filter>) -> &mut Self {
        self.filters.push(filter.into());
        self
    }

    pub fn with(mut self, filter: impl Into<Filter>) -> Self {
        self.filters.push(filter.into());
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.filters.iter()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Replace the filter at `index`, returning the new set.
    pub fn replaced(&self, index: usize, filter: Filter) -> FilterSet {
        let mut filters = self.filters.clone();
        if let Some(slot) = filters.get_mut(index) {
            *slot = filter;
        }
        FilterSet { filters }
    }

    /// Keep only filters for which `keep` returns true.
    pub fn retain_cloned(&self, mut keep: impl FnMut(&Filter) -> bool) -> FilterSet {
        FilterSet {
            filters: self.filters.iter().filter(|f| keep(f)).cloned().collect(),
        }
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<T: IntoIterator<Item = Filter>>(iter: T) -> Self {
        FilterSet {
            filters: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FilterSet {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.filters.iter()
    }
}
