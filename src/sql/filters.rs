//! Which filters and which other entities shape an entity's statement.

use std::collections::BTreeSet;

use crate::model::{EntitySpec, Filter, FilterSet, SchemaMapping};

/// Whether the code predicate is worth emitting.
///
/// With `qualifying = |query ∩ entity|`, it is emitted only when the request
/// covers less than `coverage` of the entity's ids and the list stays within
/// `max_in_clause` codes. Otherwise reading every row and dropping unwanted
/// ids is cheaper. Compared in basis points so exactly `coverage` is "not
/// less than".
pub fn needs_prop_id_in_clause(
    qualifying: usize,
    entity_total: usize,
    coverage: f64,
    max_in_clause: usize,
) -> bool {
    let threshold_bp = (coverage * 10_000.0).round() as u128;
    let below_coverage = (qualifying as u128) * 10_000 < threshold_bp * (entity_total as u128);
    below_coverage && qualifying <= max_in_clause
}

/// Requested ids the entity produces.
pub fn qualifying_ids(entity: &EntitySpec, query_ids: &BTreeSet<String>) -> BTreeSet<String> {
    entity
        .prop_ids
        .iter()
        .filter(|id| query_ids.contains(*id))
        .cloned()
        .collect()
}

/// Filters naming one of the entity's own ids.
pub fn direct_filters<'f>(entity: &EntitySpec, filters: &'f FilterSet) -> Vec<&'f Filter> {
    filters
        .iter()
        .filter(|f| entity.overlaps(f.prop_ids()))
        .collect()
}

/// Filters kept when staging `entity`: those naming its ids, plus those
/// naming the ids of a referrer taking part in the read (one producing a
/// `requested` id). Referrer filters only bound the staged rows through a
/// joined participant; see [`staging_participants`].
pub fn applicable_filters(
    entity: &EntitySpec,
    mapping: &SchemaMapping,
    filters: &FilterSet,
    requested: &BTreeSet<String>,
) -> FilterSet {
    let referrers: Vec<_> = mapping
        .inbound_references(&entity.name)
        .into_iter()
        .filter(|r| r.overlaps(requested))
        .collect();
    filters.retain_cloned(|f| {
        entity.overlaps(f.prop_ids()) || referrers.iter().any(|r| r.overlaps(f.prop_ids()))
    })
}

/// [`participants`] of a staging select, limited to referrers producing a
/// `requested` id.
pub fn staging_participants<'m>(
    entity: &EntitySpec,
    mapping: &'m SchemaMapping,
    filters: &FilterSet,
    requested: &BTreeSet<String>,
) -> Vec<&'m EntitySpec> {
    participants(entity, mapping, filters)
        .into_iter()
        .filter(|p| p.overlaps(requested))
        .collect()
}

/// Entities constraining `target`'s statement through filters on their own
/// ids: they reference `target`, a filter names them, and their key path
/// starts on the same table as `target`'s so both can be joined.
pub fn participants<'m>(
    target: &EntitySpec,
    mapping: &'m SchemaMapping,
    filters: &FilterSet,
) -> Vec<&'m EntitySpec> {
    let root = target.base_table();
    mapping
        .inbound_references(&target.name)
        .into_iter()
        .filter(|p| p.name != target.name)
        .filter(|p| p.base_table() == root)
        .filter(|p| filters.iter().any(|f| p.overlaps(f.prop_ids())))
        .collect()
}
