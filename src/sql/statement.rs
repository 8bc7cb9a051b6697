//! Complete statements: main selects, reference selects and staging selects.

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{EntitySpec, StagingSpec};
use crate::sql::alias::TableAliaser;
use crate::sql::clause::{
    build_from, build_order_by, build_where, main_columns, predicate, reference_columns,
    EntityFilters, ReferenceLayout, SelectLayout, TableRewrites, WhereContext,
};
use crate::sql::dialect::Dialect;
use crate::sql::error::{SqlGenError, SqlGenResult};
use crate::sql::filters::direct_filters;
use crate::sql::info::{path_shape, ColumnSpecInfo, Role};
use crate::sql::token::{Token, TokenStream};
use crate::sql::{QueryRequest, SqlOptions};

/// A rendered main statement and how to read its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub sql: String,
    pub layout: SelectLayout,
    /// Entity name shared by the statement's targets.
    pub entity: String,
}

/// A rendered reference statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceStatement {
    pub sql: String,
    pub layout: ReferenceLayout,
    pub entity: String,
    pub reference: String,
}

/// Renders statements for one dialect.
#[derive(Debug, Clone)]
pub struct StatementFactory<'a> {
    dialect: Dialect,
    options: &'a SqlOptions,
    rewrites: &'a TableRewrites,
}

impl<'a> StatementFactory<'a> {
    pub fn new(dialect: Dialect, options: &'a SqlOptions, rewrites: &'a TableRewrites) -> Self {
        Self {
            dialect,
            options,
            rewrites,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// `SELECT <layout> FROM ... [WHERE ...] [ORDER BY ...]` for a group of
    /// alternates, constrained by the participants' filters.
    pub fn main_select(
        &self,
        targets: &[&EntitySpec],
        participants: &[&EntitySpec],
        request: &QueryRequest<'_>,
    ) -> SqlGenResult<SelectStatement> {
        let info = ColumnSpecInfo::build(targets, participants, None)?;
        let aliases = TableAliaser::assign(&info);

        let (columns, layout) = main_columns(&info, &aliases, self.dialect)?;
        let from = build_from(&info, &aliases, self.rewrites, self.dialect)?;
        let per_entity = self.entity_filters(&info, request);
        let where_clause = build_where(&info, &aliases, &per_entity, request.key_ids, &self.where_context());
        let order_by = build_order_by(&info, &aliases, request.order);

        let sql = assemble(false, columns, &from, &where_clause, &order_by).serialize(self.dialect);
        debug!(entity = %info.primary().spec.name, dialect = %self.dialect, %sql, "rendered main statement");

        Ok(SelectStatement {
            sql,
            layout,
            entity: info.primary().spec.name.clone(),
        })
    }

    /// Owner unique ids paired with the unique ids of the entity that
    /// `reference` points at.
    pub fn reference_select(
        &self,
        owner: &EntitySpec,
        reference: &str,
        request: &QueryRequest<'_>,
    ) -> SqlGenResult<ReferenceStatement> {
        let info = ColumnSpecInfo::build(&[owner], &[], Some(reference))?;
        let aliases = TableAliaser::assign(&info);

        let (columns, layout) = reference_columns(&info, &aliases)?;
        let from = build_from(&info, &aliases, self.rewrites, self.dialect)?;
        let per_entity = self.entity_filters(&info, request);
        let where_clause = build_where(&info, &aliases, &per_entity, request.key_ids, &self.where_context());

        let sql = assemble(false, columns, &from, &where_clause, &TokenStream::new())
            .serialize(self.dialect);
        debug!(entity = %owner.name, reference, %sql, "rendered reference statement");

        Ok(ReferenceStatement {
            sql,
            layout,
            entity: owner.name.clone(),
            reference: reference.to_string(),
        })
    }

    /// `SELECT DISTINCT` of the staged columns of `staging.replaced`, as
    /// reached along `entity`'s paths.
    ///
    /// Bounds apply to the columns of the entity their filter names:
    /// `entity`'s own filters to its paths, a referrer's filters to the
    /// joined `participants`. A referrer that cannot be joined leaves the
    /// staged rows unbounded by its filters.
    pub fn staging_select(
        &self,
        entity: &EntitySpec,
        participants: &[&EntitySpec],
        staging: &StagingSpec,
        request: &QueryRequest<'_>,
    ) -> SqlGenResult<TokenStream> {
        let info = ColumnSpecInfo::build(&[entity], participants, None)?;
        let aliases = TableAliaser::assign(&info);

        let replaced = &staging.replaced;
        let node = info
            .first_node_on(&replaced.schema, &replaced.table)
            .ok_or_else(|| SqlGenError::StagedTableNotOnPath {
                schema: replaced.schema.clone(),
                table: replaced.table.clone(),
                entity: entity.name.clone(),
            })?;
        let alias = aliases.alias(node);
        let columns = staging
            .columns
            .iter()
            .map(|c| {
                let mut ts = TokenStream::new();
                ts.column(&alias, &c.name);
                ts
            })
            .collect();

        // Staging reads the base tables, never earlier staging views.
        let from = build_from(&info, &aliases, &TableRewrites::new(), self.dialect)?;
        let per_entity = self.entity_filters(&info, request);
        let where_clause = build_where(&info, &aliases, &per_entity, request.key_ids, &self.where_context());

        Ok(assemble(true, columns, &from, &where_clause, &TokenStream::new()))
    }

    fn where_context(&self) -> WhereContext<'a> {
        WhereContext::new(
            self.options,
            predicate::chunk_size(self.dialect, self.options.in_list_chunk_size),
        )
    }

    /// Filters and query ids per entity: targets use the request's ids,
    /// participants the ids their filters name.
    fn entity_filters<'r>(
        &self,
        info: &ColumnSpecInfo<'_>,
        request: &QueryRequest<'r>,
    ) -> Vec<EntityFilters<'r>> {
        info.entities()
            .iter()
            .map(|ec| {
                let filters = direct_filters(ec.spec, request.filters);
                let query_ids = match ec.role {
                    Role::Target => request.prop_ids.clone(),
                    Role::Participant => filters
                        .iter()
                        .flat_map(|f| f.prop_ids().iter().cloned())
                        .collect::<BTreeSet<_>>(),
                };
                EntityFilters { filters, query_ids }
            })
            .collect()
    }
}

fn assemble(
    distinct: bool,
    columns: Vec<TokenStream>,
    from: &TokenStream,
    where_clause: &TokenStream,
    order_by: &TokenStream,
) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Select).space();
    if distinct {
        ts.push(Token::Distinct).space();
    }
    ts.append(&TokenStream::comma_separated(columns))
        .space()
        .append(from);
    for clause in [where_clause, order_by] {
        if !clause.is_empty() {
            ts.space().append(clause);
        }
    }
    ts
}

/// Whether two alternates read every select-list slot through the same
/// paths and can therefore share one statement.
pub fn compatible_alternates(a: &EntitySpec, b: &EntitySpec) -> bool {
    fn shapes<'s>(
        paths: impl IntoIterator<Item = Option<&'s crate::model::ColumnSpec>>,
    ) -> Vec<Option<(crate::sql::info::TablePathKey, Option<String>)>> {
        paths.into_iter().map(|p| p.map(path_shape)).collect()
    }

    let slots = |e: &EntitySpec| {
        let mut paths = vec![Some(&e.base_spec)];
        paths.extend(e.unique_id_specs.iter().map(Some));
        paths.push(e.code_spec.as_ref());
        paths.push(e.start_spec.as_ref());
        paths.push(e.finish_spec.as_ref());
        paths.push(e.value_spec.as_ref());
        paths.extend(e.properties.iter().map(|p| Some(&p.spec)));
        shapes(paths)
    };

    let code_kind = |e: &EntitySpec| e.code_spec.as_ref().map(|c| c.terminal().constraint);
    let property_names = |e: &EntitySpec| e.properties.iter().map(|p| p.name.clone()).collect::<Vec<_>>();

    a.unique_id_specs.len() == b.unique_id_specs.len()
        && property_names(a) == property_names(b)
        && code_kind(a) == code_kind(b)
        && slots(a) == slots(b)
}
