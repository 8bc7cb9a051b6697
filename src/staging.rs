//! Staging tables.
//!
//! For each [`StagingSpec`] of the mapping, every contributing entity's rows
//! of the replaced base table are copied into `<area>_<n>`, indexed, and
//! merged by a union view named after the staging area. Statements rendered
//! afterwards read the view through the returned [`TableRewrites`].
//!
//! ```text
//! CREATE TABLE stage.labs_1 AS SELECT DISTINCT ... FROM ehr.labs a1 WHERE ...
//! ANALYZE stage.labs_1
//! CREATE UNIQUE INDEX labs_1_uk ON stage.labs_1 (lab_id)
//! CREATE INDEX labs_1_ix1 ON stage.labs_1 (keyid)
//! CREATE OR REPLACE VIEW stage.labs AS SELECT lab_id, keyid FROM stage.labs_1
//! ```
//!
//! DDL is never retried; the first failure stops staging.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{info, warn};

use crate::db::{DbError, RetryableExecutor};
use crate::generator::SqlGenerator;
use crate::model::{StagingSpec, TableRef};
use crate::sql::clause::TableRewrites;
use crate::sql::ddl::object_name;
use crate::sql::filters::{applicable_filters, staging_participants};
use crate::sql::{
    CreateIndex, CreateTableAs, CreateUnionView, DropTable, DropView, GatherStatistics,
    QueryRequest, SqlGenError,
};

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("staging area {area}: {source}")]
    Generation {
        area: String,
        #[source]
        source: SqlGenError,
    },

    #[error("staging area {area} declares no unique column")]
    NoUniqueColumn { area: String },

    #[error("staging area {area} has no contributing entity in the mapping")]
    NoEntities { area: String },

    #[error("staging statement failed: {statement}: {source}")]
    Ddl {
        statement: String,
        #[source]
        source: DbError,
    },
}

/// Rendered DDL of one staging area, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct StagingPlan {
    pub spec: StagingSpec,
    pub statements: Vec<String>,
    pub tables: Vec<TableRef>,
    /// Index into `statements` of each table's CREATE.
    pub creates: Vec<usize>,
    pub view: TableRef,
}

/// What staging created; pass it back to [`DataStager::drop_tables`].
#[derive(Debug, Clone, Default)]
pub struct StagedTables {
    pub tables: Vec<TableRef>,
    pub views: Vec<TableRef>,
    pub rewrites: TableRewrites,
}

impl StagedTables {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.views.is_empty()
    }
}

/// Builds and drops staging tables for one generator.
#[derive(Debug, Clone, Copy)]
pub struct DataStager<'a> {
    generator: &'a SqlGenerator,
}

impl<'a> DataStager<'a> {
    pub fn new(generator: &'a SqlGenerator) -> Self {
        Self { generator }
    }

    /// Render the DDL of every staging area without running it.
    pub fn plan(&self, request: &QueryRequest<'_>) -> Result<Vec<StagingPlan>, StagingError> {
        self.generator
            .mapping()
            .staging
            .iter()
            .map(|spec| self.plan_area(spec, request))
            .collect()
    }

    fn plan_area(
        &self,
        spec: &StagingSpec,
        request: &QueryRequest<'_>,
    ) -> Result<StagingPlan, StagingError> {
        let dialect = self.generator.dialect();
        let mapping = self.generator.mapping();
        let area = format!("{}.{}", spec.area.schema, spec.area.table);
        let unique = spec
            .unique_column()
            .ok_or_else(|| StagingError::NoUniqueColumn { area: area.clone() })?;

        let contributors: Vec<_> = spec
            .entities
            .iter()
            .flat_map(|name| mapping.alternates(name))
            .collect();
        if contributors.is_empty() {
            return Err(StagingError::NoEntities { area });
        }

        // Staging reads the base tables directly.
        let no_rewrites = TableRewrites::new();
        let statements_for = self.generator.statements(&no_rewrites);

        let mut statements = Vec::new();
        let mut tables = Vec::new();
        let mut creates = Vec::new();
        for (i, entity) in contributors.iter().enumerate() {
            let filters = applicable_filters(entity, mapping, request.filters, request.prop_ids);
            let participants = staging_participants(entity, mapping, &filters, request.prop_ids);
            // Every id of the entity: the staged table also serves referrers.
            let prop_ids: BTreeSet<String> = entity.prop_ids.iter().cloned().collect();
            let entity_request = QueryRequest {
                key_ids: request.key_ids,
                prop_ids: &prop_ids,
                filters: &filters,
                order: request.order,
            };
            let query = statements_for
                .staging_select(entity, &participants, spec, &entity_request)
                .map_err(|source| StagingError::Generation {
                    area: area.clone(),
                    source,
                })?;

            let name = object_name(dialect, &spec.area.table, &(i + 1).to_string());
            let schema = spec.area.schema.clone();

            creates.push(statements.len());
            statements.push(CreateTableAs::new(&schema, &name, query).to_sql(dialect));
            statements.push(GatherStatistics::new(&schema, &name).to_sql(dialect));
            statements.push(
                CreateIndex::new(object_name(dialect, &name, "uk"), &schema, &name)
                    .unique()
                    .column(&unique.name)
                    .to_sql(dialect),
            );
            for (n, column) in spec.secondary_columns().enumerate() {
                statements.push(
                    CreateIndex::new(
                        object_name(dialect, &name, &format!("ix{}", n + 1)),
                        &schema,
                        &name,
                    )
                    .column(&column.name)
                    .to_sql(dialect),
                );
            }
            tables.push(TableRef::new(schema, name));
        }

        let view = tables
            .iter()
            .fold(
                CreateUnionView::new(&spec.area.schema, &spec.area.table)
                    .or_replace()
                    .columns(spec.columns.iter().map(|c| c.name.clone())),
                |view, t| view.table(&t.schema, &t.table),
            )
            .to_sql(dialect);
        statements.push(view);

        Ok(StagingPlan {
            spec: spec.clone(),
            statements,
            tables,
            creates,
            view: spec.area.clone(),
        })
    }

    /// Run the DDL of every staging area.
    ///
    /// On failure the objects created so far are dropped before the error
    /// is returned.
    pub async fn stage(
        &self,
        executor: &RetryableExecutor,
        request: &QueryRequest<'_>,
    ) -> Result<StagedTables, StagingError> {
        let plans = self.plan(request)?;
        let mut staged = StagedTables::default();

        for plan in plans {
            info!(area = %plan.view.table, tables = plan.tables.len(), "staging");
            for (i, statement) in plan.statements.iter().enumerate() {
                if let Err(source) = executor.execute_ddl(statement).await {
                    let created = plan.creates.iter().filter(|&&at| at < i).count();
                    staged.tables.extend(plan.tables.iter().take(created).cloned());
                    self.drop_quietly(executor, &staged).await;
                    return Err(StagingError::Ddl {
                        statement: statement.clone(),
                        source,
                    });
                }
            }
            staged.tables.extend(plan.tables);
            staged.views.push(plan.view.clone());
            staged.rewrites.insert(&plan.spec.replaced, plan.view);
        }
        Ok(staged)
    }

    /// `DROP` statements undoing `staged`: views first, then tables.
    pub fn drop_statements(&self, staged: &StagedTables) -> Vec<String> {
        let dialect = self.generator.dialect();
        staged
            .views
            .iter()
            .rev()
            .map(|v| DropView::new(&v.schema, &v.table).to_sql(dialect))
            .chain(
                staged
                    .tables
                    .iter()
                    .rev()
                    .map(|t| DropTable::new(&t.schema, &t.table).to_sql(dialect)),
            )
            .collect()
    }

    /// Drop everything in `staged`, views first.
    pub async fn drop_tables(
        &self,
        executor: &RetryableExecutor,
        staged: &StagedTables,
    ) -> Result<(), StagingError> {
        for statement in self.drop_statements(staged) {
            executor
                .execute_ddl(&statement)
                .await
                .map_err(|source| StagingError::Ddl { statement, source })?;
        }
        info!(views = staged.views.len(), tables = staged.tables.len(), "dropped staging tables");
        Ok(())
    }

    async fn drop_quietly(&self, executor: &RetryableExecutor, staged: &StagedTables) {
        if let Err(e) = self.drop_tables(executor, staged).await {
            warn!(error = %e, "could not drop staging tables");
        }
    }
}
