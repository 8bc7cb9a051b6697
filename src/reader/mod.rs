//! Reading propositions.
//!
//! [`PropositionReader::read_propositions`] drives one read end to end:
//!
//! ```text
//! select dialect -> stage (optional) -> per entity name, on the worker pool:
//!     per statement group and partition:
//!         main statement -> MainProcessor -> ResultCache
//!         reference statements (if rows arrived) -> ReferenceProcessor
//! -> drop staging -> collect per key id
//! ```
//!
//! Alternates sharing a name are read by one statement when their paths
//! line up, otherwise by one statement each. Statements of one name run in
//! sequence so their batches and generations never interleave.

mod error;

pub use error::ReadError;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{MemoryStore, PropositionStore, ResultCache, SqliteStore};
use crate::config::Settings;
use crate::db::{Cancellation, DataSource, RetryableExecutor};
use crate::generator::{GeneratorFactory, SqlGenerator};
use crate::model::{EntitySpec, FilterSet, Order, Proposition, ReferenceSpec, SchemaMapping};
use crate::processor::{MainProcessor, ReferenceProcessor};
use crate::sql::clause::TableRewrites;
use crate::sql::filters::participants;
use crate::sql::{compatible_alternates, partition, Dialect, QueryRequest, StatementFactory};
use crate::staging::{DataStager, StagedTables};

/// Alternates of one entity name, split into groups sharing a statement.
#[derive(Debug)]
struct EntityGroup<'m> {
    name: &'m str,
    statements: Vec<Vec<&'m EntitySpec>>,
}

fn entity_groups<'m>(mapping: &'m SchemaMapping, prop_ids: &BTreeSet<String>) -> Vec<EntityGroup<'m>> {
    let mut groups: Vec<EntityGroup<'m>> = Vec::new();
    for spec in mapping.entities_for_prop_ids(prop_ids) {
        let index = match groups.iter().position(|g| g.name == spec.name) {
            Some(i) => i,
            None => {
                groups.push(EntityGroup {
                    name: &spec.name,
                    statements: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[index];
        match group
            .statements
            .iter_mut()
            .find(|members| compatible_alternates(members[0], spec))
        {
            Some(members) => members.push(spec),
            None => group.statements.push(vec![spec]),
        }
    }
    groups
}

/// One rendered statement of a dry run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStatement {
    pub entity: String,
    /// Set for reference statements.
    pub reference: Option<String>,
    pub sql: String,
}

/// Everything a read would run, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadPlan {
    pub dialect: Dialect,
    pub staging: Vec<String>,
    pub statements: Vec<PlannedStatement>,
}

/// Reads propositions for a mapping from one data source.
#[derive(Clone)]
pub struct PropositionReader {
    mapping: Arc<SchemaMapping>,
    source: Arc<dyn DataSource>,
    settings: Settings,
}

impl std::fmt::Debug for PropositionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropositionReader")
            .field("entities", &self.mapping.entities.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PropositionReader {
    /// Validates the mapping and the settings.
    pub fn new(
        mapping: SchemaMapping,
        source: Arc<dyn DataSource>,
        settings: Settings,
    ) -> Result<Self, ReadError> {
        mapping.validate()?;
        settings.validate()?;
        Ok(Self {
            mapping: Arc::new(mapping),
            source,
            settings,
        })
    }

    pub fn mapping(&self) -> &Arc<SchemaMapping> {
        &self.mapping
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Propositions with any of `prop_ids` for `key_ids` (every key when
    /// empty), constrained by `filters`, sorted per key in `order`.
    pub async fn read_propositions(
        &self,
        key_ids: &[String],
        prop_ids: &BTreeSet<String>,
        filters: &FilterSet,
        order: Order,
    ) -> Result<BTreeMap<String, Vec<Proposition>>, ReadError> {
        self.read_propositions_with_cancellation(key_ids, prop_ids, filters, order, &Cancellation::new())
            .await
    }

    /// [`read_propositions`](Self::read_propositions), stopping when `cancel`
    /// fires or its deadline passes.
    pub async fn read_propositions_with_cancellation(
        &self,
        key_ids: &[String],
        prop_ids: &BTreeSet<String>,
        filters: &FilterSet,
        order: Order,
        cancel: &Cancellation,
    ) -> Result<BTreeMap<String, Vec<Proposition>>, ReadError> {
        let generator = self.select_generator().await?;
        let request = QueryRequest {
            key_ids,
            prop_ids,
            filters,
            order,
        };
        self.read_with(&generator, &request, cancel).await
    }

    /// The statements a read would run, without running them.
    pub async fn plan(
        &self,
        key_ids: &[String],
        prop_ids: &BTreeSet<String>,
        filters: &FilterSet,
        order: Order,
    ) -> Result<ReadPlan, ReadError> {
        let generator = self.select_generator().await?;
        self.render(
            &generator,
            &QueryRequest {
                key_ids,
                prop_ids,
                filters,
                order,
            },
        )
    }

    async fn select_generator(&self) -> Result<SqlGenerator, ReadError> {
        let factory = GeneratorFactory::from_settings(&self.settings)?;
        Ok(factory
            .select(self.source.as_ref(), Arc::clone(&self.mapping))
            .await?)
    }

    fn stages(&self) -> bool {
        self.settings.execution.staging && !self.mapping.staging.is_empty()
    }

    /// Render every statement of a read with `generator`.
    pub fn render(
        &self,
        generator: &SqlGenerator,
        request: &QueryRequest<'_>,
    ) -> Result<ReadPlan, ReadError> {
        self.warn_unknown(request.prop_ids);

        let mut rewrites = TableRewrites::new();
        let mut staging = Vec::new();
        if self.stages() {
            for plan in DataStager::new(generator).plan(request)? {
                rewrites.insert(&plan.spec.replaced, plan.view.clone());
                staging.extend(plan.statements);
            }
        }

        let factory = generator.statements(&rewrites);
        let mut statements = Vec::new();
        for group in entity_groups(&self.mapping, request.prop_ids) {
            for members in &group.statements {
                let primary = members[0];
                let participants = participants(primary, &self.mapping, request.filters);
                for filters in partition(primary, request.filters) {
                    let sub = QueryRequest {
                        filters: &filters,
                        ..*request
                    };
                    let main = factory.main_select(members, &participants, &sub)?;
                    statements.push(PlannedStatement {
                        entity: main.entity,
                        reference: None,
                        sql: main.sql,
                    });
                    for spec in members {
                        for reference in self.requested_references(spec, request.prop_ids) {
                            let stmt = factory.reference_select(spec, &reference.name, &sub)?;
                            statements.push(PlannedStatement {
                                entity: stmt.entity,
                                reference: Some(stmt.reference),
                                sql: stmt.sql,
                            });
                        }
                    }
                }
            }
        }

        Ok(ReadPlan {
            dialect: generator.dialect(),
            staging,
            statements,
        })
    }

    /// Run a read with an already selected generator.
    pub async fn read_with(
        &self,
        generator: &SqlGenerator,
        request: &QueryRequest<'_>,
        cancel: &Cancellation,
    ) -> Result<BTreeMap<String, Vec<Proposition>>, ReadError> {
        if self.settings.execution.skip_execution {
            let plan = self.render(generator, request)?;
            for ddl in &plan.staging {
                info!(dialect = %plan.dialect, sql = %ddl, "dry run: staging");
            }
            for statement in &plan.statements {
                info!(entity = %statement.entity, sql = %statement.sql, "dry run: statement");
            }
            return Ok(BTreeMap::new());
        }

        self.warn_unknown(request.prop_ids);
        let executor = RetryableExecutor::new(
            Arc::clone(&self.source),
            self.settings.retry_policy(),
            self.settings.query_options(),
        );
        let stager = DataStager::new(generator);
        let staged = if self.stages() {
            stager.stage(&executor, request).await?
        } else {
            StagedTables::default()
        };

        let outcome = self
            .run_groups(generator, &executor, &staged.rewrites, request, cancel)
            .await;

        if !staged.is_empty() {
            if let Err(e) = stager.drop_tables(&executor, &staged).await {
                if outcome.is_ok() {
                    return Err(e.into());
                }
                warn!(error = %e, "could not drop staging tables after a failed read");
            }
        }

        let cache = outcome?;
        let result = cache.collect(request.key_ids, request.prop_ids, request.order)?;
        info!(
            keys = result.len(),
            propositions = result.values().map(Vec::len).sum::<usize>(),
            "read complete"
        );
        Ok(result)
    }

    fn open_store(&self) -> Result<Arc<dyn PropositionStore>, ReadError> {
        if self.settings.cache.persistent {
            let store = SqliteStore::open_scratch(
                self.mapping.as_ref(),
                self.settings.cache.directory.as_deref(),
            )?;
            debug!(path = ?store.scratch_path(), "opened scratch store");
            Ok(Arc::new(store))
        } else {
            Ok(Arc::new(MemoryStore::new()))
        }
    }

    async fn run_groups(
        &self,
        generator: &SqlGenerator,
        executor: &RetryableExecutor,
        rewrites: &TableRewrites,
        request: &QueryRequest<'_>,
        cancel: &Cancellation,
    ) -> Result<ResultCache, ReadError> {
        let cache = ResultCache::new(self.open_store()?);
        let factory = generator.statements(rewrites);
        let groups = entity_groups(&self.mapping, request.prop_ids);
        info!(
            dialect = %generator.dialect(),
            groups = groups.len(),
            workers = self.settings.execution.workers,
            "reading propositions"
        );

        stream::iter(
            groups
                .iter()
                .map(|group| self.read_group(group, &factory, executor, &cache, request, cancel)),
        )
        .buffer_unordered(self.settings.execution.workers.max(1))
        .try_collect::<Vec<()>>()
        .await?;

        Ok(cache)
    }

    async fn read_group(
        &self,
        group: &EntityGroup<'_>,
        factory: &StatementFactory<'_>,
        executor: &RetryableExecutor,
        cache: &ResultCache,
        request: &QueryRequest<'_>,
        cancel: &Cancellation,
    ) -> Result<(), ReadError> {
        for members in &group.statements {
            let primary = members[0];
            let participants = participants(primary, &self.mapping, request.filters);
            let partitions = partition(primary, request.filters);
            if partitions.len() > 1 {
                debug!(entity = group.name, partitions = partitions.len(), "partitioned read");
            }

            for filters in &partitions {
                let sub = QueryRequest { filters, ..*request };
                let statement = factory.main_select(members, &participants, &sub)?;

                cache.start_generation(group.name);
                let mut processor = MainProcessor::new(
                    cache,
                    primary,
                    &statement.layout,
                    request.prop_ids,
                    self.settings.cache.main_flush_rows,
                );
                let rows = executor.execute(&statement.sql, &mut processor, cancel).await?;
                info!(
                    entity = group.name,
                    rows,
                    accepted = processor.accepted(),
                    skipped = processor.skipped(),
                    "main statement complete"
                );

                if !cache.latest_generation_has_rows(group.name) {
                    debug!(entity = group.name, "no rows; skipping reference statements");
                    continue;
                }

                for spec in members {
                    for reference in self.requested_references(spec, request.prop_ids) {
                        let statement = factory.reference_select(spec, &reference.name, &sub)?;
                        let mut processor = ReferenceProcessor::new(
                            cache,
                            group.name,
                            reference,
                            &statement.layout,
                            self.settings.cache.reference_flush_rows,
                        );
                        executor.execute(&statement.sql, &mut processor, cancel).await?;
                        debug!(
                            entity = group.name,
                            reference = %reference.name,
                            edges = processor.edges(),
                            "reference statement complete"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// References of `spec` whose target entity produces a requested id.
    fn requested_references<'s>(
        &'s self,
        spec: &'s EntitySpec,
        prop_ids: &'s BTreeSet<String>,
    ) -> impl Iterator<Item = &'s ReferenceSpec> + 's {
        spec.references.iter().filter(move |r| {
            self.mapping
                .alternates(&r.entity_name)
                .iter()
                .any(|target| target.overlaps(prop_ids))
        })
    }

    fn warn_unknown(&self, prop_ids: &BTreeSet<String>) {
        let known: BTreeSet<&str> = self
            .mapping
            .entities
            .iter()
            .flat_map(|e| e.prop_ids.iter().map(String::as_str))
            .collect();
        let unknown: Vec<&str> = prop_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !known.contains(id))
            .collect();
        if !unknown.is_empty() {
            warn!(?unknown, "no entity produces these proposition ids");
        }
    }
}
