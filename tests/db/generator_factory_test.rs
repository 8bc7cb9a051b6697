//! Dialect selection against live and scripted data sources.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use strata::config::Settings;
use strata::db::{
    Cancellation, Connection, ConnectionInfo, DataSource, DbError, DbResult, QueryOptions,
    RowSink, SqliteDataSource,
};
use strata::generator::{GeneratorError, GeneratorFactory, GeneratorRegistry};
use strata::model::{ColumnSpec, EntityKind, EntitySpec, SchemaMapping};
use strata::sql::{Dialect, SqlOptions};

fn mapping() -> Arc<SchemaMapping> {
    Arc::new(SchemaMapping::new(vec![EntitySpec::new(
        "Patient",
        EntityKind::Constant,
        ["Patient"],
        ColumnSpec::column("ehr", "patients", "keyid"),
        vec![ColumnSpec::column("ehr", "patients", "patient_id")],
    )]))
}

/// Reports a fixed product and counts connections and driver loads.
struct ReportingSource {
    info: ConnectionInfo,
    drivers: Vec<&'static str>,
    connects: AtomicU32,
    driver_loads: AtomicU32,
}

impl ReportingSource {
    fn new(product: &str, version: &str, driver: &str, drivers: Vec<&'static str>) -> Self {
        Self {
            info: ConnectionInfo {
                driver_name: driver.into(),
                driver_version: "1".into(),
                product_name: product.into(),
                product_version: version.into(),
            },
            drivers,
            connects: AtomicU32::new(0),
            driver_loads: AtomicU32::new(0),
        }
    }
}

struct InfoOnly(ConnectionInfo);

#[async_trait]
impl Connection for InfoOnly {
    fn info(&self) -> &ConnectionInfo {
        &self.0
    }

    async fn query(
        &mut self,
        _sql: &str,
        _options: &QueryOptions,
        _sink: &mut dyn RowSink,
        _cancel: &Cancellation,
    ) -> DbResult<u64> {
        Ok(0)
    }

    async fn execute(&mut self, _sql: &str) -> DbResult<u64> {
        Ok(0)
    }
}

#[async_trait]
impl DataSource for ReportingSource {
    async fn connect(&self, _read_only: bool) -> DbResult<Box<dyn Connection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InfoOnly(self.info.clone())))
    }

    fn load_driver(&self, name: &str) -> DbResult<()> {
        self.driver_loads.fetch_add(1, Ordering::SeqCst);
        if self.drivers.contains(&name) {
            Ok(())
        } else {
            Err(DbError::DriverNotLoaded(name.into()))
        }
    }
}

#[tokio::test]
async fn test_sqlite_source_selects_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ehr.sqlite");
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE patients (keyid TEXT, patient_id TEXT);")
        .unwrap();
    let source = SqliteDataSource::new(&path);

    let factory = GeneratorFactory::new(GeneratorRegistry::builtin(), SqlOptions::default());
    let generator = factory.select(&source, mapping()).await.unwrap();
    assert_eq!(generator.dialect(), Dialect::Sqlite);
}

#[tokio::test]
async fn test_fresh_connection_per_candidate() {
    let source = ReportingSource::new("PostgreSQL", "15.4", "pgjdbc", vec![]);
    let factory = GeneratorFactory::new(GeneratorRegistry::builtin(), SqlOptions::default());

    let generator = factory.select(&source, mapping()).await.unwrap();
    assert_eq!(generator.dialect(), Dialect::Postgres);
    // Oracle's driver is missing so it is skipped without connecting.
    assert_eq!(source.connects.load(Ordering::SeqCst), 1);
    assert_eq!(source.driver_loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_registry_order_decides() {
    let source = ReportingSource::new("Oracle", "19.3", "Oracle JDBC", vec!["oracle"]);
    let registry = GeneratorRegistry::from_names(&["postgres", "oracle"]).unwrap();
    let factory = GeneratorFactory::new(registry, SqlOptions::default());

    let generator = factory.select(&source, mapping()).await.unwrap();
    assert_eq!(generator.dialect(), Dialect::Oracle);
    assert_eq!(source.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_no_compatible_generator() {
    let source = ReportingSource::new("Informix", "14.1", "ifx", vec![]);
    let factory = GeneratorFactory::new(GeneratorRegistry::builtin(), SqlOptions::default());

    let err = factory.select(&source, mapping()).await.unwrap_err();
    match err {
        GeneratorError::NoCompatibleGenerator { product, version, tried } => {
            assert_eq!(product, "Informix");
            assert_eq!(version, "14.1");
            assert!(tried.contains("postgres"));
        }
        other => panic!("expected NoCompatibleGenerator, got {:?}", other),
    }
}

#[tokio::test]
async fn test_forced_dialect_skips_detection() {
    let source = ReportingSource::new("Informix", "14.1", "ifx", vec![]);
    let factory = GeneratorFactory::new(GeneratorRegistry::builtin(), SqlOptions::default())
        .forced(Some(Dialect::MySql));

    let generator = factory.select(&source, mapping()).await.unwrap();
    assert_eq!(generator.dialect(), Dialect::MySql);
    assert_eq!(source.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_factory_from_settings() {
    let mut settings = Settings::default();
    settings.execution.forced_dialect = Some("tsql".into());
    settings.sql.in_list_chunk_size = 250;

    let source = ReportingSource::new("Informix", "14.1", "ifx", vec![]);
    let generator = GeneratorFactory::from_settings(&settings)
        .unwrap()
        .select(&source, mapping())
        .await
        .unwrap();
    assert_eq!(generator.dialect(), Dialect::TSql);
    assert_eq!(generator.options().in_list_chunk_size, 250);
}

#[test]
fn test_unknown_generator_name_is_discovery_failure() {
    let err = GeneratorRegistry::from_names(&["postgres", "db2"]).unwrap_err();
    assert!(matches!(err, GeneratorError::Discovery(_)));

    let mut settings = Settings::default();
    settings.sql.generators = vec!["db2".into()];
    assert!(matches!(
        GeneratorFactory::from_settings(&settings),
        Err(GeneratorError::Discovery(_))
    ));
}

#[test]
fn test_registry_dedups() {
    let registry = GeneratorRegistry::from_names(&["sqlite", "postgres", "sqlite"]).unwrap();
    assert_eq!(registry.dialects(), &[Dialect::Sqlite, Dialect::Postgres]);
    let empty: [&str; 0] = [];
    assert_eq!(GeneratorRegistry::from_names(&empty).unwrap(), GeneratorRegistry::builtin());
}
