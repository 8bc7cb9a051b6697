//! strata CLI - render, check and run schema mappings
//!
//! Usage:
//!   strata sql <mapping> --prop-id <id>... [--key <id>...] [--dialect <dialect>]
//!   strata check <mapping>
//!   strata read <mapping> --prop-id <id>... [--key <id>...] [--database <file>]
//!
//! Examples:
//!   strata sql mappings/ehr.toml --prop-id Glucose --key K1 --dialect oracle
//!   strata check mappings/ehr.toml
//!   strata read mappings/ehr.toml --prop-id Glucose --database ehr.sqlite --order desc

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use strata::config::Settings;
use strata::db::{Cancellation, SqliteDataSource};
use strata::generator::SqlGenerator;
use strata::logging::init_logging;
use strata::model::{FilterSet, Order, PositionFilter, SchemaMapping, Side};
use strata::processor::decode::parse_datetime_millis;
use strata::reader::PropositionReader;
use strata::sql::{Dialect, QueryRequest};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "strata - compile entity-to-table mappings into SQL and read propositions")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to STRATA_CONFIG, ./strata.toml, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct RequestArgs {
    /// Proposition ids to read
    #[arg(short, long = "prop-id", required = true)]
    prop_ids: Vec<String>,

    /// Key ids to read (all keys if omitted)
    #[arg(short, long = "key")]
    keys: Vec<String>,

    /// Lower position bound (date, timestamp or epoch milliseconds)
    #[arg(long)]
    from: Option<String>,

    /// Upper position bound (date, timestamp or epoch milliseconds)
    #[arg(long)]
    until: Option<String>,

    /// Interval side the bounds apply to
    #[arg(long, default_value = "start")]
    side: SideArg,

    /// Sort order of each key's propositions
    #[arg(long, default_value = "asc")]
    order: OrderArg,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the statements of a read without running them
    Sql {
        /// Path to the mapping (.toml or .json)
        mapping: PathBuf,

        #[command(flatten)]
        request: RequestArgs,

        /// SQL dialect to generate (defaults to the configured forced dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// Validate a mapping
    Check {
        /// Path to the mapping (.toml or .json)
        mapping: PathBuf,
    },

    /// Read propositions from an SQLite database and print them as JSON
    Read {
        /// Path to the mapping (.toml or .json)
        mapping: PathBuf,

        #[command(flatten)]
        request: RequestArgs,

        /// SQLite database (defaults to [source] path in the settings)
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Oracle,
    Postgres,
    Tsql,
    Mysql,
    H2,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Oracle => Dialect::Oracle,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Tsql => Dialect::TSql,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::H2 => Dialect::H2,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SideArg {
    Start,
    Finish,
}

#[derive(Clone, ValueEnum)]
enum OrderArg {
    Asc,
    Desc,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output SQL with comments
    Verbose,
    /// Output the plan as JSON
    Json,
}

/// Parsed request arguments, owned so a `QueryRequest` can borrow them.
struct Request {
    key_ids: Vec<String>,
    prop_ids: BTreeSet<String>,
    filters: FilterSet,
    order: Order,
}

impl Request {
    fn from_args(args: RequestArgs) -> Result<Self, String> {
        let prop_ids: BTreeSet<String> = args.prop_ids.into_iter().collect();
        let side = match args.side {
            SideArg::Start => Side::Start,
            SideArg::Finish => Side::Finish,
        };
        let position = |raw: &str| {
            parse_datetime_millis(raw).ok_or_else(|| format!("Invalid position '{}'", raw))
        };

        let mut filters = FilterSet::new();
        if args.from.is_some() || args.until.is_some() {
            let mut filter = PositionFilter::new(prop_ids.iter().cloned());
            if let Some(from) = &args.from {
                filter = filter.from(position(from)?, side);
            }
            if let Some(until) = &args.until {
                filter = filter.until(position(until)?, side);
            }
            filters.push(filter);
        }

        Ok(Self {
            key_ids: args.keys,
            prop_ids,
            filters,
            order: match args.order {
                OrderArg::Asc => Order::Ascending,
                OrderArg::Desc => Order::Descending,
            },
        })
    }

    fn query(&self) -> QueryRequest<'_> {
        QueryRequest {
            key_ids: &self.key_ids,
            prop_ids: &self.prop_ids,
            filters: &self.filters,
            order: self.order,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Sql {
            mapping,
            request,
            dialect,
            output,
        } => cmd_sql(settings, mapping, request, dialect, output),
        Commands::Check { mapping } => cmd_check(mapping),
        Commands::Read {
            mapping,
            request,
            database,
        } => cmd_read(settings, mapping, request, database).await,
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, String> {
    let mut settings = match path {
        Some(path) => Settings::from_file(path).map_err(|e| e.to_string())?,
        None => return Settings::load().map_err(|e| e.to_string()),
    };
    settings.apply_env_overrides().map_err(|e| e.to_string())?;
    settings.validate().map_err(|e| e.to_string())?;
    Ok(settings)
}

fn load_mapping(path: &PathBuf) -> Result<SchemaMapping, ExitCode> {
    SchemaMapping::from_file(path).map_err(|e| {
        eprintln!("Error loading mapping '{}': {}", path.display(), e);
        ExitCode::FAILURE
    })
}

fn cmd_sql(
    settings: Settings,
    mapping_path: PathBuf,
    args: RequestArgs,
    dialect: Option<DialectArg>,
    output: OutputFormat,
) -> ExitCode {
    let mapping = match load_mapping(&mapping_path) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let request = match Request::from_args(args) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let dialect = match dialect.map(Dialect::from) {
        Some(d) => d,
        None => match settings.forced_dialect() {
            Ok(Some(d)) => d,
            Ok(None) => {
                eprintln!("Error: no dialect given; pass --dialect or set execution.forced_dialect");
                return ExitCode::FAILURE;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let options = settings.sql.options();
    // Rendering never opens the source.
    let source = Arc::new(SqliteDataSource::new(":memory:"));
    let reader = match PropositionReader::new(mapping, source, settings) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let generator = SqlGenerator::new(dialect, Arc::clone(reader.mapping()), options);

    let plan = match reader.render(&generator, &request.query()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match output {
        OutputFormat::Sql => {
            for ddl in &plan.staging {
                println!("{};", ddl);
            }
            for statement in &plan.statements {
                println!("{};", statement.sql);
            }
        }
        OutputFormat::Verbose => {
            println!("-- strata rendered SQL");
            println!("-- Mapping: {}", mapping_path.display());
            println!("-- Dialect: {}", plan.dialect);
            for ddl in &plan.staging {
                println!();
                println!("-- staging");
                println!("{};", ddl);
            }
            for statement in &plan.statements {
                println!();
                match &statement.reference {
                    Some(reference) => println!("-- {} -> {}", statement.entity, reference),
                    None => println!("-- {}", statement.entity),
                }
                println!("{};", statement.sql);
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(&plan) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}

fn cmd_check(mapping_path: PathBuf) -> ExitCode {
    let mapping = match load_mapping(&mapping_path) {
        Ok(m) => m,
        Err(code) => return code,
    };

    match mapping.validate() {
        Ok(()) => {
            println!("✓ {} is valid", mapping_path.display());
            for (kind, names) in mapping.summary() {
                println!("  {}: {}", kind.as_str(), names.join(", "));
            }
            if !mapping.staging.is_empty() {
                println!("  staging areas: {}", mapping.staging.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_read(
    settings: Settings,
    mapping_path: PathBuf,
    args: RequestArgs,
    database: Option<PathBuf>,
) -> ExitCode {
    let mapping = match load_mapping(&mapping_path) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let request = match Request::from_args(args) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let database = match database {
        Some(path) => path,
        None => match settings.source.resolved_path() {
            Ok(Some(path)) => path,
            Ok(None) => {
                eprintln!("Error: no database given; pass --database or set source.path");
                return ExitCode::FAILURE;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let source = Arc::new(SqliteDataSource::new(database));
    let reader = match PropositionReader::new(mapping, source, settings) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let query = request.query();
    let result = reader
        .read_propositions_with_cancellation(
            query.key_ids,
            query.prop_ids,
            query.filters,
            query.order,
            &Cancellation::new(),
        )
        .await;

    match result {
        Ok(propositions) => match serde_json::to_string_pretty(&propositions) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
