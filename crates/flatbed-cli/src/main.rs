mod config;

use config::{ConfigError, Overrides, Settings};
use facet::Facet;
use figue as args;
use flatbed::{
    Change, PgGateway, RecoverableError, ReconcileReport, ReconciliationPlan, SchemaTree,
    TableDescriptor,
};
use owo_colors::OwoColorize;
use std::error::Error;
use tracing_subscriber::EnvFilter;

/// Reconcile a Postgres database with a hierarchical schema.
#[derive(Facet, Debug)]
struct Cli {
    /// Show version information
    #[facet(args::named, args::short = 'V')]
    version: bool,

    /// Command to run
    #[facet(default, args::subcommand)]
    command: Option<Commands>,
}

/// Available commands
#[derive(Facet, Debug)]
#[repr(u8)]
enum Commands {
    /// Create missing tables, columns and foreign keys
    Migrate {
        /// Database connection URL
        #[facet(default, args::named)]
        database_url: Option<String>,

        /// Path to the schema document
        #[facet(default, args::named)]
        schema: Option<String>,
    },
    /// Show what migrate would change, without changing anything
    Plan {
        /// Database connection URL
        #[facet(default, args::named)]
        database_url: Option<String>,

        /// Path to the schema document
        #[facet(default, args::named)]
        schema: Option<String>,

        /// Print the SQL statements
        #[facet(args::named)]
        sql: bool,
    },
    /// Print the tables the schema flattens to
    Tables {
        /// Path to the schema document
        #[facet(default, args::named)]
        schema: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args_ref: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

    let result: Result<Cli, _> = args::from_slice(&args_ref);

    match result {
        Ok(cli) => {
            init_tracing();
            if let Err(e) = run(cli).await {
                eprintln!("{} {}", "error:".red().bold(), e);
                std::process::exit(1);
            }
        }
        Err(err) if err.is_help_request() => {
            print!("{}", err.help_text().unwrap_or(""));
        }
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flatbed=info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if cli.version {
        println!("flatbed {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    match cli.command {
        Some(Commands::Migrate {
            database_url,
            schema,
        }) => {
            let settings = settings(database_url, schema)?;
            let url = settings.require_database_url()?;
            println!("flatbed migrate");
            println!("  database: {}", mask_password(url).dimmed());
            println!("  schema:   {}", settings.schema.display().dimmed());
            println!();

            let tables = load_tables(&settings)?;
            let gateway = PgGateway::connect(url, settings.connect_timeout).await?;
            let report =
                flatbed::reconcile_and_close(gateway, &tables, &settings.skip_constraints).await?;
            print_report(&report);
        }
        Some(Commands::Plan {
            database_url,
            schema,
            sql,
        }) => {
            let settings = settings(database_url, schema)?;
            let url = settings.require_database_url()?;
            println!("flatbed plan");
            println!("  database: {}", mask_password(url).dimmed());
            println!();

            let tables = load_tables(&settings)?;
            let gateway = PgGateway::connect(url, settings.connect_timeout).await?;
            let plan = flatbed::plan_and_close(gateway, &tables, &settings.skip_constraints).await?;
            print_plan(&plan, sql);
        }
        Some(Commands::Tables { schema }) => {
            let settings = settings(None, schema)?;
            let tables = load_tables(&settings)?;
            print_tables(&tables);
        }
        None => {
            let config = args::HelpConfig {
                program_name: Some("flatbed".to_string()),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
                ..Default::default()
            };
            print!("{}", args::generate_help::<Cli>(&config));
        }
    }

    Ok(())
}

fn settings(database_url: Option<String>, schema: Option<String>) -> Result<Settings, ConfigError> {
    // A missing .env is not an error.
    let _ = dotenvy::dotenv();
    let settings = Settings::resolve(Overrides {
        schema,
        database_url,
        env_database_url: std::env::var("DATABASE_URL").ok(),
    })?;
    tracing::debug!(
        schema = %settings.schema.display(),
        skip_constraints = ?settings.skip_constraints,
        "resolved settings"
    );
    Ok(settings)
}

fn load_tables(settings: &Settings) -> Result<Vec<TableDescriptor>, flatbed::Error> {
    let tree = SchemaTree::load(&settings.schema)?;
    Ok(flatbed::flatten_validated(&tree)?)
}

fn print_change(change: &Change) {
    match change {
        Change::CreateTable { .. } => println!("  {}", change.to_string().green()),
        Change::AddColumn { .. } => println!("  {}", change.to_string().cyan()),
        Change::AddForeignKey(_) => println!("  {}", change.to_string().blue()),
    }
}

fn print_failure(failure: &RecoverableError) {
    println!("  {} {}", "!".yellow().bold(), failure.yellow());
}

fn print_report(report: &ReconcileReport) {
    if report.is_noop() && report.failures.is_empty() {
        println!("{}", "Database is up to date.".green());
        return;
    }

    for change in &report.applied {
        print_change(change);
    }
    for failure in &report.failures {
        print_failure(failure);
    }

    println!();
    println!(
        "{} tables created, {} columns added, {} foreign keys added, {} skipped",
        report.created_tables().count().bold(),
        report.added_columns().count().bold(),
        report.added_constraints().count().bold(),
        report.failures.len().bold()
    );
}

fn print_plan(plan: &ReconciliationPlan, sql: bool) {
    if plan.is_empty() && plan.skipped.is_empty() {
        println!("{}", "Nothing to do.".green());
        return;
    }

    if sql {
        println!("{}", plan.to_sql());
    } else {
        println!("{}", "Structure:".bold());
        for change in &plan.structure {
            print_change(change);
        }
        println!("{}", "Relationships:".bold());
        for change in &plan.relationships {
            print_change(change);
        }
    }

    for skipped in &plan.skipped {
        print_failure(skipped);
    }
}

fn print_tables(tables: &[TableDescriptor]) {
    println!("Schema ({} tables):", tables.len());
    println!();
    for table in tables {
        println!("  {} ({} columns)", table.name.bold(), table.fields.len());
        let sole_key = table.primary_key().len() == 1;
        for field in &table.fields {
            let mut attrs = Vec::new();
            if field.is_primary_key {
                attrs.push("PK");
            }
            if field.is_unique() && !(field.is_primary_key && sole_key) {
                attrs.push("UNIQUE");
            }

            let attrs_str = if attrs.is_empty() {
                String::new()
            } else {
                format!(" [{}]", attrs.join(", "))
            };

            println!("    {}: {}{}", field.name, field.column_type(), attrs_str);
        }

        for (_, fk) in table.foreign_keys() {
            println!(
                "    FK: {} -> {}.{}",
                fk.column, fk.target_table, fk.target_column
            );
        }
        println!();
    }
}

/// Mask password in database URL for display
fn mask_password(url: &str) -> String {
    // Simple masking: replace password between :// and @
    if let Some(start) = url.find("://")
        && let Some(at) = url.rfind('@')
        && at > start
    {
        let prefix = &url[..start + 3];
        let suffix = &url[at..];
        if let Some(colon) = url[start + 3..at].find(':') {
            let user = &url[start + 3..start + 3 + colon];
            return format!("{}{}:***{}", prefix, user, suffix);
        }
    }
    url.to_string()
}
