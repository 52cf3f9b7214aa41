//! Tabrest CLI - query the GitHub REST API with SQL

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datafusion::prelude::SessionContext;
use tabrest_connectors::{register_rest_schema, Rest, SchemaTableName};
use tabrest_github::{github_rest, GithubConfig, GithubRest, SCHEMA_NAME};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabrest")]
#[command(about = "Query REST APIs as SQL tables")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tables of the github schema
    Tables,

    /// Show the columns of a table
    Describe {
        /// Table name, e.g. `issues`
        table: String,
    },

    /// Run a SQL query, e.g. "SELECT title FROM github.issues WHERE owner = 'o' AND repo = 'r'"
    Query {
        sql: String,

        /// Print the physical plan instead of running the query
        #[arg(long)]
        explain: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --verbose wins over RUST_LOG
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = GithubConfig::from_env()?;
    info!("Loaded configuration: {:?}", config);
    let rest = Arc::new(github_rest(&config).context("Failed to create GitHub connector")?);

    match cli.command {
        Commands::Tables => list_tables(&rest),
        Commands::Describe { table } => describe(&rest, &table)?,
        Commands::Query { sql, explain } => run_query(rest, &sql, explain).await?,
    }

    Ok(())
}

fn list_tables(rest: &GithubRest) {
    for table in rest.list_tables(Some(SCHEMA_NAME)) {
        println!("{}", table);
    }
}

fn describe(rest: &GithubRest, table: &str) -> Result<()> {
    let columns = rest.get_table_metadata(&SchemaTableName::new(SCHEMA_NAME, table))?;
    let width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for column in &columns {
        let field = column.to_field();
        println!(
            "{:width$}  {}{}",
            column.name,
            field.data_type(),
            if column.nullable { "" } else { " NOT NULL" },
            width = width
        );
    }
    Ok(())
}

async fn run_query(rest: Arc<GithubRest>, sql: &str, explain: bool) -> Result<()> {
    let ctx = SessionContext::new();
    register_rest_schema(&ctx, rest)?;

    let df = ctx.sql(sql).await?;
    if explain {
        df.explain(false, false)?.show().await?;
    } else {
        df.show().await?;
    }
    Ok(())
}
