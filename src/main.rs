use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rapidsms_provider::config::AppConfig;
use rapidsms_provider::logging::init_logging;
use rapidsms_provider::{ContentValues, DataProvider, Selection, Value};
use serde_json::json;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file layered over config/default and config/local
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a row
    Insert {
        /// Target address, e.g. `message` or `content://org.rapidandroid.provider/formdata/2`
        uri: String,

        /// Column value, repeatable (`--set phone=555-1000`)
        #[arg(short, long = "set", value_name = "COLUMN=VALUE")]
        values: Vec<String>,
    },
    /// Query rows
    Query {
        /// Address to query
        uri: String,

        /// WHERE fragment with `?` placeholders
        #[arg(short = 'w', long = "where")]
        clause: Option<String>,

        /// Placeholder value, repeatable
        #[arg(short, long = "arg")]
        args: Vec<String>,

        /// ORDER BY fragment
        #[arg(short, long)]
        sort: Option<String>,

        /// Comma-separated projection
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
    /// Delete rows
    Delete {
        /// Address to delete from
        uri: String,

        /// WHERE fragment with `?` placeholders
        #[arg(short = 'w', long = "where")]
        clause: Option<String>,

        /// Placeholder value, repeatable
        #[arg(short, long = "arg")]
        args: Vec<String>,
    },
    /// Print the type string of an address
    Type {
        /// Address to describe
        uri: String,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from(cli.config.as_deref())?;

    // Initialize logging; the guard keeps the file appender flushing
    let log_file = config.log_file();
    let _guard = init_logging(
        Some(&config.get_log_level()),
        log_file.as_deref(),
        config.logging.format == "json",
    )?;

    info!("Starting rapidsms-provider");

    let provider = DataProvider::open(&config).context("Failed to open data provider")?;

    let output = match cli.command {
        Commands::Insert { uri, values } => {
            let values = parse_assignments(&values)?;
            let inserted = provider
                .insert(&uri, values)
                .with_context(|| format!("Insert into {uri} failed"))?;
            json!({
                "uri": provider.router().uri_for(&inserted.locator),
                "row_id": inserted.row_id,
            })
        },
        Commands::Query {
            uri,
            clause,
            args,
            sort,
            columns,
        } => {
            let mut selection = Selection {
                clause,
                args: args.iter().map(|arg| parse_value(arg)).collect(),
                ..Selection::default()
            };
            if !columns.is_empty() {
                selection = selection.with_projection(columns);
            }
            if let Some(sort) = sort {
                selection = selection.sorted_by(sort);
            }

            let rows = provider
                .query(&uri, &selection)
                .with_context(|| format!("Query of {uri} failed"))?;
            let rows: Vec<BTreeMap<String, Value>> = rows.iter().map(rapidsms_provider::Row::to_map).collect();
            serde_json::to_value(rows)?
        },
        Commands::Delete { uri, clause, args } => {
            let selection = Selection {
                clause,
                args: args.iter().map(|arg| parse_value(arg)).collect(),
                ..Selection::default()
            };
            let removed = provider
                .delete(&uri, &selection)
                .with_context(|| format!("Delete from {uri} failed"))?;
            json!({ "deleted": removed })
        },
        Commands::Type { uri } => json!({ "type": provider.content_type(&uri)? }),
    };

    emit(&output)
}

#[allow(clippy::print_stdout)]
fn emit(output: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

/// Parse `column=value` pairs into insert values
fn parse_assignments(assignments: &[String]) -> Result<ContentValues> {
    assignments
        .iter()
        .map(|assignment| {
            let (column, value) = assignment
                .split_once('=')
                .with_context(|| format!("Expected COLUMN=VALUE, got '{assignment}'"))?;
            Ok((column.trim().to_string(), parse_value(value)))
        })
        .collect()
}

/// Interpret a command-line literal as the narrowest matching value
fn parse_value(raw: &str) -> Value {
    match raw {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        // Keep phone-like literals (+2547..., 0722...) as text
        _ if raw.starts_with('+') || (raw.len() > 1 && raw.starts_with('0')) => Value::from(raw),
        _ => raw
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| raw.parse::<f64>().map(Value::Real))
            .unwrap_or_else(|_| Value::from(raw)),
    }
}
