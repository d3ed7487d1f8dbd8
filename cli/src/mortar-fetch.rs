//! Runs a fetch request read from a JSON file and summarizes the result.

mod connection;

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use lib_mortar::loggers::setup_logging;
use lib_mortar::{Client, FetchRequest, ResultAssembler};
use tracing::info;

use connection::ConnectionArgs;

/// Fetch metadata and timeseries from Mortar.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Reads a JSON-encoded fetch request, streams the result, and prints each view with its columns and row count and each selection with its shape. --sql runs a read-only statement against the view tables; --csv prints a selection's frame."
)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Path to the JSON fetch request.
    #[arg(value_name = "REQUEST")]
    request: PathBuf,

    /// Read-only SQL to run against the view tables.
    #[arg(long)]
    sql: Option<String>,

    /// Print this selection's frame as CSV.
    #[arg(long, value_name = "SELECTION")]
    csv: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = setup_logging("mortar-fetch", "info")?;

    let text = fs::read_to_string(&args.request)
        .with_context(|| format!("reading {}", args.request.display()))?;
    let request: FetchRequest = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", args.request.display()))?;

    let config = args.connection.resolve()?;
    info!("{}", config);

    let mut client = Client::connect(&config)?;
    let result = client.fetch(&request).await?;

    summarize(&result);

    if let Some(sql) = &args.sql {
        let rows = result.query(sql)?;
        println!("{}", rows.columns.join("\t"));
        for row in &rows.rows {
            let cells: Vec<&str> = row.iter().map(|c| c.as_deref().unwrap_or("")).collect();
            println!("{}", cells.join("\t"));
        }
    }

    if let Some(selection) = &args.csv {
        print!("{}", result.materialize(selection));
    }
    Ok(())
}

fn summarize(result: &ResultAssembler) {
    for view in result.list_views() {
        let columns = result.table_columns(view).unwrap_or(&[]);
        let rows = result
            .query(&format!("select count(*) from \"{}\"", view.replace('"', "\"\"")))
            .ok()
            .and_then(|r| r.rows.first().and_then(|row| row.first().cloned().flatten()))
            .unwrap_or_else(|| "?".to_string());
        println!("view {}: [{}] {} rows", view, columns.join(", "), rows);
    }
    for selection in result.list_selections() {
        let frame = result.materialize(selection);
        println!(
            "selection {}: {} timestamps x {} identifiers",
            selection,
            frame.len(),
            frame.columns().len()
        );
    }
    let stats = result.stats();
    info!(
        metadata_rows = stats.metadata_rows,
        samples = stats.samples,
        skipped = stats.skipped_records,
        "fetch summary"
    );
}
