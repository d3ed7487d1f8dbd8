//! Prints the sites that satisfy every given metadata query, one per line.

mod connection;

use clap::Parser;
use lib_mortar::loggers::setup_logging;
use lib_mortar::Client;
use tracing::info;

use connection::ConnectionArgs;

/// Find the Mortar sites that qualify for a set of metadata queries.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// SPARQL queries a site must all answer.
    #[arg(required = true, value_name = "QUERY")]
    queries: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = setup_logging("mortar-qualify", "info")?;

    let config = args.connection.resolve()?;
    info!("{}", config);

    let mut client = Client::connect(&config)?;
    let sites = client.qualify(args.queries.as_slice()).await?;

    for site in &sites {
        println!("{}", site);
    }
    info!(count = sites.len(), "qualifying sites");
    Ok(())
}
