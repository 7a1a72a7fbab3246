//! Maintenance commands for the search index.
//!
//! `create-index` provisions the configured layout under the given name; `search` embeds a
//! query and prints the nearest documents from the configured index.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyingest::{
    config, logging, pipeline,
    search::{AzureSearchService, VectorIndex, index_definition},
};

#[derive(Parser)]
#[command(
    name = "rustyingest-admin",
    about = "Provision and query the Azure AI Search index"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update a vector index.
    CreateIndex {
        /// Index name.
        name: String,
    },
    /// Print the documents nearest to a query.
    Search {
        /// Query text.
        query: String,
        /// Number of hits.
        #[arg(short, default_value_t = 3)]
        k: usize,
    },
}

#[tokio::main]
async fn main() {
    logging::init_tracing();
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::init_config().context("failed to load configuration")?;

    match cli.command {
        Command::CreateIndex { name } => {
            let service =
                AzureSearchService::new(&config.search).context("failed to build search client")?;
            let definition =
                index_definition(&name, config.search.layout, config.embedding.dimension);
            service
                .create_index(&definition)
                .await
                .with_context(|| format!("failed to create index {name}"))?;
            println!("Index {name} is ready");
        }
        Command::Search { query, k } => {
            let indexer = pipeline::build_indexer(&config).context("failed to build clients")?;
            let hits = indexer
                .search(&config.search.index_name, &query, k)
                .await
                .context("search failed")?;

            let fields = [config.search.layout.content_field()];
            if hits.is_empty() {
                println!("No matches");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {}\n{}\n",
                    rank + 1,
                    hit.score,
                    hit.id().unwrap_or("<no id>"),
                    hit.text(&fields).unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}
