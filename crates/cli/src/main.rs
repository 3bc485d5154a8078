//! Shoper AI Search CLI - migrations, reindexing and query preview.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (app schema and session store)
//! ss-cli migrate
//!
//! # Reindex up to 500 products into the configured search backend
//! ss-cli reindex --limit 500
//!
//! # Show how a query is parsed
//! ss-cli parse-query "buty nike czerwony rozmiar 42 do 300 zł"
//! ss-cli parse-query "кроссовки бренд nike до 5000 руб" --russian
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use shoper_search_server::search::DEFAULT_REINDEX_LIMIT;

mod commands;

#[derive(Parser)]
#[command(name = "ss-cli")]
#[command(author, version, about = "Shoper AI Search CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Index the shop's catalogue into the search backend
    Reindex {
        /// Maximum number of products to index
        #[arg(short, long, default_value_t = DEFAULT_REINDEX_LIMIT)]
        limit: u32,
    },
    /// Show how a search query is parsed
    ParseQuery {
        /// Query text
        text: String,

        /// Use the Russian keyword set
        #[arg(long)]
        russian: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Reindex { limit } => {
            commands::reindex::run(limit).await?;
        }
        Commands::ParseQuery { text, russian } => commands::parse_query::run(&text, russian)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_reindex_default_limit() {
        let cli = Cli::parse_from(["ss-cli", "reindex"]);
        assert!(matches!(cli.command, Commands::Reindex { limit } if limit == DEFAULT_REINDEX_LIMIT));
    }

    #[test]
    fn test_parse_query_flags() {
        let cli = Cli::parse_from(["ss-cli", "parse-query", "buty", "--russian"]);
        assert!(matches!(
            cli.command,
            Commands::ParseQuery { ref text, russian: true } if text == "buty"
        ));
    }
}
