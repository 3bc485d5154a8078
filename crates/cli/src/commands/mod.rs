//! CLI subcommands.

pub mod migrate;
pub mod parse_query;
pub mod reindex;
