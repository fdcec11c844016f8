//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tessera",
    version,
    author = "neur0map",
    about = "Hybrid retrieval and ensemble reranking over chunked document corpora",
    long_about = "Tessera indexes a corpus of text chunks for dense, sparse and late-interaction retrieval, \
                  fuses the candidate lists with weighted reciprocal rank fusion and reorders the top \
                  candidates with an ensemble of rerankers selected by a named strategy."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/tessera/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a corpus and run one search against it
    Search {
        /// Search query text
        query: String,

        /// Corpus file in JSON Lines format ({"id", "text", "document_id", "metadata"})
        #[arg(long, value_name = "FILE")]
        corpus: PathBuf,

        /// Maximum number of results to return (defaults to search.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Strategy to use (e.g., "speed", "balanced", "accurate", "ensemble")
        #[arg(short, long)]
        strategy: Option<String>,

        /// Enable a candidate source for this search
        #[arg(long, value_name = "SOURCE")]
        enable_source: Vec<String>,

        /// Disable a candidate source for this search
        #[arg(long, value_name = "SOURCE")]
        disable_source: Vec<String>,

        /// Enable a reranker model for this search
        #[arg(long, value_name = "MODEL")]
        enable_model: Vec<String>,

        /// Disable a reranker model for this search
        #[arg(long, value_name = "MODEL")]
        disable_model: Vec<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List the available strategies
    Strategies,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
