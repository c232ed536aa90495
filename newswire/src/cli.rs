//! CLI argument parsing for the newswire pipeline

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Newswire: agentic news generation pipeline
#[derive(Parser, Debug)]
#[command(name = "newswire", version, about)]
pub struct Cli {
    /// Path to the SQLite database (default: ~/.newswire/newswire.db)
    #[arg(long)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate one or more news articles
    Generate {
        /// Steer the topic toward this request
        #[arg(short, long)]
        request: Option<String>,

        /// Personalize for this reader's stored preferences
        #[arg(short, long)]
        email: Option<String>,

        /// Comma-separated style tokens (short|depth, informal|formal,
        /// satirical|straight), e.g. "short,informal,satirical"
        #[arg(short, long)]
        style: Option<String>,

        /// Write one article per writing-style permutation
        #[arg(long)]
        all_styles: bool,

        /// How many articles to generate
        #[arg(short, long, default_value_t = 1)]
        count: u32,

        /// Concurrent section research invocations (1-10)
        #[arg(long, default_value_t = 2)]
        concurrency: usize,

        /// Rounds of query refinement per section
        #[arg(long, default_value_t = 2)]
        max_search_depth: u32,

        /// Search queries per round per section
        #[arg(long, default_value_t = 2)]
        number_of_queries: u32,
    },

    /// List stored articles, newest first
    List {
        /// Only articles tagged with this topic (e.g. "Business")
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Show one article in full
    Show {
        /// Article id
        id: i64,
    },

    /// Generate an audio briefing for a stored article
    Briefing {
        /// Article id
        id: i64,

        /// Listener context woven into the script
        #[arg(long)]
        context: Option<String>,

        /// Write the audio to this file (mp3)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete workflow checkpoints not touched for N days
    Purge {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

/// Default database location under the user's home directory.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".newswire")
        .join("newswire.db")
}
