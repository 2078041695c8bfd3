use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "seriphon",
    version,
    about = "Series episode discovery and download tool"
)]
pub struct Args {
    /// Increase log verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a series page and print the discovered catalog
    Catalog {
        /// Series root URL
        url: String,

        /// Download root directory
        #[arg(long, default_value_t = default_folder())]
        dest: String,

        /// Emit the catalog as JSON instead of a tree
        #[arg(long)]
        json: bool,
    },

    /// Download episodes of a series
    Download {
        /// Series root URL
        url: String,

        /// Download root directory
        #[arg(long, default_value_t = default_folder())]
        dest: String,

        /// Restrict the selection to one season id (e.g. `2`)
        #[arg(long)]
        season: Option<String>,

        /// Explicit episode URL; may be repeated. When omitted, every
        /// discovered episode (or every episode of --season) is taken.
        #[arg(long = "episode")]
        episodes: Vec<String>,

        /// Maximum simultaneous transfers
        #[arg(long, default_value_t = default_parallelism())]
        parallel: usize,
    },
}

/// `DOWNLOAD_FOLDER` environment variable, or `downloads` next to the
/// working directory.
pub fn default_folder() -> String {
    std::env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string())
}

/// `PARALLEL_DOWNLOADS` environment variable, or 2.
pub fn default_parallelism() -> usize {
    std::env::var("PARALLEL_DOWNLOADS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2)
}
