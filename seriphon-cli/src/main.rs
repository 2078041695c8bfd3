mod cli;
mod error;
mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use url::Url;

use seriphon_engine::{
    DownloadEngine, DownloadJob, EngineConfig, HttpFetcher, PageFetcher, TreeResolver,
};

use crate::{
    cli::{Args, Commands},
    error::{CliError, Result},
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = EngineConfig::default();
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::with_config(&config)?);

    match args.command {
        Commands::Catalog { url, dest, json } => {
            let url = parse_url(&url)?;
            let resolver = TreeResolver::new(fetcher, config);
            let info = resolver.resolve_series(&url, &PathBuf::from(dest)).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                output::print_series(&info);
            }
        }

        Commands::Download {
            url,
            dest,
            season,
            episodes,
            parallel,
        } => {
            let root_url = parse_url(&url)?;
            let folder = PathBuf::from(dest);

            let selected = if episodes.is_empty() {
                // No explicit selection: crawl the tree and take everything,
                // or one season of it.
                let resolver = TreeResolver::new(Arc::clone(&fetcher), config.clone());
                let info = resolver.resolve_series(&root_url, &folder).await;
                info!(title = %info.title, episodes = info.episode_count(), "Catalog resolved");
                match &season {
                    Some(id) => info
                        .seasons
                        .get(id)
                        .map(|eps| eps.iter().map(|ep| ep.source_url.clone()).collect())
                        .unwrap_or_default(),
                    None => info.episode_urls(),
                }
            } else {
                episodes
            };

            if selected.is_empty() {
                return Err(CliError::EmptySelection);
            }

            let job = DownloadJob {
                source_url: root_url.to_string(),
                folder,
                episodes: selected,
                parallelism: parallel,
            };

            let engine = Arc::new(DownloadEngine::new(fetcher, config));
            let total = job.episodes.len() as u64;
            let handle = engine.spawn(job);

            // Ctrl+C requests cancellation; the job still drains to a
            // terminal state with its result buckets.
            let cancel_engine = Arc::clone(&engine);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Cancelling...");
                    cancel_engine.cancel();
                }
            });

            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "[{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .expect("valid progress template")
                .progress_chars("=>-"),
            );

            while !handle.is_finished() {
                let snap = engine.status();
                bar.set_position((snap.completed.len() + snap.errors.len()) as u64);
                bar.set_message(format!("{} downloading", snap.downloading.len()));
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            bar.finish_and_clear();

            let outcome = handle.await??;
            output::print_outcome(&outcome);
        }
    }

    Ok(())
}

fn parse_url(input: &str) -> Result<Url> {
    Url::parse(input).map_err(|_| CliError::InvalidUrl(input.to_string()))
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
