//! Terminal rendering for catalogs and job results.

use seriphon_engine::{JobOutcome, SeriesInfo};

/// Print a catalog as an indented tree, seasons in numeric order where the
/// ids allow it.
pub fn print_series(info: &SeriesInfo) {
    println!("{}", info.title);
    if let Some(cover) = &info.cover_image_url {
        println!("  cover: {cover}");
    }

    let mut season_ids: Vec<&String> = info.seasons.keys().collect();
    season_ids.sort_by(|a, b| match (a.parse::<u32>(), b.parse::<u32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    });

    for season_id in season_ids {
        let episodes = &info.seasons[season_id];
        println!("  Season {season_id} ({} episodes)", episodes.len());
        for episode in episodes {
            let marker = if episode.already_present { "x" } else { " " };
            println!("    [{marker}] {}  {}", episode.name, episode.source_url);
        }
    }

    if info.seasons.is_empty() {
        println!("  (no episodes found)");
    }
}

/// Print the three result buckets of a finished job.
pub fn print_outcome(outcome: &JobOutcome) {
    println!(
        "Done: {} downloaded, {} skipped, {} failed",
        outcome.downloaded.len(),
        outcome.skipped.len(),
        outcome.failed.len()
    );
    for item in &outcome.failed {
        println!("  failed: {} ({})", item.path.display(), item.reason);
    }
}
