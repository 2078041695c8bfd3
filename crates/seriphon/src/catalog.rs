//! Data model produced by one crawl.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Title used when a series page is unreachable or has no `<title>`.
pub const DEFAULT_SERIES_TITLE: &str = "Untitled Series";

/// A single discovered episode. Identity is the source URL; the struct is not
/// mutated after the crawl builds it (`already_present` is recomputed by the
/// download engine rather than updated in place).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Display name, taken from the link text when available.
    pub name: String,
    /// Absolute URL of the media file.
    pub source_url: String,
    /// Where the file would be written on disk.
    pub destination_path: PathBuf,
    /// Whether the destination existed when the catalog was built. Advisory:
    /// the download engine re-checks before scheduling a transfer.
    #[serde(rename = "downloaded")]
    pub already_present: bool,
}

/// Mapping from season id (e.g. `"1"`) to the episodes discovered under it,
/// in page-encounter order. Season keys carry no ordering guarantee.
pub type SeasonCatalog = HashMap<String, Vec<Episode>>;

/// Everything one crawl learns about a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub title: String,
    pub cover_image_url: Option<String>,
    pub seasons: SeasonCatalog,
}

impl SeriesInfo {
    /// Total number of episodes across all seasons.
    pub fn episode_count(&self) -> usize {
        self.seasons.values().map(Vec::len).sum()
    }

    /// All episode source URLs, season by season.
    pub fn episode_urls(&self) -> Vec<String> {
        self.seasons
            .values()
            .flatten()
            .map(|ep| ep.source_url.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_serializes_presence_as_downloaded() {
        let episode = Episode {
            name: "Episode 1".to_string(),
            source_url: "https://host/show/season-1/ep01.mp4".to_string(),
            destination_path: PathBuf::from("/downloads/Show/Season 01/ep01.mp4"),
            already_present: true,
        };

        let json = serde_json::to_value(&episode).unwrap();
        assert_eq!(json["downloaded"], serde_json::json!(true));
        assert!(json.get("already_present").is_none());
    }

    #[test]
    fn test_episode_count() {
        let mut seasons = SeasonCatalog::new();
        seasons.insert(
            "1".to_string(),
            vec![
                Episode {
                    name: "a".into(),
                    source_url: "https://h/a.mp4".into(),
                    destination_path: PathBuf::from("/d/a.mp4"),
                    already_present: false,
                },
                Episode {
                    name: "b".into(),
                    source_url: "https://h/b.mp4".into(),
                    destination_path: PathBuf::from("/d/b.mp4"),
                    already_present: false,
                },
            ],
        );
        seasons.insert("2".to_string(), Vec::new());

        let info = SeriesInfo {
            title: "Show".to_string(),
            cover_image_url: None,
            seasons,
        };
        assert_eq!(info.episode_count(), 2);
        assert_eq!(info.episode_urls().len(), 2);
    }
}
