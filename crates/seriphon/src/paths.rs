//! Destination path computation.
//!
//! Pure except for [`destination_exists`], which is a separate call so callers
//! decide when the filesystem is consulted — presence can change between
//! catalog build and download start.

use std::path::{Path, PathBuf};

use url::Url;

use crate::catalog::DEFAULT_SERIES_TITLE;
use crate::season::{classify_season, format_season_folder};
use crate::utils::sanitize_filename;

/// Directory a series is stored under: `<download_root>/<sanitized title>`.
/// Falls back to a default when sanitizing leaves nothing usable.
pub fn series_root(download_root: &Path, title: &str) -> PathBuf {
    let name = sanitize_filename(title);
    if name.is_empty() {
        download_root.join(DEFAULT_SERIES_TITLE)
    } else {
        download_root.join(name)
    }
}

/// Compute the canonical destination for an episode URL under a series root:
/// `<series_root>/<Season NN>/<sanitized filename>`. Returns the path and the
/// season folder name it was placed under.
pub fn resolve_destination(series_root: &Path, episode_url: &Url) -> (PathBuf, String) {
    let filename = sanitize_filename(url_filename(episode_url));
    let season = classify_season(episode_url.as_str(), None);
    let season_folder = format_season_folder(&season);
    let path = series_root.join(&season_folder).join(filename);
    (path, season_folder)
}

/// Whether the destination already exists on disk.
pub fn destination_exists(path: &Path) -> bool {
    path.exists()
}

/// Last non-empty path segment of a URL, or the host as a last resort.
pub fn url_filename(url: &Url) -> &str {
    url.path_segments()
        .and_then(|segments| segments.rev().find(|segment| !segment.is_empty()))
        .unwrap_or_else(|| url.host_str().unwrap_or("download"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_destination_with_season_in_url() {
        let url = Url::parse("https://host/show/season-2/ep01.mp4").unwrap();
        let (path, folder) = resolve_destination(Path::new("/downloads/Show"), &url);
        assert_eq!(folder, "Season 02");
        assert_eq!(
            path,
            PathBuf::from("/downloads/Show/Season 02/ep01.mp4")
        );
    }

    #[test]
    fn test_resolve_destination_defaults_to_season_one() {
        let url = Url::parse("https://host/show/ep01.mp4").unwrap();
        let (path, folder) = resolve_destination(Path::new("/downloads/Show"), &url);
        assert_eq!(folder, "Season 01");
        assert_eq!(
            path,
            PathBuf::from("/downloads/Show/Season 01/ep01.mp4")
        );
    }

    #[test]
    fn test_url_filename_skips_trailing_slash() {
        let url = Url::parse("https://host/show/season-1/").unwrap();
        assert_eq!(url_filename(&url), "season-1");
    }

    #[test]
    fn test_series_root_sanitizes_the_title() {
        assert_eq!(
            series_root(Path::new("/downloads"), "My Show: Redux"),
            PathBuf::from("/downloads/My Show Redux")
        );
        assert_eq!(
            series_root(Path::new("/downloads"), "???"),
            PathBuf::from("/downloads/Untitled Series")
        );
    }

    #[test]
    fn test_destination_exists() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("ep01.mp4");
        std::fs::write(&present, b"x").unwrap();

        assert!(destination_exists(&present));
        assert!(!destination_exists(&dir.path().join("ep02.mp4")));
    }
}
