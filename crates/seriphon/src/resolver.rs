//! Recursive directory-tree resolution.
//!
//! The resolver walks a link tree of unknown depth and shape, classifying each
//! page as a leaf (it links to media files) or an internal node (it links to
//! further directory pages), and accumulates a season -> episode catalog.
//! The crawl is sequential and depth-first with one outstanding fetch at a
//! time; failed or malformed branches contribute nothing instead of failing
//! the build.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::catalog::{DEFAULT_SERIES_TITLE, Episode, SeasonCatalog, SeriesInfo};
use crate::config::EngineConfig;
use crate::fetch::PageFetcher;
use crate::paths::{destination_exists, series_root, url_filename};
use crate::season::{DEFAULT_SEASON, format_season_folder, season_digits};
use crate::utils::sanitize_filename;

/// Heuristic for anchors worth descending into: season/episode vocabulary in
/// either language of the sites this was written against, or any digit.
static FOLDER_HINT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(season|temporada|episod|cap[ií]tulo|chapter|[0-9])").unwrap());

/// An anchor extracted from a page, with its target already resolved against
/// the page URL.
struct AnchorLink {
    href: Url,
    text: String,
}

/// What one parsed page yields.
struct PageLinks {
    title: Option<String>,
    cover_image: Option<String>,
    anchors: Vec<AnchorLink>,
}

/// Parse a page body and collect its usable anchors.
///
/// Kept synchronous on purpose: the scraper document is not `Send`, so it must
/// never be held across an await point.
fn extract_page_links(body: &str, base_url: &Url) -> PageLinks {
    let anchor_selector = Selector::parse("a[href]").expect("valid anchor selector");
    let title_selector = Selector::parse("title").expect("valid title selector");
    let image_selector = Selector::parse("img[src]").expect("valid image selector");

    let document = Html::parse_document(body);

    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let cover_image = document
        .select(&image_selector)
        .next()
        .and_then(|el| el.value().attr("src"))
        .and_then(|src| base_url.join(src.trim()).ok())
        .map(|u| u.to_string());

    let mut anchors = Vec::new();
    for element in document.select(&anchor_selector) {
        let Some(raw) = element.value().attr("href") else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }
        let Ok(href) = base_url.join(raw) else {
            continue;
        };
        // Also drops mailto: and javascript: targets.
        if href.scheme() != "http" && href.scheme() != "https" {
            continue;
        }
        let text = element.text().collect::<String>().trim().to_string();
        anchors.push(AnchorLink { href, text });
    }

    PageLinks {
        title,
        cover_image,
        anchors,
    }
}

fn looks_like_subfolder(anchor: &AnchorLink) -> bool {
    FOLDER_HINT_REGEX.is_match(&anchor.text) || FOLDER_HINT_REGEX.is_match(anchor.href.path())
}

/// Fetch a page and pull out its title and cover image, tolerating failure.
async fn fetch_page_meta(fetcher: &dyn PageFetcher, url: &Url) -> (Option<String>, Option<String>) {
    match fetcher.fetch_page(url).await {
        Ok(body) => {
            let page = extract_page_links(&body, url);
            (page.title, page.cover_image)
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Series page fetch failed");
            (None, None)
        }
    }
}

/// Resolve the series title from its root page, falling back to a default
/// when the page is unreachable or carries no `<title>`.
pub async fn fetch_series_title(fetcher: &dyn PageFetcher, url: &Url) -> String {
    let (title, _) = fetch_page_meta(fetcher, url).await;
    title.unwrap_or_else(|| DEFAULT_SERIES_TITLE.to_string())
}

/// Walks directory-like pages and produces a [`SeasonCatalog`].
pub struct TreeResolver {
    fetcher: Arc<dyn PageFetcher>,
    config: EngineConfig,
}

impl TreeResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: EngineConfig) -> Self {
        Self { fetcher, config }
    }

    /// Crawl a whole series: root page metadata plus the season catalog.
    /// Best-effort by design; an unreachable site yields an empty catalog,
    /// not an error.
    pub async fn resolve_series(&self, root_url: &Url, download_root: &Path) -> SeriesInfo {
        let (title, cover_image_url) = fetch_page_meta(self.fetcher.as_ref(), root_url).await;
        let title = title.unwrap_or_else(|| DEFAULT_SERIES_TITLE.to_string());
        let root = series_root(download_root, &title);
        let seasons = self.resolve(root_url, &root).await;
        SeriesInfo {
            title,
            cover_image_url,
            seasons,
        }
    }

    /// Crawl from `root_url`, computing episode destinations beneath
    /// `series_root`.
    pub async fn resolve(&self, root_url: &Url, series_root: &Path) -> SeasonCatalog {
        let mut catalog = SeasonCatalog::new();
        let mut visited = HashSet::new();
        self.visit(
            root_url.clone(),
            series_root,
            None,
            0,
            &mut visited,
            &mut catalog,
        )
        .await;
        catalog
    }

    /// Visit one page. Boxed because the future recurses.
    fn visit<'a>(
        &'a self,
        url: Url,
        series_root: &'a Path,
        season_hint: Option<String>,
        depth: usize,
        visited: &'a mut HashSet<Url>,
        catalog: &'a mut SeasonCatalog,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if depth > self.config.max_crawl_depth {
                warn!(url = %url, depth, "Crawl depth limit reached");
                return;
            }
            // Cyclic listings would otherwise recurse forever.
            if !visited.insert(url.clone()) {
                debug!(url = %url, "Page already visited");
                return;
            }

            let body = match self.fetcher.fetch_page(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(url = %url, error = %e, "Page fetch failed, branch skipped");
                    return;
                }
            };

            let page = extract_page_links(&body, &url);
            let (media, others): (Vec<_>, Vec<_>) = page
                .anchors
                .into_iter()
                .partition(|anchor| self.config.is_media_path(anchor.href.path()));

            if !media.is_empty() {
                // Leaf: every media link on the page shares one season,
                // derived from the page URL, then its title, then the hint
                // propagated down from the parent.
                let season = season_digits(url.as_str())
                    .or_else(|| page.title.as_deref().and_then(season_digits))
                    .or(season_hint)
                    .unwrap_or_else(|| DEFAULT_SEASON.to_string());
                let season_folder = format_season_folder(&season);

                debug!(url = %url, season = %season, count = media.len(), "Leaf page");

                let episodes = catalog.entry(season).or_default();
                let mut seen_on_page = HashSet::new();
                for anchor in media {
                    if !seen_on_page.insert(anchor.href.clone()) {
                        continue;
                    }
                    let filename = sanitize_filename(url_filename(&anchor.href));
                    let destination_path = series_root.join(&season_folder).join(&filename);
                    let already_present = destination_exists(&destination_path);
                    let name = if anchor.text.is_empty() {
                        filename
                    } else {
                        anchor.text
                    };
                    episodes.push(Episode {
                        name,
                        source_url: anchor.href.to_string(),
                        destination_path,
                        already_present,
                    });
                }
                return;
            }

            // Internal node: descend into anchors that look like subfolders,
            // handing each its own inferred season as the hint for deeper
            // leaves.
            for anchor in others {
                if !looks_like_subfolder(&anchor) {
                    continue;
                }
                let child_hint = season_digits(anchor.href.as_str())
                    .or_else(|| season_digits(&anchor.text))
                    .or_else(|| season_hint.clone());
                self.visit(
                    anchor.href.clone(),
                    series_root,
                    child_hint,
                    depth + 1,
                    visited,
                    catalog,
                )
                .await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;
    use std::path::PathBuf;

    fn page(title: &str, body: &str) -> String {
        format!("<html><head><title>{title}</title></head><body>{body}</body></html>")
    }

    fn resolver(fetcher: FakeFetcher) -> TreeResolver {
        TreeResolver::new(Arc::new(fetcher), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_two_branch_crawl() {
        let fetcher = FakeFetcher::new()
            .with_page(
                "https://site/show/",
                page(
                    "My Show",
                    r#"<a href="/show/season-1/">Season 1</a>
                       <a href="/show/season-2/">Season 2</a>
                       <a href="mailto:admin@site">contact</a>
                       <a href="/about/">About us</a>"#,
                ),
            )
            .with_page(
                "https://site/show/season-1/",
                page(
                    "My Show - Season 1",
                    r#"<a href="/show/season-1/ep01.mp4">Episode 1</a>
                       <a href="/show/season-1/ep02.mp4">Episode 2</a>
                       <a href="/show/season-1/ep03.mp4">Episode 3</a>"#,
                ),
            )
            .with_page(
                "https://site/show/season-2/",
                page(
                    "My Show - Season 2",
                    r#"<a href="/show/season-2/ep01.mp4">Episode 1</a>
                       <a href="/show/season-2/ep02.mp4">Episode 2</a>"#,
                ),
            );

        let resolver = resolver(fetcher);
        let root = Url::parse("https://site/show/").unwrap();
        let catalog = resolver.resolve(&root, Path::new("/downloads/My Show")).await;

        assert_eq!(catalog.len(), 2);
        let season_one = &catalog["1"];
        assert_eq!(season_one.len(), 3);
        assert_eq!(
            season_one.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            vec!["Episode 1", "Episode 2", "Episode 3"]
        );
        assert_eq!(
            season_one[0].destination_path,
            PathBuf::from("/downloads/My Show/Season 01/ep01.mp4")
        );
        assert_eq!(catalog["2"].len(), 2);
    }

    #[tokio::test]
    async fn test_cyclic_listing_terminates() {
        let fetcher = FakeFetcher::new()
            .with_page(
                "https://site/show/",
                page(
                    "My Show",
                    r#"<a href="/show/season-1/">Season 1</a>"#,
                ),
            )
            .with_page(
                "https://site/show/season-1/",
                page(
                    "Season 1",
                    // The parent link forms a cycle.
                    r#"<a href="/show/">Back to Season list</a>
                       <a href="/show/season-1/part-1/">Part 1</a>"#,
                ),
            )
            .with_page(
                "https://site/show/season-1/part-1/",
                page(
                    "Part 1",
                    r#"<a href="/show/season-1/part-1/ep01.mp4">Episode 1</a>"#,
                ),
            );

        let resolver = resolver(fetcher);
        let root = Url::parse("https://site/show/").unwrap();
        let catalog = resolver.resolve(&root, Path::new("/downloads/My Show")).await;

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog["1"].len(), 1);
    }

    #[tokio::test]
    async fn test_season_hint_reaches_deeper_leaves() {
        let fetcher = FakeFetcher::new()
            .with_page(
                "https://site/show/",
                page(
                    "My Show",
                    r#"<a href="/show/fifth/">Season 5</a>"#,
                ),
            )
            .with_page(
                "https://site/show/fifth/",
                page(
                    "My Show",
                    r#"<a href="/show/fifth/ep01.mp4">Episode 1</a>"#,
                ),
            );

        let resolver = resolver(fetcher);
        let root = Url::parse("https://site/show/").unwrap();
        let catalog = resolver.resolve(&root, Path::new("/downloads/My Show")).await;

        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains_key("5"), "keys: {:?}", catalog.keys());
        assert_eq!(
            catalog["5"][0].destination_path,
            PathBuf::from("/downloads/My Show/Season 05/ep01.mp4")
        );
    }

    #[tokio::test]
    async fn test_unreachable_branch_contributes_nothing() {
        let fetcher = FakeFetcher::new()
            .with_page(
                "https://site/show/",
                page(
                    "My Show",
                    r#"<a href="/show/season-1/">Season 1</a>
                       <a href="/show/season-2/">Season 2</a>"#,
                ),
            )
            .with_page(
                "https://site/show/season-1/",
                page(
                    "Season 1",
                    r#"<a href="/show/season-1/ep01.mp4">Episode 1</a>"#,
                ),
            );
        // season-2 page is never registered, so fetching it fails.

        let resolver = resolver(fetcher);
        let root = Url::parse("https://site/show/").unwrap();
        let catalog = resolver.resolve(&root, Path::new("/downloads/My Show")).await;

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog["1"].len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_series_extracts_metadata() {
        let fetcher = FakeFetcher::new().with_page(
            "https://site/show/",
            page(
                "My Show",
                r#"<img src="/covers/show.jpg">
                   <a href="/show/season-1/">Season 1</a>"#,
            ),
        );

        let resolver = resolver(fetcher);
        let root = Url::parse("https://site/show/").unwrap();
        let info = resolver
            .resolve_series(&root, Path::new("/downloads"))
            .await;

        assert_eq!(info.title, "My Show");
        assert_eq!(
            info.cover_image_url.as_deref(),
            Some("https://site/covers/show.jpg")
        );
        // The broken season branch is tolerated.
        assert!(info.seasons.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_root_yields_default_series() {
        let resolver = resolver(FakeFetcher::new());
        let root = Url::parse("https://site/gone/").unwrap();
        let info = resolver
            .resolve_series(&root, Path::new("/downloads"))
            .await;

        assert_eq!(info.title, DEFAULT_SERIES_TITLE);
        assert!(info.cover_image_url.is_none());
        assert!(info.seasons.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_media_links_kept_once() {
        let fetcher = FakeFetcher::new().with_page(
            "https://site/show/season-1/",
            page(
                "Season 1",
                r#"<a href="/show/season-1/ep01.mp4">Episode 1</a>
                   <a href="/show/season-1/ep01.mp4">Episode 1 (mirror)</a>"#,
            ),
        );

        let resolver = resolver(fetcher);
        let root = Url::parse("https://site/show/season-1/").unwrap();
        let catalog = resolver.resolve(&root, Path::new("/downloads/My Show")).await;

        assert_eq!(catalog["1"].len(), 1);
    }
}
