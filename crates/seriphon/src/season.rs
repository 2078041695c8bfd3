//! Season identification from URLs and link text.
//!
//! Directory listings rarely agree on how a season is spelled (`Season-3`,
//! `season 03`, `SEASON3`, `Temporada 2`); the classifier only cares about the
//! digit run that follows the word.

use std::sync::LazyLock;

use regex::Regex;

/// Season assigned when neither the URL nor the display text carries one.
pub const DEFAULT_SEASON: &str = "1";

static SEASON_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:season|temporada)[^0-9]*([0-9]+)").unwrap());

/// Extract a season id from a single piece of text, if present.
///
/// The digit run is normalized (`"07"` -> `"7"`) so that differently padded
/// spellings of the same season share one catalog key.
pub fn season_digits(text: &str) -> Option<String> {
    SEASON_REGEX.captures(text).map(|caps| {
        let digits = &caps[1];
        match digits.parse::<u32>() {
            Ok(n) => n.to_string(),
            Err(_) => digits.to_string(),
        }
    })
}

/// Classify a season from a URL, falling back to the node's display text and
/// finally to [`DEFAULT_SEASON`].
pub fn classify_season(url: &str, display_text: Option<&str>) -> String {
    season_digits(url)
        .or_else(|| display_text.and_then(season_digits))
        .unwrap_or_else(|| DEFAULT_SEASON.to_string())
}

/// Format a season id as an on-disk folder name.
///
/// Numeric ids are zero-padded to two digits (`"3"` -> `"Season 03"`);
/// anything else is passed through unchanged (`"finale"` -> `"Season finale"`).
pub fn format_season_folder(season_id: &str) -> String {
    match season_id.parse::<u32>() {
        Ok(n) => format!("Season {n:02}"),
        Err(_) => format!("Season {season_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_recognizes_common_spellings() {
        for hint in ["Season-7", "season 07", "SEASON7", "season_07", "Temporada 7"] {
            assert_eq!(classify_season(hint, None), "7", "hint: {hint}");
        }
    }

    #[test]
    fn test_classifier_normalizes_zero_padding() {
        assert_eq!(
            classify_season("https://host/show/season-03/", None),
            classify_season("https://host/show/Season-3/", None)
        );
    }

    #[test]
    fn test_classifier_prefers_url_over_text() {
        assert_eq!(
            classify_season("https://host/show/season-2/", Some("Season 9")),
            "2"
        );
    }

    #[test]
    fn test_classifier_falls_back_to_display_text() {
        assert_eq!(
            classify_season("https://host/show/extras/", Some("Season 4")),
            "4"
        );
    }

    #[test]
    fn test_classifier_defaults_without_a_match() {
        assert_eq!(classify_season("https://host/show/extras/", None), "1");
        assert_eq!(classify_season("https://host/show/", Some("Specials")), "1");
    }

    #[test]
    fn test_season_digits_returns_none_without_a_match() {
        assert_eq!(season_digits("https://host/show/extras/"), None);
        assert_eq!(season_digits("Season-"), None);
    }

    #[test]
    fn test_format_season_folder() {
        assert_eq!(format_season_folder("7"), "Season 07");
        assert_eq!(format_season_folder("10"), "Season 10");
        assert_eq!(format_season_folder("finale"), "Season finale");
    }
}
