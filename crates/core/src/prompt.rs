//! Positive-prompt composition from structured semantic fields.
//!
//! The Anima checkpoint responds best to a fixed tag ordering:
//! quality/safety/year meta first, then subject count, character, series,
//! artist, style, appearance, free tags, natural-language supplement, and
//! environment last. Fields are comma-joined on a single line.

use crate::params::GenerationParams;

/// Join the non-blank parts with `", "`, trimming each.
fn join_csv<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compose the positive text from the structured semantic fields.
///
/// Only consulted when the caller did not supply a combined `positive`
/// override; with an override the semantic fields are ignored for text
/// purposes (history summaries still read them).
pub fn compose_positive_text(params: &GenerationParams) -> String {
    join_csv([
        params.quality_meta_year_safe.as_deref(),
        params.count.as_deref(),
        params.character.as_deref(),
        params.series.as_deref(),
        params.artist.as_deref(),
        params.style.as_deref(),
        params.appearance.as_deref(),
        params.tags.as_deref(),
        params.nltags.as_deref(),
        params.environment.as_deref(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with(
        count: &str,
        artist: &str,
        tags: &str,
    ) -> GenerationParams {
        GenerationParams {
            count: Some(count.to_string()),
            artist: Some(artist.to_string()),
            tags: Some(tags.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn skips_empty_fields_without_stray_separators() {
        let params = params_with("1girl", "@fkey", "smile");
        assert_eq!(compose_positive_text(&params), "1girl, @fkey, smile");
    }

    #[test]
    fn blank_fields_are_skipped() {
        let mut params = params_with("1girl", "@fkey", "smile");
        params.series = Some("   ".to_string());
        params.style = Some(String::new());
        assert_eq!(compose_positive_text(&params), "1girl, @fkey, smile");
    }

    #[test]
    fn full_ordering_is_stable() {
        let params = GenerationParams {
            quality_meta_year_safe: Some("masterpiece, 2024, safe".to_string()),
            count: Some("1girl".to_string()),
            character: Some("hatsune miku".to_string()),
            series: Some("vocaloid".to_string()),
            artist: Some("@fkey".to_string()),
            style: Some("watercolor".to_string()),
            appearance: Some("aqua hair".to_string()),
            tags: Some("smile, looking at viewer".to_string()),
            nltags: Some("sitting by a window".to_string()),
            environment: Some("golden hour".to_string()),
            ..Default::default()
        };
        assert_eq!(
            compose_positive_text(&params),
            "masterpiece, 2024, safe, 1girl, hatsune miku, vocaloid, @fkey, \
             watercolor, aqua hair, smile, looking at viewer, sitting by a window, \
             golden hour"
        );
    }

    #[test]
    fn all_empty_yields_empty_string() {
        assert_eq!(compose_positive_text(&GenerationParams::default()), "");
    }
}
