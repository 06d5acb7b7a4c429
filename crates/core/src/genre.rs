//! Canonical genre normalization.
//!
//! Mirrors the fixed keyword-table pattern used for mood/genre extraction
//! in provider-facing normalizers: lowercase, strip a trailing plural `s`,
//! then look the result up in a fixed table. Unmapped inputs are preserved
//! verbatim (with original capitalization) so no data is lost.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static CANONICAL_GENRES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("fiction", "Fiction"),
        ("nonfiction", "Nonfiction"),
        ("non-fiction", "Nonfiction"),
        ("thriller", "Thriller"),
        ("mystery", "Mystery"),
        ("classic", "Classic Literature"),
        ("classics", "Classic Literature"),
        ("science fiction", "Science Fiction"),
        ("sci-fi", "Science Fiction"),
        ("scifi", "Science Fiction"),
        ("fantasy", "Fantasy"),
        ("romance", "Romance"),
        ("horror", "Horror"),
        ("biography", "Biography"),
        ("autobiography", "Autobiography"),
        ("memoir", "Memoir"),
        ("history", "History"),
        ("historical fiction", "Historical Fiction"),
        ("poetry", "Poetry"),
        ("drama", "Drama"),
        ("comedy", "Comedy"),
        ("adventure", "Adventure"),
        ("crime", "Crime"),
        ("young adult", "Young Adult"),
        ("children", "Children's"),
        ("children's", "Children's"),
        ("self-help", "Self-Help"),
        ("self help", "Self-Help"),
        ("business", "Business"),
        ("philosophy", "Philosophy"),
        ("religion", "Religion"),
        ("cookbook", "Cooking"),
        ("cooking", "Cooking"),
        ("travel", "Travel"),
        ("art", "Art"),
        ("graphic novel", "Graphic Novels"),
        ("graphic novels", "Graphic Novels"),
        ("comic", "Comics"),
        ("comics", "Comics"),
        ("dystopian", "Dystopian"),
        ("short story", "Short Stories"),
        ("short stories", "Short Stories"),
    ]
    .into_iter()
    .collect()
});

/// Strip a single trailing `s` (naive depluralization, matching the
/// source's own simplistic rule — it does not attempt full stemming).
fn strip_trailing_s(input: &str) -> &str {
    input.strip_suffix('s').unwrap_or(input)
}

/// Normalize one genre tag: lowercase, strip trailing `s`, look up in the
/// canonical table. Unmapped inputs are preserved with their original
/// capitalization.
pub fn normalize_one(input: &str) -> String {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();
    let depluralized = strip_trailing_s(&lower);

    if let Some(canonical) = CANONICAL_GENRES.get(lower.as_str()) {
        return (*canonical).to_string();
    }
    if let Some(canonical) = CANONICAL_GENRES.get(depluralized) {
        return (*canonical).to_string();
    }

    trimmed.to_string()
}

/// Normalize a list of genre tags: map each through [`normalize_one`], then
/// de-duplicate while preserving first-seen order.
pub fn normalize(inputs: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(inputs.len());
    for raw in inputs {
        let canonical = normalize_one(raw);
        if seen.insert(canonical.clone()) {
            out.push(canonical);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_genres_case_insensitively() {
        assert_eq!(normalize_one("Thriller"), "Thriller");
        assert_eq!(normalize_one("THRILLERS"), "Thriller");
        assert_eq!(normalize_one("mystery"), "Mystery");
    }

    #[test]
    fn maps_multi_word_genres() {
        assert_eq!(normalize_one("Science Fiction"), "Science Fiction");
        assert_eq!(normalize_one("classics"), "Classic Literature");
    }

    #[test]
    fn preserves_unmapped_input_verbatim() {
        assert_eq!(normalize_one("Steampunk"), "Steampunk");
    }

    #[test]
    fn idempotent_on_already_canonical_input() {
        for raw in ["Fiction", "Thriller", "Steampunk", "Science Fiction"] {
            let once = normalize_one(raw);
            let twice = normalize_one(&once);
            assert_eq!(once, twice, "normalize_one should be idempotent for {raw}");
        }
    }

    #[test]
    fn dedups_preserving_first_seen_order() {
        let input = vec![
            "Thriller".to_string(),
            "thrillers".to_string(),
            "Mystery".to_string(),
        ];
        assert_eq!(normalize(&input), vec!["Thriller", "Mystery"]);
    }
}
