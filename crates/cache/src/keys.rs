//! Deterministic cache key construction: same inputs always produce the
//! same key, so two callers racing on the same lookup share one cache slot.

use book_gateway_core::isbn;

pub fn search_title(title: &str, max: usize) -> String {
    format!("search:title:{}:{}", title.to_lowercase(), max)
}

pub fn search_isbn(isbn_str: &str) -> String {
    format!("search:isbn:{}", isbn::digits(isbn_str))
}

pub fn search_author(name: &str, limit: usize, offset: usize) -> String {
    format!("search:author:{}:{}:{}", name.to_lowercase(), limit, offset)
}

pub fn book_isbn(isbn_str: &str) -> String {
    format!("book:isbn:{}", isbn::digits(isbn_str))
}

pub fn enrichment(isbn_str: &str) -> String {
    format!("enrichment:{}", isbn::digits(isbn_str))
}

/// Marks an author as already processed by the cache-warming consumer, so
/// a redelivered or repeat message can be skipped without re-querying
/// every provider.
pub fn author_processed_marker(author: &str) -> String {
    format!("processed:author:{}", author.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_title_key_is_lowercased() {
        assert_eq!(search_title("Dune", 5), "search:title:dune:5");
    }

    #[test]
    fn search_isbn_key_strips_formatting() {
        assert_eq!(
            search_isbn("978-0-441-01359-3"),
            "search:isbn:9780441013593"
        );
    }

    #[test]
    fn book_isbn_key_matches_schema() {
        assert_eq!(book_isbn("9780441013593"), "book:isbn:9780441013593");
    }

    #[test]
    fn enrichment_key_matches_schema() {
        assert_eq!(enrichment("9780441013593"), "enrichment:9780441013593");
    }
}
