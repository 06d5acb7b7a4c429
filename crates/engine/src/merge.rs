//! Quality-biased merge of two `Work` records believed to describe the
//! same book, used when a batch-warming pass observes the same title from
//! more than one provider.

use book_gateway_core::models::Work;

/// Keeps the higher-quality record's scalar fields (title, description,
/// year) but unions `subject_tags`, `contributors`, `editions`, and the
/// per-provider id lists from both records, so neither provider's
/// contribution is thrown away.
pub fn merge_by_quality(a: Work, b: Work) -> Work {
    let (mut winner, loser) = if a.quality_score >= b.quality_score {
        (a, b)
    } else {
        (b, a)
    };

    for tag in loser.subject_tags {
        if !winner.subject_tags.contains(&tag) {
            winner.subject_tags.push(tag);
        }
    }

    if winner.description.is_none() {
        winner.description = loser.description;
    }

    if winner.first_publication_year.is_none() {
        winner.first_publication_year = loser.first_publication_year;
    }

    for author in loser.authors {
        if !winner.authors.iter().any(|a| a.name == author.name) {
            winner.authors.push(author);
        }
    }

    for edition in loser.editions {
        let already_known = winner
            .editions
            .iter()
            .any(|e| e.isbn.is_some() && e.isbn == edition.isbn);
        if !already_known {
            winner.editions.push(edition);
        }
    }

    winner.contributors.extend(loser.contributors);
    winner.google_books_volume_ids.extend(loser.google_books_volume_ids);
    winner.open_library_work_ids.extend(loser.open_library_work_ids);
    winner.isbndb_ids.extend(loser.isbndb_ids);

    winner.synthetic = winner.synthetic && loser.synthetic;

    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use book_gateway_core::models::{Edition, EditionFormat};

    fn work(provider: &'static str, quality: f32, tags: Vec<&str>) -> Work {
        Work {
            title: "Dune".to_string(),
            subject_tags: tags.into_iter().map(String::from).collect(),
            description: None,
            first_publication_year: None,
            authors: vec![],
            editions: vec![Edition {
                isbn: Some("9780441013593".to_string()),
                isbn_list: vec![],
                publisher: None,
                publication_year: None,
                format: EditionFormat::Unknown,
                cover_url: None,
                primary_provider: provider.to_string(),
            }],
            synthetic: true,
            primary_provider: provider.to_string(),
            contributors: [provider.to_string()].into_iter().collect(),
            google_books_volume_ids: vec![],
            open_library_work_ids: vec![],
            isbndb_ids: vec![],
            quality_score: quality,
        }
    }

    #[test]
    fn higher_quality_record_wins_title_fields() {
        let a = work("google_books", 0.9, vec!["sci-fi"]);
        let b = work("open_library", 0.4, vec!["fiction"]);
        let merged = merge_by_quality(a, b);
        assert_eq!(merged.primary_provider, "google_books");
    }

    #[test]
    fn subject_tags_are_unioned() {
        let a = work("google_books", 0.9, vec!["sci-fi"]);
        let b = work("open_library", 0.4, vec!["fiction"]);
        let merged = merge_by_quality(a, b);
        assert!(merged.subject_tags.contains(&"sci-fi".to_string()));
        assert!(merged.subject_tags.contains(&"fiction".to_string()));
    }

    #[test]
    fn contributors_are_unioned() {
        let a = work("google_books", 0.9, vec![]);
        let b = work("open_library", 0.4, vec![]);
        let merged = merge_by_quality(a, b);
        assert!(merged.contributors.contains("google_books"));
        assert!(merged.contributors.contains("open_library"));
    }
}
