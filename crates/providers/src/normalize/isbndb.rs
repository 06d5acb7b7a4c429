//! Maps ISBNdb `book` records into `(Work, Edition?, Author[])` triples.
//! ISBNdb records are single-edition, so results are marked `synthetic`.

use book_gateway_core::isbn;
use book_gateway_core::models::{Author, Edition, EditionFormat};
use serde::Deserialize;
use tracing::warn;

use crate::client::{assemble_work, NormalizedResponse};
use crate::error::ProviderError;

const PROVIDER: &str = "isbndb";

#[derive(Debug, Deserialize)]
pub struct BooksResponse {
    #[serde(default)]
    pub books: Vec<Book>,
}

#[derive(Debug, Deserialize)]
pub struct BookResponse {
    pub book: Book,
}

#[derive(Debug, Deserialize)]
pub struct Book {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    #[serde(rename = "date_published")]
    pub date_published: Option<String>,
    pub isbn13: Option<String>,
    pub isbn: Option<String>,
    pub image: Option<String>,
    pub synopsis: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    pub binding: Option<String>,
}

pub fn normalize_one(book: Book) -> Result<NormalizedResponse, ProviderError> {
    normalize_many(vec![book])
}

pub fn normalize_many(books: Vec<Book>) -> Result<NormalizedResponse, ProviderError> {
    let mut works = Vec::with_capacity(books.len());

    for book in books {
        let Some(title) = book.title.filter(|t| !t.trim().is_empty()) else {
            warn!(provider = PROVIDER, "book missing title, dropping");
            continue;
        };

        let chosen_isbn = book
            .isbn13
            .or(book.isbn)
            .filter(|i| isbn::is_valid(i));

        let publication_year = book
            .date_published
            .as_deref()
            .and_then(|d| d.get(0..4))
            .and_then(|y| y.parse::<i32>().ok());

        let format = match book.binding.as_deref().map(str::to_lowercase).as_deref() {
            Some(b) if b.contains("hardcover") => EditionFormat::Hardcover,
            Some(b) if b.contains("paperback") => EditionFormat::Paperback,
            Some(b) if b.contains("ebook") || b.contains("kindle") => EditionFormat::Ebook,
            _ => EditionFormat::Unknown,
        };

        let edition = Edition {
            isbn: chosen_isbn,
            isbn_list: Vec::new(),
            publisher: book.publisher,
            publication_year,
            format,
            cover_url: book.image,
            primary_provider: PROVIDER.to_string(),
        };

        let authors = book
            .authors
            .into_iter()
            .map(|name| Author {
                name,
                birth_date: None,
                biography: None,
                gender: Default::default(),
                cultural_region: None,
            })
            .collect();

        works.push(assemble_work(
            title,
            PROVIDER,
            true,
            Some(edition),
            authors,
            book.subjects,
            book.synopsis,
            publication_year,
        ));
    }

    Ok(NormalizedResponse { works })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Book {
        Book {
            title: Some("The Hobbit".into()),
            authors: vec!["J.R.R. Tolkien".into()],
            publisher: Some("HarperCollins".into()),
            date_published: Some("1937-09-21".into()),
            isbn13: Some("9780618260300".into()),
            isbn: None,
            image: Some("https://example.invalid/cover.jpg".into()),
            synopsis: Some("A hobbit's unexpected journey.".into()),
            subjects: vec!["fantasy".into()],
            binding: Some("Hardcover".into()),
        }
    }

    #[test]
    fn maps_binding_to_edition_format() {
        let normalized = normalize_one(sample_book()).unwrap();
        assert_eq!(
            normalized.works[0].editions[0].format,
            EditionFormat::Hardcover
        );
    }

    #[test]
    fn records_are_marked_synthetic() {
        let normalized = normalize_one(sample_book()).unwrap();
        assert!(normalized.works[0].synthetic);
    }

    #[test]
    fn missing_title_drops_record() {
        let mut book = sample_book();
        book.title = None;
        let normalized = normalize_one(book).unwrap();
        assert!(normalized.works.is_empty());
    }
}
