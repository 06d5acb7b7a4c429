//! Maps an Open Library `search.json` response into `(Work, Edition?,
//! Author[])` triples. Open Library's search docs are already
//! work-level records (multiple ISBNs roll up under one `doc`), so these
//! are not marked `synthetic`.

use book_gateway_core::isbn;
use book_gateway_core::models::{Author, Edition, EditionFormat};
use serde::Deserialize;
use tracing::warn;

use crate::client::{assemble_work, NormalizedResponse};
use crate::error::ProviderError;

const PROVIDER: &str = "open_library";

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub docs: Vec<Doc>,
    #[serde(rename = "numFound", default)]
    pub num_found: usize,
}

#[derive(Debug, Deserialize)]
pub struct Doc {
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Vec<String>,
    #[serde(rename = "first_publish_year")]
    pub first_publish_year: Option<i32>,
    #[serde(default)]
    pub isbn: Vec<String>,
    #[serde(default)]
    pub subject: Vec<String>,
    #[serde(rename = "cover_i")]
    pub cover_i: Option<i64>,
    pub key: Option<String>,
}

pub fn normalize(response: SearchResponse) -> Result<NormalizedResponse, ProviderError> {
    let mut works = Vec::with_capacity(response.docs.len());

    for doc in response.docs {
        let Some(title) = doc.title.filter(|t| !t.trim().is_empty()) else {
            warn!(provider = PROVIDER, "doc missing title, dropping");
            continue;
        };

        let chosen_isbn = doc.isbn.iter().find(|i| isbn::is_valid(i)).cloned();
        let isbn_list: Vec<String> = doc.isbn.iter().filter(|i| isbn::is_valid(i)).cloned().collect();

        let cover_url = doc
            .cover_i
            .map(|id| format!("https://covers.openlibrary.org/b/id/{id}-L.jpg"));

        let edition = if chosen_isbn.is_some() || cover_url.is_some() {
            Some(Edition {
                isbn: chosen_isbn,
                isbn_list,
                publisher: None,
                publication_year: doc.first_publish_year,
                format: EditionFormat::Unknown,
                cover_url,
                primary_provider: PROVIDER.to_string(),
            })
        } else {
            None
        };

        let authors = doc
            .author_name
            .into_iter()
            .map(|name| Author {
                name,
                birth_date: None,
                biography: None,
                gender: Default::default(),
                cultural_region: None,
            })
            .collect();

        let mut work = assemble_work(
            title,
            PROVIDER,
            false,
            edition,
            authors,
            doc.subject,
            None,
            doc.first_publish_year,
        );

        if let Some(key) = doc.key {
            work.open_library_work_ids.push(key);
        }

        works.push(work);
    }

    Ok(NormalizedResponse { works })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolls_up_multiple_isbns_into_isbn_list() {
        let response = SearchResponse {
            docs: vec![Doc {
                title: Some("Dune".into()),
                author_name: vec!["Frank Herbert".into()],
                first_publish_year: Some(1965),
                isbn: vec!["9780441013593".to_string(), "0441013597".to_string()],
                subject: vec!["science fiction".into()],
                cover_i: Some(123),
                key: Some("/works/OL1234W".into()),
            }],
            num_found: 1,
        };
        let normalized = normalize(response).unwrap();
        assert_eq!(normalized.works.len(), 1);
        assert_eq!(normalized.works[0].open_library_work_ids, vec!["/works/OL1234W"]);
        assert!(!normalized.works[0].synthetic);
    }

    #[test]
    fn doc_without_title_is_dropped() {
        let response = SearchResponse {
            docs: vec![Doc {
                title: None,
                author_name: vec![],
                first_publish_year: None,
                isbn: vec![],
                subject: vec![],
                cover_i: None,
                key: None,
            }],
            num_found: 1,
        };
        let normalized = normalize(response).unwrap();
        assert!(normalized.works.is_empty());
    }
}
