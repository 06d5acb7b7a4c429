//! Maps a Google Books `volumes` response into `(Work, Edition?, Author[])`
//! triples. Each `item` is itself a single-edition volume record, so every
//! resulting `Work` is marked `synthetic`.

use book_gateway_core::isbn;
use book_gateway_core::models::{Author, Edition, EditionFormat};
use serde::Deserialize;
use tracing::warn;

use crate::client::{assemble_work, NormalizedResponse};
use crate::error::ProviderError;

const PROVIDER: &str = "google_books";

#[derive(Debug, Deserialize)]
pub struct VolumesResponse {
    #[serde(default)]
    pub items: Vec<Volume>,
    #[serde(rename = "totalItems", default)]
    pub total_items: usize,
}

#[derive(Debug, Deserialize)]
pub struct Volume {
    #[serde(rename = "volumeInfo")]
    pub volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(rename = "publishedDate")]
    pub published_date: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(rename = "industryIdentifiers", default)]
    pub industry_identifiers: Vec<IndustryIdentifier>,
    #[serde(rename = "imageLinks")]
    pub image_links: Option<ImageLinks>,
    #[serde(rename = "printType")]
    pub print_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    #[serde(rename = "smallThumbnail")]
    pub small_thumbnail: Option<String>,
}

/// A parse failure on one record drops that record with a warning rather
/// than failing the whole response.
pub fn normalize(response: VolumesResponse) -> Result<NormalizedResponse, ProviderError> {
    let mut works = Vec::with_capacity(response.items.len());

    for item in response.items {
        let Some(info) = item.volume_info else {
            warn!(provider = PROVIDER, "volume missing volumeInfo, dropping");
            continue;
        };

        let Some(title) = info.title.filter(|t| !t.trim().is_empty()) else {
            warn!(provider = PROVIDER, "volume missing title, dropping");
            continue;
        };

        let isbn13 = info
            .industry_identifiers
            .iter()
            .find(|id| id.kind == "ISBN_13")
            .map(|id| id.identifier.clone());
        let isbn10 = info
            .industry_identifiers
            .iter()
            .find(|id| id.kind == "ISBN_10")
            .map(|id| id.identifier.clone());
        let chosen_isbn = isbn13.or(isbn10).filter(|i| isbn::is_valid(i));

        let publication_year = info
            .published_date
            .as_deref()
            .and_then(|d| d.get(0..4))
            .and_then(|y| y.parse::<i32>().ok());

        let format = match info.print_type.as_deref() {
            Some("BOOK") => EditionFormat::Paperback,
            _ => EditionFormat::Unknown,
        };

        let cover_url = info
            .image_links
            .as_ref()
            .and_then(|links| links.thumbnail.clone().or_else(|| links.small_thumbnail.clone()));

        let edition = Edition {
            isbn: chosen_isbn,
            isbn_list: Vec::new(),
            publisher: None,
            publication_year,
            format,
            cover_url,
            primary_provider: PROVIDER.to_string(),
        };

        let authors = info
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
            info.categories,
            info.description,
            publication_year,
        ));
    }

    Ok(NormalizedResponse { works })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_volumes_missing_title() {
        let response = VolumesResponse {
            items: vec![Volume {
                volume_info: Some(VolumeInfo {
                    title: None,
                    authors: vec![],
                    published_date: None,
                    description: None,
                    categories: vec![],
                    industry_identifiers: vec![],
                    image_links: None,
                    print_type: None,
                }),
            }],
            total_items: 1,
        };
        let normalized = normalize(response).unwrap();
        assert!(normalized.works.is_empty());
    }

    #[test]
    fn invalid_isbn_is_dropped_not_faked() {
        let response = VolumesResponse {
            items: vec![Volume {
                volume_info: Some(VolumeInfo {
                    title: Some("Test Title".into()),
                    authors: vec!["Jane Author".into()],
                    published_date: Some("2001-05-01".into()),
                    description: Some("A description.".into()),
                    categories: vec!["Fiction".into()],
                    industry_identifiers: vec![IndustryIdentifier {
                        kind: "ISBN_13".into(),
                        identifier: "9780439708181".into(),
                    }],
                    image_links: None,
                    print_type: Some("BOOK".into()),
                }),
            }],
            total_items: 1,
        };
        let normalized = normalize(response).unwrap();
        assert_eq!(normalized.works.len(), 1);
        assert!(normalized.works[0].editions[0].isbn.is_none());
    }

    #[test]
    fn synthetic_flag_set_for_volume_records() {
        let response = VolumesResponse {
            items: vec![Volume {
                volume_info: Some(VolumeInfo {
                    title: Some("Test Title".into()),
                    authors: vec![],
                    published_date: None,
                    description: None,
                    categories: vec![],
                    industry_identifiers: vec![],
                    image_links: None,
                    print_type: None,
                }),
            }],
            total_items: 1,
        };
        let normalized = normalize(response).unwrap();
        assert!(normalized.works[0].synthetic);
    }
}
