//! The common shape every provider client exposes.

use async_trait::async_trait;
use book_gateway_core::models::{Author, Edition, Work};
use serde::Serialize;

use crate::error::ProviderError;

/// A normalizer's output before caller-side merging: a flat list of works
/// each carrying its own editions/authors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedResponse {
    pub works: Vec<Work>,
}

/// Provenance/diagnostic info returned alongside a normalized response.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMeta {
    pub provider: String,
    pub raw_result_count: usize,
}

/// The three lookup operations every provider exposes.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search_by_title(
        &self,
        query: &str,
        max: usize,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError>;

    async fn search_by_isbn(
        &self,
        isbn: &str,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError>;

    async fn search_by_author(
        &self,
        name: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(NormalizedResponse, ProviderMeta), ProviderError>;
}

/// Build a `(Work, Edition, Author[])`-style triple into a flattened `Work`.
pub(crate) fn assemble_work(
    title: String,
    provider: &'static str,
    synthetic: bool,
    edition: Option<Edition>,
    authors: Vec<Author>,
    subject_tags: Vec<String>,
    description: Option<String>,
    first_publication_year: Option<i32>,
) -> Work {
    let has_isbn = edition.as_ref().map(|e| e.isbn.is_some()).unwrap_or(false);
    let has_cover = edition
        .as_ref()
        .map(|e| e.cover_url.is_some())
        .unwrap_or(false);
    let quality_score = Work::compute_quality_score(has_isbn, has_cover, description.as_deref());

    let mut contributors = std::collections::BTreeSet::new();
    contributors.insert(provider.to_string());

    Work {
        title,
        subject_tags: book_gateway_core::genre::normalize(&subject_tags),
        description,
        first_publication_year,
        authors,
        editions: edition.into_iter().collect(),
        synthetic,
        primary_provider: provider.to_string(),
        contributors,
        google_books_volume_ids: Vec::new(),
        open_library_work_ids: Vec::new(),
        isbndb_ids: Vec::new(),
        quality_score,
    }
}
