//! Canonical entities: `Work`, `Edition`, `Author`, `Job`, `Photo`,
//! `AuthToken`, `CacheEntry`.
//!
//! `Work`/`Edition`/`Author` are values: produced once by a normalizer,
//! immutable thereafter, and serialized with `camelCase` field names to
//! match the wire envelope. `Job`/`Photo`/`AuthToken` are mutable,
//! coordinator-owned state and stay `snake_case` internally.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format of a physical/electronic book manifestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditionFormat {
    Hardcover,
    Paperback,
    Ebook,
    Unknown,
}

impl Default for EditionFormat {
    fn default() -> Self {
        EditionFormat::Unknown
    }
}

/// Author gender, normalized to a closed set; missing data maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    Other,
    Unknown,
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Unknown
    }
}

/// A physical/electronic manifestation of a `Work`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edition {
    pub isbn: Option<String>,
    #[serde(default)]
    pub isbn_list: Vec<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub format: EditionFormat,
    pub cover_url: Option<String>,
    pub primary_provider: String,
}

/// A person credited as an author of a `Work`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub name: String,
    pub birth_date: Option<DateTime<Utc>>,
    pub biography: Option<String>,
    #[serde(default)]
    pub gender: Gender,
    pub cultural_region: Option<String>,
}

/// A logical book, merged and normalized from one or more providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    pub title: String,
    #[serde(default)]
    pub subject_tags: Vec<String>,
    pub description: Option<String>,
    pub first_publication_year: Option<i32>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub editions: Vec<Edition>,
    /// True when derived from a single provider's edition record rather
    /// than a true work record.
    pub synthetic: bool,
    pub primary_provider: String,
    #[serde(default)]
    pub contributors: std::collections::BTreeSet<String>,
    #[serde(default)]
    pub google_books_volume_ids: Vec<String>,
    #[serde(default)]
    pub open_library_work_ids: Vec<String>,
    #[serde(default)]
    pub isbndb_ids: Vec<String>,
    pub quality_score: f32,
}

impl Work {
    /// `0.4 * has_isbn + 0.4 * has_cover + 0.2 * clamp(len(description)/100, 0, 1)`
    pub fn compute_quality_score(has_isbn: bool, has_cover: bool, description: Option<&str>) -> f32 {
        let isbn_component = if has_isbn { 0.4 } else { 0.0 };
        let cover_component = if has_cover { 0.4 } else { 0.0 };
        let desc_len = description.map(str::len).unwrap_or(0) as f32;
        let desc_component = 0.2 * (desc_len / 100.0).clamp(0.0, 1.0);
        isbn_component + cover_component + desc_component
    }
}

/// Which background pipeline a `Job` is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    BatchEnrichment,
    AiScan,
    BatchAiScan,
    CsvImport,
}

/// Job lifecycle state. Transitions form a DAG with a single terminal set
/// (`Complete`/`Failed`/`Canceled`); a terminal job never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Initializing,
    Ready,
    Processing,
    Complete,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed | JobStatus::Canceled)
    }
}

/// Per-photo state within a batch bookshelf scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub index: usize,
    pub status: PhotoStatus,
    pub books_found: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    Queued,
    Processing,
    Complete,
    Error,
}

/// A background task tracked by the job coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub pipeline: Pipeline,
    pub status: JobStatus,
    pub total: usize,
    pub processed: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<serde_json::Value>,
    pub version: u64,
    #[serde(default)]
    pub photos: Option<Vec<Photo>>,
    #[serde(default)]
    pub cancel_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_input: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<AuthToken>,
}

impl Job {
    pub fn new(id: Uuid, pipeline: Pipeline, total: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            pipeline,
            status: JobStatus::Initializing,
            total,
            processed: 0,
            created_at: now,
            updated_at: now,
            result: None,
            version: 0,
            photos: None,
            cancel_requested: false,
            staged_input: None,
            token: None,
        }
    }
}

/// Auth token bound to exactly one `Job`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Auth token TTL: 2 hours.
pub const AUTH_TOKEN_TTL: Duration = Duration::hours(2);

/// Refresh window: last 30 minutes before expiry.
pub const AUTH_REFRESH_WINDOW: Duration = Duration::minutes(30);

impl AuthToken {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            expires_at: now + AUTH_TOKEN_TTL,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>, presented: Uuid) -> bool {
        presented == self.token && now < self.expires_at
    }

    pub fn in_refresh_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - AUTH_REFRESH_WINDOW
    }
}

/// A cached provider/engine result, with the provenance and quality data
/// needed to pick a TTL multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub stored_at: DateTime<Utc>,
    pub ttl_secs: i64,
    pub source_provider: String,
    pub quality_score: f32,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.stored_at + Duration::seconds(self.ttl_secs)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.stored_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_score_full_marks() {
        let score = Work::compute_quality_score(true, true, Some(&"x".repeat(200)));
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn quality_score_no_isbn_no_cover_no_description() {
        let score = Work::compute_quality_score(false, false, None);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn quality_score_partial_description_is_clamped() {
        let score = Work::compute_quality_score(false, false, Some(&"x".repeat(50)));
        assert!((score - 0.1).abs() < 1e-6);
    }

    #[test]
    fn job_starts_initializing_with_version_zero() {
        let job = Job::new(Uuid::new_v4(), Pipeline::BatchEnrichment, 5);
        assert_eq!(job.status, JobStatus::Initializing);
        assert_eq!(job.version, 0);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn auth_token_refresh_window_boundaries() {
        let now = Utc::now();
        let token = AuthToken::new(now);

        let at_31_min_before = token.expires_at - Duration::minutes(31);
        let at_29_min_before = token.expires_at - Duration::minutes(29);

        assert!(!token.in_refresh_window(at_31_min_before));
        assert!(token.in_refresh_window(at_29_min_before));
    }

    #[test]
    fn auth_token_invalid_after_expiry() {
        let now = Utc::now();
        let token = AuthToken::new(now);
        assert!(!token.is_valid(token.expires_at + Duration::seconds(1), token.token));
    }

    #[test]
    fn auth_token_rejects_mismatched_token() {
        let now = Utc::now();
        let token = AuthToken::new(now);
        assert!(!token.is_valid(now, Uuid::new_v4()));
    }
}
