//! The two response envelopes used on the wire.
//!
//! HTTP uses `{data, metadata, error?}`; WebSocket uses
//! `{type, jobId, pipeline, version, timestamp, payload}`. These are
//! deliberately distinct types — see Design Note 9, "Envelope on WebSocket
//! vs. HTTP" — so a caller can never accidentally serialize one as the
//! other.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Pipeline;

/// The canonical HTTP response envelope.
#[derive(Debug, Serialize)]
pub struct HttpEnvelope<T: Serialize> {
    pub data: Option<T>,
    pub metadata: EnvelopeMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

#[derive(Debug, Serialize)]
pub struct EnvelopeMetadata {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl Default for EnvelopeMetadata {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            processing_time_ms: None,
            provider: None,
            cached: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T: Serialize> HttpEnvelope<T> {
    pub fn success(data: T, metadata: EnvelopeMetadata) -> Self {
        Self {
            data: Some(data),
            metadata,
            error: None,
        }
    }

    pub fn error(code: &str, message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self {
            data: None,
            metadata: EnvelopeMetadata::default(),
            error: Some(EnvelopeError {
                code: code.to_string(),
                message: message.into(),
                details,
            }),
        }
    }
}

/// The WebSocket progress-protocol envelope: one tagged variant per event
/// a job can emit, each carrying the job id, pipeline, a monotonic
/// version, and a timestamp alongside its payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEnvelope {
    Progress {
        #[serde(rename = "jobId")]
        job_id: Uuid,
        pipeline: Pipeline,
        version: u64,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    },
    Complete {
        #[serde(rename = "jobId")]
        job_id: Uuid,
        pipeline: Pipeline,
        version: u64,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    },
    Failed {
        #[serde(rename = "jobId")]
        job_id: Uuid,
        pipeline: Pipeline,
        version: u64,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    },
    Canceled {
        #[serde(rename = "jobId")]
        job_id: Uuid,
        pipeline: Pipeline,
        version: u64,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    },
    TokenRotated {
        #[serde(rename = "jobId")]
        job_id: Uuid,
        pipeline: Pipeline,
        version: u64,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    },
    ReadyAck {
        #[serde(rename = "jobId")]
        job_id: Uuid,
        pipeline: Pipeline,
        version: u64,
        timestamp: DateTime<Utc>,
        payload: serde_json::Value,
    },
}

impl WsEnvelope {
    /// Whether this envelope is one of the three terminal kinds
    /// (`complete`/`failed`/`canceled`); a client must see exactly one of
    /// these, last.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WsEnvelope::Complete { .. } | WsEnvelope::Failed { .. } | WsEnvelope::Canceled { .. }
        )
    }

    pub fn version(&self) -> u64 {
        match self {
            WsEnvelope::Progress { version, .. }
            | WsEnvelope::Complete { version, .. }
            | WsEnvelope::Failed { version, .. }
            | WsEnvelope::Canceled { version, .. }
            | WsEnvelope::TokenRotated { version, .. }
            | WsEnvelope::ReadyAck { version, .. } => *version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_kinds_are_flagged_correctly() {
        let job_id = Uuid::new_v4();
        let now = Utc::now();
        let complete = WsEnvelope::Complete {
            job_id,
            pipeline: Pipeline::BatchEnrichment,
            version: 3,
            timestamp: now,
            payload: serde_json::json!({}),
        };
        let progress = WsEnvelope::Progress {
            job_id,
            pipeline: Pipeline::BatchEnrichment,
            version: 1,
            timestamp: now,
            payload: serde_json::json!({}),
        };
        assert!(complete.is_terminal());
        assert!(!progress.is_terminal());
    }

    #[test]
    fn http_envelope_serializes_without_error_field_on_success() {
        let env = HttpEnvelope::success(serde_json::json!({"ok": true}), EnvelopeMetadata::default());
        let value = serde_json::to_value(&env).unwrap();
        assert!(value.get("error").is_none());
    }
}
