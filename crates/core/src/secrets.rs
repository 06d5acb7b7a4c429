//! A uniform accessor over provider secrets, per Design Note 9: "accept
//! both 'raw string' and 'async handle' shapes behind a single accessor,
//! callers resolve once per operation."

use async_trait::async_trait;
use std::sync::Arc;

/// An async secret handle, for deployments that back provider keys with a
/// vault or secret manager instead of plain environment variables.
#[async_trait]
pub trait SecretHandle: Send + Sync {
    async fn get(&self) -> Result<String, SecretError>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to resolve secret: {0}")]
pub struct SecretError(pub String);

/// A secret is either a plain string or a resolvable handle; callers treat
/// both as opaque once resolved.
#[derive(Clone)]
pub enum SecretSource {
    Raw(String),
    Handle(Arc<dyn SecretHandle>),
}

impl SecretSource {
    pub fn raw(value: impl Into<String>) -> Self {
        SecretSource::Raw(value.into())
    }

    pub async fn resolve(&self) -> Result<String, SecretError> {
        match self {
            SecretSource::Raw(s) => Ok(s.clone()),
            SecretSource::Handle(h) => h.get().await,
        }
    }
}

impl std::fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretSource(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticHandle(String);

    #[async_trait]
    impl SecretHandle for StaticHandle {
        async fn get(&self) -> Result<String, SecretError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn raw_secret_resolves_to_itself() {
        let secret = SecretSource::raw("api-key-123");
        assert_eq!(secret.resolve().await.unwrap(), "api-key-123");
    }

    #[tokio::test]
    async fn handle_secret_resolves_via_async_get() {
        let secret = SecretSource::Handle(Arc::new(StaticHandle("vault-value".into())));
        assert_eq!(secret.resolve().await.unwrap(), "vault-value");
    }

    #[test]
    fn debug_never_prints_secret_value() {
        let secret = SecretSource::raw("super-secret");
        let printed = format!("{:?}", secret);
        assert!(!printed.contains("super-secret"));
    }
}
