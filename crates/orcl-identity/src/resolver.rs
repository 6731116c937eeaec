use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use orcl_core::{parse_did, parse_orcl_did, ORCL_METHOD};
use orcl_ledger::{DocumentMetadata, LedgerService};

use crate::document::DidDocument;

pub const ERROR_NOT_FOUND: &str = "notFound";
pub const ERROR_INVALID_DID_URL: &str = "invalidDidUrl";
pub const ERROR_METHOD_NOT_SUPPORTED: &str = "methodNotSupported";

/// Metadata describing how a resolution went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The outcome of resolving a DID. Failures are carried in
/// `did_resolution_metadata.error`, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidResolutionResult {
    pub did_document: Option<DidDocument>,
    pub did_document_metadata: DocumentMetadata,
    pub did_resolution_metadata: ResolutionMetadata,
}

impl DidResolutionResult {
    pub fn found(document: DidDocument, metadata: DocumentMetadata) -> Self {
        Self {
            did_document: Some(document),
            did_document_metadata: metadata,
            did_resolution_metadata: ResolutionMetadata::default(),
        }
    }

    pub fn failed(error: &str, message: impl Into<String>) -> Self {
        Self {
            did_document: None,
            did_document_metadata: DocumentMetadata::default(),
            did_resolution_metadata: ResolutionMetadata {
                error: Some(error.to_string()),
                message: Some(message.into()),
            },
        }
    }

    pub fn is_found(&self) -> bool {
        self.did_document.is_some()
    }

    pub fn is_deactivated(&self) -> bool {
        self.did_document_metadata.deactivated
    }
}

/// Trait for resolving DIDs to their documents.
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// DID methods this resolver handles.
    fn supported_methods(&self) -> &[&str];

    /// Resolve a bare DID.
    async fn resolve(&self, did: &str) -> DidResolutionResult;
}

struct CachedResolution {
    result: DidResolutionResult,
    fetched_at: Instant,
}

/// Resolves `did:orcl` DIDs against the ledger, caching documents for a
/// fixed time.
pub struct OrclDidResolver {
    ledger: Arc<dyn LedgerService>,
    cache: DashMap<String, CachedResolution>,
    ttl: Duration,
}

impl OrclDidResolver {
    pub fn new(ledger: Arc<dyn LedgerService>, ttl: Duration) -> Self {
        Self {
            ledger,
            cache: DashMap::new(),
            ttl,
        }
    }

    /// Drop any cached resolution of `did`.
    pub fn invalidate(&self, did: &str) {
        if self.cache.remove(did).is_some() {
            tracing::debug!(did = %did, "resolver cache entry invalidated");
        }
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, did: &str) -> Option<DidResolutionResult> {
        let entry = self.cache.get(did)?;
        if entry.fetched_at.elapsed() < self.ttl {
            tracing::debug!(did = %did, "resolver cache hit");
            return Some(entry.result.clone());
        }
        drop(entry);
        self.cache.remove(did);
        None
    }

    async fn resolve_from_ledger(&self, did: &str) -> DidResolutionResult {
        let unable = |reason: &dyn std::fmt::Display| {
            DidResolutionResult::failed(
                ERROR_NOT_FOUND,
                format!("resolver_error: Unable to resolve did '{}': {}", did, reason),
            )
        };

        match self.ledger.resolve(did).await {
            Ok(Some(stored)) => match DidDocument::from_value(stored.did_document) {
                Ok(document) => {
                    DidResolutionResult::found(document, stored.did_document_metadata)
                }
                Err(e) => unable(&e),
            },
            Ok(None) => unable(&"DID not found on ledger"),
            Err(e) => {
                tracing::warn!(did = %did, error = %e, "ledger resolution failed");
                unable(&e)
            }
        }
    }
}

#[async_trait]
impl DidResolver for OrclDidResolver {
    fn supported_methods(&self) -> &[&str] {
        &[ORCL_METHOD]
    }

    async fn resolve(&self, did: &str) -> DidResolutionResult {
        let Some(parsed) = parse_orcl_did(did) else {
            return DidResolutionResult::failed(
                ERROR_NOT_FOUND,
                format!("resolver_error: Unable to resolve did '{}': Invalid DID", did),
            );
        };
        if !parsed.is_bare() {
            return DidResolutionResult::failed(
                ERROR_INVALID_DID_URL,
                format!("Unsupported did Url: '{}'", did),
            );
        }

        if let Some(result) = self.cached(&parsed.did) {
            return result;
        }

        let result = self.resolve_from_ledger(&parsed.did).await;
        if result.is_found() {
            self.cache.insert(
                parsed.did.clone(),
                CachedResolution {
                    result: result.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }
        result
    }
}

/// Dispatches resolution to the resolver registered for the DID's method.
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn DidResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    pub fn register(&mut self, resolver: Arc<dyn DidResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DidResolver for ResolverRegistry {
    fn supported_methods(&self) -> &[&str] {
        &[]
    }

    async fn resolve(&self, did: &str) -> DidResolutionResult {
        let Some(parsed) = parse_did(did) else {
            return DidResolutionResult::failed(
                ERROR_NOT_FOUND,
                format!("resolver_error: Unable to resolve did '{}': Invalid DID", did),
            );
        };
        match self
            .resolvers
            .iter()
            .find(|r| r.supported_methods().contains(&parsed.method.as_str()))
        {
            Some(resolver) => resolver.resolve(did).await,
            None => DidResolutionResult::failed(
                ERROR_METHOD_NOT_SUPPORTED,
                format!("No resolver for method '{}'", parsed.method),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orcl_crypto::KeyPair;
    use orcl_ledger::InMemoryLedger;

    async fn setup() -> (Arc<InMemoryLedger>, OrclDidResolver, String) {
        let ledger = Arc::new(InMemoryLedger::new());
        let key = KeyPair::generate().public_key();
        let doc = ledger.create(&key.to_multibase()).await.unwrap();
        let did = doc["id"].as_str().unwrap().to_string();
        let resolver = OrclDidResolver::new(ledger.clone(), Duration::from_secs(60));
        (ledger, resolver, did)
    }

    #[tokio::test]
    async fn test_resolve_found() {
        let (_ledger, resolver, did) = setup().await;
        let result = resolver.resolve(&did).await;
        assert!(result.is_found());
        assert!(!result.is_deactivated());
        assert_eq!(result.did_document.unwrap().id, did);
        assert!(result.did_resolution_metadata.error.is_none());
    }

    #[tokio::test]
    async fn test_resolve_unknown_is_not_found() {
        let (_ledger, resolver, _) = setup().await;
        let result = resolver
            .resolve("did:orcl:00000000-0000-4000-8000-000000000000")
            .await;
        assert!(result.did_document.is_none());
        assert_eq!(
            result.did_resolution_metadata.error.as_deref(),
            Some(ERROR_NOT_FOUND)
        );
    }

    #[tokio::test]
    async fn test_resolve_garbage_never_panics() {
        let (_ledger, resolver, _) = setup().await;
        for input in ["", "not-a-did", "did:wrong:!!", "did:orcl:not-a-uuid"] {
            let result = resolver.resolve(input).await;
            assert_eq!(
                result.did_resolution_metadata.error.as_deref(),
                Some(ERROR_NOT_FOUND),
                "input {:?}",
                input
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_did_url_rejected() {
        let (_ledger, resolver, did) = setup().await;
        let result = resolver.resolve(&format!("{}#keys-1", did)).await;
        assert_eq!(
            result.did_resolution_metadata.error.as_deref(),
            Some(ERROR_INVALID_DID_URL)
        );
    }

    #[tokio::test]
    async fn test_cache_survives_ledger_outage() {
        let (ledger, resolver, did) = setup().await;
        assert!(resolver.resolve(&did).await.is_found());
        assert_eq!(resolver.cached_count(), 1);

        ledger.set_offline(true);
        assert!(resolver.resolve(&did).await.is_found());

        resolver.invalidate(&did);
        let result = resolver.resolve(&did).await;
        assert!(!result.is_found());
        assert!(result
            .did_resolution_metadata
            .message
            .unwrap()
            .contains("ledger unreachable"));
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let ledger = Arc::new(InMemoryLedger::new());
        let doc = ledger.create("z6MkKey").await.unwrap();
        let did = doc["id"].as_str().unwrap().to_string();
        let resolver = OrclDidResolver::new(ledger.clone(), Duration::ZERO);

        assert!(resolver.resolve(&did).await.is_found());
        ledger.deactivate(&did).await.unwrap();
        assert!(resolver.resolve(&did).await.is_deactivated());
    }

    #[tokio::test]
    async fn test_registry_dispatches_by_method() {
        let (_ledger, resolver, did) = setup().await;
        let mut registry = ResolverRegistry::new();
        registry.register(Arc::new(resolver));
        assert_eq!(registry.resolver_count(), 1);

        assert!(registry.resolve(&did).await.is_found());
        let other = registry.resolve("did:web:example-com").await;
        assert_eq!(
            other.did_resolution_metadata.error.as_deref(),
            Some(ERROR_METHOD_NOT_SUPPORTED)
        );
    }
}
