//! Enrichment fan-out — concurrent, partial-failure-tolerant lookups.
//!
//! Given a confirmed identity, the coordinator issues one call per
//! configured service concurrently, applies per-call timeouts, and waits
//! for every call to settle before returning. Any subset may fail without
//! failing the whole enrichment; downstream treats every entry as optional
//! context.

pub mod licensing;
pub mod registry;
pub mod web;

pub use licensing::{LicenceProfile, LicensingClient};
pub use registry::{BusinessRegistryClient, Candidate, IdentityRegistry, SearchKind};
pub use web::{WebHit, WebPresence, WebSearchClient};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EnrichmentFailure;

/// The confirmed identity enrichment runs against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedIdentity {
    pub business_name: String,
    pub abn: String,
    pub entity_type: String,
    pub gst_registered: bool,
    pub state: String,
    pub postcode: String,
}

/// A successful enrichment payload, typed per service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnrichmentPayload {
    Licence(LicenceProfile),
    WebPresence(WebPresence),
}

/// The settled outcome of one enrichment call.
///
/// `NoCoverage` is distinct from failure: the service's geographic scope
/// simply excludes the subject's jurisdiction. It is non-retryable and
/// carries no confidence penalty downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnrichmentResult {
    Success(EnrichmentPayload),
    NoCoverage,
    Failure(EnrichmentFailure),
}

impl EnrichmentResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn licence(&self) -> Option<&LicenceProfile> {
        match self {
            Self::Success(EnrichmentPayload::Licence(profile)) => Some(profile),
            _ => None,
        }
    }

    pub fn web_presence(&self) -> Option<&WebPresence> {
        match self {
            Self::Success(EnrichmentPayload::WebPresence(presence)) => Some(presence),
            _ => None,
        }
    }
}

/// One enrichment boundary: a named service with its own timeout.
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    fn name(&self) -> &str;

    fn timeout(&self) -> Duration;

    /// Run the lookup. Transport problems and misses are returned as typed
    /// results, never as panics or turn failures. Timeout enforcement is
    /// the coordinator's job.
    async fn lookup(&self, identity: &ConfirmedIdentity) -> EnrichmentResult;
}

/// Fans out to all configured services and joins the settled results.
pub struct EnrichmentCoordinator {
    services: Vec<Arc<dyn EnrichmentService>>,
}

impl EnrichmentCoordinator {
    pub fn new(services: Vec<Arc<dyn EnrichmentService>>) -> Self {
        Self { services }
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    /// Issue every configured lookup concurrently and wait for all of them
    /// to settle. Total latency is bounded by the slowest per-call timeout,
    /// not the sum.
    pub async fn enrich(
        &self,
        identity: &ConfirmedIdentity,
    ) -> HashMap<String, EnrichmentResult> {
        let calls = self.services.iter().map(|service| {
            let service = Arc::clone(service);
            async move {
                let name = service.name().to_string();
                let timeout = service.timeout();
                let result = match tokio::time::timeout(timeout, service.lookup(identity)).await
                {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(service = %name, timeout_ms = timeout.as_millis() as u64, "Enrichment call timed out");
                        EnrichmentResult::Failure(EnrichmentFailure::Timeout {
                            service: name.clone(),
                            timeout_ms: timeout.as_millis() as u64,
                        })
                    }
                };
                (name, result)
            }
        });

        let settled = futures::future::join_all(calls).await;
        let map: HashMap<String, EnrichmentResult> = settled.into_iter().collect();

        let successes = map.values().filter(|r| r.is_success()).count();
        tracing::info!(
            services = map.len(),
            successes,
            "Enrichment join settled"
        );
        map
    }
}
