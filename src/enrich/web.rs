//! Web-presence search client.
//!
//! Country-scoped web search over the confirmed business name. Result
//! snippets also feed a best-effort contact phone extraction.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::EnrichmentFailure;

use super::{ConfirmedIdentity, EnrichmentPayload, EnrichmentResult, EnrichmentService};

/// One web search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Web presence derived for a confirmed business.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebPresence {
    pub hits: Vec<WebHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
}

/// Web search client.
pub struct WebSearchClient {
    http: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    result_count: usize,
    timeout: Duration,
}

impl WebSearchClient {
    pub fn new(http: reqwest::Client, api_key: Option<SecretString>, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            base_url: "https://api.search.brave.com/res/v1/web/search".to_string(),
            result_count: 5,
            timeout,
        }
    }

    /// Override the endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Run a search. Retries once on rate limiting.
    pub async fn search(&self, query: &str) -> Result<Vec<WebHit>, EnrichmentFailure> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EnrichmentFailure::Transport {
                service: "web".to_string(),
                reason: "web search not configured".to_string(),
            }
        })?;

        let count = self.result_count.to_string();
        for attempt in 0..2 {
            let response = self
                .http
                .get(&self.base_url)
                .header("Accept", "application/json")
                .header("X-Subscription-Token", api_key.expose_secret())
                .query(&[("q", query), ("count", count.as_str()), ("country", "AU")])
                .send()
                .await
                .map_err(|e| EnrichmentFailure::Transport {
                    service: "web".to_string(),
                    reason: e.to_string(),
                })?;

            if response.status().as_u16() == 429 && attempt == 0 {
                tracing::debug!("Web search rate limited, retrying once");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }

            if !response.status().is_success() {
                return Err(EnrichmentFailure::Transport {
                    service: "web".to_string(),
                    reason: format!("search returned {}", response.status()),
                });
            }

            let data: serde_json::Value =
                response
                    .json()
                    .await
                    .map_err(|e| EnrichmentFailure::Transport {
                        service: "web".to_string(),
                        reason: format!("search response not JSON: {e}"),
                    })?;

            let hits = data["web"]["results"]
                .as_array()
                .map(|results| {
                    results
                        .iter()
                        .take(self.result_count)
                        .map(|item| WebHit {
                            title: item["title"].as_str().unwrap_or_default().to_string(),
                            url: item["url"].as_str().unwrap_or_default().to_string(),
                            snippet: item["description"].as_str().unwrap_or_default().to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            return Ok(hits);
        }

        Err(EnrichmentFailure::Transport {
            service: "web".to_string(),
            reason: "rate limited".to_string(),
        })
    }
}

#[async_trait]
impl EnrichmentService for WebSearchClient {
    fn name(&self) -> &str {
        "web"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn lookup(&self, identity: &ConfirmedIdentity) -> EnrichmentResult {
        let query = format!("{} {} tradesperson", identity.business_name, identity.state);
        match self.search(&query).await {
            Ok(hits) => {
                let contact_phone = extract_phone(&hits);
                EnrichmentResult::Success(EnrichmentPayload::WebPresence(WebPresence {
                    hits,
                    contact_phone,
                }))
            }
            Err(failure) => EnrichmentResult::Failure(failure),
        }
    }
}

/// Pull the first AU-looking phone number out of the top snippets:
/// 1300/1800 numbers, mobiles, and bracketed area codes.
pub fn extract_phone(hits: &[WebHit]) -> Option<String> {
    let re = Regex::new(
        r"(?:1[38]00\s?\d{3}\s?\d{3}|0[24]\d{2}\s?\d{3}\s?\d{3}|\(0\d\)\s?\d{4}\s?\d{4})",
    )
    .expect("static regex");

    hits.iter()
        .take(3)
        .find_map(|hit| re.find(&hit.snippet).map(|m| m.as_str().trim().to_string()))
}
