//! Licensing register client.
//!
//! Geographically scoped: the register only covers certain jurisdictions,
//! and an out-of-scope subject yields `NoCoverage` — a normal outcome, not
//! a failure. Authenticates via OAuth client-credentials with a cached
//! bearer token.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::EnrichmentFailure;

use super::{ConfirmedIdentity, EnrichmentPayload, EnrichmentResult, EnrichmentService};

/// Extracted licence profile for a confirmed business.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenceProfile {
    pub licensee: String,
    pub licence_number: String,
    pub licence_type: String,
    pub status: String,
    pub expiry_date: String,
    /// Active trade classes — the strongest service-mapping signal.
    pub classes: Vec<String>,
    /// No public warnings, suspensions, or prosecutions on record.
    pub compliance_clean: bool,
    /// An active individual party in a principal role, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct CachedToken {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Licensing register client. Currently scoped to NSW.
pub struct LicensingClient {
    http: reqwest::Client,
    api_key: Option<SecretString>,
    auth_header: Option<SecretString>,
    base_url: String,
    token_url: String,
    covered_states: Vec<String>,
    timeout: Duration,
    token: RwLock<CachedToken>,
}

impl LicensingClient {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<SecretString>,
        auth_header: Option<SecretString>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            api_key,
            auth_header,
            base_url: "https://api.onegov.nsw.gov.au/tradesregister/v1".to_string(),
            token_url: "https://api.onegov.nsw.gov.au/oauth/client_credential/accesstoken"
                .to_string(),
            covered_states: vec!["NSW".to_string()],
            timeout,
            token: RwLock::new(CachedToken::default()),
        }
    }

    /// Override endpoints (tests).
    pub fn with_urls(mut self, base_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.token_url = token_url.into();
        self
    }

    /// Get or refresh the OAuth bearer token. A 60 s buffer avoids using a
    /// token that expires mid-request.
    async fn bearer_token(&self) -> Result<String, EnrichmentFailure> {
        {
            let cached = self.token.read().await;
            if !cached.access_token.is_empty() {
                if let Some(expires_at) = cached.expires_at {
                    if Utc::now() < expires_at - chrono::Duration::seconds(60) {
                        return Ok(cached.access_token.clone());
                    }
                }
            }
        }

        let auth_header = self.auth_header.as_ref().ok_or_else(|| {
            EnrichmentFailure::Transport {
                service: "licensing".to_string(),
                reason: "licensing register not configured".to_string(),
            }
        })?;

        let response = self
            .http
            .get(&self.token_url)
            .query(&[("grant_type", "client_credentials")])
            .header("Authorization", auth_header.expose_secret())
            .send()
            .await
            .map_err(|e| EnrichmentFailure::Transport {
                service: "licensing".to_string(),
                reason: format!("token request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(EnrichmentFailure::Transport {
                service: "licensing".to_string(),
                reason: format!("token endpoint returned {}", response.status()),
            });
        }

        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| EnrichmentFailure::Transport {
                    service: "licensing".to_string(),
                    reason: format!("token response not JSON: {e}"),
                })?;

        let access_token = body["access_token"].as_str().unwrap_or_default().to_string();
        if access_token.is_empty() {
            return Err(EnrichmentFailure::Transport {
                service: "licensing".to_string(),
                reason: "token response missing access_token".to_string(),
            });
        }
        let expires_in = body["expires_in"]
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .or_else(|| body["expires_in"].as_i64())
            .unwrap_or(43_200);

        let mut cached = self.token.write().await;
        cached.access_token = access_token.clone();
        cached.expires_at = Some(Utc::now() + chrono::Duration::seconds(expires_in));
        tracing::debug!(expires_in, "Licensing OAuth token refreshed");

        Ok(access_token)
    }

    async fn api_get(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, EnrichmentFailure> {
        let token = self.bearer_token().await?;
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EnrichmentFailure::Transport {
                service: "licensing".to_string(),
                reason: "licensing register not configured".to_string(),
            }
        })?;

        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(params)
            .header("Authorization", format!("Bearer {token}"))
            .header("apikey", api_key.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| EnrichmentFailure::Transport {
                service: "licensing".to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(EnrichmentFailure::Transport {
                service: "licensing".to_string(),
                reason: format!("register returned {}", response.status()),
            });
        }

        response
            .json()
            .await
            .map_err(|e| EnrichmentFailure::Transport {
                service: "licensing".to_string(),
                reason: format!("register response not JSON: {e}"),
            })
    }

    /// Browse the register by licensee name.
    async fn browse(&self, name: &str) -> Result<Vec<serde_json::Value>, EnrichmentFailure> {
        let data = self.api_get("/browse", &[("searchText", name)]).await?;
        Ok(data.as_array().cloned().unwrap_or_default())
    }

    /// Fetch full details for one licence.
    async fn details(&self, licence_id: &str) -> Result<serde_json::Value, EnrichmentFailure> {
        self.api_get("/details", &[("licenceid", licence_id)]).await
    }
}

#[async_trait]
impl EnrichmentService for LicensingClient {
    fn name(&self) -> &str {
        "licensing"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn lookup(&self, identity: &ConfirmedIdentity) -> EnrichmentResult {
        if !self.covered_states.iter().any(|s| *s == identity.state) {
            tracing::debug!(state = %identity.state, "Licensing register has no coverage for this jurisdiction");
            return EnrichmentResult::NoCoverage;
        }

        // Apostrophes break the register's search endpoint.
        let clean_name: String = identity
            .business_name
            .chars()
            .filter(|c| *c != '\'' && *c != '\u{2019}')
            .collect();

        let matches = match self.browse(&clean_name).await {
            Ok(matches) => matches,
            Err(failure) => return EnrichmentResult::Failure(failure),
        };

        let Some(best) = best_current_match(&matches, &clean_name) else {
            return EnrichmentResult::Failure(EnrichmentFailure::NotFound {
                service: "licensing".to_string(),
            });
        };

        let licence_id = best["licenceID"].as_str().unwrap_or_default();
        if licence_id.is_empty() {
            return EnrichmentResult::Failure(EnrichmentFailure::NotFound {
                service: "licensing".to_string(),
            });
        }

        match self.details(licence_id).await {
            Ok(data) => EnrichmentResult::Success(EnrichmentPayload::Licence(
                profile_from_details(&data),
            )),
            Err(failure) => EnrichmentResult::Failure(failure),
        }
    }
}

/// Pick the best current licence: prefer a licensee whose name contains (or
/// is contained by) the business name, otherwise the first current entry.
fn best_current_match<'a>(
    matches: &'a [serde_json::Value],
    business_name: &str,
) -> Option<&'a serde_json::Value> {
    let name_lower = business_name.to_lowercase();
    let current = matches
        .iter()
        .filter(|m| m["status"].as_str() == Some("Current"));

    let by_name = current.clone().find(|m| {
        let licensee = m["licensee"].as_str().unwrap_or_default().to_lowercase();
        !licensee.is_empty() && (licensee.contains(&name_lower) || name_lower.contains(&licensee))
    });

    by_name.or_else(|| {
        matches
            .iter()
            .find(|m| m["status"].as_str() == Some("Current"))
    })
}

/// Extract a `LicenceProfile` from the register's details payload.
fn profile_from_details(data: &serde_json::Value) -> LicenceProfile {
    let detail = &data["licenceDetail"];

    let classes: Vec<String> = data["licenceClasses"]
        .as_array()
        .map(|classes| {
            classes
                .iter()
                .filter(|c| c["isActive"].as_str() == Some("True"))
                .filter_map(|c| c["className"].as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let compliance = &data["complianceActions"];
    let compliance_clean = if compliance.is_object() {
        compliance["publicWarningsCount"].as_i64().unwrap_or(0) == 0
            && compliance["cautionReprimandCount"].as_i64().unwrap_or(0) == 0
            && compliance["suspensions"]
                .as_array()
                .map(|a| a.is_empty())
                .unwrap_or(true)
            && compliance["prosecutions"]
                .as_array()
                .map(|a| a.is_empty())
                .unwrap_or(true)
    } else {
        true
    };

    const PRINCIPAL_ROLES: &[&str] =
        &["Director", "Nominated Supervisor", "Partner", "Sole Trader"];
    let contact_name = data["associatedParties"].as_array().and_then(|parties| {
        parties
            .iter()
            .filter(|p| p["isActive"].as_str() == Some("True"))
            .find(|p| {
                p["partyType"].as_str() == Some("Individual")
                    && p["role"]
                        .as_str()
                        .is_some_and(|role| PRINCIPAL_ROLES.contains(&role))
            })
            .and_then(|p| p["name"].as_str())
            .filter(|name| !name.is_empty())
            .map(String::from)
    });

    LicenceProfile {
        licensee: detail["licensee"].as_str().unwrap_or_default().to_string(),
        licence_number: detail["licenceNumber"].as_str().unwrap_or_default().to_string(),
        licence_type: detail["licenceType"].as_str().unwrap_or_default().to_string(),
        status: detail["status"].as_str().unwrap_or_default().to_string(),
        expiry_date: detail["expiryDate"].as_str().unwrap_or_default().to_string(),
        classes,
        compliance_clean,
        contact_name,
    }
}
