//! Business registry client — identity lookup boundary.
//!
//! Talks to the national business register's JSON endpoints, which wrap
//! their payloads in a JSONP callback. Without a configured GUID the client
//! falls back to deterministic mock results so the rest of the flow can be
//! exercised offline.

use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// How a search term should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// A registered identifier (ABN).
    Identifier,
    /// A business name.
    Name,
}

impl SearchKind {
    /// Classify free-form input: nine or more digits is an identifier.
    pub fn detect(input: &str) -> Self {
        let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.chars().all(|c| c.is_ascii_digit()) && digits.len() >= 9 {
            Self::Identifier
        } else {
            Self::Name
        }
    }
}

/// A registry search candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub abn: String,
    pub entity_name: String,
    pub entity_type: String,
    pub gst_registered: bool,
    pub state: String,
    pub postcode: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_start_date: Option<String>,
}

/// The identity lookup boundary.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    async fn search(&self, term: &str, kind: SearchKind) -> Result<Vec<Candidate>, RegistryError>;

    async fn fetch(&self, abn: &str) -> Result<Option<Candidate>, RegistryError>;
}

/// HTTP client for the business register.
pub struct BusinessRegistryClient {
    http: reqwest::Client,
    guid: Option<SecretString>,
    base_url: String,
    max_results: usize,
}

impl BusinessRegistryClient {
    pub fn new(http: reqwest::Client, guid: Option<SecretString>, max_results: usize) -> Self {
        Self {
            http,
            guid,
            base_url: "https://abr.business.gov.au/json".to_string(),
            max_results,
        }
    }

    /// Override the endpoint base (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_jsonp(&self, url: &str, params: &[(&str, &str)]) -> Result<String, RegistryError> {
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| RegistryError::RequestFailed {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RegistryError::BadStatus {
                status: response.status().as_u16(),
            });
        }

        response.text().await.map_err(|e| RegistryError::RequestFailed {
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl IdentityRegistry for BusinessRegistryClient {
    async fn search(&self, term: &str, kind: SearchKind) -> Result<Vec<Candidate>, RegistryError> {
        let Some(ref guid) = self.guid else {
            tracing::debug!("Registry GUID not configured, serving mock results");
            return Ok(mock_search(term, kind, self.max_results));
        };

        let body = match kind {
            SearchKind::Identifier => {
                let clean: String = term.chars().filter(|c| !c.is_whitespace()).collect();
                let url = format!("{}/AbnDetails.aspx", self.base_url);
                self.get_jsonp(
                    &url,
                    &[("abn", clean.as_str()), ("callback", "c"), ("guid", guid.expose_secret())],
                )
                .await?
            }
            SearchKind::Name => {
                let url = format!("{}/MatchingNames.aspx", self.base_url);
                let max = self.max_results.to_string();
                self.get_jsonp(
                    &url,
                    &[
                        ("name", term),
                        ("maxResults", max.as_str()),
                        ("callback", "c"),
                        ("guid", guid.expose_secret()),
                    ],
                )
                .await?
            }
        };

        let parsed = parse_jsonp(&body, kind, self.max_results)?;
        tracing::info!(count = parsed.len(), "Registry search settled");
        Ok(parsed)
    }

    async fn fetch(&self, abn: &str) -> Result<Option<Candidate>, RegistryError> {
        let candidates = self.search(abn, SearchKind::Identifier).await?;
        Ok(candidates.into_iter().next())
    }
}

/// Unwrap the JSONP callback (`c({...})`) and parse the payload.
fn parse_jsonp(body: &str, kind: SearchKind, max_results: usize) -> Result<Vec<Candidate>, RegistryError> {
    let re = Regex::new(r"(?s)c\((.*)\)").expect("static regex");
    let inner = re
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| RegistryError::ParseFailed {
            reason: "missing JSONP callback wrapper".to_string(),
        })?;

    let data: serde_json::Value =
        serde_json::from_str(inner).map_err(|e| RegistryError::ParseFailed {
            reason: e.to_string(),
        })?;

    match kind {
        SearchKind::Identifier => {
            let abn = data["Abn"].as_str().unwrap_or_default().to_string();
            if abn.is_empty() {
                return Ok(Vec::new());
            }
            let name = data["EntityName"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(String::from)
                .or_else(|| {
                    data["BusinessName"]
                        .as_array()
                        .and_then(|names| names.first())
                        .and_then(|n| n.as_str())
                        .map(String::from)
                })
                .unwrap_or_else(|| "Unknown".to_string());
            Ok(vec![Candidate {
                abn,
                entity_name: name,
                entity_type: data["EntityTypeName"].as_str().unwrap_or("Unknown").to_string(),
                gst_registered: data["Gst"].as_str().is_some_and(|g| !g.is_empty()),
                state: data["AddressState"].as_str().unwrap_or_default().to_string(),
                postcode: data["AddressPostcode"].as_str().unwrap_or_default().to_string(),
                status: data["AbnStatus"].as_str().unwrap_or("Unknown").to_string(),
                score: None,
                entity_start_date: data["EntityStartDate"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .map(String::from),
            }])
        }
        SearchKind::Name => {
            // The same ABN can appear twice (entity name + trading name).
            // Deduplicate by ABN, preferring the trading name entry.
            let names = data["Names"].as_array().cloned().unwrap_or_default();
            let mut by_abn: Vec<(String, Candidate)> = Vec::new();
            for entry in names {
                let abn = entry["Abn"].as_str().unwrap_or_default().to_string();
                if abn.is_empty() {
                    continue;
                }
                let name_type = entry["NameType"].as_str().unwrap_or_default().to_string();
                let candidate = Candidate {
                    abn: abn.clone(),
                    entity_name: entry["Name"].as_str().unwrap_or("Unknown").to_string(),
                    entity_type: name_type.clone(),
                    gst_registered: false,
                    state: entry["State"].as_str().unwrap_or_default().to_string(),
                    postcode: entry["Postcode"].as_str().unwrap_or_default().to_string(),
                    status: "Active".to_string(),
                    score: entry["Score"].as_u64().map(|s| s as u32),
                    entity_start_date: None,
                };
                match by_abn.iter_mut().find(|(existing, _)| *existing == abn) {
                    Some((_, slot)) => {
                        if matches!(name_type.as_str(), "Business Name" | "Trading Name") {
                            *slot = candidate;
                        }
                    }
                    None => by_abn.push((abn, candidate)),
                }
            }
            Ok(by_abn
                .into_iter()
                .map(|(_, candidate)| candidate)
                .take(max_results)
                .collect())
        }
    }
}

/// Deterministic mock results for development without a registry key.
fn mock_search(term: &str, kind: SearchKind, _max_results: usize) -> Vec<Candidate> {
    match kind {
        SearchKind::Identifier => {
            let clean: String = term.chars().filter(|c| !c.is_whitespace()).collect();
            vec![Candidate {
                abn: clean.clone(),
                entity_name: format!("Business with ABN {clean}"),
                entity_type: "Australian Private Company".to_string(),
                gst_registered: true,
                state: "NSW".to_string(),
                postcode: "2000".to_string(),
                status: "Active".to_string(),
                score: None,
                entity_start_date: None,
            }]
        }
        SearchKind::Name => {
            let lower = term.to_lowercase();
            let title = titlecase(term.trim());
            let name = if lower.contains("pty") || lower.contains("ltd") {
                title
            } else {
                format!("{title} Pty Ltd")
            };
            vec![Candidate {
                abn: "51824753556".to_string(),
                entity_name: name,
                entity_type: "Australian Private Company".to_string(),
                gst_registered: true,
                state: "NSW".to_string(),
                postcode: "2095".to_string(),
                status: "Active".to_string(),
                score: Some(100),
                entity_start_date: None,
            }]
        }
    }
}

fn titlecase(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
