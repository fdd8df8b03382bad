//! Service category taxonomy.
//!
//! Static category → subcategory dataset loaded once at startup. Service
//! mapping resolves collaborator output against it, and the gap computation
//! feeds the clarification question in service discovery.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::normalize::ServiceSelection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
    pub subcategories: Vec<Subcategory>,
}

/// Trade keywords (matched against business names and licence classes) and
/// the category each maps to.
const TRADE_KEYWORDS: &[(&str, &str)] = &[
    ("electri", "Electrician"),
    ("plumb", "Plumber"),
    ("gas fit", "Plumber"),
    ("paint", "Painter"),
    ("clean", "Cleaner"),
    ("garden", "Gardener"),
    ("landscap", "Landscaper"),
    ("carpent", "Carpenter"),
    ("build", "Builder"),
    ("roof", "Roofer"),
    ("tile", "Tiler"),
    ("tiling", "Tiler"),
    ("handyman", "Handyman"),
    ("locksmith", "Locksmith"),
];

/// The in-memory taxonomy.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Taxonomy {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::DatasetLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw).map_err(|e| ConfigError::DatasetLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let categories: Vec<Category> = serde_json::from_str(raw)?;
        Ok(Self { categories })
    }

    /// The taxonomy bundled with the crate.
    pub fn bundled() -> Self {
        Self::from_json(include_str!("../data/taxonomy.json"))
            .expect("bundled taxonomy is valid JSON")
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        let needle = name.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.name.to_lowercase() == needle)
    }

    /// Text rendering for collaborator prompts.
    pub fn as_prompt_text(&self) -> String {
        let mut lines = Vec::new();
        for category in &self.categories {
            lines.push(format!("{} (id: {}):", category.name, category.id));
            for sub in &category.subcategories {
                lines.push(format!("  - {} (id: {})", sub.name, sub.id));
            }
        }
        lines.join("\n")
    }

    /// Text rendering restricted to the named categories, for trimmed
    /// follow-up prompts.
    pub fn as_prompt_text_for(&self, category_names: &[String]) -> String {
        if category_names.is_empty() {
            return self.as_prompt_text();
        }
        let mut lines = Vec::new();
        for category in &self.categories {
            if !category_names
                .iter()
                .any(|n| n.eq_ignore_ascii_case(&category.name))
            {
                continue;
            }
            lines.push(format!("{} (id: {}):", category.name, category.id));
            for sub in &category.subcategories {
                lines.push(format!("  - {} (id: {})", sub.name, sub.id));
            }
        }
        if lines.is_empty() {
            self.as_prompt_text()
        } else {
            lines.join("\n")
        }
    }

    /// Match free text (business name, licence class) to a category via the
    /// trade keyword table.
    pub fn match_trade(&self, text: &str) -> Option<&Category> {
        let lower = text.to_lowercase();
        TRADE_KEYWORDS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .and_then(|(_, category)| self.category(category))
    }

    /// Subcategories of the dominant category not yet covered by the mapped
    /// services. Detection priority: dominant category among the mapped
    /// services, then business-name keyword, then licence-class keyword.
    pub fn gaps(
        &self,
        services: &[ServiceSelection],
        business_name: &str,
        licence_classes: &[String],
    ) -> Vec<ServiceSelection> {
        let category = self
            .dominant_category(services)
            .or_else(|| self.match_trade(business_name))
            .or_else(|| {
                licence_classes
                    .iter()
                    .find_map(|class| self.match_trade(class))
            });

        let Some(category) = category else {
            return Vec::new();
        };

        let mapped: Vec<u32> = services.iter().map(|s| s.subcategory_id).collect();
        category
            .subcategories
            .iter()
            .filter(|sub| !mapped.contains(&sub.id))
            .map(|sub| ServiceSelection {
                input: String::new(),
                category_name: category.name.clone(),
                category_id: category.id,
                subcategory_name: sub.name.clone(),
                subcategory_id: sub.id,
                confidence: None,
            })
            .collect()
    }

    fn dominant_category(&self, services: &[ServiceSelection]) -> Option<&Category> {
        let mut counts: std::collections::BTreeMap<&str, usize> = Default::default();
        for service in services {
            if !service.category_name.is_empty() {
                *counts.entry(service.category_name.as_str()).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .and_then(|(name, _)| self.category(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_taxonomy_loads() {
        let taxonomy = Taxonomy::bundled();
        assert!(taxonomy.category("Electrician").is_some());
        assert!(taxonomy.category("Plumber").is_some());
    }

    #[test]
    fn prompt_text_lists_subcategories() {
        let text = Taxonomy::bundled().as_prompt_text();
        assert!(text.contains("Electrician (id:"));
        assert!(text.contains("  - "));
    }

    #[test]
    fn match_trade_from_business_name() {
        let taxonomy = Taxonomy::bundled();
        let category = taxonomy.match_trade("DANS PLUMBING PTY LTD").unwrap();
        assert_eq!(category.name, "Plumber");
        assert!(taxonomy.match_trade("ACME HOLDINGS").is_none());
    }

    #[test]
    fn gaps_prefers_mapped_services_over_name() {
        let taxonomy = Taxonomy::bundled();
        let plumber = taxonomy.category("Plumber").unwrap();
        // Business name says electrical, but the mapped services are plumbing
        let services = vec![ServiceSelection {
            input: "hot water".into(),
            category_name: "Plumber".into(),
            category_id: plumber.id,
            subcategory_name: plumber.subcategories[0].name.clone(),
            subcategory_id: plumber.subcategories[0].id,
            confidence: None,
        }];
        let gaps = taxonomy.gaps(&services, "SPARKY ELECTRICAL", &[]);
        assert!(!gaps.is_empty());
        assert!(gaps.iter().all(|g| g.category_name == "Plumber"));
        assert!(gaps.iter().all(|g| g.subcategory_id != services[0].subcategory_id));
    }

    #[test]
    fn gaps_falls_back_to_licence_classes() {
        let taxonomy = Taxonomy::bundled();
        let gaps = taxonomy.gaps(&[], "STACEY, MATTHEW GREGORY", &["Electrician".to_string()]);
        assert!(!gaps.is_empty());
        assert!(gaps.iter().all(|g| g.category_name == "Electrician"));
    }

    #[test]
    fn gaps_empty_without_signal() {
        let taxonomy = Taxonomy::bundled();
        assert!(taxonomy.gaps(&[], "ACME HOLDINGS", &[]).is_empty());
    }

    #[test]
    fn restricted_prompt_text() {
        let taxonomy = Taxonomy::bundled();
        let text = taxonomy.as_prompt_text_for(&["Plumber".to_string()]);
        assert!(text.contains("Plumber"));
        assert!(!text.contains("Electrician (id:"));
    }
}
