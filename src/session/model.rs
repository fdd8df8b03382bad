//! Session data model — transcript, typed collected facts, final record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::node::NodeId;
use crate::enrich::{Candidate, ConfirmedIdentity, EnrichmentResult, LicenceProfile, WebHit};
use crate::geo::CoverageArea;
use crate::normalize::{PlanChoice, QuickReply, ServiceSelection};

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Identity verification facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityFacts {
    /// What the user last searched for.
    pub search_input: String,
    /// Candidates awaiting disambiguation.
    pub candidates: Vec<Candidate>,
    /// The confirmed identity, once verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<ConfirmedIdentity>,
    pub verified: bool,
}

/// Enrichment-derived facts. Every entry is optional context downstream —
/// absence reduces confidence, never blocks progression.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentFacts {
    pub results: HashMap<String, EnrichmentResult>,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_phone: String,
}

impl EnrichmentFacts {
    pub fn licence(&self) -> Option<&LicenceProfile> {
        self.results.values().find_map(|r| r.licence())
    }

    pub fn licence_classes(&self) -> Vec<String> {
        self.licence().map(|l| l.classes.clone()).unwrap_or_default()
    }

    pub fn web_hits(&self) -> Vec<WebHit> {
        self.results
            .values()
            .find_map(|r| r.web_presence())
            .map(|w| w.hits.clone())
            .unwrap_or_default()
    }
}

/// Service discovery facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceFacts {
    pub services: Vec<ServiceSelection>,
    #[serde(default)]
    pub raw_input: String,
    pub confirmed: bool,
    /// Clarification rounds consumed in the current visit.
    #[serde(default)]
    pub rounds: u32,
}

/// Coverage facts. The area is recomputed wholesale on each ServiceArea
/// run; `user_exclusions` persist across recomputations within the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageFacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<CoverageArea>,
    #[serde(default)]
    pub user_exclusions: Vec<String>,
    pub confirmed: bool,
    #[serde(default)]
    pub rounds: u32,
}

/// Plan selection facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFacts {
    pub choice: PlanChoice,
}

/// Typed collected facts, one independently settable/mergeable slot per
/// domain area. Append/overwrite only: no node may silently drop another
/// node's fields — only explicit edit operations target them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectedFacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityFacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentFacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<ServiceFacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageFacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanFacts>,
}

impl CollectedFacts {
    pub fn identity_mut(&mut self) -> &mut IdentityFacts {
        self.identity.get_or_insert_with(IdentityFacts::default)
    }

    pub fn enrichment_mut(&mut self) -> &mut EnrichmentFacts {
        self.enrichment.get_or_insert_with(EnrichmentFacts::default)
    }

    pub fn services_mut(&mut self) -> &mut ServiceFacts {
        self.services.get_or_insert_with(ServiceFacts::default)
    }

    pub fn coverage_mut(&mut self) -> &mut CoverageFacts {
        self.coverage.get_or_insert_with(CoverageFacts::default)
    }

    pub fn confirmed_identity(&self) -> Option<&ConfirmedIdentity> {
        self.identity.as_ref().and_then(|i| i.confirmed.as_ref())
    }

    pub fn business_name(&self) -> &str {
        self.confirmed_identity()
            .map(|i| i.business_name.as_str())
            .unwrap_or("")
    }
}

/// A session — the unit of conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub current_node: NodeId,
    pub transcript: Vec<Turn>,
    pub facts: CollectedFacts,
    /// Monotonically increasing inbound-turn counter.
    pub turn_counter: u64,
    /// The greeting has been delivered.
    #[serde(default)]
    pub greeted: bool,
    /// The user confirmed the profile review summary.
    #[serde(default)]
    pub reviewed: bool,
    pub completed: bool,
    /// Written exactly once, at the Complete node. Immutable afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_record: Option<FinalRecord>,
    /// The most recent explicit option list, inherited by steps whose
    /// options are absent, and the quick-match lookup set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_options: Option<Vec<QuickReply>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            current_node: NodeId::Greeting,
            transcript: Vec::new(),
            facts: CollectedFacts::default(),
            turn_counter: 0,
            greeted: false,
            reviewed: false,
            completed: false,
            final_record: None,
            last_options: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_user_turn(&mut self, content: &str) {
        self.turn_counter += 1;
        self.updated_at = Utc::now();
        self.transcript.push(Turn {
            role: TurnRole::User,
            content: content.to_string(),
            at: self.updated_at,
        });
    }

    pub fn push_assistant_turn(&mut self, content: &str) {
        self.updated_at = Utc::now();
        self.transcript.push(Turn {
            role: TurnRole::Assistant,
            content: content.to_string(),
            at: self.updated_at,
        });
    }

    /// The last user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.transcript
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::User)
            .map(|t| t.content.as_str())
    }

    /// Recent conversation, formatted for collaborator context.
    pub fn recent_conversation(&self, max_turns: usize) -> String {
        let turns: Vec<&Turn> = self.transcript.iter().rev().take(max_turns * 2).collect();
        let mut lines: Vec<String> = turns
            .into_iter()
            .rev()
            .map(|t| match t.role {
                TurnRole::User => format!("User: {}", t.content),
                TurnRole::Assistant => {
                    let content: String = t.content.chars().take(200).collect();
                    format!("Assistant: {content}")
                }
            })
            .collect();
        if lines.is_empty() {
            lines.push("(No conversation yet)".to_string());
        }
        lines.join("\n")
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Services grouped by category in the final record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCategoryOutput {
    pub category: String,
    pub category_id: u32,
    pub subcategories: Vec<SubcategoryOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcategoryOutput {
    pub name: String,
    pub id: u32,
}

/// The final structured output, produced once at `Complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalRecord {
    pub business_name: String,
    pub abn: String,
    pub entity_type: String,
    pub gst_registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licence: Option<LicenceProfile>,
    pub services: Vec<ServiceCategoryOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageArea>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanChoice>,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_phone: String,
}

impl FinalRecord {
    /// Assemble the final record from collected facts.
    pub fn from_facts(facts: &CollectedFacts) -> Self {
        let identity = facts.confirmed_identity().cloned().unwrap_or_default();

        let mut services: Vec<ServiceCategoryOutput> = Vec::new();
        for selection in facts
            .services
            .as_ref()
            .map(|s| s.services.as_slice())
            .unwrap_or_default()
        {
            let entry = SubcategoryOutput {
                name: selection.subcategory_name.clone(),
                id: selection.subcategory_id,
            };
            match services
                .iter_mut()
                .find(|c| c.category == selection.category_name)
            {
                Some(category) => category.subcategories.push(entry),
                None => services.push(ServiceCategoryOutput {
                    category: selection.category_name.clone(),
                    category_id: selection.category_id,
                    subcategories: vec![entry],
                }),
            }
        }

        let enrichment = facts.enrichment.as_ref();

        Self {
            business_name: identity.business_name,
            abn: identity.abn,
            entity_type: identity.entity_type,
            gst_registered: identity.gst_registered,
            licence: enrichment.and_then(|e| e.licence().cloned()),
            services,
            coverage: facts.coverage.as_ref().and_then(|c| c.area.clone()),
            plan: facts.plan.as_ref().map(|p| p.choice.clone()),
            contact_name: enrichment.map(|e| e.contact_name.clone()).unwrap_or_default(),
            contact_phone: enrichment
                .map(|e| e.contact_phone.clone())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_greeting() {
        let session = Session::new();
        assert_eq!(session.current_node, NodeId::Greeting);
        assert_eq!(session.turn_counter, 0);
        assert!(!session.completed);
        assert!(session.final_record.is_none());
    }

    #[test]
    fn turn_counter_increments_on_user_turns_only() {
        let mut session = Session::new();
        session.push_user_turn("hello");
        session.push_assistant_turn("hi there");
        session.push_user_turn("51824753556");
        assert_eq!(session.turn_counter, 2);
        assert_eq!(session.transcript.len(), 3);
        assert_eq!(session.last_user_message(), Some("51824753556"));
    }

    #[test]
    fn recent_conversation_formats_roles() {
        let mut session = Session::new();
        session.push_user_turn("hi");
        session.push_assistant_turn("hello!");
        let text = session.recent_conversation(4);
        assert!(text.contains("User: hi"));
        assert!(text.contains("Assistant: hello!"));
    }

    #[test]
    fn recent_conversation_empty_placeholder() {
        let session = Session::new();
        assert_eq!(session.recent_conversation(4), "(No conversation yet)");
    }

    #[test]
    fn facts_accessors_create_slots() {
        let mut facts = CollectedFacts::default();
        assert!(facts.identity.is_none());
        facts.identity_mut().search_input = "dans plumbing".to_string();
        assert_eq!(facts.identity.as_ref().unwrap().search_input, "dans plumbing");
    }

    #[test]
    fn final_record_groups_services_by_category() {
        use crate::normalize::ServiceSelection;

        let mut facts = CollectedFacts::default();
        facts.identity_mut().confirmed = Some(ConfirmedIdentity {
            business_name: "SAMPLE PLUMBING".into(),
            abn: "51824753556".into(),
            entity_type: "Company".into(),
            gst_registered: true,
            state: "NSW".into(),
            postcode: "2095".into(),
        });
        let services = facts.services_mut();
        for (category, category_id, sub, sub_id) in [
            ("Plumber", 2, "General Plumbing", 201),
            ("Plumber", 2, "Hot Water Systems", 203),
            ("Electrician", 1, "Rewiring", 102),
        ] {
            services.services.push(ServiceSelection {
                input: String::new(),
                category_name: category.into(),
                category_id,
                subcategory_name: sub.into(),
                subcategory_id: sub_id,
                confidence: None,
            });
        }

        let record = FinalRecord::from_facts(&facts);
        assert_eq!(record.business_name, "SAMPLE PLUMBING");
        assert_eq!(record.services.len(), 2);
        assert_eq!(record.services[0].category, "Plumber");
        assert_eq!(record.services[0].subcategories.len(), 2);
        assert_eq!(record.services[1].subcategories.len(), 1);
    }

    #[test]
    fn session_serde_roundtrip() {
        let mut session = Session::new();
        session.push_user_turn("hello");
        session.facts.services_mut().confirmed = true;
        session.current_node = NodeId::ServiceArea;

        let json = serde_json::to_string(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, session.id);
        assert_eq!(parsed.current_node, NodeId::ServiceArea);
        assert_eq!(parsed.turn_counter, 1);
        assert!(parsed.facts.services.unwrap().confirmed);
    }
}
